//! `ghnotes`: manage blog notes and comments stored in a GitHub repository.

/// CLI module - command-line interface for ghnotes
mod cli;

fn main() {
    cli::run_cli();
}
