//! Command-line argument structures and enums

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ghnotes")]
#[command(version)]
#[command(about = "Manage blog notes and comments stored in a GitHub repository", long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Password that unlocks the stored API token
    #[arg(long, global = true, env = "GHNOTES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update the configuration file
    Init {
        /// Repository owner (user or organization)
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// Branch holding the notes (default: main)
        #[arg(long)]
        branch: Option<String>,

        /// API base URL, for GitHub Enterprise
        #[arg(long)]
        api_base: Option<String>,

        /// Public site address used by `sitemap`
        #[arg(long)]
        site_domain: Option<String>,
    },

    /// Show current configuration
    Config,

    /// Encrypt an API token read from stdin
    EncryptToken {
        /// PBKDF2 iteration count
        #[arg(long, default_value_t = ghnotes_core::credential::DEFAULT_ITERATIONS)]
        iterations: u32,

        /// Store the encrypted bundle in the config file instead of printing it
        #[arg(long)]
        save: bool,
    },

    /// Verify the token can reach the repository
    Check {
        /// Create an empty notes.json if the repository has none
        #[arg(long)]
        create_index: bool,
    },

    /// List notes, newest first
    #[command(alias = "ls")]
    List {
        /// Only notes with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one note
    Show {
        /// Note id (e.g. note-1704164645000)
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Create a note
    New {
        /// Note title
        #[arg(short, long)]
        title: String,

        /// Tag (repeatable)
        #[arg(short = 'g', long = "tag")]
        tags: Vec<String>,

        /// Store the content as HTML instead of markdown
        #[arg(long)]
        html: bool,

        /// Read content from a file
        #[arg(short, long, conflicts_with = "content", required_unless_present = "content")]
        file: Option<PathBuf>,

        /// Content given inline
        #[arg(long)]
        content: Option<String>,

        /// Summary shown in listings (default: start of the content)
        #[arg(long)]
        excerpt: Option<String>,
    },

    /// Change an existing note
    Edit {
        /// Note id
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// Replace the tags (repeatable)
        #[arg(short = 'g', long = "tag")]
        tags: Vec<String>,

        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,

        /// Read new content from a file
        #[arg(short, long, conflicts_with = "content")]
        file: Option<PathBuf>,

        /// New content given inline
        #[arg(long)]
        content: Option<String>,

        /// New summary
        #[arg(long)]
        excerpt: Option<String>,
    },

    /// Add a comment to a note
    Comment {
        /// Note id
        id: String,

        /// Display name
        #[arg(short, long)]
        author: String,

        /// Contact email (stored, shown masked)
        #[arg(short, long)]
        email: Option<String>,

        /// Comment text
        #[arg(short, long)]
        body: String,
    },

    /// List the comments on a note, newest first
    Comments {
        /// Note id
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Count comments for several notes
    Counts {
        /// Note ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Read note documents directly from the note folders
    Scan {
        /// Only this folder (default: notes/ and htmlnotes/)
        #[arg(long)]
        folder: Option<String>,
    },

    /// Show tag counts
    Tags,

    /// Generate sitemap.xml
    Sitemap {
        /// Site address (default: site_domain from config)
        #[arg(short, long)]
        domain: Option<String>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_new_requires_content_source() {
        assert!(Cli::try_parse_from(["ghnotes", "new", "--title", "T"]).is_err());
        assert!(
            Cli::try_parse_from([
                "ghnotes", "new", "--title", "T", "--content", "x", "--file", "a.md"
            ])
            .is_err()
        );

        let cli = Cli::try_parse_from([
            "ghnotes", "new", "--title", "T", "-g", "a", "-g", "b", "--content", "x",
        ])
        .unwrap();
        match cli.command {
            Commands::New { tags, content, .. } => {
                assert_eq!(tags, vec!["a", "b"]);
                assert_eq!(content.as_deref(), Some("x"));
            }
            _ => panic!("expected new"),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["ghnotes", "list", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
