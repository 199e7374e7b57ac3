//! Comment command handlers

use ghnotes_core::Comment;
use ghnotes_core::note::mask_email;

use crate::cli::{CliRepository, block_on, report_error, report_error_as};

/// Add a comment to a note
pub fn handle_comment(
    repo: &CliRepository,
    id: &str,
    author: String,
    email: Option<String>,
    body: String,
) -> bool {
    let comment = Comment::new(id, author, email, body);
    match block_on(repo.save_comment(&comment)) {
        Ok(count) => {
            println!("✓ Comment added to {} ({} total)", id, count);
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// List the comments on a note, newest first
pub fn handle_comments(repo: &CliRepository, id: &str, json: bool) -> bool {
    let comments = match block_on(repo.get_comments(id)) {
        Ok(comments) => comments,
        Err(e) => {
            report_error_as(&e, json);
            return false;
        }
    };

    if json {
        // Addresses are masked in every output format
        let masked: Vec<Comment> = comments
            .into_iter()
            .map(|mut c| {
                c.email = c.email.as_deref().map(mask_email);
                c
            })
            .collect();
        return match serde_json::to_string_pretty(&masked) {
            Ok(out) => {
                println!("{}", out);
                true
            }
            Err(e) => {
                eprintln!("✗ {}", e);
                false
            }
        };
    }

    if comments.is_empty() {
        println!("No comments on {}.", id);
        return true;
    }
    for comment in &comments {
        let who = match &comment.email {
            Some(email) => format!("{} <{}>", comment.author, mask_email(email)),
            None => comment.author.clone(),
        };
        println!("{}  {}", comment.date.format("%Y-%m-%d %H:%M"), who);
        for line in comment.body.lines() {
            println!("    {}", line);
        }
    }
    true
}

/// Count comments for several notes
pub fn handle_counts(repo: &CliRepository, ids: &[String]) -> bool {
    let counts = block_on(repo.batch_get_comment_counts(ids));
    for (id, count) in &counts {
        println!("{:>4}  {}", count, id);
    }
    true
}
