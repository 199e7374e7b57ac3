//! Note command handlers

use std::path::PathBuf;

use chrono::Utc;
use ghnotes_core::note::normalize_tags;
use ghnotes_core::sitemap::{default_pages, generate_sitemap};
use ghnotes_core::{Config, IndexEntry, Note, NoteError, NoteType};

use crate::cli::{CliRepository, block_on, report_error, report_error_as};

/// Fields changed by `ghnotes edit`; `None` keeps the current value.
pub struct NoteChanges {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub file: Option<PathBuf>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
}

/// Content from `--file` or `--content`.
fn read_body(file: Option<PathBuf>, content: Option<String>) -> Result<Option<String>, String> {
    match (file, content) {
        (Some(path), _) => std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e)),
        (None, content) => Ok(content),
    }
}

fn print_entry_line(entry: &IndexEntry) {
    let tags = if entry.tags.is_empty() {
        String::new()
    } else {
        format!(
            " [{}]",
            entry.tags.iter().cloned().collect::<Vec<_>>().join(", ")
        )
    };
    println!(
        "{}  {}  {}{}",
        entry.date.format("%Y-%m-%d"),
        entry.id,
        entry.title,
        tags
    );
}

/// List notes, optionally filtered by tag
pub fn handle_list(repo: &CliRepository, tag: Option<String>, json: bool) -> bool {
    let entries = match block_on(repo.list_notes()) {
        Ok(entries) => entries,
        Err(e) => {
            report_error_as(&e, json);
            return false;
        }
    };
    let entries: Vec<IndexEntry> = match tag {
        Some(tag) => entries.into_iter().filter(|e| e.tags.contains(&tag)).collect(),
        None => entries,
    };

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No notes.");
        return true;
    }
    for entry in &entries {
        print_entry_line(entry);
    }
    true
}

/// Show one note with its content
pub fn handle_show(repo: &CliRepository, id: &str, json: bool) -> bool {
    let note = match block_on(repo.get_note_by_id(id)) {
        Ok(Some(note)) => note,
        Ok(None) if json => {
            report_error_as(&NoteError::NotFound(format!("note {}", id)), true);
            return false;
        }
        Ok(None) => {
            eprintln!("✗ No note with id '{}'", id);
            return false;
        }
        Err(e) => {
            report_error_as(&e, json);
            return false;
        }
    };

    if json {
        return print_json(&note);
    }

    println!("{}", note.title);
    println!("{}", "=".repeat(note.title.chars().count().max(3)));
    println!("id: {}", note.id);
    println!("type: {}", note.note_type.as_str());
    println!("date: {}", note.date.to_rfc3339());
    if !note.tags.is_empty() {
        println!("tags: {}", note.tags.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    println!();
    println!("{}", note.content);
    true
}

/// Create a note
pub fn handle_new(
    repo: &CliRepository,
    title: String,
    tags: Vec<String>,
    html: bool,
    file: Option<PathBuf>,
    content: Option<String>,
    excerpt: Option<String>,
) -> bool {
    let body = match read_body(file, content) {
        Ok(body) => body.unwrap_or_default(),
        Err(e) => {
            eprintln!("✗ {}", e);
            return false;
        }
    };

    let note_type = if html { NoteType::Html } else { NoteType::Markdown };
    let mut note = Note::new(title, note_type, body).with_tags(tags);
    note.excerpt = excerpt;

    match block_on(repo.save_note(&note)) {
        Ok(entry) => {
            println!("✓ Created {}: {}", entry.id, entry.title);
            if let Some(path) = entry.content_ref {
                println!("  Content stored in {}", path);
            }
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// Apply changes to an existing note
pub fn handle_edit(repo: &CliRepository, id: &str, changes: NoteChanges) -> bool {
    let body = match read_body(changes.file, changes.content) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("✗ {}", e);
            return false;
        }
    };

    block_on(async {
        let mut note = match repo.get_note_by_id(id).await {
            Ok(Some(note)) => note,
            Ok(None) => {
                eprintln!("✗ No note with id '{}'", id);
                return false;
            }
            Err(e) => {
                report_error(&e);
                return false;
            }
        };

        let content_changed = body.is_some();
        if let Some(title) = changes.title {
            note.title = title;
        }
        if let Some(tags) = changes.tags {
            note.tags = normalize_tags(tags);
        }
        if let Some(body) = body {
            note.content = body;
        }
        match changes.excerpt {
            Some(excerpt) => note.excerpt = Some(excerpt),
            // A stale summary would describe the old text
            None if content_changed => note.excerpt = None,
            None => {}
        }

        match repo.update_note(id, &note).await {
            Ok(entry) => {
                println!("✓ Updated {}: {}", entry.id, entry.title);
                true
            }
            Err(e) => {
                report_error(&e);
                false
            }
        }
    })
}

/// Read note documents straight from the note folders
pub fn handle_scan(repo: &CliRepository, folder: Option<String>) -> bool {
    let result = block_on(async {
        match folder {
            Some(folder) => repo.scan_folder(&folder).await,
            None => repo.scan_all_notes().await,
        }
    });

    match result {
        Ok(notes) => {
            for note in &notes {
                println!(
                    "{}  {}  {} ({})",
                    note.date.format("%Y-%m-%d"),
                    note.id,
                    note.title,
                    note.note_type.as_str()
                );
            }
            println!("{} note document(s) found", notes.len());
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// Show the tag histogram
pub fn handle_tags(repo: &CliRepository) -> bool {
    match block_on(repo.tag_counts()) {
        Ok(tags) => {
            let mut tags: Vec<_> = tags.into_iter().collect();
            tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            if tags.is_empty() {
                println!("No tags.");
            }
            for (tag, count) in tags {
                println!("{:>4}  {}", count, tag);
            }
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// Generate sitemap.xml from the index
pub fn handle_sitemap(
    repo: &CliRepository,
    config: &Config,
    domain: Option<String>,
    output: Option<PathBuf>,
) -> bool {
    let Some(domain) = domain.or_else(|| config.site_domain.clone()) else {
        eprintln!("✗ No site domain; pass --domain or set site_domain in the config");
        return false;
    };

    let entries = match block_on(repo.list_notes()) {
        Ok(entries) => entries,
        Err(e) => {
            report_error(&e);
            return false;
        }
    };

    let xml = generate_sitemap(&domain, &default_pages(), &entries, Utc::now().date_naive());
    match output {
        Some(path) => match std::fs::write(&path, xml) {
            Ok(()) => {
                println!(
                    "✓ Wrote {} ({} note pages)",
                    path.display(),
                    entries.len()
                );
                true
            }
            Err(e) => {
                eprintln!("✗ Failed to write '{}': {}", path.display(), e);
                false
            }
        },
        None => {
            print!("{}", xml);
            true
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> bool {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}
