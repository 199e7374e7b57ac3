//! The note index (`notes.json`).
//!
//! The index lists every note as an [`IndexEntry`] and keeps a tag histogram
//! in `all_tags`. Every mutation goes through [`NoteIndex::upsert`] so that
//! `all_tags[t]` always equals the number of entries carrying `t`, with no
//! zero or negative counts left behind.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::note::{Note, NoteType};

/// Path of the index document.
pub const INDEX_PATH: &str = "notes.json";

/// Current index schema version.
pub const INDEX_VERSION: u32 = 2;

/// Summary of a note as stored in the index.
///
/// Exactly one of `content` (inline body) and `content_ref` (path of a
/// satellite file) is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Note id
    pub id: String,
    /// Title
    pub title: String,
    /// Content type
    #[serde(rename = "type", default)]
    pub note_type: NoteType,
    /// Inline body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Satellite path holding the body
    #[serde(
        rename = "contentRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_ref: Option<String>,
    /// Tag set
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation date
    pub date: DateTime<Utc>,
    /// Short summary
    #[serde(default)]
    pub excerpt: String,
    /// `excerpt` was derived from the content rather than given by the author
    #[serde(
        rename = "excerptGenerated",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub excerpt_generated: bool,
}

impl IndexEntry {
    /// Entry carrying the body inline.
    pub fn inline(note: &Note) -> Self {
        Self {
            content: Some(note.content.clone()),
            content_ref: None,
            ..Self::summary(note)
        }
    }

    /// Entry pointing at a satellite file.
    pub fn referenced(note: &Note, path: impl Into<String>) -> Self {
        Self {
            content: None,
            content_ref: Some(path.into()),
            ..Self::summary(note)
        }
    }

    fn summary(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            note_type: note.note_type,
            content: None,
            content_ref: None,
            tags: note.tags.clone(),
            date: note.date,
            excerpt: note.excerpt_or_generated(),
            excerpt_generated: !note.has_excerpt(),
        }
    }

    /// Build a note from this entry with the given body.
    pub fn to_note(&self, content: String) -> Note {
        Note {
            id: self.id.clone(),
            title: self.title.clone(),
            note_type: self.note_type,
            content,
            tags: self.tags.clone(),
            date: self.date,
            excerpt: Some(self.excerpt.clone())
                .filter(|e| !self.excerpt_generated && !e.is_empty()),
            comments: Vec::new(),
        }
    }
}

/// The `notes.json` document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteIndex {
    /// Note summaries, newest insertion first
    #[serde(default)]
    pub notes: Vec<IndexEntry>,
    /// Tag histogram
    #[serde(default)]
    pub all_tags: IndexMap<String, i64>,
    /// Time of the last write
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Schema version
    #[serde(default)]
    pub version: u32,
}

impl NoteIndex {
    /// An empty index at the current version.
    pub fn new() -> Self {
        Self {
            version: INDEX_VERSION,
            ..Self::default()
        }
    }

    /// Find an entry by id.
    pub fn find(&self, id: &str) -> Option<&IndexEntry> {
        self.notes.iter().find(|e| e.id == id)
    }

    /// Insert a new entry at the front, or replace the entry with the same
    /// id in place. Returns the replaced entry.
    pub fn upsert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        let new_tags = entry.tags.clone();
        let previous = match self.notes.iter().position(|e| e.id == entry.id) {
            Some(pos) => Some(std::mem::replace(&mut self.notes[pos], entry)),
            None => {
                self.notes.insert(0, entry);
                None
            }
        };

        if let Some(old) = &previous {
            for tag in &old.tags {
                *self.all_tags.entry(tag.clone()).or_insert(0) -= 1;
            }
        }
        for tag in &new_tags {
            *self.all_tags.entry(tag.clone()).or_insert(0) += 1;
        }
        self.all_tags.retain(|_, count| *count > 0);

        previous
    }

    /// Rebuild `all_tags` from the entries.
    pub fn recount_tags(&mut self) {
        let mut counts: IndexMap<String, i64> = IndexMap::new();
        for entry in &self.notes {
            for tag in &entry.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        self.all_tags = counts;
    }

    /// Bring an older index up to the current schema: duplicate ids are
    /// dropped (first wins) and tags recounted. Returns whether anything
    /// changed.
    pub fn migrate(&mut self) -> bool {
        if self.version >= INDEX_VERSION {
            return false;
        }

        let mut seen = BTreeSet::new();
        self.notes.retain(|e| seen.insert(e.id.clone()));
        self.recount_tags();
        log::info!(
            "[notes] Migrated index from version {} to {}",
            self.version,
            INDEX_VERSION
        );
        self.version = INDEX_VERSION;
        true
    }

    /// Stamp the index before writing it.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
        self.version = INDEX_VERSION;
    }

    /// Entries by date, newest first. Equal dates keep index order.
    pub fn sorted_by_date(&self) -> Vec<IndexEntry> {
        let mut entries = self.notes.clone();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn note(id: &str, tags: &[&str], day: u32) -> Note {
        Note {
            id: id.to_string(),
            title: id.to_string(),
            note_type: NoteType::Markdown,
            content: format!("body of {}", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            excerpt: None,
            comments: Vec::new(),
        }
    }

    fn tags(index: &NoteIndex) -> Vec<(&str, i64)> {
        let mut tags: Vec<_> = index.all_tags.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        tags.sort();
        tags
    }

    #[test]
    fn test_upsert_tracks_tag_counts() {
        let mut index = NoteIndex::new();
        index.upsert(IndexEntry::inline(&note("note-1", &["a", "b"], 1)));
        index.upsert(IndexEntry::inline(&note("note-2", &["b"], 2)));
        assert_eq!(tags(&index), vec![("a", 1), ("b", 2)]);

        let previous = index.upsert(IndexEntry::inline(&note("note-1", &["b", "c"], 1)));
        assert_eq!(previous.unwrap().tags.len(), 2);
        assert_eq!(tags(&index), vec![("b", 2), ("c", 1)]);
        assert_eq!(index.notes.len(), 2);
    }

    #[test]
    fn test_new_entries_go_first_and_updates_stay_in_place() {
        let mut index = NoteIndex::new();
        index.upsert(IndexEntry::inline(&note("note-1", &[], 1)));
        index.upsert(IndexEntry::inline(&note("note-2", &[], 2)));
        index.upsert(IndexEntry::inline(&note("note-1", &["x"], 1)));

        let ids: Vec<_> = index.notes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["note-2", "note-1"]);
    }

    #[test]
    fn test_corrupt_counts_are_pruned_on_upsert() {
        let mut index = NoteIndex::new();
        index.all_tags.insert("ghost".into(), 0);
        index.all_tags.insert("negative".into(), -2);
        index.upsert(IndexEntry::inline(&note("note-1", &["a"], 1)));
        assert_eq!(tags(&index), vec![("a", 1)]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_dates() {
        let mut index = NoteIndex::new();
        index.notes = vec![
            IndexEntry::inline(&note("first", &[], 1)),
            IndexEntry::inline(&note("newest", &[], 5)),
            IndexEntry::inline(&note("second", &[], 1)),
        ];
        let ids: Vec<_> = index.sorted_by_date().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["newest", "first", "second"]);
    }

    #[test]
    fn test_legacy_index_is_migrated() {
        let json = r#"{
            "notes": [
                {"id": "note-1", "title": "A", "content": "x", "tags": ["a"], "date": "2024-01-01T00:00:00Z"},
                {"id": "note-1", "title": "A dup", "content": "y", "tags": ["z"], "date": "2024-01-01T00:00:00Z"},
                {"id": "note-2", "title": "B", "content": "y", "tags": ["a", "b"], "date": "2024-01-02T00:00:00Z"}
            ]
        }"#;
        let mut index: NoteIndex = serde_json::from_str(json).unwrap();
        assert_eq!(index.version, 0);
        assert!(index.migrate());
        assert_eq!(index.version, INDEX_VERSION);
        assert_eq!(index.notes.len(), 2);
        assert_eq!(tags(&index), vec![("a", 2), ("b", 1)]);
        assert!(!index.migrate());
    }

    #[test]
    fn test_entry_wire_format() {
        let n = note("note-1", &["a"], 1);
        let value = serde_json::to_value(IndexEntry::referenced(&n, "notes/note-1.json")).unwrap();
        assert_eq!(value["contentRef"], "notes/note-1.json");
        assert_eq!(value["type"], "markdown");
        assert!(value.get("content").is_none());
        assert_eq!(value["excerpt"], "body of note-1");
        assert_eq!(value["excerptGenerated"], true);
    }

    #[test]
    fn test_to_note_round_trips_summary() {
        let mut n = note("note-1", &["a"], 1);
        n.excerpt = Some("short".into());
        let entry = IndexEntry::inline(&n);
        assert_eq!(entry.to_note(n.content.clone()), n);
    }

    #[test]
    fn test_generated_excerpt_is_not_returned_as_authored() {
        let n = note("note-1", &["a"], 1);
        let entry = IndexEntry::inline(&n);
        assert_eq!(entry.excerpt, "body of note-1");
        assert!(entry.excerpt_generated);
        assert_eq!(entry.to_note(n.content.clone()), n);

        // Older entries carry no flag and keep their excerpt
        let json = r#"{"id": "note-2", "title": "B", "content": "y", "date": "2024-01-02T00:00:00Z", "excerpt": "kept"}"#;
        let legacy: IndexEntry = serde_json::from_str(json).unwrap();
        assert_eq!(legacy.to_note("y".into()).excerpt.as_deref(), Some("kept"));
    }
}
