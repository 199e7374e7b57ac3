//! Note repository: domain operations over a [`ContentStore`].
//!
//! Remote layout:
//!
//! | path | content |
//! |---|---|
//! | `notes.json` | the [`NoteIndex`] |
//! | `notes/{id}.json` | full note document, for markdown notes above the inline limit |
//! | `notecontent/{id}.html` | raw body of HTML notes |
//! | `comments/{id}.json` | array of comments for note `id` |
//!
//! `htmlnotes/` is an older per-note folder that is still read by
//! [`NoteRepository::scan_all_notes`] but never written.
//!
//! Each read-modify-write reads the revision token at the start and hands it
//! to the final write, so a concurrent change surfaces as
//! [`NoteError::Conflict`]; the configured [`ConflictRetry`] then re-runs the
//! whole sequence.

use chrono::Utc;
use futures_util::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::{Config, DEFAULT_INLINE_CONTENT_LIMIT};
use crate::error::{NoteError, Result};
use crate::index::{INDEX_PATH, IndexEntry, NoteIndex};
use crate::note::{Comment, Note, NoteType, validate_id};
use crate::retry::ConflictRetry;
use crate::store::{ContentStore, EntryKind};

/// Folder of full note documents.
pub const NOTES_DIR: &str = "notes";
/// Legacy folder of HTML note documents.
pub const LEGACY_HTML_DIR: &str = "htmlnotes";
/// Folder of raw HTML bodies.
pub const HTML_CONTENT_DIR: &str = "notecontent";
/// Folder of comment collections.
pub const COMMENTS_DIR: &str = "comments";

/// Path of the full document for a note.
pub fn note_document_path(id: &str) -> String {
    format!("{}/{}.json", NOTES_DIR, id)
}

/// Path of the raw HTML body for a note.
pub fn html_content_path(id: &str) -> String {
    format!("{}/{}.html", HTML_CONTENT_DIR, id)
}

/// Path of the comment collection for a note.
pub fn comments_path(id: &str) -> String {
    format!("{}/{}.json", COMMENTS_DIR, id)
}

/// Notes and comments stored in a [`ContentStore`].
pub struct NoteRepository<S> {
    store: S,
    retry: ConflictRetry,
    inline_limit: usize,
}

impl<S: ContentStore> NoteRepository<S> {
    /// Create a repository with the default retry policy and inline limit.
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: ConflictRetry::default(),
            inline_limit: DEFAULT_INLINE_CONTENT_LIMIT,
        }
    }

    /// Create a repository using the retry policy and inline limit from `config`.
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store)
            .with_retry(config.conflict_retry())
            .with_inline_limit(config.inline_content_limit)
    }

    /// Set the conflict retry policy (builder pattern).
    pub fn with_retry(mut self, retry: ConflictRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Set the largest markdown body kept inline in the index (builder pattern).
    pub fn with_inline_limit(mut self, limit: usize) -> Self {
        self.inline_limit = limit;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ==================== Notes ====================

    /// Save a note: write its content, then insert or replace its index entry.
    pub async fn save_note(&self, note: &Note) -> Result<IndexEntry> {
        validate_id(&note.id)?;
        let entry = self.write_content(note).await?;
        self.retry
            .run("save note", move || self.upsert_entry(entry.clone(), false))
            .await
    }

    /// Replace an existing note. Fails with `NotFound` if `id` is not indexed.
    pub async fn update_note(&self, id: &str, note: &Note) -> Result<IndexEntry> {
        validate_id(id)?;
        let (index, _) = self.read_index().await?;
        if index.find(id).is_none() {
            return Err(NoteError::NotFound(format!("note {}", id)));
        }

        let mut note = note.clone();
        note.id = id.to_string();
        let entry = self.write_content(&note).await?;
        self.retry
            .run("update note", move || self.upsert_entry(entry.clone(), true))
            .await
    }

    /// Fetch a note with its content resolved. Comments are not loaded.
    pub async fn get_note_by_id(&self, id: &str) -> Result<Option<Note>> {
        validate_id(id)?;
        let (index, _) = self.read_index().await?;
        let Some(entry) = index.find(id) else {
            return Ok(None);
        };

        let content = self.resolve_content(entry).await?;
        Ok(Some(entry.to_note(content)))
    }

    /// All index entries, newest first.
    pub async fn list_notes(&self) -> Result<Vec<IndexEntry>> {
        let (index, _) = self.read_index().await?;
        Ok(index.sorted_by_date())
    }

    /// Tag histogram from the index.
    pub async fn tag_counts(&self) -> Result<IndexMap<String, i64>> {
        let (index, _) = self.read_index().await?;
        Ok(index.all_tags)
    }

    /// The index as stored (migrated in memory if it is an older version).
    pub async fn load_index(&self) -> Result<NoteIndex> {
        Ok(self.read_index().await?.0)
    }

    /// Create an empty index if none exists. Returns whether one was created.
    pub async fn init_index(&self) -> Result<bool> {
        if self.store.get(INDEX_PATH).await?.is_some() {
            return Ok(false);
        }

        let mut index = NoteIndex::new();
        index.touch(Utc::now());
        match self
            .write_json(INDEX_PATH, &index, "Initialize notes index", None)
            .await
        {
            Ok(_) => Ok(true),
            // Someone else created it first
            Err(NoteError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ==================== Comments ====================

    /// Append a comment to its note's collection. Returns the new count.
    pub async fn save_comment(&self, comment: &Comment) -> Result<usize> {
        comment.validate()?;
        let path = comments_path(&comment.note_id);
        let path = path.as_str();
        self.retry
            .run("save comment", move || self.append_comment(path, comment))
            .await
    }

    /// Comments of a note, newest first.
    pub async fn get_comments(&self, id: &str) -> Result<Vec<Comment>> {
        validate_id(id)?;
        let mut comments: Vec<Comment> = self
            .read_json::<Vec<Comment>>(&comments_path(id))
            .await?
            .map(|(comments, _)| comments)
            .unwrap_or_default();
        comments.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(comments)
    }

    /// Comment counts for several notes, fetched concurrently. A note whose
    /// comments cannot be read counts as zero.
    pub async fn batch_get_comment_counts(&self, ids: &[String]) -> IndexMap<String, usize> {
        let results = join_all(ids.iter().map(|id| self.get_comments(id))).await;

        ids.iter()
            .zip(results)
            .map(|(id, result)| {
                let count = match result {
                    Ok(comments) => comments.len(),
                    Err(e) => {
                        log::warn!("[notes] Could not count comments for {}: {}", id, e);
                        0
                    }
                };
                (id.clone(), count)
            })
            .collect()
    }

    // ==================== Scanning ====================

    /// Read every `*.json` note document in `dir`, newest first. Documents
    /// that cannot be read or parsed are skipped.
    pub async fn scan_folder(&self, dir: &str) -> Result<Vec<Note>> {
        let entries = self.store.list(dir).await?;
        let paths: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == EntryKind::File && e.name.ends_with(".json"))
            .map(|e| e.path)
            .collect();

        let results = join_all(paths.iter().map(|path| self.read_json::<Note>(path))).await;

        let mut notes = Vec::with_capacity(paths.len());
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(Some((note, _))) => notes.push(note),
                Ok(None) => log::debug!("[notes] {} disappeared during scan", path),
                Err(e) => log::warn!("[notes] Skipping {}: {}", path, e),
            }
        }

        notes.sort_by(|a, b| b.date.cmp(&a.date));
        log::debug!("[notes] Scanned {} notes in {}/", notes.len(), dir);
        Ok(notes)
    }

    /// Scan both note folders concurrently, newest first. A folder that
    /// cannot be listed is skipped.
    pub async fn scan_all_notes(&self) -> Result<Vec<Note>> {
        let folders = [NOTES_DIR, LEGACY_HTML_DIR];
        let results = join_all(folders.iter().map(|dir| self.scan_folder(dir))).await;

        let mut notes: Vec<Note> = Vec::new();
        for (dir, result) in folders.iter().zip(results) {
            match result {
                Ok(found) => {
                    for note in found {
                        if !notes.iter().any(|n| n.id == note.id) {
                            notes.push(note);
                        }
                    }
                }
                Err(e) => log::warn!("[notes] Could not scan {}/: {}", dir, e),
            }
        }

        notes.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(notes)
    }

    // ==================== Internals ====================

    async fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<(T, String)>> {
        let Some(file) = self.store.get(path).await? else {
            return Ok(None);
        };
        let text = file.text()?;
        let value = serde_json::from_str(&text).map_err(|e| NoteError::Json {
            path: path.to_string(),
            source: e,
        })?;
        Ok(Some((value, file.sha)))
    }

    async fn write_json<T: Serialize>(
        &self,
        path: &str,
        value: &T,
        message: &str,
        sha: Option<&str>,
    ) -> Result<String> {
        let json = serde_json::to_string_pretty(value)?;
        self.store.put(path, json.as_bytes(), message, sha).await
    }

    async fn read_index(&self) -> Result<(NoteIndex, Option<String>)> {
        match self.read_json::<NoteIndex>(INDEX_PATH).await? {
            Some((mut index, sha)) => {
                index.migrate();
                Ok((index, Some(sha)))
            }
            None => {
                log::debug!("[notes] No index at {}, starting empty", INDEX_PATH);
                Ok((NoteIndex::new(), None))
            }
        }
    }

    async fn upsert_entry(&self, entry: IndexEntry, must_exist: bool) -> Result<IndexEntry> {
        let (mut index, sha) = self.read_index().await?;
        if must_exist && index.find(&entry.id).is_none() {
            return Err(NoteError::NotFound(format!("note {}", entry.id)));
        }

        let previous = index.upsert(entry.clone());
        index.touch(Utc::now());

        let message = match &previous {
            Some(_) => format!("Update note: {}", entry.title),
            None => format!("Add note: {}", entry.title),
        };
        if let Some(stale) = previous
            .and_then(|old| old.content_ref)
            .filter(|old| entry.content_ref.as_ref() != Some(old))
        {
            log::info!("[notes] {} is no longer referenced by {}", stale, entry.id);
        }
        self.write_json(INDEX_PATH, &index, &message, sha.as_deref())
            .await?;
        log::info!("[notes] {}", message);
        Ok(entry)
    }

    /// Write the note body where it belongs and return the matching index entry.
    ///
    /// When a note changes placement (HTML to markdown, or a large body
    /// shrinking under the inline limit) the old satellite is left in the
    /// repository. Only the index decides which file is read.
    async fn write_content(&self, note: &Note) -> Result<IndexEntry> {
        match note.note_type {
            NoteType::Html => {
                let path = html_content_path(&note.id);
                self.replace_file(&path, note.content.as_bytes(), &note.title)
                    .await?;
                Ok(IndexEntry::referenced(note, path))
            }
            NoteType::Markdown if note.content.len() > self.inline_limit => {
                let path = note_document_path(&note.id);
                let mut document = note.clone();
                document.comments.clear();
                let json = serde_json::to_string_pretty(&document)?;
                self.replace_file(&path, json.as_bytes(), &note.title)
                    .await?;
                Ok(IndexEntry::referenced(note, path))
            }
            NoteType::Markdown => Ok(IndexEntry::inline(note)),
        }
    }

    /// Create or overwrite a satellite file under its current revision token.
    async fn replace_file(&self, path: &str, content: &[u8], title: &str) -> Result<()> {
        let message = format!("Save content: {}", title);
        let message = message.as_str();
        self.retry
            .run("write note content", move || async move {
                let sha = self.store.get(path).await?.map(|f| f.sha);
                self.store
                    .put(path, content, message, sha.as_deref())
                    .await
            })
            .await?;
        log::debug!("[notes] Wrote {} ({} bytes)", path, content.len());
        Ok(())
    }

    async fn resolve_content(&self, entry: &IndexEntry) -> Result<String> {
        if let Some(content) = &entry.content {
            return Ok(content.clone());
        }

        if let Some(path) = &entry.content_ref {
            let file = self
                .store
                .get(path)
                .await?
                .ok_or_else(|| NoteError::NotFound(path.clone()))?;
            if path.ends_with(".json") {
                let text = file.text()?;
                let document: Note = serde_json::from_str(&text).map_err(|e| NoteError::Json {
                    path: path.clone(),
                    source: e,
                })?;
                return Ok(document.content);
            }
            return file.text();
        }

        // Entries written before bodies were indexed point at a per-note document
        let legacy_dir = match entry.note_type {
            NoteType::Html => LEGACY_HTML_DIR,
            NoteType::Markdown => NOTES_DIR,
        };
        let path = format!("{}/{}.json", legacy_dir, entry.id);
        match self.read_json::<Note>(&path).await? {
            Some((document, _)) => Ok(document.content),
            None => {
                log::warn!("[notes] No content found for {}", entry.id);
                Ok(String::new())
            }
        }
    }

    async fn append_comment(&self, path: &str, comment: &Comment) -> Result<usize> {
        let (mut comments, sha) = match self.read_json::<Vec<Comment>>(path).await? {
            Some((comments, sha)) => (comments, Some(sha)),
            None => (Vec::new(), None),
        };
        comments.push(comment.clone());

        let message = format!("Add comment to {}", comment.note_id);
        self.write_json(path, &comments, &message, sha.as_deref())
            .await?;
        log::info!("[notes] {} ({} total)", message, comments.len());
        Ok(comments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::time::Duration;

    fn repo() -> NoteRepository<InMemoryStore> {
        NoteRepository::new(InMemoryStore::new()).with_retry(ConflictRetry {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        })
    }

    #[tokio::test]
    async fn test_small_markdown_is_inline() {
        let repo = repo();
        let note = Note::new("Small", NoteType::Markdown, "tiny");
        let entry = repo.save_note(&note).await.unwrap();

        assert_eq!(entry.content.as_deref(), Some("tiny"));
        assert_eq!(repo.store().paths(), vec![INDEX_PATH.to_string()]);
    }

    #[tokio::test]
    async fn test_large_markdown_goes_to_note_document() {
        let repo = repo().with_inline_limit(10);
        let note = Note::new("Large", NoteType::Markdown, "x".repeat(11));
        let entry = repo.save_note(&note).await.unwrap();

        let path = note_document_path(&note.id);
        assert_eq!(entry.content_ref.as_deref(), Some(path.as_str()));
        assert!(entry.content.is_none());

        let loaded = repo.get_note_by_id(&note.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, note.content);
    }

    #[tokio::test]
    async fn test_html_goes_to_content_file() {
        let repo = repo();
        let note = Note::new("Page", NoteType::Html, "<p>hello</p>");
        let entry = repo.save_note(&note).await.unwrap();

        assert_eq!(entry.excerpt, "hello");
        let file = repo
            .store()
            .get(&html_content_path(&note.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(file.text().unwrap(), "<p>hello</p>");

        // Saving again overwrites the satellite under its current token
        let mut edited = note.clone();
        edited.content = "<p>edited</p>".into();
        repo.save_note(&edited).await.unwrap();
        let loaded = repo.get_note_by_id(&note.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, "<p>edited</p>");
    }

    #[tokio::test]
    async fn test_placement_change_reads_from_new_location() {
        let repo = repo();
        let mut note = Note::new("Page", NoteType::Html, "<p>old</p>");
        repo.save_note(&note).await.unwrap();

        note.note_type = NoteType::Markdown;
        note.content = "now inline".into();
        let entry = repo.update_note(&note.id, &note).await.unwrap();
        assert_eq!(entry.content.as_deref(), Some("now inline"));
        assert!(entry.content_ref.is_none());

        let loaded = repo.get_note_by_id(&note.id).await.unwrap().unwrap();
        assert_eq!(loaded, note);
        // The old body stays behind, unreferenced
        assert!(repo.store().paths().contains(&html_content_path(&note.id)));
        let index = repo.load_index().await.unwrap();
        assert!(index.notes.iter().all(|e| e.content_ref.is_none()));
    }

    #[tokio::test]
    async fn test_update_missing_note_is_not_found() {
        let repo = repo();
        let note = Note::new("Ghost", NoteType::Html, "<p>x</p>");
        let err = repo.update_note("note-404", &note).await.unwrap_err();
        assert!(err.is_not_found());
        // Nothing was written
        assert!(repo.store().paths().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_id_is_rejected_before_io() {
        let repo = repo();
        let mut note = Note::new("Bad", NoteType::Markdown, "x");
        note.id = "../escape".into();
        assert!(matches!(
            repo.save_note(&note).await,
            Err(NoteError::InvalidId(_))
        ));
        assert!(matches!(
            repo.get_comments("a/b").await,
            Err(NoteError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_entry_reads_per_note_document() {
        let store = InMemoryStore::new()
            .with_file(
                INDEX_PATH,
                r#"{"notes":[{"id":"note-7","title":"Old","type":"html","tags":["x"],"date":"2023-05-01T00:00:00Z"}]}"#,
            )
            .with_file(
                "htmlnotes/note-7.json",
                r#"{"id":"note-7","title":"Old","type":"html","content":"<p>old</p>","date":"2023-05-01T00:00:00Z"}"#,
            );
        let repo = NoteRepository::new(store);

        let note = repo.get_note_by_id("note-7").await.unwrap().unwrap();
        assert_eq!(note.content, "<p>old</p>");
        assert_eq!(repo.tag_counts().await.unwrap().get("x"), Some(&1));
    }

    #[tokio::test]
    async fn test_init_index_is_idempotent() {
        let repo = repo();
        assert!(repo.init_index().await.unwrap());
        assert!(!repo.init_index().await.unwrap());
        assert_eq!(repo.load_index().await.unwrap().notes.len(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_json_error() {
        let repo = NoteRepository::new(InMemoryStore::new().with_file(INDEX_PATH, "{not json"));
        match repo.list_notes().await {
            Err(NoteError::Json { path, .. }) => assert_eq!(path, INDEX_PATH),
            other => panic!("expected Json error, got {:?}", other),
        }
    }
}
