//! Notes and comments.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NoteError, Result};

/// Characters kept in a generated excerpt.
pub const EXCERPT_CHARS: usize = 100;

/// How a note's content is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    /// Markdown source
    #[default]
    Markdown,
    /// Raw HTML
    Html,
}

impl NoteType {
    /// Wire name (`markdown` or `html`).
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Markdown => "markdown",
            NoteType::Html => "html",
        }
    }
}

/// A blog note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier, `note-{unix millis}` for generated ids
    pub id: String,
    /// Title
    pub title: String,
    /// Content type
    #[serde(rename = "type", default)]
    pub note_type: NoteType,
    /// Full body
    #[serde(default)]
    pub content: String,
    /// Tag set
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Creation date
    pub date: DateTime<Utc>,
    /// Short summary; generated from the content when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Comments embedded in the document (read-only; new comments go to
    /// the per-note comment collection)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

impl Note {
    /// Create a note with a freshly generated id dated now.
    pub fn new(title: impl Into<String>, note_type: NoteType, content: impl Into<String>) -> Self {
        let date = Utc::now();
        Self {
            id: generate_note_id(date),
            title: title.into(),
            note_type,
            content: content.into(),
            tags: BTreeSet::new(),
            date,
            excerpt: None,
            comments: Vec::new(),
        }
    }

    /// Replace the tag set (builder pattern).
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    /// Whether the author supplied a non-blank excerpt.
    pub fn has_excerpt(&self) -> bool {
        self.excerpt.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// The stored excerpt, or one derived from the content.
    pub fn excerpt_or_generated(&self) -> String {
        match &self.excerpt {
            Some(excerpt) if !excerpt.trim().is_empty() => excerpt.clone(),
            _ => make_excerpt(&self.content, self.note_type),
        }
    }
}

/// Trim tags and drop empty ones.
pub fn normalize_tags<I, T>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    tags.into_iter()
        .map(|t| t.into().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Generate a note id from a creation time.
pub fn generate_note_id(at: DateTime<Utc>) -> String {
    format!("note-{}", at.timestamp_millis())
}

/// Derive an excerpt: tags stripped for HTML, first [`EXCERPT_CHARS`]
/// characters, `...` appended when truncated.
pub fn make_excerpt(content: &str, note_type: NoteType) -> String {
    let text = match note_type {
        NoteType::Html => strip_tags(content),
        NoteType::Markdown => content.to_string(),
    };
    let text = text.trim();

    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Reject ids that would escape their directory when used in a path.
pub fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(NoteError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// A reader comment on a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Note the comment belongs to
    #[serde(rename = "noteId")]
    pub note_id: String,
    /// Display name
    #[serde(default)]
    pub author: String,
    /// Contact address, never shown unmasked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Comment text
    #[serde(alias = "content")]
    pub body: String,
    /// Posting date
    pub date: DateTime<Utc>,
}

impl Comment {
    /// Create a comment dated now.
    pub fn new(
        note_id: impl Into<String>,
        author: impl Into<String>,
        email: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            note_id: note_id.into(),
            author: author.into(),
            email: email.filter(|e| !e.trim().is_empty()),
            body: body.into(),
            date: Utc::now(),
        }
    }

    /// Check the comment before it is stored.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.note_id)?;
        if self.body.trim().is_empty() {
            return Err(NoteError::InvalidComment("comment body is empty".to_string()));
        }
        if let Some(email) = &self.email
            && !is_valid_email(email)
        {
            return Err(NoteError::InvalidComment(format!(
                "malformed email address '{}'",
                mask_email(email)
            )));
        }
        Ok(())
    }
}

/// `local@domain.tld`: no whitespace, exactly one `@`, a dot inside the
/// domain with text on both sides.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

/// Mask an email for display: the first two characters of the local part,
/// the rest replaced by `*`.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "*".repeat(email.chars().count().min(8));
    };
    let visible: String = local.chars().take(2).collect();
    let hidden = local.chars().count().saturating_sub(2);
    format!("{}{}@{}", visible, "*".repeat(hidden), domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generated_id_uses_millis() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(generate_note_id(at), "note-1704164645000");
    }

    #[test]
    fn test_excerpt_short_markdown_is_untouched() {
        assert_eq!(make_excerpt("hello", NoteType::Markdown), "hello");
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let content = "字".repeat(150);
        let excerpt = make_excerpt(&content, NoteType::Markdown);
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_excerpt_strips_html() {
        let excerpt = make_excerpt("<h1>Title</h1><p>Body <b>bold</b></p>", NoteType::Html);
        assert_eq!(excerpt, "TitleBody bold");
    }

    #[test]
    fn test_explicit_excerpt_wins() {
        let mut note = Note::new("t", NoteType::Markdown, "body text");
        note.excerpt = Some("custom".into());
        assert_eq!(note.excerpt_or_generated(), "custom");
        note.excerpt = Some("  ".into());
        assert_eq!(note.excerpt_or_generated(), "body text");
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("note-1").is_ok());
        for bad in ["", " ", "../x", "a/b", "a\\b", ".."] {
            assert!(
                matches!(validate_id(bad), Err(NoteError::InvalidId(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_tags_are_trimmed_and_deduplicated() {
        let note = Note::new("t", NoteType::Markdown, "").with_tags([" rust", "rust", "", "web"]);
        assert_eq!(note.tags.into_iter().collect::<Vec<_>>(), vec!["rust", "web"]);
    }

    #[test]
    fn test_note_wire_format() {
        let json = r#"{
            "id": "note-1",
            "title": "Hello",
            "type": "html",
            "content": "<p>x</p>",
            "tags": ["b", "a"],
            "date": "2024-03-01T08:00:00.000Z"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.note_type, NoteType::Html);
        assert!(note.comments.is_empty());

        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "html");
        assert_eq!(value["tags"], serde_json::json!(["a", "b"]));
        assert!(value.get("excerpt").is_none());
    }

    #[test]
    fn test_comment_accepts_content_alias() {
        let json = r#"{"noteId":"note-1","author":"A","content":"hi","date":"2024-03-01T08:00:00Z"}"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.body, "hi");
        assert_eq!(serde_json::to_value(&comment).unwrap()["body"], "hi");
    }

    #[test]
    fn test_comment_validation() {
        assert!(Comment::new("note-1", "A", None, "hi").validate().is_ok());
        assert!(matches!(
            Comment::new("note-1", "A", None, "  ").validate(),
            Err(NoteError::InvalidComment(_))
        ));
        assert!(matches!(
            Comment::new("note-1", "A", Some("not-an-email".into()), "hi").validate(),
            Err(NoteError::InvalidComment(_))
        ));
        assert!(matches!(
            Comment::new("../x", "A", None, "hi").validate(),
            Err(NoteError::InvalidId(_))
        ));
        // Blank email is treated as absent
        assert!(Comment::new("note-1", "A", Some(" ".into()), "hi").email.is_none());
    }

    #[test]
    fn test_email_rules() {
        assert!(is_valid_email("reader@example.com"));
        assert!(!is_valid_email("reader@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
        assert!(!is_valid_email("a@.com"));
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("reader@example.com"), "re****@example.com");
        assert_eq!(mask_email("a@example.com"), "a@example.com");
    }
}
