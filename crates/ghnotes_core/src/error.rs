use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for ghnotes operations
#[derive(Debug, Error)]
pub enum NoteError {
    // Remote store errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Revision conflict writing '{path}' (HTTP {status}); re-fetch and retry")]
    Conflict { path: String, status: u16 },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote API error {status} for '{path}': {message}")]
    Api {
        status: u16,
        path: String,
        message: String,
    },

    // Encoding errors
    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    // Credential errors
    #[error("Token decryption failed: {0}")]
    Decryption(String),

    // Domain validation errors
    #[error("Invalid note id '{0}'")]
    InvalidId(String),

    #[error("Invalid comment: {0}")]
    InvalidComment(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for ghnotes operations
pub type Result<T> = std::result::Result<T, NoteError>;

impl NoteError {
    /// Whether the remote rejected a write because the revision token was stale.
    pub fn is_conflict(&self) -> bool {
        matches!(self, NoteError::Conflict { .. })
    }

    /// Whether the error is a missing path or note.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NoteError::NotFound(_))
    }

    /// Short, stable name of the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            NoteError::NotFound(_) => "NotFound",
            NoteError::Conflict { .. } => "Conflict",
            NoteError::Auth(_) => "Auth",
            NoteError::Network(_) => "Network",
            NoteError::Api { .. } => "Api",
            NoteError::Decoding(_) => "Decoding",
            NoteError::Json { .. } => "Json",
            NoteError::Serialize(_) => "Serialize",
            NoteError::Decryption(_) => "Decryption",
            NoteError::InvalidId(_) => "InvalidId",
            NoteError::InvalidComment(_) => "InvalidComment",
            NoteError::Config(_) => "Config",
            NoteError::ConfigParse(_) => "ConfigParse",
            NoteError::ConfigSerialize(_) => "ConfigSerialize",
            NoteError::NoConfigDir => "NoConfigDir",
            NoteError::Io(_) => "Io",
            NoteError::FileRead { .. } => "FileRead",
            NoteError::FileWrite { .. } => "FileWrite",
        }
    }

    /// Convert to a serializable representation (for `--json` CLI output)
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}

/// A serializable representation of NoteError
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Remote path involved (if applicable)
    pub path: Option<String>,
}

impl From<&NoteError> for SerializableError {
    fn from(err: &NoteError) -> Self {
        let path = match err {
            NoteError::Conflict { path, .. } => Some(path.clone()),
            NoteError::Api { path, .. } => Some(path.clone()),
            NoteError::Json { path, .. } => Some(path.clone()),
            NoteError::NotFound(path) => Some(path.clone()),
            _ => None,
        };

        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            path,
        }
    }
}
