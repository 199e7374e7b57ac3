#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// Token encryption and provisioning
pub mod credential;

/// Base64 transport encoding
pub mod encoding;

/// Error (common error types)
pub mod error;

/// The `notes.json` index
pub mod index;

/// Notes and comments
pub mod note;

/// Domain operations over a content store
pub mod repository;

/// Conflict retry for read-modify-write sequences
pub mod retry;

/// Sitemap generation
pub mod sitemap;

/// Content store abstraction and implementations
pub mod store;

pub use config::Config;
pub use credential::{Credential, CredentialConfig, EncryptedBundle};
pub use error::{NoteError, Result};
pub use index::{IndexEntry, NoteIndex};
pub use note::{Comment, Note, NoteType};
pub use repository::NoteRepository;
pub use retry::ConflictRetry;
pub use store::{ContentStore, InMemoryStore};
