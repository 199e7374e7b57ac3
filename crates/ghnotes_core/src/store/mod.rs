//! Content store abstraction.
//!
//! A content store maps slash-separated paths to opaque bytes, each version
//! identified by a revision token (`sha`). Writes to an existing path must
//! carry the current token; a stale or missing token is rejected with
//! [`NoteError::Conflict`](crate::error::NoteError::Conflict) rather than
//! overwriting someone else's change.
//!
//! ## Object safety
//!
//! `ContentStore` is object safe so it can sit behind `dyn ContentStore`.
//! All methods return boxed futures.
//!
//! ## Implementations
//!
//! - [`github::GitHubStore`] (feature `github`): the GitHub contents API
//! - [`memory::InMemoryStore`]: process-local, for tests and dry runs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encoding::utf8_text;
use crate::error::Result;

#[cfg(feature = "github")]
pub mod github;
pub mod memory;

pub use memory::InMemoryStore;

/// A boxed future for object-safe async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A file read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Path relative to the repository root
    pub path: String,
    /// Decoded file body
    pub content: Vec<u8>,
    /// Revision token of this version
    pub sha: String,
}

impl RemoteFile {
    /// The body as UTF-8 text; invalid UTF-8 is a decoding error.
    pub fn text(&self) -> Result<String> {
        utf8_text(self.content.clone())
    }
}

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symlinks, submodules, anything else
    #[serde(other)]
    Other,
}

/// One entry of a non-recursive directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File name without the directory
    pub name: String,
    /// Path relative to the repository root
    pub path: String,
    /// Entry kind
    pub kind: EntryKind,
    /// Revision token
    pub sha: String,
}

/// Async CRUD over "path → bytes" with optimistic concurrency.
pub trait ContentStore: Send + Sync {
    /// Human-readable description of the backing store (for logs)
    fn describe(&self) -> String;

    /// Read a file. A missing path is `Ok(None)`.
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<RemoteFile>>>;

    /// Create or replace a file and return its new revision token.
    ///
    /// `sha` must be the current token when the path exists and `None` when
    /// it does not; anything else is a conflict.
    fn put<'a>(
        &'a self,
        path: &'a str,
        content: &'a [u8],
        message: &'a str,
        sha: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>>;

    /// List a directory (non-recursive). A missing directory is empty.
    fn list<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, Result<Vec<RemoteEntry>>>;
}

impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<RemoteFile>>> {
        (**self).get(path)
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        content: &'a [u8],
        message: &'a str,
        sha: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        (**self).put(path, content, message, sha)
    }

    fn list<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, Result<Vec<RemoteEntry>>> {
        (**self).list(dir)
    }
}

impl<S: ContentStore + ?Sized> ContentStore for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<RemoteFile>>> {
        (**self).get(path)
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        content: &'a [u8],
        message: &'a str,
        sha: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        (**self).put(path, content, message, sha)
    }

    fn list<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, Result<Vec<RemoteEntry>>> {
        (**self).list(dir)
    }
}
