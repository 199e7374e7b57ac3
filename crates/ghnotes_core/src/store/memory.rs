//! In-memory content store.
//!
//! Behaves like the contents API: bodies are held in base64 transport form,
//! revision tokens are content hashes over a git-style blob header, and a
//! write with a stale or missing token is a conflict.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

use super::{BoxFuture, ContentStore, EntryKind, RemoteEntry, RemoteFile};
use crate::encoding::{decode_bytes, encode_bytes};
use crate::error::{NoteError, Result};

#[derive(Debug, Clone)]
struct StoredFile {
    transport: String,
    sha: String,
}

/// A commit recorded by [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Path written
    pub path: String,
    /// Commit message
    pub message: String,
    /// Revision token after the write
    pub sha: String,
}

/// An in-memory store, cheap to clone (clones share state).
#[derive(Clone, Default)]
pub struct InMemoryStore {
    files: Arc<RwLock<BTreeMap<String, StoredFile>>>,
    commits: Arc<RwLock<Vec<CommitRecord>>>,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with text files (builder pattern).
    pub fn with_file(self, path: &str, content: &str) -> Self {
        {
            let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
            files.insert(
                normalize(path),
                StoredFile {
                    transport: encode_bytes(content.as_bytes()),
                    sha: blob_sha(content.as_bytes()),
                },
            );
        }
        self
    }

    /// Current revision token of a path, if present.
    pub fn sha_of(&self, path: &str) -> Option<String> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(&normalize(path)).map(|f| f.sha.clone())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.keys().cloned().collect()
    }

    /// Commits made through [`ContentStore::put`], oldest first.
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.commits.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn read(&self, path: &str) -> Result<Option<RemoteFile>> {
        let path = normalize(path);
        let stored = {
            let files = self.files.read().unwrap_or_else(|e| e.into_inner());
            files.get(&path).cloned()
        };

        match stored {
            Some(stored) => Ok(Some(RemoteFile {
                content: decode_bytes(&stored.transport)?,
                path,
                sha: stored.sha,
            })),
            None => Ok(None),
        }
    }

    fn write(&self, path: &str, content: &[u8], message: &str, sha: Option<&str>) -> Result<String> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(NoteError::Api {
                status: 422,
                path,
                message: "path must not be empty".to_string(),
            });
        }

        let new_sha = blob_sha(content);
        {
            let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
            let current = files.get(&path).map(|f| f.sha.as_str());
            if current != sha {
                log::debug!(
                    "[memory] Rejecting write to {}: expected {:?}, have {:?}",
                    path,
                    sha,
                    current
                );
                return Err(NoteError::Conflict {
                    status: if current.is_some() { 409 } else { 422 },
                    path,
                });
            }

            files.insert(
                path.clone(),
                StoredFile {
                    transport: encode_bytes(content),
                    sha: new_sha.clone(),
                },
            );
        }

        self.commits
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(CommitRecord {
                path,
                message: message.to_string(),
                sha: new_sha.clone(),
            });

        Ok(new_sha)
    }

    fn list_dir(&self, dir: &str) -> Vec<RemoteEntry> {
        let dir = normalize(dir);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<RemoteEntry> = Vec::new();
        for (path, stored) in files.iter() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                None => entries.push(RemoteEntry {
                    name: rest.to_string(),
                    path: path.clone(),
                    kind: EntryKind::File,
                    sha: stored.sha.clone(),
                }),
                Some((child_dir, _)) => {
                    if !entries.iter().any(|e| e.kind == EntryKind::Dir && e.name == child_dir) {
                        entries.push(RemoteEntry {
                            name: child_dir.to_string(),
                            path: format!("{}{}", prefix, child_dir),
                            kind: EntryKind::Dir,
                            sha: String::new(),
                        });
                    }
                }
            }
        }
        entries
    }
}

impl ContentStore for InMemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<RemoteFile>>> {
        Box::pin(async move { self.read(path) })
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        content: &'a [u8],
        message: &'a str,
        sha: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { self.write(path, content, message, sha) })
    }

    fn list<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, Result<Vec<RemoteEntry>>> {
        Box::pin(async move { Ok(self.list_dir(dir)) })
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Hash over a git-style blob header so equal content gets equal tokens.
fn blob_sha(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
