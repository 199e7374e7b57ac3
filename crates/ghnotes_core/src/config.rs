//! Configuration types for ghnotes.
//!
//! The [`Config`] struct names the remote repository that backs the notes
//! store and carries the encrypted token bundle. It is persisted as TOML
//! (typically at `~/.config/ghnotes/config.toml` on Unix systems).
//!
//! # Example
//!
//! ```ignore
//! use ghnotes_core::config::Config;
//!
//! let config = Config::new("C6thunder", "thunder.github.io");
//! config.save()?;
//!
//! let config = Config::load()?;
//! assert_eq!(config.branch, "main");
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::credential::EncryptedBundle;
use crate::error::{NoteError, Result};
use crate::retry::ConflictRetry;

/// Default API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default branch holding the notes documents.
pub const DEFAULT_BRANCH: &str = "main";

/// Markdown notes up to this many bytes are stored inline in the index.
pub const DEFAULT_INLINE_CONTENT_LIMIT: usize = 16 * 1024;

/// `Config` describes the remote repository and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Branch that holds `notes.json` and the satellite files
    #[serde(default = "default_branch")]
    pub branch: String,

    /// API base URL (GitHub Enterprise installs use their own)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Markdown notes above this size go to `notes/{id}.json`
    #[serde(default = "default_inline_limit")]
    pub inline_content_limit: usize,

    /// Attempts per read-modify-write when the remote reports a conflict.
    /// `1` disables retrying.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,

    /// Public site domain used for sitemap generation (e.g. "https://thunder.github.io")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_domain: Option<String>,

    /// Encrypted bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<EncryptedBundle>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_inline_limit() -> usize {
    DEFAULT_INLINE_CONTENT_LIMIT
}

fn default_conflict_retries() -> u32 {
    ConflictRetry::default().max_attempts
}

impl Config {
    /// Create a new config for the given repository with defaults elsewhere
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: default_branch(),
            api_base: default_api_base(),
            inline_content_limit: DEFAULT_INLINE_CONTENT_LIMIT,
            conflict_retries: default_conflict_retries(),
            site_domain: None,
            credential: None,
        }
    }

    /// Check that the repository coordinates are usable.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(NoteError::Config(
                "repository owner and name must be configured".to_string(),
            ));
        }
        if self.branch.trim().is_empty() {
            return Err(NoteError::Config("branch must not be empty".to_string()));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(NoteError::Config(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        Ok(())
    }

    /// Retry policy derived from `conflict_retries`.
    pub fn conflict_retry(&self) -> ConflictRetry {
        ConflictRetry {
            max_attempts: self.conflict_retries.max(1),
            ..ConflictRetry::default()
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| NoteError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| NoteError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| NoteError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Get the default config file path
    #[cfg(not(target_arch = "wasm32"))]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ghnotes").join("config.toml"))
    }

    /// Load config from the default location
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Result<Self> {
        let path = Self::config_path().ok_or(NoteError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Save config to the default location
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(NoteError::NoConfigDir)?;
        self.save_to(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::encrypt_token;

    #[test]
    fn test_minimal_toml_gets_defaults() {
        let config: Config = toml::from_str("owner = \"me\"\nrepo = \"blog\"\n").unwrap();
        assert_eq!(config.branch, "main");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.inline_content_limit, DEFAULT_INLINE_CONTENT_LIMIT);
        assert_eq!(config.conflict_retries, 3);
        assert!(config.credential.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_missing_repo() {
        let config = Config::new("me", " ");
        assert!(matches!(config.validate(), Err(NoteError::Config(_))));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::new("me", "blog");
        config.branch = "gh-pages".to_string();
        config.site_domain = Some("https://me.github.io".to_string());
        config.credential = Some(encrypt_token("tok", "pw", 10).unwrap());

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match Config::load_from(&path) {
            Err(NoteError::FileRead { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected FileRead error, got {:?}", other),
        }
    }

    #[test]
    fn test_conflict_retry_never_zero() {
        let mut config = Config::new("me", "blog");
        config.conflict_retries = 0;
        assert_eq!(config.conflict_retry().max_attempts, 1);
    }
}
