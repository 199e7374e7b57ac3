//! Config command handlers

use std::path::Path;

use ghnotes_core::Config;

use crate::cli::{report_error, resolve_config_path};

/// Handle the init command
/// Returns true on success, false on error
pub fn handle_init(
    config_override: Option<&Path>,
    owner: String,
    repo: String,
    branch: Option<String>,
    api_base: Option<String>,
    site_domain: Option<String>,
) -> bool {
    let path = match resolve_config_path(config_override) {
        Ok(path) => path,
        Err(e) => {
            report_error(&e);
            return false;
        }
    };

    // Keep the stored token and other settings when re-running init
    let existing = if path.exists() {
        match Config::load_from(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                report_error(&e);
                return false;
            }
        }
    } else {
        None
    };

    let config = apply_init(existing, owner, repo, branch, api_base, site_domain);
    if let Err(e) = config.validate() {
        report_error(&e);
        return false;
    }

    match config.save_to(&path) {
        Ok(()) => {
            println!("✓ Saved configuration to {}", path.display());
            println!("  Repository: {}/{} ({})", config.owner, config.repo, config.branch);
            if config.credential.is_none() {
                println!();
                println!("Next, store an encrypted API token:");
                println!("  echo $GITHUB_TOKEN | ghnotes encrypt-token --save --password <PASSWORD>");
            }
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

fn apply_init(
    existing: Option<Config>,
    owner: String,
    repo: String,
    branch: Option<String>,
    api_base: Option<String>,
    site_domain: Option<String>,
) -> Config {
    let mut config = match existing {
        Some(mut config) => {
            config.owner = owner;
            config.repo = repo;
            config
        }
        None => Config::new(owner, repo),
    };
    if let Some(branch) = branch {
        config.branch = branch;
    }
    if let Some(api_base) = api_base {
        config.api_base = api_base;
    }
    if site_domain.is_some() {
        config.site_domain = site_domain;
    }
    config
}

/// Show the configuration (the token stays encrypted)
pub fn handle_show_config(config_override: Option<&Path>) -> bool {
    let path = match resolve_config_path(config_override) {
        Ok(path) => path,
        Err(e) => {
            report_error(&e);
            return false;
        }
    };

    match Config::load_from(&path) {
        Ok(config) => {
            println!("ghnotes Configuration");
            println!("=====================");
            println!("Repository: {}/{}", config.owner, config.repo);
            println!("Branch: {}", config.branch);
            println!("API base: {}", config.api_base);
            println!("Inline content limit: {} bytes", config.inline_content_limit);
            println!("Conflict retries: {}", config.conflict_retries);
            if let Some(ref domain) = config.site_domain {
                println!("Site domain: {}", domain);
            }
            match config.credential {
                Some(ref bundle) => println!(
                    "Token: encrypted ({} PBKDF2 iterations)",
                    bundle.iterations
                ),
                None => println!("Token: not configured"),
            }
            println!("Config file: {}", path.display());
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghnotes_core::credential::encrypt_token;

    #[test]
    fn test_reinit_keeps_token_and_unset_options() {
        let mut existing = Config::new("old", "blog");
        existing.branch = "gh-pages".into();
        existing.site_domain = Some("https://old.github.io".into());
        existing.credential = Some(encrypt_token("tok", "pw", 10).unwrap());

        let config = apply_init(Some(existing.clone()), "new".into(), "blog2".into(), None, None, None);
        assert_eq!(config.owner, "new");
        assert_eq!(config.repo, "blog2");
        assert_eq!(config.branch, "gh-pages");
        assert_eq!(config.site_domain, existing.site_domain);
        assert_eq!(config.credential, existing.credential);
    }

    #[test]
    fn test_init_writes_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(handle_init(
            Some(&path),
            "me".into(),
            "blog".into(),
            Some("main".into()),
            None,
            Some("https://me.github.io".into()),
        ));

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.owner, "me");
        assert_eq!(config.site_domain.as_deref(), Some("https://me.github.io"));
        assert!(handle_show_config(Some(&path)));
    }

    #[test]
    fn test_init_rejects_bad_api_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(!handle_init(
            Some(&path),
            "me".into(),
            "blog".into(),
            None,
            Some("ftp://nope".into()),
            None,
        ));
        assert!(!path.exists());
    }
}
