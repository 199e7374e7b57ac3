//! Command-line interface for ghnotes

/// Clap argument definitions
mod args;

/// `comment`, `comments`, `counts` commands
mod comments;

/// `init` and `config` command handlers
mod config;

/// Note commands (`list`, `show`, `new`, `edit`, `scan`, `tags`, `sitemap`)
mod notes;

/// `encrypt-token` and `check` commands
mod token;

use std::path::{Path, PathBuf};

use clap::Parser;
use ghnotes_core::store::github::GitHubStore;
use ghnotes_core::{Config, CredentialConfig, NoteError, NoteRepository};

pub use args::Cli;
use args::Commands;

/// Repository type used by every remote command.
pub type CliRepository = NoteRepository<GitHubStore>;

/// Helper to run async operations in sync context
fn block_on<F: std::future::Future>(f: F) -> F::Output {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(f),
        Err(e) => {
            eprintln!("✗ Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    }
}

/// Config file location: the `--config` override or the default path.
fn resolve_config_path(config_override: Option<&Path>) -> Result<PathBuf, NoteError> {
    match config_override {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path().ok_or(NoteError::NoConfigDir),
    }
}

fn load_config(config_override: Option<&Path>) -> Result<Config, NoteError> {
    let path = resolve_config_path(config_override)?;
    Config::load_from(&path)
}

/// Pick the credential source: an explicit password unlocks the stored
/// bundle, otherwise the bundle must carry its own password.
fn credential_config(config: &Config, password: Option<String>) -> Result<CredentialConfig, NoteError> {
    match (password, &config.credential) {
        (Some(password), _) => Ok(CredentialConfig::PasswordOnly(password)),
        (None, Some(bundle)) => Ok(CredentialConfig::FullBundle(bundle.clone())),
        (None, None) => Err(NoteError::Config(
            "no token configured; run 'ghnotes encrypt-token --save' first".to_string(),
        )),
    }
}

fn open_repository(
    config_override: Option<&Path>,
    password: Option<String>,
) -> Result<(Config, CliRepository), NoteError> {
    let config = load_config(config_override)?;
    let credential = credential_config(&config, password)?.provision(config.credential.as_ref())?;
    let store = GitHubStore::new(&config, credential)?;
    log::debug!("Opened {}", ghnotes_core::ContentStore::describe(&store));
    let repo = NoteRepository::from_config(store, &config);
    Ok((config, repo))
}

/// Open the repository and run `f`, reporting setup failures.
fn with_repository<F>(config_override: Option<&Path>, password: Option<String>, f: F) -> bool
where
    F: FnOnce(&Config, &CliRepository) -> bool,
{
    match open_repository(config_override, password) {
        Ok((config, repo)) => f(&config, &repo),
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// Print an error with a hint for the common setup mistakes.
fn report_error(e: &NoteError) {
    eprintln!("✗ {}", e);
    match e {
        NoteError::FileRead { .. } | NoteError::NoConfigDir => {
            eprintln!("  Run 'ghnotes init --owner <OWNER> --repo <REPO>' first.");
        }
        NoteError::Decryption(_) => {
            eprintln!("  Check the password (--password or GHNOTES_PASSWORD).");
        }
        NoteError::Auth(_) => {
            eprintln!("  Provide the token password with --password or GHNOTES_PASSWORD.");
        }
        NoteError::Conflict { .. } => {
            eprintln!("  Someone else changed the repository at the same time; try again.");
        }
        _ => {}
    }
}

/// `{"error": {...}}` document for `--json` output.
fn error_json(e: &NoteError) -> String {
    let body = serde_json::json!({ "error": e.to_serializable() });
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
}

/// Report an error as JSON on stdout when `json` is set, otherwise as text.
fn report_error_as(e: &NoteError, json: bool) {
    if json {
        println!("{}", error_json(e));
    } else {
        report_error(e);
    }
}

/// Main entry point for the CLI
pub fn run_cli() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Cli {
        config: config_override,
        password,
        command,
    } = Cli::parse();
    let config_path = config_override.as_deref();

    let success = match command {
        Commands::Init {
            owner,
            repo,
            branch,
            api_base,
            site_domain,
        } => config::handle_init(config_path, owner, repo, branch, api_base, site_domain),

        Commands::Config => config::handle_show_config(config_path),

        Commands::EncryptToken { iterations, save } => {
            token::handle_encrypt_token(config_path, password, iterations, save)
        }

        Commands::Check { create_index } => token::handle_check(config_path, password, create_index),

        Commands::List { tag, json } => {
            with_repository(config_path, password, |_, repo| notes::handle_list(repo, tag, json))
        }

        Commands::Show { id, json } => {
            with_repository(config_path, password, |_, repo| notes::handle_show(repo, &id, json))
        }

        Commands::New {
            title,
            tags,
            html,
            file,
            content,
            excerpt,
        } => with_repository(config_path, password, |_, repo| {
            notes::handle_new(repo, title, tags, html, file, content, excerpt)
        }),

        Commands::Edit {
            id,
            title,
            tags,
            clear_tags,
            file,
            content,
            excerpt,
        } => with_repository(config_path, password, |_, repo| {
            let changes = notes::NoteChanges {
                title,
                tags: if clear_tags {
                    Some(Vec::new())
                } else if tags.is_empty() {
                    None
                } else {
                    Some(tags)
                },
                file,
                content,
                excerpt,
            };
            notes::handle_edit(repo, &id, changes)
        }),

        Commands::Comment {
            id,
            author,
            email,
            body,
        } => with_repository(config_path, password, |_, repo| {
            comments::handle_comment(repo, &id, author, email, body)
        }),

        Commands::Comments { id, json } => with_repository(config_path, password, |_, repo| {
            comments::handle_comments(repo, &id, json)
        }),

        Commands::Counts { ids } => {
            with_repository(config_path, password, |_, repo| comments::handle_counts(repo, &ids))
        }

        Commands::Scan { folder } => {
            with_repository(config_path, password, |_, repo| notes::handle_scan(repo, folder))
        }

        Commands::Tags => with_repository(config_path, password, |_, repo| notes::handle_tags(repo)),

        Commands::Sitemap { domain, output } => with_repository(config_path, password, |cfg, repo| {
            notes::handle_sitemap(repo, cfg, domain, output)
        }),
    };

    if !success {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghnotes_core::credential::encrypt_token;

    #[test]
    fn test_password_selects_password_only() {
        let config = Config::new("me", "blog");
        let source = credential_config(&config, Some("pw".into())).unwrap();
        assert!(matches!(source, CredentialConfig::PasswordOnly(_)));
    }

    #[test]
    fn test_stored_bundle_without_password_fails_on_provision() {
        let mut config = Config::new("me", "blog");
        config.credential = Some(encrypt_token("tok", "pw", 10).unwrap());

        let source = credential_config(&config, None).unwrap();
        let err = source.provision(config.credential.as_ref()).unwrap_err();
        assert!(matches!(err, NoteError::Auth(_)));
    }

    #[test]
    fn test_missing_bundle_and_password_is_config_error() {
        let config = Config::new("me", "blog");
        assert!(matches!(
            credential_config(&config, None),
            Err(NoteError::Config(_))
        ));
    }

    #[test]
    fn test_error_json_carries_kind_and_path() {
        let err = NoteError::Conflict {
            path: "notes.json".to_string(),
            status: 409,
        };
        let value: serde_json::Value = serde_json::from_str(&error_json(&err)).unwrap();
        assert_eq!(value["error"]["kind"], "Conflict");
        assert_eq!(value["error"]["path"], "notes.json");
        assert!(value["error"]["message"].as_str().unwrap().contains("409"));

        let value: serde_json::Value =
            serde_json::from_str(&error_json(&NoteError::NotFound("note note-1".into()))).unwrap();
        assert_eq!(value["error"]["kind"], "NotFound");
    }

    #[test]
    fn test_explicit_config_path_is_used() {
        let path = Path::new("/tmp/ghnotes-test.toml");
        assert_eq!(resolve_config_path(Some(path)).unwrap(), path);
    }
}
