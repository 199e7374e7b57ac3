//! Token encryption and connection check

use std::io::Read;
use std::path::Path;

use ghnotes_core::credential::encrypt_token;
use ghnotes_core::{Config, NoteError};

use crate::cli::{block_on, report_error, resolve_config_path, with_repository};

/// Encrypt a token read from stdin. With `save` the bundle goes into the
/// config file, otherwise it is printed as JSON.
pub fn handle_encrypt_token(
    config_override: Option<&Path>,
    password: Option<String>,
    iterations: u32,
    save: bool,
) -> bool {
    let Some(password) = password.filter(|p| !p.is_empty()) else {
        eprintln!("✗ A password is required (--password or GHNOTES_PASSWORD)");
        return false;
    };

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        eprintln!("✗ Failed to read token from stdin: {}", e);
        return false;
    }
    let token = input.trim();
    if token.is_empty() {
        eprintln!("✗ No token on stdin");
        return false;
    }

    let bundle = match encrypt_token(token, &password, iterations) {
        Ok(bundle) => bundle,
        Err(e) => {
            report_error(&e);
            return false;
        }
    };

    if !save {
        return match serde_json::to_string_pretty(&bundle) {
            Ok(json) => {
                println!("{}", json);
                true
            }
            Err(e) => {
                eprintln!("✗ {}", e);
                false
            }
        };
    }

    let result = resolve_config_path(config_override).and_then(|path| {
        let mut config = Config::load_from(&path)?;
        config.credential = Some(bundle);
        config.save_to(&path)?;
        Ok::<_, NoteError>(path)
    });
    match result {
        Ok(path) => {
            println!("✓ Encrypted token saved to {}", path.display());
            true
        }
        Err(e) => {
            report_error(&e);
            false
        }
    }
}

/// Check that the token can see the repository
pub fn handle_check(config_override: Option<&Path>, password: Option<String>, create_index: bool) -> bool {
    with_repository(config_override, password, |config, repo| {
        block_on(async {
            let info = match repo.store().check_connection().await {
                Ok(info) => info,
                Err(e) => {
                    report_error(&e);
                    return false;
                }
            };
            println!(
                "✓ Connected to {} ({}, default branch {})",
                info.full_name,
                if info.private { "private" } else { "public" },
                info.default_branch
            );
            println!("  Notes branch: {}", config.branch);

            if create_index {
                match repo.init_index().await {
                    Ok(true) => println!("✓ Created empty notes.json"),
                    Ok(false) => println!("  notes.json already exists"),
                    Err(e) => {
                        report_error(&e);
                        return false;
                    }
                }
            }
            true
        })
    })
}
