//! Token provisioning from an encrypted bundle.
//!
//! The bearer token for the contents API is never stored in plain text.
//! Configuration holds an [`EncryptedBundle`]: the token encrypted with
//! AES-256-GCM under a key derived from a password with PBKDF2-HMAC-SHA256.
//! At startup the bundle is decrypted once and the token lives only in the
//! returned [`Credential`].
//!
//! # Example
//!
//! ```ignore
//! use ghnotes_core::credential::{CredentialConfig, encrypt_token};
//!
//! let bundle = encrypt_token("ghp_example", "hunter2", 100_000)?;
//! let credential = CredentialConfig::PasswordOnly("hunter2".into()).provision(Some(&bundle))?;
//! assert_eq!(credential.expose(), "ghp_example");
//! ```

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::encoding::{decode_lenient, encode_bytes, utf8_text};
use crate::error::{NoteError, Result};

/// Default PBKDF2 iteration count for newly created bundles.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Salt length in bytes for newly created bundles.
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// An encrypted bearer token as stored in configuration.
///
/// Binary fields are base64 (standard or URL-safe, padding optional).
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct EncryptedBundle {
    /// AES-GCM ciphertext with the authentication tag appended
    #[serde(alias = "token")]
    pub ciphertext: String,

    /// PBKDF2 salt
    pub salt: String,

    /// PBKDF2 iteration count
    pub iterations: u32,

    /// AES-GCM nonce; bundles without one use the retired format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,

    /// Password embedded alongside the bundle (shared, low-value tokens only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for EncryptedBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedBundle")
            .field("ciphertext", &self.ciphertext)
            .field("salt", &self.salt)
            .field("iterations", &self.iterations)
            .field("iv", &self.iv)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Where the decryption password comes from.
#[derive(Clone)]
pub enum CredentialConfig {
    /// Only a password; the bundle itself comes from stored configuration.
    PasswordOnly(String),
    /// A complete bundle, optionally carrying its own password.
    FullBundle(EncryptedBundle),
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialConfig::PasswordOnly(_) => f.write_str("PasswordOnly(****)"),
            CredentialConfig::FullBundle(bundle) => f.debug_tuple("FullBundle").field(bundle).finish(),
        }
    }
}

impl CredentialConfig {
    /// Decrypt the bearer token.
    ///
    /// `stored` is the bundle from configuration and is only consulted for
    /// [`CredentialConfig::PasswordOnly`].
    pub fn provision(&self, stored: Option<&EncryptedBundle>) -> Result<Credential> {
        let (bundle, password) = match self {
            CredentialConfig::PasswordOnly(password) => {
                let bundle = stored.ok_or_else(|| {
                    NoteError::Config(
                        "a password was given but no encrypted token bundle is configured"
                            .to_string(),
                    )
                })?;
                (bundle, password.as_str())
            }
            CredentialConfig::FullBundle(bundle) => {
                let password = bundle.password.as_deref().ok_or_else(|| {
                    NoteError::Auth("no password available to decrypt the token bundle".into())
                })?;
                (bundle, password)
            }
        };

        let token = decrypt_bundle(bundle, password)?;
        log::info!("[credential] Token decrypted ({})", mask_secret(&token));
        Credential::new(token)
    }
}

/// Bearer token held in process memory.
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Wrap a token; an empty token is an authentication error.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(NoteError::Auth("empty bearer token".to_string()));
        }
        Ok(Self { token })
    }

    /// The raw token, for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", mask_secret(&self.token))
    }
}

fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}****", prefix)
}

/// Derive an AES-256 key from a password with PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// Authenticated AES-256-GCM decryption.
///
/// A wrong key or any modification of the ciphertext fails the tag check.
pub fn decrypt(ciphertext: &[u8], key: &[u8; KEY_LEN], iv: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN {
        return Err(NoteError::Config(format!(
            "token bundle iv must be {} bytes, got {}",
            IV_LEN,
            iv.len()
        )));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| {
            NoteError::Decryption("authentication tag mismatch (wrong password or tampered bundle)".into())
        })
}

/// Decrypt a bundle with the given password.
pub fn decrypt_bundle(bundle: &EncryptedBundle, password: &str) -> Result<String> {
    let iv = bundle.iv.as_deref().ok_or_else(|| {
        NoteError::Config(
            "token bundle has no iv; re-encrypt the token with `ghnotes encrypt-token`".to_string(),
        )
    })?;

    if bundle.iterations == 0 {
        return Err(NoteError::Config(
            "token bundle iteration count must be positive".to_string(),
        ));
    }

    let salt = decode_lenient(&bundle.salt)?;
    let iv = decode_lenient(iv)?;
    let ciphertext = decode_lenient(&bundle.ciphertext)?;

    let key = derive_key(password, &salt, bundle.iterations);
    let plaintext = decrypt(&ciphertext, &key, &iv)?;
    utf8_text(plaintext)
}

/// Encrypt a token into a new bundle with a random salt and iv.
///
/// The returned bundle never carries the password.
pub fn encrypt_token(token: &str, password: &str, iterations: u32) -> Result<EncryptedBundle> {
    if iterations == 0 {
        return Err(NoteError::Config(
            "iteration count must be positive".to_string(),
        ));
    }
    if token.trim().is_empty() {
        return Err(NoteError::Auth("refusing to encrypt an empty token".to_string()));
    }

    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), token.as_bytes())
        .map_err(|_| NoteError::Decryption("encryption failed".to_string()))?;

    Ok(EncryptedBundle {
        ciphertext: encode_bytes(&ciphertext),
        salt: encode_bytes(&salt),
        iterations,
        iv: Some(encode_bytes(&iv)),
        password: None,
    })
}
