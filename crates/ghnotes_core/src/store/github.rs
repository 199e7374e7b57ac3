//! GitHub contents API store.
//!
//! Each path maps to `GET/PUT {api_base}/repos/{owner}/{repo}/contents/{path}`
//! on the configured branch. File bodies travel as base64; the blob `sha`
//! returned by the API is the revision token.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{BoxFuture, ContentStore, EntryKind, RemoteEntry, RemoteFile};
use crate::config::Config;
use crate::credential::Credential;
use crate::encoding::{decode_bytes, encode_bytes};
use crate::error::{NoteError, Result};

const USER_AGENT: &str = concat!("ghnotes/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// Repository metadata returned by [`GitHubStore::check_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// `owner/repo`
    pub full_name: String,
    /// Default branch of the repository
    pub default_branch: String,
    /// Whether the repository is private
    #[serde(default)]
    pub private: bool,
}

/// One item of a contents response (a file body or a listing entry).
#[derive(Debug, Deserialize)]
struct ContentsItem {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsBody {
    Dir(Vec<ContentsItem>),
    File(ContentsItem),
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

/// Content store backed by a GitHub repository.
pub struct GitHubStore {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    branch: String,
}

impl GitHubStore {
    /// Create a store for the repository named in `config`.
    pub fn new(config: &Config, credential: Credential) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| NoteError::Auth("token contains invalid header characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| NoteError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
        })
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo)
        )
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/contents/{}", self.repo_url(), encoded.join("/"))
    }

    /// Verify the token can see the repository.
    pub async fn check_connection(&self) -> Result<RepoInfo> {
        let url = self.repo_url();
        log::debug!("[GitHub] GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let path = format!("{}/{}", self.owner, self.repo);
            if status == StatusCode::NOT_FOUND {
                return Err(NoteError::NotFound(format!(
                    "repository {} (or the token cannot see it)",
                    path
                )));
            }
            return Err(error_for_status(status, &path, &body));
        }

        let info: RepoInfo = response
            .json()
            .await
            .map_err(|e| NoteError::Network(format!("failed to read repository info: {}", e)))?;

        if info.default_branch != self.branch {
            log::info!(
                "[GitHub] {} default branch is '{}', notes live on '{}'",
                info.full_name,
                info.default_branch,
                self.branch
            );
        }
        Ok(info)
    }

    /// GET a contents path. 404 is `Ok(None)`.
    async fn fetch(&self, path: &str) -> Result<Option<ContentsBody>> {
        let url = self.contents_url(path);
        log::debug!("[GitHub] GET {} (ref {})", url, self.branch);

        let response = self
            .client
            .get(&url)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| NoteError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, path, &body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| NoteError::Network(e.to_string()))?;
        let body = serde_json::from_str(&text).map_err(|e| NoteError::Json {
            path: path.to_string(),
            source: e,
        })?;
        Ok(Some(body))
    }

    async fn get_file(&self, path: &str) -> Result<Option<RemoteFile>> {
        let item = match self.fetch(path).await? {
            None => return Ok(None),
            Some(ContentsBody::File(item)) => item,
            Some(ContentsBody::Dir(_)) => {
                return Err(NoteError::Api {
                    status: 200,
                    path: path.to_string(),
                    message: "expected a file, found a directory".to_string(),
                });
            }
        };

        let content = file_content(&item)?;
        log::debug!(
            "[GitHub] Read {} ({} bytes, sha {})",
            item.path,
            content.len(),
            item.sha
        );
        Ok(Some(RemoteFile {
            path: item.path,
            content,
            sha: item.sha,
        }))
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> Result<String> {
        let url = self.contents_url(path);
        let request = PutRequest {
            message,
            content: encode_bytes(content),
            branch: &self.branch,
            sha,
        };
        log::debug!(
            "[GitHub] PUT {} ({} bytes, {})",
            url,
            content.len(),
            sha.map(|s| format!("sha {}", s))
                .unwrap_or_else(|| "create".to_string())
        );

        let response = self
            .client
            .put(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, path, &body));
        }

        let put: PutResponse = response
            .json()
            .await
            .map_err(|e| NoteError::Network(format!("failed to read PUT response: {}", e)))?;
        log::info!("[GitHub] Committed {}: {}", path, message);
        Ok(put.content.sha)
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        match self.fetch(dir).await? {
            None => Ok(Vec::new()),
            Some(ContentsBody::Dir(items)) => Ok(items
                .into_iter()
                .map(|item| RemoteEntry {
                    name: item.name,
                    path: item.path,
                    kind: item.kind,
                    sha: item.sha,
                })
                .collect()),
            Some(ContentsBody::File(_)) => {
                log::warn!("[GitHub] {} is a file, not a directory", dir);
                Ok(Vec::new())
            }
        }
    }
}

impl ContentStore for GitHubStore {
    fn describe(&self) -> String {
        format!("github:{}/{}@{}", self.owner, self.repo, self.branch)
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Option<RemoteFile>>> {
        Box::pin(self.get_file(path))
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        content: &'a [u8],
        message: &'a str,
        sha: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.put_file(path, content, message, sha))
    }

    fn list<'a>(&'a self, dir: &'a str) -> BoxFuture<'a, Result<Vec<RemoteEntry>>> {
        Box::pin(self.list_dir(dir))
    }
}

fn file_content(item: &ContentsItem) -> Result<Vec<u8>> {
    let content = item.content.as_deref().unwrap_or("");
    match item.encoding.as_deref() {
        Some("base64") => decode_bytes(content),
        // Empty files come back with no encoding
        None if content.is_empty() => Ok(Vec::new()),
        encoding => Err(NoteError::Decoding(format!(
            "'{}' has unsupported content encoding {:?} (files over 1 MB are not inlined)",
            item.path, encoding
        ))),
    }
}

fn error_for_status(status: StatusCode, path: &str, body: &str) -> NoteError {
    let message = serde_json::from_str::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status.as_u16() {
        401 | 403 => NoteError::Auth(format!("HTTP {} for '{}': {}", status.as_u16(), path, message)),
        404 => NoteError::NotFound(path.to_string()),
        409 => NoteError::Conflict {
            path: path.to_string(),
            status: 409,
        },
        // 422 also covers validation failures; only a sha mismatch is a conflict
        422 if message.to_ascii_lowercase().contains("sha") => NoteError::Conflict {
            path: path.to_string(),
            status: 422,
        },
        code => NoteError::Api {
            status: code,
            path: path.to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GitHubStore {
        let mut config = Config::new("C6thunder", "thunder.github.io");
        config.api_base = "https://github.example.com/api/v3/".to_string();
        GitHubStore::new(&config, Credential::new("ghp_test").unwrap()).unwrap()
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        let store = store();
        assert_eq!(
            store.contents_url("notes/a b.json"),
            "https://github.example.com/api/v3/repos/C6thunder/thunder.github.io/contents/notes/a%20b.json"
        );
        assert_eq!(
            store.contents_url("/notes.json"),
            "https://github.example.com/api/v3/repos/C6thunder/thunder.github.io/contents/notes.json"
        );
    }

    #[test]
    fn test_describe_names_branch() {
        assert_eq!(store().describe(), "github:C6thunder/thunder.github.io@main");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config::new("", "blog");
        let result = GitHubStore::new(&config, Credential::new("t").unwrap());
        assert!(matches!(result, Err(NoteError::Config(_))));
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"message":"sha does not match"}"#;
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, "notes.json", body),
            NoteError::Auth(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, "notes.json", body),
            NoteError::Auth(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, "notes.json", body),
            NoteError::Conflict { status: 409, .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "notes.json", body),
            NoteError::Conflict { status: 422, .. }
        ));
        let invalid = r#"{"message":"Invalid request.\n\nbranch is not a valid ref"}"#;
        assert!(matches!(
            error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "notes.json", invalid),
            NoteError::Api { status: 422, .. }
        ));
        match error_for_status(StatusCode::BAD_GATEWAY, "notes.json", "upstream down") {
            NoteError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_file_body_with_wrapped_base64() {
        let json = r#"{
            "type": "file",
            "encoding": "base64",
            "name": "notes.json",
            "path": "notes.json",
            "sha": "abc123",
            "content": "eyJub3RlcyI6\nW119\n"
        }"#;
        let body: ContentsBody = serde_json::from_str(json).unwrap();
        let ContentsBody::File(item) = body else {
            panic!("expected a file body");
        };
        assert_eq!(file_content(&item).unwrap(), br#"{"notes":[]}"#);
    }

    #[test]
    fn test_parse_dir_listing() {
        let json = r#"[
            {"type": "file", "name": "a.json", "path": "notes/a.json", "sha": "1"},
            {"type": "dir", "name": "old", "path": "notes/old", "sha": "2"},
            {"type": "submodule", "name": "x", "path": "notes/x", "sha": "3"}
        ]"#;
        let body: ContentsBody = serde_json::from_str(json).unwrap();
        let ContentsBody::Dir(items) = body else {
            panic!("expected a listing");
        };
        let kinds: Vec<_> = items.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![EntryKind::File, EntryKind::Dir, EntryKind::Other]);
    }

    #[test]
    fn test_large_file_without_inline_content_is_decoding_error() {
        let item = ContentsItem {
            name: "big.json".into(),
            path: "notes/big.json".into(),
            sha: "s".into(),
            kind: EntryKind::File,
            content: Some(String::new()),
            encoding: Some("none".into()),
        };
        assert!(matches!(file_content(&item), Err(NoteError::Decoding(_))));
    }

    #[test]
    fn test_put_request_omits_sha_on_create() {
        let request = PutRequest {
            message: "Add note: x",
            content: encode_bytes(b"{}"),
            branch: "main",
            sha: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("sha").is_none());
        assert_eq!(json["content"], "e30=");
    }
}
