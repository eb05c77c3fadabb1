//! Network origins behind the cache gateway.
//!
//! An [`Origin`] answers a request path with an [`OriginResponse`], or fails
//! at the network layer with an [`OriginError`]. HTTP status failures such
//! as `404` are responses, not errors; only a failure to obtain any response
//! at all is an error.
//!
//! | Origin | Source |
//! |--------|--------|
//! | [`HttpOrigin`] | A static site served over HTTP(S), via `reqwest` |
//! | [`DirOrigin`] | A static site directory on local disk |

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::config::Config;

/// A response as returned by an origin or replayed from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl OriginResponse {
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: b"Not Found".to_vec(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("network error fetching {path}: {message}")]
    Network { path: String, message: String },
}

impl OriginError {
    fn network(path: &str, message: impl ToString) -> Self {
        OriginError::Network {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
pub trait Origin: Send + Sync {
    /// Fetches `path` (always starting with `/`, may carry a query string).
    async fn fetch(&self, path: &str) -> Result<OriginResponse, OriginError>;
}

/// Builds the origin selected in `[origin]`.
pub fn from_config(config: &Config) -> anyhow::Result<Box<dyn Origin>> {
    match (&config.origin.base_url, &config.origin.root) {
        (Some(url), _) => Ok(Box::new(HttpOrigin::new(url)?)),
        (None, Some(root)) => Ok(Box::new(DirOrigin::new(root))),
        (None, None) => anyhow::bail!("origin: one of base_url or root must be set"),
    }
}

// ============ HTTP ============

pub struct HttpOrigin {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrigin {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("musannaf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, path: &str) -> Result<OriginResponse, OriginError> {
        let resp = self
            .client
            .get(self.url_for(path))
            .send()
            .await
            .map_err(|e| OriginError::network(path, e))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp
            .bytes()
            .await
            .map_err(|e| OriginError::network(path, e))?;

        Ok(OriginResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

// ============ Directory ============

/// Serves files under `root`. A missing root behaves like an unreachable
/// network; a missing file is a `404`.
pub struct DirOrigin {
    root: PathBuf,
}

impl DirOrigin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a request path onto a file under the root. `None` for paths
    /// that try to leave the root.
    fn file_for(&self, path: &str) -> Option<PathBuf> {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let relative = path.trim_start_matches('/');
        let relative = if relative.is_empty() || relative.ends_with('/') {
            format!("{}index.html", relative)
        } else {
            relative.to_string()
        };

        let rel = Path::new(&relative);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(rel))
    }
}

#[async_trait]
impl Origin for DirOrigin {
    async fn fetch(&self, path: &str) -> Result<OriginResponse, OriginError> {
        if !tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(OriginError::network(
                path,
                format!("origin root unavailable: {}", self.root.display()),
            ));
        }

        let Some(file) = self.file_for(path) else {
            return Ok(OriginResponse::not_found());
        };

        match tokio::fs::read(&file).await {
            Ok(body) => Ok(OriginResponse::ok(content_type_for(&file), body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OriginResponse::not_found()),
            Err(e) => Err(OriginError::network(path, e)),
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript",
        Some("webmanifest") => "application/manifest+json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
