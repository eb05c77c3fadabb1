//! Offline-first cache gateway.
//!
//! The gateway sits between the reader and the origin and applies one
//! caching policy to every request:
//!
//! ```text
//!   request ──▶ classify ──▶ match in current store ──hit──▶ cached response
//!                                 │
//!                                miss
//!                                 ▼
//!                           origin fetch ──ok──▶ store copy ──▶ network response
//!                                 │
//!                           network error
//!                                 ▼
//!                 data:  200 application/json "[]"
//!                 asset: GatewayError::Network
//! ```
//!
//! # Lifecycle
//!
//! | Step | Effect |
//! |------|--------|
//! | [`install`](CacheGateway::install) | Fetch all core assets and store them (all or nothing) |
//! | [`activate`](CacheGateway::activate) | Delete every store not named for the current version |
//! | [`fetch`](CacheGateway::fetch) | Cache-or-fetch; data chunks are cached on first read |
//!
//! There are no per-entry lifetimes: a store is only ever invalidated as a
//! whole, by bumping the version token in the configuration.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{CacheStorage, DiskCacheStorage};
use crate::config::Config;
use crate::origin::{self, Origin, OriginError, OriginResponse};

/// Body of the synthetic response returned for unreachable data chunks.
pub const EMPTY_COLLECTION: &[u8] = b"[]";

/// Which caching rules apply to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// A chunk file under the data directory.
    Data,
    /// Anything else served by the site.
    Asset,
}

/// Where a gateway response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Synthetic empty collection after a network failure.
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub response: OriginResponse,
    pub source: ResponseSource,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Network(#[from] OriginError),
}

/// Static settings of a gateway.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Versioned store name, e.g. `musannaf-cache-v1`.
    pub store_name: String,
    /// Request paths stored at install time.
    pub core_assets: Vec<String>,
    /// Directory holding chunk files, e.g. `data`.
    pub data_dir: String,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            store_name: config.cache.store_name(),
            core_assets: config.cache.core_assets.clone(),
            data_dir: config.corpus.data_dir.clone(),
        }
    }
}

pub struct CacheGateway {
    storage: Arc<dyn CacheStorage>,
    origin: Arc<dyn Origin>,
    settings: GatewaySettings,
}

impl CacheGateway {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        origin: Arc<dyn Origin>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            storage,
            origin,
            settings,
        }
    }

    /// Disk-backed gateway over the configured origin.
    pub fn from_config(config: &Config) -> Result<Self> {
        let origin: Arc<dyn Origin> = Arc::from(origin::from_config(config)?);
        Ok(Self::new(
            Arc::new(DiskCacheStorage::new(&config.cache.dir)),
            origin,
            GatewaySettings::from_config(config),
        ))
    }

    pub fn store_name(&self) -> &str {
        &self.settings.store_name
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn classify(&self, path: &str) -> RequestKind {
        let path = normalize_key(path);
        let path = path.split('?').next().unwrap_or("");
        let data_dir = self.settings.data_dir.trim_matches('/');
        let prefix = if data_dir.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", data_dir)
        };
        if path.starts_with(&prefix) && path.ends_with(".json") {
            RequestKind::Data
        } else {
            RequestKind::Asset
        }
    }

    /// Fetches every core asset and stores them in the current store.
    ///
    /// Nothing is written unless every asset was fetched successfully.
    /// Returns the number of stored assets.
    pub async fn install(&self) -> Result<usize> {
        let mut fetched = Vec::with_capacity(self.settings.core_assets.len());
        for asset in &self.settings.core_assets {
            let key = normalize_key(asset);
            let response = self
                .origin
                .fetch(&key)
                .await
                .with_context(|| format!("Failed to install core asset {}", key))?;
            if !response.is_success() {
                anyhow::bail!(
                    "Failed to install core asset {}: origin returned {}",
                    key,
                    response.status
                );
            }
            fetched.push((key, response));
        }

        self.storage.open(&self.settings.store_name).await?;
        for (key, response) in &fetched {
            self.storage
                .put(&self.settings.store_name, key, response)
                .await?;
        }
        log::info!(
            "installed {} core assets into {}",
            fetched.len(),
            self.settings.store_name
        );
        Ok(fetched.len())
    }

    /// Deletes every store whose name is not the current versioned name.
    /// Returns the deleted store names.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name != self.settings.store_name && self.storage.delete(&name).await? {
                log::info!("deleted stale cache store {}", name);
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Cache-or-fetch for one request path.
    pub async fn fetch(&self, path: &str) -> Result<GatewayResponse, GatewayError> {
        let key = normalize_key(path);
        let kind = self.classify(&key);
        let store = &self.settings.store_name;

        match self.storage.match_entry(store, &key).await {
            Ok(Some(response)) => {
                log::debug!("cache hit {}", key);
                return Ok(GatewayResponse {
                    response,
                    source: ResponseSource::Cache,
                });
            }
            Ok(None) => log::debug!("cache miss {}", key),
            Err(e) => log::warn!("cache lookup failed for {}: {:#}", key, e),
        }

        match self.origin.fetch(&key).await {
            Ok(response) => {
                if response.is_success() {
                    if let Err(e) = self.storage.put(store, &key, &response).await {
                        log::warn!("failed to cache {}: {:#}", key, e);
                    }
                } else {
                    log::debug!("origin returned {} for {}", response.status, key);
                }
                Ok(GatewayResponse {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(e) => match kind {
                RequestKind::Data => {
                    log::warn!("{}; serving empty collection", e);
                    Ok(GatewayResponse {
                        response: OriginResponse::ok("application/json", EMPTY_COLLECTION),
                        source: ResponseSource::Fallback,
                    })
                }
                RequestKind::Asset => Err(GatewayError::Network(e)),
            },
        }
    }
}

/// Cache key for a request path: always rooted at `/`.
pub fn normalize_key(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
