//! Named cache stores for the gateway.
//!
//! A cache storage holds any number of named stores; each store maps a
//! request key (the normalized request path) to a stored response. The
//! gateway only ever reads and writes the store whose name carries the
//! current version token, and deletes the others wholesale on activation.
//!
//! | Backend | Layout |
//! |---------|--------|
//! | [`DiskCacheStorage`] | `<dir>/<store>/<sha256(key)>.body` + `.json` metadata |
//! | [`MemoryCacheStorage`] | `RwLock<BTreeMap<store, BTreeMap<key, response>>>` |
//!
//! On disk, the body is written first and the metadata file last, each via
//! a temporary file and a rename. An entry exists once its metadata exists,
//! so readers never observe a half-written body.
//!
//! Every disk store carries a [`STORE_MARKER`] file. Directories without it
//! are not stores: they are never listed and never deleted, so the cache
//! directory may be shared with other data.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::origin::OriginResponse;

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the named store if it does not exist yet.
    async fn open(&self, store: &str) -> Result<()>;

    /// Names of every existing store.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes a store and all its entries. Returns `false` if it did not exist.
    async fn delete(&self, store: &str) -> Result<bool>;

    /// Exact-match lookup of `key` in `store`.
    async fn match_entry(&self, store: &str, key: &str) -> Result<Option<OriginResponse>>;

    /// Stores (or replaces) the response for `key` in `store`.
    async fn put(&self, store: &str, key: &str, response: &OriginResponse) -> Result<()>;

    /// Request keys held by `store`, sorted.
    async fn entries(&self, store: &str) -> Result<Vec<String>>;
}

// ============ Disk ============

/// Metadata written next to each cached body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    content_type: Option<String>,
    stored_at: DateTime<Utc>,
}

/// File that marks a directory as a cache store.
pub const STORE_MARKER: &str = ".musannaf-store";

pub struct DiskCacheStorage {
    dir: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn store_dir(&self, store: &str) -> Result<PathBuf> {
        if store.is_empty()
            || store.contains('/')
            || store.contains('\\')
            || store.starts_with('.')
        {
            anyhow::bail!("invalid cache store name: '{}'", store);
        }
        Ok(self.dir.join(store))
    }

    async fn is_store(&self, dir: &Path) -> Result<bool> {
        let marker = dir.join(STORE_MARKER);
        tokio::fs::try_exists(&marker)
            .await
            .with_context(|| format!("Failed to check {}", marker.display()))
    }

    fn entry_paths(&self, store: &str, key: &str) -> Result<(PathBuf, PathBuf)> {
        let dir = self.store_dir(store)?;
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        Ok((
            dir.join(format!("{}.body", digest)),
            dir.join(format!("{}.json", digest)),
        ))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

async fn read_meta(path: &Path) -> Result<Option<EntryMeta>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let meta = serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt cache metadata: {}", path.display()))?;
            Ok(Some(meta))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, store: &str) -> Result<()> {
        let dir = self.store_dir(store)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create cache store {}", dir.display()))?;
        if !self.is_store(&dir).await? {
            let marker = dir.join(STORE_MARKER);
            tokio::fs::write(&marker, store.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", marker.display()))?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut rd = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to list cache dir {}", self.dir.display()))
            }
        };
        while let Some(entry) = rd.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if self.store_dir(&name).is_err() || !self.is_store(&entry.path()).await? {
                log::debug!("ignoring {} in cache dir: not a cache store", name);
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, store: &str) -> Result<bool> {
        let dir = self.store_dir(store)?;
        if !self.is_store(&dir).await? {
            if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                log::warn!("refusing to delete {}: not a cache store", dir.display());
            }
            return Ok(false);
        }
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", dir.display())),
        }
    }

    async fn match_entry(&self, store: &str, key: &str) -> Result<Option<OriginResponse>> {
        let (body_path, meta_path) = self.entry_paths(store, key)?;
        let Some(meta) = read_meta(&meta_path).await? else {
            return Ok(None);
        };
        if meta.key != key {
            // Digest collision or a foreign file; treat as a miss.
            return Ok(None);
        }
        let body = match tokio::fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", body_path.display()))
            }
        };
        Ok(Some(OriginResponse {
            status: meta.status,
            content_type: meta.content_type,
            body,
        }))
    }

    async fn put(&self, store: &str, key: &str, response: &OriginResponse) -> Result<()> {
        self.open(store).await?;
        let (body_path, meta_path) = self.entry_paths(store, key)?;
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            stored_at: Utc::now(),
        };
        write_atomic(&body_path, &response.body).await?;
        write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?).await?;
        Ok(())
    }

    async fn entries(&self, store: &str) -> Result<Vec<String>> {
        let dir = self.store_dir(store)?;
        let mut keys = Vec::new();
        let mut rd = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
        };
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_meta(&path).await {
                Ok(Some(meta)) => keys.push(meta.key),
                Ok(None) => {}
                Err(e) => log::warn!("skipping cache entry {}: {:#}", path.display(), e),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ============ Memory ============

/// In-memory storage for tests and embedding.
#[derive(Default)]
pub struct MemoryCacheStorage {
    stores: RwLock<BTreeMap<String, BTreeMap<String, OriginResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("cache storage lock poisoned")
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, store: &str) -> Result<()> {
        self.stores
            .write()
            .map_err(poisoned)?
            .entry(store.to_string())
            .or_default();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.stores.read().map_err(poisoned)?.keys().cloned().collect())
    }

    async fn delete(&self, store: &str) -> Result<bool> {
        Ok(self.stores.write().map_err(poisoned)?.remove(store).is_some())
    }

    async fn match_entry(&self, store: &str, key: &str) -> Result<Option<OriginResponse>> {
        Ok(self
            .stores
            .read()
            .map_err(poisoned)?
            .get(store)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, store: &str, key: &str, response: &OriginResponse) -> Result<()> {
        self.stores
            .write()
            .map_err(poisoned)?
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn entries(&self, store: &str) -> Result<Vec<String>> {
        Ok(self
            .stores
            .read()
            .map_err(poisoned)?
            .get(store)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}
