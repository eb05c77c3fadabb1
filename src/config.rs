//! TOML configuration parsing and validation.
//!
//! ```toml
//! [corpus]
//! total_records = 37943
//! chunk_size = 1000
//! page_size = 100
//! data_dir = "data"
//!
//! [origin]
//! root = "./site"          # or: base_url = "https://example.org/musannaf/"
//!
//! [cache]
//! dir = "./.cache/musannaf"
//! name = "musannaf-cache"
//! version = "v1"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{Context, Result};
use musannaf_core::CorpusLayout;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    pub origin: OriginConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_total_records")]
    pub total_records: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Fetch every chunk a page spans instead of only the first one.
    #[serde(default)]
    pub assemble_across_chunks: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            total_records: default_total_records(),
            chunk_size: default_chunk_size(),
            page_size: default_page_size(),
            data_dir: default_data_dir(),
            assemble_across_chunks: false,
        }
    }
}

fn default_total_records() -> u64 {
    37943
}
fn default_chunk_size() -> u64 {
    1000
}
fn default_page_size() -> u64 {
    100
}
fn default_data_dir() -> String {
    "data".to_string()
}

/// Where chunk files and static assets come from. Exactly one must be set.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct OriginConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_cache_name")]
    pub name: String,
    #[serde(default = "default_cache_version")]
    pub version: String,
    #[serde(default = "default_core_assets")]
    pub core_assets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            name: default_cache_name(),
            version: default_cache_version(),
            core_assets: default_core_assets(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.cache/musannaf")
}
fn default_cache_name() -> String {
    "musannaf-cache".to_string()
}
fn default_cache_version() -> String {
    "v1".to_string()
}
fn default_core_assets() -> Vec<String> {
    ["/", "/index.html", "/style.css", "/app.js", "/manifest.json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl CacheConfig {
    /// Store name with the version token embedded, e.g. `musannaf-cache-v1`.
    pub fn store_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl Config {
    pub fn layout(&self) -> Result<CorpusLayout> {
        CorpusLayout::new(
            self.corpus.chunk_size,
            self.corpus.page_size,
            self.corpus.total_records,
        )
        .map_err(Into::into)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate corpus
    config
        .layout()
        .with_context(|| "corpus: invalid layout")?;

    // Validate origin
    match (&config.origin.base_url, &config.origin.root) {
        (Some(_), Some(_)) => anyhow::bail!("origin: set either base_url or root, not both"),
        (None, None) => anyhow::bail!("origin: one of base_url or root must be set"),
        (Some(url), None) if !(url.starts_with("http://") || url.starts_with("https://")) => {
            anyhow::bail!("origin.base_url must be an http(s) URL, got '{}'", url)
        }
        _ => {}
    }

    // Validate cache naming; names become directory names on disk
    for (field, value) in [
        ("cache.name", &config.cache.name),
        ("cache.version", &config.cache.version),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{} must not be empty", field);
        }
        if value.contains('/') || value.contains('\\') || value.contains("..") {
            anyhow::bail!("{} must not contain path separators: '{}'", field, value);
        }
    }

    for asset in &config.cache.core_assets {
        if !asset.starts_with('/') {
            anyhow::bail!("cache.core_assets entries must start with '/': '{}'", asset);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[origin]\nroot = \"./site\"\n").unwrap();
        assert_eq!(cfg.corpus.total_records, 37943);
        assert_eq!(cfg.corpus.chunk_size, 1000);
        assert_eq!(cfg.corpus.page_size, 100);
        assert_eq!(cfg.cache.store_name(), "musannaf-cache-v1");
        assert_eq!(cfg.cache.core_assets.len(), 5);
        assert_eq!(cfg.server.bind, "127.0.0.1:7340");
        assert!(!cfg.corpus.assemble_across_chunks);
    }

    #[test]
    fn test_origin_must_be_exactly_one() {
        assert!(parse("[origin]\n").is_err());
        assert!(parse("[origin]\nroot = \"a\"\nbase_url = \"https://x\"\n").is_err());
        assert!(parse("[origin]\nbase_url = \"ftp://x\"\n").is_err());
        assert!(parse("[origin]\nbase_url = \"https://example.org/m/\"\n").is_ok());
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(parse("[corpus]\npage_size = 0\n[origin]\nroot = \"a\"\n").is_err());
        assert!(parse("[corpus]\nchunk_size = 0\n[origin]\nroot = \"a\"\n").is_err());
        assert!(parse("[corpus]\ntotal_records = 0\n[origin]\nroot = \"a\"\n").is_err());
    }

    #[test]
    fn test_rejects_path_like_cache_version() {
        assert!(parse("[origin]\nroot = \"a\"\n[cache]\nversion = \"../v2\"\n").is_err());
        assert!(parse("[origin]\nroot = \"a\"\n[cache]\nname = \"\"\n").is_err());
    }

    #[test]
    fn test_rejects_relative_core_asset() {
        assert!(parse("[origin]\nroot = \"a\"\n[cache]\ncore_assets = [\"index.html\"]\n").is_err());
    }
}
