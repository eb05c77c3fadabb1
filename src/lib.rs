//! # Musannaf Reader
//!
//! **A paginated reader for a chunked hadith corpus, with an offline-first
//! caching gateway.**
//!
//! The corpus is a dense, 1-based sequence of records published as
//! immutable JSON chunk files (`data/hadiths_001.json`, ...). The reader
//! maps pages and record ids onto those files, fetches them through a
//! gateway that keeps a versioned local cache, and renders one view per
//! request.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────────┐
//! │ ViewRequest  │──▶│ Index Resolver │──▶│ Cache Gateway│──▶ origin
//! │ page / jump  │   │ (core crate)   │   │ cache-or-fetch│   (HTTP or dir)
//! └──────────────┘   └────────────────┘   └──────┬───────┘
//!                                                │
//!                        ┌───────────────────────┤
//!                        ▼                       ▼
//!                 ┌──────────────┐        ┌──────────────┐
//!                 │  CLI viewer  │        │  HTTP front  │
//!                 │  (musannaf)  │        │   (axum)     │
//!                 └──────────────┘        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! musannaf page 12              # records 1101..1200
//! musannaf jump 37943           # a single record
//! musannaf open "?page=3"       # from a query string
//! musannaf cache install        # warm core assets
//! musannaf serve                # run the HTTP gateway
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`origin`] | HTTP and directory origins |
//! | [`cache`] | Named cache stores: disk and in-memory |
//! | [`gateway`] | Install / activate / cache-or-fetch policy |
//! | [`viewer`] | One render cycle with local error recovery |
//! | [`view_cmd`] | `page`, `jump`, `open`, `locate` commands |
//! | [`cache_cmd`] | `cache install`, `cache activate`, `cache list` commands |
//! | [`server`] | HTTP front for the gateway |

pub mod cache;
pub mod cache_cmd;
pub mod config;
pub mod gateway;
pub mod origin;
pub mod server;
pub mod view_cmd;
pub mod viewer;

pub use gateway::{CacheGateway, GatewayError, GatewayResponse, RequestKind, ResponseSource};
pub use musannaf_core::{ChunkId, CorpusLayout, Record, ViewRequest};
pub use viewer::{Notice, RenderedView, Viewer};
