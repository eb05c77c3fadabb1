//! # Musannaf Core
//!
//! Shared, I/O-free logic for the Musannaf reader: the record model, the
//! chunk payload decoder, the index resolver that maps pages and record
//! ids onto chunk files, the immutable view request, and pagination
//! windows.
//!
//! This crate contains no tokio, reqwest, or filesystem I/O. Everything
//! here is plain integer arithmetic and slicing, so it can be reused by
//! the CLI, the HTTP gateway, or a `wasm32-unknown-unknown` front end.

pub mod models;
pub mod pagination;
pub mod resolver;
pub mod view;

pub use models::{decode_chunk, DecodedChunk, Record};
pub use resolver::{ChunkId, CorpusLayout, RecordRange, ResolveError};
pub use view::{ChunkSlice, LoadedChunk, Resolution, Selection, ViewMode, ViewRequest};
