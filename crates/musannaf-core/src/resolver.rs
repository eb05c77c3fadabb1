//! Index resolution between record ids, pages, and chunk files.
//!
//! The corpus is a dense, 1-based sequence of records split into
//! fixed-size chunk files. A [`CorpusLayout`] holds the three numbers fixed
//! at configuration time (chunk size, page size, total record count) and
//! answers every addressing question the reader needs:
//!
//! | Question | Method |
//! |----------|--------|
//! | Which chunk holds record `id`? | [`CorpusLayout::chunk_for_record`] |
//! | Which records does page `p` show? | [`CorpusLayout::range_for_page`] |
//! | Where does a record sit inside its chunk? | [`CorpusLayout::slice_within_chunk`] |
//! | Is a jump target valid, and where is it? | [`CorpusLayout::resolve_jump`] |
//! | Which chunks does a range touch? | [`CorpusLayout::chunks_spanning`] |
//!
//! ```text
//! record id:  1 ........ 1000 | 1001 ....... 2000 | ... | 37001 .. 37943
//! chunk id:        001        |       002         | ... |      038
//! page (100): 1 2 ... 10      | 11 ... 20         | ... | 371 ... 380
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Validation failures raised before any chunk is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("record {id} is out of range: enter a number between 1 and {total}")]
    RecordOutOfRange { id: u64, total: u64 },

    #[error("'{input}' is not a record number: enter a number between 1 and {total}")]
    NotANumber { input: String, total: u64 },

    #[error("page {page} is out of range: pages start at 1")]
    PageOutOfRange { page: u64 },

    #[error("invalid chunk token: '{0}'")]
    InvalidChunkToken(String),

    #[error("invalid corpus layout: {0}")]
    InvalidLayout(&'static str),
}

/// A 1-based chunk number, rendered as a three-digit zero-padded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(u32);

impl ChunkId {
    /// Wraps a raw 1-based chunk number. Returns `None` for zero.
    pub fn new(n: u32) -> Option<Self> {
        (n >= 1).then_some(Self(n))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// File name of this chunk, e.g. `hadiths_001.json`.
    pub fn file_name(self) -> String {
        format!("hadiths_{}.json", self)
    }

    /// Request path of this chunk under `data_dir`, e.g. `data/hadiths_001.json`.
    pub fn path_in(self, data_dir: &str) -> String {
        let dir = data_dir.trim_matches('/');
        if dir.is_empty() {
            self.file_name()
        } else {
            format!("{}/{}", dir, self.file_name())
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl Serialize for ChunkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for ChunkId {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ResolveError::InvalidChunkToken(s.to_string()));
        }
        trimmed
            .parse::<u32>()
            .ok()
            .and_then(ChunkId::new)
            .ok_or_else(|| ResolveError::InvalidChunkToken(s.to_string()))
    }
}

/// An inclusive range of absolute record ids. Empty when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordRange {
    pub start: u64,
    pub end: u64,
}

impl RecordRange {
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.start <= id && id <= self.end
    }
}

/// Fixed addressing constants for one corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusLayout {
    chunk_size: u64,
    page_size: u64,
    total_records: u64,
}

impl CorpusLayout {
    pub fn new(chunk_size: u64, page_size: u64, total_records: u64) -> Result<Self, ResolveError> {
        if chunk_size == 0 {
            return Err(ResolveError::InvalidLayout("chunk size must be > 0"));
        }
        if page_size == 0 {
            return Err(ResolveError::InvalidLayout("page size must be > 0"));
        }
        if total_records == 0 {
            return Err(ResolveError::InvalidLayout("total record count must be > 0"));
        }
        if total_records.div_ceil(chunk_size) > u64::from(u32::MAX) {
            return Err(ResolveError::InvalidLayout("too many chunks"));
        }
        Ok(Self {
            chunk_size,
            page_size,
            total_records,
        })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn total_pages(&self) -> u64 {
        self.total_records.div_ceil(self.page_size)
    }

    pub fn total_chunks(&self) -> u32 {
        // Bounded by the check in `new`.
        self.total_records.div_ceil(self.chunk_size) as u32
    }

    /// Chunk holding record `id`: `floor((id - 1) / chunk_size) + 1`.
    ///
    /// Only the lower bound is checked here; use [`resolve_jump`](Self::resolve_jump)
    /// for input that must also lie within the corpus.
    pub fn chunk_for_record(&self, id: u64) -> Result<ChunkId, ResolveError> {
        if id < 1 {
            return Err(ResolveError::RecordOutOfRange {
                id,
                total: self.total_records,
            });
        }
        let n = (id - 1) / self.chunk_size + 1;
        u32::try_from(n)
            .ok()
            .and_then(ChunkId::new)
            .ok_or(ResolveError::RecordOutOfRange {
                id,
                total: self.total_records,
            })
    }

    /// Absolute record range shown on `page`.
    ///
    /// A page past the end of the corpus yields an empty range rather than
    /// an error; the caller renders a "no results" state for it.
    pub fn range_for_page(&self, page: u64) -> Result<RecordRange, ResolveError> {
        if page < 1 {
            return Err(ResolveError::PageOutOfRange { page });
        }
        let start = (page - 1).saturating_mul(self.page_size).saturating_add(1);
        let end = start
            .saturating_add(self.page_size - 1)
            .min(self.total_records);
        Ok(RecordRange { start, end })
    }

    /// Offset of `global_start` inside the chunk that holds it.
    pub fn slice_within_chunk(&self, global_start: u64) -> usize {
        (global_start.saturating_sub(1) % self.chunk_size) as usize
    }

    /// Bounds-checked chunk lookup for a jump target.
    pub fn resolve_jump(&self, id: u64) -> Result<ChunkId, ResolveError> {
        if id < 1 || id > self.total_records {
            return Err(ResolveError::RecordOutOfRange {
                id,
                total: self.total_records,
            });
        }
        self.chunk_for_record(id)
    }

    /// Parses and validates raw jump input such as the text of an input box.
    pub fn parse_jump_input(&self, input: &str) -> Result<u64, ResolveError> {
        let id = input
            .trim()
            .parse::<u64>()
            .map_err(|_| ResolveError::NotANumber {
                input: input.to_string(),
                total: self.total_records,
            })?;
        self.resolve_jump(id)?;
        Ok(id)
    }

    /// Page that displays record `id`.
    pub fn page_for_record(&self, id: u64) -> u64 {
        id.saturating_sub(1) / self.page_size + 1
    }

    /// Records stored in `chunk`, clipped to the corpus size.
    pub fn chunk_records(&self, chunk: ChunkId) -> RecordRange {
        let start = u64::from(chunk.get() - 1) * self.chunk_size + 1;
        let end = (start + self.chunk_size - 1).min(self.total_records);
        RecordRange { start, end }
    }

    /// Every chunk that `range` touches, in order.
    pub fn chunks_spanning(&self, range: RecordRange) -> Vec<ChunkId> {
        if range.is_empty() {
            return Vec::new();
        }
        let (Ok(first), Ok(last)) = (
            self.chunk_for_record(range.start),
            self.chunk_for_record(range.end),
        ) else {
            return Vec::new();
        };
        (first.get()..=last.get()).filter_map(ChunkId::new).collect()
    }
}
