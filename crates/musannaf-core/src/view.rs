//! Immutable view requests and the resolve/select steps of a render cycle.
//!
//! A render cycle is:
//!
//! 1. build a [`ViewRequest`] from query parameters or a navigation action,
//! 2. [`resolve`](ViewRequest::resolve) it into the chunks to fetch and the
//!    local slice to take,
//! 3. fetch and decode those chunks (outside this crate),
//! 4. [`select`] the displayed records from what was loaded.
//!
//! Navigation never mutates a request; every action returns a new value.

use serde::Serialize;
use url::form_urlencoded;

use crate::models::Record;
use crate::resolver::{ChunkId, CorpusLayout, RecordRange, ResolveError};

/// What the reader is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewMode {
    /// A page of consecutive records.
    Page { page: u64 },
    /// A single record addressed by absolute id.
    Jump { id: u64 },
}

/// One navigation target, plus the legacy `file` chunk override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRequest {
    mode: ViewMode,
    file: Option<ChunkId>,
}

impl ViewRequest {
    pub fn page(page: u64) -> Self {
        Self {
            mode: ViewMode::Page { page: page.max(1) },
            file: None,
        }
    }

    /// A jump request. The id is validated when the request is resolved.
    pub fn jump(id: u64) -> Self {
        Self {
            mode: ViewMode::Jump { id },
            file: None,
        }
    }

    /// Parses `page`, `jump` and `file` from a query string such as
    /// `?page=3&jump=0&file=001`.
    ///
    /// Numbers are read from their leading digits, so `page=3abc` is page 3.
    /// Missing or unparseable values fall back to their defaults
    /// (`page=1`, `jump=0`, no file). A positive `jump` wins over `page`.
    pub fn from_query(query: &str) -> Self {
        let query = query.trim().trim_start_matches('?');
        let mut page = 1u64;
        let mut jump = 0u64;
        let mut file = None;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => page = leading_number(&value).filter(|p| *p > 0).unwrap_or(1),
                "jump" => jump = leading_number(&value).unwrap_or(0),
                "file" => file = value.parse::<ChunkId>().ok(),
                _ => {}
            }
        }

        let mode = if jump > 0 {
            ViewMode::Jump { id: jump }
        } else {
            ViewMode::Page { page }
        };
        Self { mode, file }
    }

    pub fn with_file(self, file: ChunkId) -> Self {
        Self {
            file: Some(file),
            ..self
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn file(&self) -> Option<ChunkId> {
        self.file
    }

    /// Renders the request back into a query string.
    pub fn to_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        match self.mode {
            ViewMode::Page { page } => {
                out.append_pair("page", &page.to_string());
            }
            ViewMode::Jump { id } => {
                out.append_pair("jump", &id.to_string());
            }
        }
        if let Some(file) = self.file {
            out.append_pair("file", &file.to_string());
        }
        out.finish()
    }

    // ============ Navigation ============

    pub fn first(&self, _layout: &CorpusLayout) -> Self {
        match self.mode {
            ViewMode::Page { .. } => Self::page(1),
            ViewMode::Jump { .. } => Self::jump(1),
        }
    }

    pub fn last(&self, layout: &CorpusLayout) -> Self {
        match self.mode {
            ViewMode::Page { .. } => Self::page(layout.total_pages()),
            ViewMode::Jump { .. } => Self::jump(layout.total_records()),
        }
    }

    pub fn next(&self, layout: &CorpusLayout) -> Self {
        match self.mode {
            ViewMode::Page { page } => {
                Self::page(page.saturating_add(1).min(layout.total_pages()))
            }
            ViewMode::Jump { id } => Self::jump(id.saturating_add(1).min(layout.total_records())),
        }
    }

    pub fn prev(&self, layout: &CorpusLayout) -> Self {
        match self.mode {
            ViewMode::Page { page } => {
                Self::page(page.saturating_sub(1).clamp(1, layout.total_pages()))
            }
            ViewMode::Jump { id } => {
                Self::jump(id.saturating_sub(1).clamp(1, layout.total_records()))
            }
        }
    }

    pub fn goto_page(&self, page: u64) -> Self {
        Self::page(page)
    }

    /// Validated jump; out-of-range targets fail before anything is fetched.
    pub fn jump_to(&self, layout: &CorpusLayout, id: u64) -> Result<Self, ResolveError> {
        layout.resolve_jump(id)?;
        Ok(Self::jump(id))
    }

    // ============ Resolution ============

    /// Computes the chunks to fetch and the slice to take.
    ///
    /// A `file` override that disagrees with the computed chunk is dropped
    /// here, before any fetch, and the result is marked `corrected`.
    pub fn resolve(
        &self,
        layout: &CorpusLayout,
        assemble_across_chunks: bool,
    ) -> Result<Resolution, ResolveError> {
        let (range, chunks) = match self.mode {
            ViewMode::Page { page } => {
                let range = layout.range_for_page(page)?;
                let chunks = if range.is_empty() {
                    Vec::new()
                } else if assemble_across_chunks {
                    layout.chunks_spanning(range)
                } else {
                    vec![layout.chunk_for_record(range.start)?]
                };
                (range, chunks)
            }
            ViewMode::Jump { id } => {
                let chunk = layout.resolve_jump(id)?;
                (RecordRange { start: id, end: id }, vec![chunk])
            }
        };

        let local_offset = if range.is_empty() {
            0
        } else {
            layout.slice_within_chunk(range.start)
        };
        let single = chunks.len() == 1;
        let slices = chunks
            .iter()
            .map(|&chunk| {
                let held = layout.chunk_records(chunk);
                let start = range.start.max(held.start);
                // A lone chunk is sliced by position only, even past its end.
                let end = if single { range.end } else { range.end.min(held.end) };
                ChunkSlice {
                    chunk,
                    offset: (start - held.start) as usize,
                    len: (end + 1).saturating_sub(start) as usize,
                }
            })
            .collect();
        let corrected = match (self.file, chunks.first()) {
            (Some(file), Some(expected)) => file != *expected,
            _ => false,
        };

        Ok(Resolution {
            mode: self.mode,
            range,
            chunks,
            slices,
            local_offset,
            corrected,
        })
    }
}

/// The number spelled by the leading digits of `value`, after optional
/// whitespace and a `+` sign.
fn leading_number(value: &str) -> Option<u64> {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

impl Default for ViewRequest {
    fn default() -> Self {
        Self::page(1)
    }
}

/// The addressing outcome for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub mode: ViewMode,
    /// Records to display; a single id in jump mode, empty past the last page.
    pub range: RecordRange,
    /// Chunks to fetch, in order. Empty when `range` is empty.
    pub chunks: Vec<ChunkId>,
    /// The part of each chunk that belongs to `range`, in chunk order.
    pub slices: Vec<ChunkSlice>,
    /// Offset of `range.start` inside the first chunk.
    pub local_offset: usize,
    /// A stale `file` override was discarded.
    pub corrected: bool,
}

impl Resolution {
    pub fn primary_chunk(&self) -> Option<ChunkId> {
        self.chunks.first().copied()
    }
}

/// Positions `offset..offset + len` of one chunk's decoded records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSlice {
    pub chunk: ChunkId,
    pub offset: usize,
    pub len: usize,
}

/// Decoded records of one fetched chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedChunk {
    pub chunk: ChunkId,
    pub records: Vec<Record>,
}

/// What the loaded records yield for a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Records of a page, in id order.
    Page(Vec<Record>),
    /// The jump target.
    Found(Record),
    /// The right chunk loaded but the jump target is not in it.
    NotFound { id: u64 },
    /// Nothing to show: past the last page, or the chunk had no records there.
    Empty,
    /// The loaded chunk is not the one the range lives in.
    Mismatch { expected: ChunkId, loaded: ChunkId },
}

/// Picks the displayed records out of the chunks in `loaded`.
///
/// Each chunk contributes only its own slice, so a short or empty chunk
/// never shifts records of the next one into the page.
pub fn select(resolution: &Resolution, loaded: &[LoadedChunk]) -> Selection {
    let Some(expected) = resolution.primary_chunk() else {
        return Selection::Empty;
    };
    let mismatch = loaded
        .first()
        .filter(|first| first.chunk != expected)
        .map(|first| Selection::Mismatch {
            expected,
            loaded: first.chunk,
        });

    match resolution.mode {
        ViewMode::Page { .. } => {
            let mut page = Vec::new();
            for slice in &resolution.slices {
                let Some(chunk) = loaded.iter().find(|c| c.chunk == slice.chunk) else {
                    continue;
                };
                page.extend(
                    chunk
                        .records
                        .iter()
                        .skip(slice.offset)
                        .take(slice.len)
                        .cloned(),
                );
            }
            if !page.is_empty() {
                Selection::Page(page)
            } else {
                mismatch.unwrap_or(Selection::Empty)
            }
        }
        ViewMode::Jump { id } => match loaded
            .iter()
            .flat_map(|c| c.records.iter())
            .find(|r| r.hadith_id == Some(id))
        {
            Some(record) => Selection::Found(record.clone()),
            None => mismatch.unwrap_or(Selection::NotFound { id }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> CorpusLayout {
        CorpusLayout::new(1000, 100, 37943).unwrap()
    }

    fn records(range: std::ops::RangeInclusive<u64>) -> Vec<Record> {
        range
            .map(|id| Record {
                hadith_id: Some(id),
                english_text: Some(format!("text {}", id)),
                ..Record::default()
            })
            .collect()
    }

    fn chunk(n: u32) -> ChunkId {
        ChunkId::new(n).unwrap()
    }

    fn loaded(n: u32, range: std::ops::RangeInclusive<u64>) -> LoadedChunk {
        LoadedChunk {
            chunk: chunk(n),
            records: records(range),
        }
    }

    #[test]
    fn test_from_query_defaults() {
        assert_eq!(ViewRequest::from_query(""), ViewRequest::page(1));
        assert_eq!(ViewRequest::from_query("?page=abc"), ViewRequest::page(1));
        assert_eq!(ViewRequest::from_query("page=0"), ViewRequest::page(1));
        assert_eq!(ViewRequest::from_query("jump=0&page=4"), ViewRequest::page(4));
        assert_eq!(ViewRequest::from_query("page=-2"), ViewRequest::page(1));
    }

    #[test]
    fn test_from_query_reads_leading_digits() {
        assert_eq!(ViewRequest::from_query("page=3abc"), ViewRequest::page(3));
        assert_eq!(ViewRequest::from_query("page=%2B7"), ViewRequest::page(7));
        assert_eq!(
            ViewRequest::from_query("jump=1500x").mode(),
            ViewMode::Jump { id: 1500 }
        );
        assert_eq!(ViewRequest::from_query("jump=x1500"), ViewRequest::page(1));
    }

    #[test]
    fn test_from_query_jump_wins() {
        let req = ViewRequest::from_query("?file=002&page=3&jump=1500");
        assert_eq!(req.mode(), ViewMode::Jump { id: 1500 });
        assert_eq!(req.file(), Some(chunk(2)));
    }

    #[test]
    fn test_query_round_trip() {
        let req = ViewRequest::page(12).with_file(chunk(2));
        assert_eq!(req.to_query(), "page=12&file=002");
        assert_eq!(ViewRequest::from_query(&req.to_query()), req);
    }

    #[test]
    fn test_navigation_returns_new_values() {
        let l = layout();
        let start = ViewRequest::page(1).with_file(chunk(1));
        let next = start.next(&l);
        assert_eq!(start.mode(), ViewMode::Page { page: 1 });
        assert_eq!(next.mode(), ViewMode::Page { page: 2 });
        assert_eq!(next.file(), None);
        assert_eq!(start.prev(&l).mode(), ViewMode::Page { page: 1 });
        assert_eq!(start.last(&l).mode(), ViewMode::Page { page: 380 });
        assert_eq!(start.last(&l).next(&l).mode(), ViewMode::Page { page: 380 });
    }

    #[test]
    fn test_jump_navigation_clamps() {
        let l = layout();
        let last = ViewRequest::jump(37943);
        assert_eq!(last.next(&l).mode(), ViewMode::Jump { id: 37943 });
        assert_eq!(ViewRequest::jump(1).prev(&l).mode(), ViewMode::Jump { id: 1 });
        assert_eq!(last.first(&l).mode(), ViewMode::Jump { id: 1 });
    }

    #[test]
    fn test_jump_to_validates() {
        let l = layout();
        let req = ViewRequest::default();
        assert!(req.jump_to(&l, 37943).is_ok());
        assert!(matches!(
            req.jump_to(&l, 37944),
            Err(ResolveError::RecordOutOfRange { .. })
        ));
    }

    #[test]
    fn test_resolve_page() {
        let res = ViewRequest::page(11).resolve(&layout(), false).unwrap();
        assert_eq!(res.range, RecordRange { start: 1001, end: 1100 });
        assert_eq!(res.chunks, vec![chunk(2)]);
        assert_eq!(res.local_offset, 0);
        assert!(!res.corrected);
    }

    #[test]
    fn test_resolve_corrects_stale_file() {
        let res = ViewRequest::page(11)
            .with_file(chunk(1))
            .resolve(&layout(), false)
            .unwrap();
        assert!(res.corrected);
        assert_eq!(res.primary_chunk(), Some(chunk(2)));

        let agreeing = ViewRequest::page(11)
            .with_file(chunk(2))
            .resolve(&layout(), false)
            .unwrap();
        assert!(!agreeing.corrected);
    }

    #[test]
    fn test_resolve_jump_out_of_range() {
        assert!(ViewRequest::jump(37944).resolve(&layout(), false).is_err());
        let res = ViewRequest::jump(37943).resolve(&layout(), false).unwrap();
        assert_eq!(res.chunks, vec![chunk(38)]);
        assert_eq!(res.local_offset, 942);
    }

    #[test]
    fn test_resolve_past_end_is_empty() {
        let res = ViewRequest::page(500).resolve(&layout(), false).unwrap();
        assert!(res.range.is_empty());
        assert!(res.chunks.is_empty());
        assert_eq!(select(&res, &[]), Selection::Empty);
    }

    #[test]
    fn test_resolve_slices_follow_chunk_bounds() {
        let l = CorpusLayout::new(1000, 300, 37943).unwrap();
        let res = ViewRequest::page(4).resolve(&l, true).unwrap();
        assert_eq!(
            res.slices,
            vec![
                ChunkSlice { chunk: chunk(1), offset: 900, len: 100 },
                ChunkSlice { chunk: chunk(2), offset: 0, len: 200 },
            ]
        );

        let single = ViewRequest::page(4).resolve(&l, false).unwrap();
        assert_eq!(
            single.slices,
            vec![ChunkSlice { chunk: chunk(1), offset: 900, len: 300 }]
        );

        let jump = ViewRequest::jump(1500).resolve(&l, true).unwrap();
        assert_eq!(
            jump.slices,
            vec![ChunkSlice { chunk: chunk(2), offset: 499, len: 1 }]
        );
    }

    #[test]
    fn test_select_page_slice() {
        let l = layout();
        let res = ViewRequest::page(12).resolve(&l, false).unwrap();
        match select(&res, &[loaded(2, 1001..=2000)]) {
            Selection::Page(page) => {
                assert_eq!(page.len(), 100);
                assert_eq!(page[0].hadith_id, Some(1101));
                assert_eq!(page[99].hadith_id, Some(1200));
            }
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_select_detects_wrong_chunk() {
        let l = layout();
        let res = ViewRequest::page(12).resolve(&l, false).unwrap();
        assert_eq!(
            select(&res, &[loaded(1, 1..=50)]),
            Selection::Mismatch {
                expected: chunk(2),
                loaded: chunk(1)
            }
        );
        // The right chunk with no records at the offset is simply empty.
        let empty = LoadedChunk {
            chunk: chunk(2),
            records: Vec::new(),
        };
        assert_eq!(select(&res, &[empty]), Selection::Empty);
    }

    #[test]
    fn test_select_jump() {
        let l = layout();
        let res = ViewRequest::jump(1500).resolve(&l, false).unwrap();
        match select(&res, &[loaded(2, 1001..=2000)]) {
            Selection::Found(r) => assert_eq!(r.hadith_id, Some(1500)),
            other => panic!("unexpected selection: {:?}", other),
        }
        assert_eq!(
            select(&res, &[loaded(2, 1001..=1499)]),
            Selection::NotFound { id: 1500 }
        );
        assert!(matches!(
            select(&res, &[loaded(3, 2001..=2010)]),
            Selection::Mismatch { .. }
        ));
    }

    #[test]
    fn test_multi_chunk_assembly() {
        let l = CorpusLayout::new(1000, 300, 37943).unwrap();
        let res = ViewRequest::page(4).resolve(&l, true).unwrap();
        assert_eq!(res.chunks, vec![chunk(1), chunk(2)]);
        assert_eq!(res.local_offset, 900);
        match select(&res, &[loaded(1, 1..=1000), loaded(2, 1001..=2000)]) {
            Selection::Page(page) => {
                assert_eq!(page.len(), 300);
                assert_eq!(page[0].hadith_id, Some(901));
                assert_eq!(page[299].hadith_id, Some(1200));
            }
            other => panic!("unexpected selection: {:?}", other),
        }

        // Without assembly the page is cut at the chunk boundary.
        let single = ViewRequest::page(4).resolve(&l, false).unwrap();
        match select(&single, &[loaded(1, 1..=1000)]) {
            Selection::Page(page) => assert_eq!(page.len(), 100),
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_assembly_keeps_page_bounds_when_a_chunk_is_empty() {
        let l = CorpusLayout::new(1000, 300, 37943).unwrap();
        let res = ViewRequest::page(4).resolve(&l, true).unwrap();
        let offline = LoadedChunk {
            chunk: chunk(1),
            records: Vec::new(),
        };
        match select(&res, &[offline, loaded(2, 1001..=2000)]) {
            Selection::Page(page) => {
                assert_eq!(page.len(), 200);
                assert_eq!(page[0].hadith_id, Some(1001));
                assert_eq!(page[199].hadith_id, Some(1200));
            }
            other => panic!("unexpected selection: {:?}", other),
        }

        // A short first chunk does not pull later records forward either.
        match select(&res, &[loaded(1, 1..=950), loaded(2, 1001..=2000)]) {
            Selection::Page(page) => {
                assert_eq!(page.first().and_then(|r| r.hadith_id), Some(901));
                assert!(page.iter().all(|r| {
                    let id = r.hadith_id.unwrap();
                    (901..=1200).contains(&id)
                }));
                assert_eq!(page.len(), 250);
            }
            other => panic!("unexpected selection: {:?}", other),
        }
    }
}
