//! One render cycle: request → resolve → fetch through the gateway →
//! decode → select.
//!
//! Every failure short of invalid input is recovered locally and reported
//! as a [`Notice`] on the rendered view:
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Invalid jump or page | [`ResolveError`] before any fetch |
//! | Chunk request answered with an HTTP error | [`Notice::ChunkUnavailable`], no retry |
//! | Origin unreachable | empty chunk from the gateway, [`Notice::Offline`] |
//! | Unexpected chunk JSON | treated as empty, [`Notice::MalformedChunk`] |
//! | Jump target absent | [`Notice::RecordNotFound`], navigation still rendered |
//! | Loaded chunks are not the resolved ones | one corrective re-fetch |

use serde::Serialize;
use std::sync::Arc;

use musannaf_core::pagination::{JumpNav, PageWindow, DEFAULT_RADIUS};
use musannaf_core::view::select;
use musannaf_core::{
    decode_chunk, ChunkId, CorpusLayout, LoadedChunk, Record, RecordRange, Resolution,
    ResolveError, Selection, ViewMode, ViewRequest,
};

use crate::config::Config;
use crate::gateway::{CacheGateway, ResponseSource};

/// Something the reader should be told alongside (or instead of) records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A stale `file` parameter was replaced by the computed chunk.
    Corrected { requested: ChunkId, used: ChunkId },
    ChunkUnavailable { chunk: ChunkId, status: Option<u16> },
    Offline { chunk: ChunkId },
    MalformedChunk { chunk: ChunkId },
    RecordNotFound { id: u64 },
    NoResults,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Corrected { requested, used } => {
                write!(f, "Chunk {} does not hold this view; loaded chunk {} instead.", requested, used)
            }
            Notice::ChunkUnavailable { chunk, status } => match status {
                Some(status) => write!(
                    f,
                    "Error loading hadiths. Check file number: {} (HTTP {})",
                    chunk, status
                ),
                None => write!(f, "Error loading hadiths. Check file number: {}", chunk),
            },
            Notice::Offline { chunk } => {
                write!(f, "Chunk {} is not available offline.", chunk)
            }
            Notice::MalformedChunk { chunk } => {
                write!(f, "Chunk {} has an unexpected format and was skipped.", chunk)
            }
            Notice::RecordNotFound { .. } => write!(f, "Hadith not found in this file."),
            Notice::NoResults => write!(f, "No hadiths on this page."),
        }
    }
}

/// Controls rendered under the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Navigation {
    Pages(PageWindow),
    Jump(JumpNav),
}

/// The outcome of one render cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedView {
    pub view: ViewMode,
    pub range: RecordRange,
    pub chunks: Vec<ChunkId>,
    pub records: Vec<Record>,
    /// Record to emphasize in jump mode.
    pub highlight: Option<u64>,
    pub notices: Vec<Notice>,
    pub navigation: Navigation,
}

/// Records loaded for a list of chunks.
struct Loaded {
    chunks: Vec<LoadedChunk>,
    notices: Vec<Notice>,
    failed: bool,
}

pub struct Viewer {
    gateway: Arc<CacheGateway>,
    layout: CorpusLayout,
    data_dir: String,
    assemble_across_chunks: bool,
}

impl Viewer {
    pub fn new(
        gateway: Arc<CacheGateway>,
        layout: CorpusLayout,
        data_dir: impl Into<String>,
        assemble_across_chunks: bool,
    ) -> Self {
        Self {
            gateway,
            layout,
            data_dir: data_dir.into(),
            assemble_across_chunks,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(CacheGateway::from_config(config)?),
            config.layout()?,
            config.corpus.data_dir.clone(),
            config.corpus.assemble_across_chunks,
        ))
    }

    pub fn layout(&self) -> &CorpusLayout {
        &self.layout
    }

    /// Request path of a chunk, e.g. `/data/hadiths_001.json`.
    pub fn chunk_path(&self, chunk: ChunkId) -> String {
        format!("/{}", chunk.path_in(&self.data_dir))
    }

    /// Runs one render cycle. Fails only on invalid input, before any fetch.
    pub async fn render(&self, request: &ViewRequest) -> Result<RenderedView, ResolveError> {
        let resolution = request.resolve(&self.layout, self.assemble_across_chunks)?;

        let mut notices = Vec::new();
        if let (true, Some(requested), Some(used)) = (
            resolution.corrected,
            request.file(),
            resolution.primary_chunk(),
        ) {
            log::info!("ignoring stale chunk {} for {:?}; using {}", requested, request.mode(), used);
            notices.push(Notice::Corrected { requested, used });
        }

        let loaded = self.load(&resolution.chunks).await;
        Ok(self.complete(resolution, loaded, notices).await)
    }

    /// Selects from what was loaded, re-fetching the resolved chunks once
    /// if `loaded` starts with a different chunk.
    ///
    /// `render` always loads the resolved chunks, so from there the
    /// re-fetch never fires; it guards against a load that did not come
    /// from this resolution. Notices of a discarded load are dropped.
    async fn complete(
        &self,
        resolution: Resolution,
        mut loaded: Loaded,
        mut notices: Vec<Notice>,
    ) -> RenderedView {
        let mut refetched = false;
        let selection = loop {
            if loaded.failed {
                break Selection::Empty;
            }
            match select(&resolution, &loaded.chunks) {
                Selection::Mismatch { expected, loaded: wrong } if !refetched => {
                    log::warn!(
                        "chunk {} does not hold {:?}; re-fetching chunk {}",
                        wrong,
                        resolution.mode,
                        expected
                    );
                    refetched = true;
                    loaded = self.load(&resolution.chunks).await;
                }
                Selection::Mismatch { expected, loaded: wrong } => {
                    log::warn!(
                        "chunk {} still does not hold the range expected in {}; giving up",
                        wrong,
                        expected
                    );
                    break Selection::Empty;
                }
                other => break other,
            }
        };
        notices.append(&mut loaded.notices);

        let (records, highlight) = match selection {
            Selection::Page(records) => (records, None),
            Selection::Found(record) => {
                let id = record.hadith_id;
                (vec![record], id)
            }
            Selection::NotFound { id } => {
                notices.push(Notice::RecordNotFound { id });
                (Vec::new(), None)
            }
            Selection::Empty | Selection::Mismatch { .. } => {
                if !loaded.failed {
                    notices.push(Notice::NoResults);
                }
                (Vec::new(), None)
            }
        };

        RenderedView {
            view: resolution.mode,
            range: resolution.range,
            chunks: loaded.chunks.iter().map(|c| c.chunk).collect(),
            records,
            highlight,
            notices,
            navigation: self.navigation(resolution.mode),
        }
    }

    fn navigation(&self, mode: ViewMode) -> Navigation {
        match mode {
            ViewMode::Page { page } => Navigation::Pages(PageWindow::around(
                page,
                self.layout.total_pages(),
                DEFAULT_RADIUS,
            )),
            ViewMode::Jump { id } => {
                Navigation::Jump(JumpNav::around(id, self.layout.total_records()))
            }
        }
    }

    /// Fetches and decodes `chunks` in order, stopping at the first chunk
    /// the origin refuses.
    async fn load(&self, chunks: &[ChunkId]) -> Loaded {
        let mut loaded = Loaded {
            chunks: Vec::with_capacity(chunks.len()),
            notices: Vec::new(),
            failed: false,
        };

        for &chunk in chunks {
            let path = self.chunk_path(chunk);
            let resp = match self.gateway.fetch(&path).await {
                Ok(resp) => resp,
                Err(e) => {
                    log::error!("error loading chunk {}: {}", chunk, e);
                    loaded.notices.push(Notice::ChunkUnavailable {
                        chunk,
                        status: None,
                    });
                    loaded.failed = true;
                    break;
                }
            };
            if !resp.response.is_success() {
                log::error!("error loading chunk {}: HTTP {}", chunk, resp.response.status);
                loaded.notices.push(Notice::ChunkUnavailable {
                    chunk,
                    status: Some(resp.response.status),
                });
                loaded.failed = true;
                break;
            }
            if resp.source == ResponseSource::Fallback {
                loaded.notices.push(Notice::Offline { chunk });
            }

            let decoded = decode_chunk(&resp.response.body);
            if decoded.malformed {
                log::warn!("unexpected JSON structure in {}", path);
                loaded.notices.push(Notice::MalformedChunk { chunk });
            }
            loaded.chunks.push(LoadedChunk {
                chunk,
                records: decoded.records,
            });
        }

        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::gateway::GatewaySettings;
    use crate::origin::{Origin, OriginError, OriginResponse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves synthetic chunk files for a small corpus.
    struct CorpusOrigin {
        files: HashMap<String, Vec<u8>>,
        unreachable: Vec<String>,
        calls: AtomicUsize,
    }

    impl CorpusOrigin {
        fn new(layout: &CorpusLayout) -> Self {
            let mut files = HashMap::new();
            for n in 1..=layout.total_chunks() {
                let chunk = ChunkId::new(n).unwrap();
                let range = layout.chunk_records(chunk);
                let records: Vec<serde_json::Value> = (range.start..=range.end)
                    .map(|id| {
                        serde_json::json!({
                            "hadith_id": id,
                            "arabic_text": format!("ar {}", id),
                            "english_text": format!("en {}", id),
                            "narrators_en": "narrator",
                        })
                    })
                    .collect();
                files.insert(
                    format!("/data/{}", chunk.file_name()),
                    serde_json::to_vec(&records).unwrap(),
                );
            }
            Self {
                files,
                unreachable: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_file(mut self, path: &str, body: &str) -> Self {
            self.files.insert(path.to_string(), body.as_bytes().to_vec());
            self
        }

        fn without_file(mut self, path: &str) -> Self {
            self.files.remove(path);
            self
        }

        /// Fetching `path` fails at the network level.
        fn unreachable(mut self, path: &str) -> Self {
            self.unreachable.push(path.to_string());
            self
        }
    }

    #[async_trait]
    impl Origin for CorpusOrigin {
        async fn fetch(&self, path: &str) -> Result<OriginResponse, OriginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable.iter().any(|p| p == path) {
                return Err(OriginError::Network {
                    path: path.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Ok(match self.files.get(path) {
                Some(body) => OriginResponse::ok("application/json", body.clone()),
                None => OriginResponse::not_found(),
            })
        }
    }

    fn layout() -> CorpusLayout {
        CorpusLayout::new(100, 10, 950).unwrap()
    }

    fn viewer_with(origin: Arc<CorpusOrigin>, assemble: bool) -> Viewer {
        let gateway = CacheGateway::new(
            Arc::new(MemoryCacheStorage::new()),
            origin,
            GatewaySettings {
                store_name: "test-v1".to_string(),
                core_assets: vec![],
                data_dir: "data".to_string(),
            },
        );
        Viewer::new(Arc::new(gateway), layout(), "data", assemble)
    }

    fn ids(view: &RenderedView) -> Vec<u64> {
        view.records.iter().filter_map(|r| r.hadith_id).collect()
    }

    #[tokio::test]
    async fn test_render_page() {
        let viewer = viewer_with(Arc::new(CorpusOrigin::new(&layout())), false);
        let view = viewer.render(&ViewRequest::page(12)).await.unwrap();
        assert_eq!(ids(&view), (111..=120).collect::<Vec<_>>());
        assert_eq!(view.chunks, vec![ChunkId::new(2).unwrap()]);
        assert!(view.notices.is_empty());
        match view.navigation {
            Navigation::Pages(w) => assert_eq!((w.current, w.total_pages), (12, 95)),
            other => panic!("unexpected navigation: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_render_last_page_is_short() {
        let viewer = viewer_with(Arc::new(CorpusOrigin::new(&layout())), false);
        let view = viewer.render(&ViewRequest::page(95)).await.unwrap();
        assert_eq!(ids(&view), (941..=950).collect::<Vec<_>>());
        let past = viewer.render(&ViewRequest::page(96)).await.unwrap();
        assert!(past.records.is_empty());
        assert_eq!(past.notices, vec![Notice::NoResults]);
    }

    #[tokio::test]
    async fn test_render_jump_to_last_record_disables_next() {
        let viewer = viewer_with(Arc::new(CorpusOrigin::new(&layout())), false);
        let view = viewer.render(&ViewRequest::jump(950)).await.unwrap();
        assert_eq!(ids(&view), vec![950]);
        assert_eq!(view.highlight, Some(950));
        match view.navigation {
            Navigation::Jump(nav) => assert!(!nav.has_next()),
            other => panic!("unexpected navigation: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_out_of_range_jump_fetches_nothing() {
        let origin = Arc::new(CorpusOrigin::new(&layout()));
        let viewer = viewer_with(origin.clone(), false);
        let err = viewer.render(&ViewRequest::jump(951)).await.unwrap_err();
        assert!(matches!(err, ResolveError::RecordOutOfRange { id: 951, total: 950 }));
        assert_eq!(origin.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_file_parameter_is_corrected_before_fetch() {
        let origin = Arc::new(CorpusOrigin::new(&layout()));
        let viewer = viewer_with(origin.clone(), false);
        let request = ViewRequest::from_query("?file=001&page=12");
        let view = viewer.render(&request).await.unwrap();
        assert_eq!(ids(&view).first(), Some(&111));
        assert!(matches!(view.notices[0], Notice::Corrected { .. }));
        assert_eq!(origin.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_chunk_names_the_file() {
        let origin = CorpusOrigin::new(&layout()).without_file("/data/hadiths_003.json");
        let viewer = viewer_with(Arc::new(origin), false);
        let view = viewer.render(&ViewRequest::page(25)).await.unwrap();
        assert!(view.records.is_empty());
        assert_eq!(
            view.notices,
            vec![Notice::ChunkUnavailable {
                chunk: ChunkId::new(3).unwrap(),
                status: Some(404)
            }]
        );
        assert!(view.notices[0].to_string().contains("003"));
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_treated_as_empty() {
        let origin =
            CorpusOrigin::new(&layout()).with_file("/data/hadiths_001.json", r#"{"items": 1}"#);
        let viewer = viewer_with(Arc::new(origin), false);
        let view = viewer.render(&ViewRequest::page(1)).await.unwrap();
        assert!(view.records.is_empty());
        assert!(view
            .notices
            .contains(&Notice::MalformedChunk { chunk: ChunkId::new(1).unwrap() }));
        assert!(view.notices.contains(&Notice::NoResults));
    }

    #[tokio::test]
    async fn test_jump_target_missing_from_chunk() {
        let origin = CorpusOrigin::new(&layout())
            .with_file("/data/hadiths_001.json", r#"{"hadiths": [{"hadith_id": 1}]}"#);
        let viewer = viewer_with(Arc::new(origin), false);
        let view = viewer.render(&ViewRequest::jump(5)).await.unwrap();
        assert!(view.records.is_empty());
        assert_eq!(view.notices, vec![Notice::RecordNotFound { id: 5 }]);
        assert!(matches!(view.navigation, Navigation::Jump(_)));
    }

    #[tokio::test]
    async fn test_mismatch_triggers_exactly_one_refetch() {
        let origin = Arc::new(CorpusOrigin::new(&layout()));
        let viewer = viewer_with(origin.clone(), false);
        let resolution = ViewRequest::page(12).resolve(viewer.layout(), false).unwrap();

        // Pretend chunk 001 was loaded with too few records for page 12.
        let wrong = Loaded {
            chunks: vec![LoadedChunk {
                chunk: ChunkId::new(1).unwrap(),
                records: Vec::new(),
            }],
            notices: Vec::new(),
            failed: false,
        };
        let view = viewer.complete(resolution, wrong, Vec::new()).await;
        assert_eq!(ids(&view), (111..=120).collect::<Vec<_>>());
        assert_eq!(origin.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_drops_notices_of_discarded_load() {
        let origin =
            CorpusOrigin::new(&layout()).with_file("/data/hadiths_002.json", r#"{"rows": []}"#);
        let viewer = viewer_with(Arc::new(origin), false);
        let resolution = ViewRequest::page(12).resolve(viewer.layout(), false).unwrap();

        let wrong = Loaded {
            chunks: vec![LoadedChunk {
                chunk: ChunkId::new(1).unwrap(),
                records: Vec::new(),
            }],
            notices: vec![Notice::Offline {
                chunk: ChunkId::new(1).unwrap(),
            }],
            failed: false,
        };
        let view = viewer.complete(resolution, wrong, Vec::new()).await;
        assert_eq!(
            view.notices,
            vec![
                Notice::MalformedChunk {
                    chunk: ChunkId::new(2).unwrap()
                },
                Notice::NoResults,
            ]
        );
    }

    fn assembling_viewer(origin: CorpusOrigin, l: CorpusLayout) -> Viewer {
        let gateway = CacheGateway::new(
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(origin),
            GatewaySettings {
                store_name: "test-v1".to_string(),
                core_assets: vec![],
                data_dir: "data".to_string(),
            },
        );
        Viewer::new(Arc::new(gateway), l, "data", true)
    }

    #[tokio::test]
    async fn test_assembly_with_offline_first_chunk_stays_on_page() {
        let l = CorpusLayout::new(100, 30, 950).unwrap();
        let origin = CorpusOrigin::new(&l).unreachable("/data/hadiths_001.json");
        let view = assembling_viewer(origin, l)
            .render(&ViewRequest::page(4))
            .await
            .unwrap();
        assert_eq!(ids(&view), (101..=120).collect::<Vec<_>>());
        assert!(view.notices.contains(&Notice::Offline {
            chunk: ChunkId::new(1).unwrap()
        }));
    }

    #[tokio::test]
    async fn test_assembly_with_malformed_first_chunk_stays_on_page() {
        let l = CorpusLayout::new(100, 30, 950).unwrap();
        let origin = CorpusOrigin::new(&l).with_file("/data/hadiths_001.json", "{}");
        let view = assembling_viewer(origin, l)
            .render(&ViewRequest::page(4))
            .await
            .unwrap();
        assert_eq!(ids(&view), (101..=120).collect::<Vec<_>>());
        assert!(view.notices.contains(&Notice::MalformedChunk {
            chunk: ChunkId::new(1).unwrap()
        }));
    }

    #[tokio::test]
    async fn test_assembly_across_chunks() {
        let l = CorpusLayout::new(100, 30, 950).unwrap();
        let gateway = CacheGateway::new(
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(CorpusOrigin::new(&l)),
            GatewaySettings {
                store_name: "test-v1".to_string(),
                core_assets: vec![],
                data_dir: "data".to_string(),
            },
        );
        let gateway = Arc::new(gateway);

        // Page 4 covers 91..=120.
        let assembled = Viewer::new(gateway.clone(), l, "data", true)
            .render(&ViewRequest::page(4))
            .await
            .unwrap();
        assert_eq!(ids(&assembled), (91..=120).collect::<Vec<_>>());
        assert_eq!(assembled.chunks.len(), 2);

        let single = Viewer::new(gateway, l, "data", false)
            .render(&ViewRequest::page(4))
            .await
            .unwrap();
        assert_eq!(ids(&single), (91..=100).collect::<Vec<_>>());
    }
}
