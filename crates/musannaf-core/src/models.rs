//! Record model and chunk payload decoding.
//!
//! A chunk file is JSON in one of two shapes:
//!
//! ```json
//! [ { "hadith_id": 1, "arabic_text": "...", ... }, ... ]
//! { "hadiths": [ { "hadith_id": 1, ... }, ... ] }
//! ```
//!
//! [`decode_chunk`] recognizes both and normalizes them to a single sorted
//! `Vec<Record>`. Anything else decodes to an empty chunk flagged as
//! malformed so the caller can warn and carry on.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One hadith entry. Every field may be absent in the source data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "lenient_id")]
    pub hadith_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub arabic_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub english_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub narrators_en: Option<String>,
}

impl Record {
    /// Display label for the id, `N/A` when missing.
    pub fn id_label(&self) -> String {
        self.hadith_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    fn sort_key(&self) -> u64 {
        self.hadith_id.unwrap_or(0)
    }
}

/// Accepts `12`, `"12"`, or nothing.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts strings, stringifies other scalars, drops null/arrays/objects.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// The two recognized chunk file shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkPayload {
    Bare(Vec<Record>),
    Wrapped { hadiths: Vec<Record> },
}

/// Result of decoding one chunk file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedChunk {
    /// Records sorted by `hadith_id` (missing ids sort first).
    pub records: Vec<Record>,
    /// `true` when the payload matched neither shape.
    pub malformed: bool,
}

/// Decodes raw chunk bytes into a sorted record list.
pub fn decode_chunk(bytes: &[u8]) -> DecodedChunk {
    let records = match serde_json::from_slice::<ChunkPayload>(bytes) {
        Ok(ChunkPayload::Bare(records)) | Ok(ChunkPayload::Wrapped { hadiths: records }) => {
            records
        }
        Err(_) => {
            return DecodedChunk {
                records: Vec::new(),
                malformed: true,
            }
        }
    };

    let mut records = records;
    records.sort_by_key(Record::sort_key);
    DecodedChunk {
        records,
        malformed: false,
    }
}
