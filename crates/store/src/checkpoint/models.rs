use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::CollectionId;
use serde::{Deserialize, Serialize};

/// Pagination and watermark state of one collection.
///
/// `cursor` is the offset of the next page to request. `watermark` is the
/// largest "updated" timestamp seen so far, kept as the remote's ISO-8601
/// text so it compares lexicographically.
///
/// Documents written by older extractors used `start_at` / `last_updated`;
/// both spellings decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(alias = "start_at")]
    pub cursor: u64,
    #[serde(default, alias = "last_updated")]
    pub watermark: Option<String>,
}

impl Checkpoint {
    pub fn new(cursor: u64, watermark: Option<String>) -> Self {
        Self { cursor, watermark }
    }

    /// Partial update: a missing `watermark` keeps the current one.
    pub fn merged(&self, cursor: u64, watermark: Option<&str>) -> Self {
        Self {
            cursor,
            watermark: watermark
                .map(str::to_owned)
                .or_else(|| self.watermark.clone()),
        }
    }

    pub fn decode(collection: &CollectionId, bytes: &[u8]) -> QuarryResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| QuarryError::CheckpointCorrupt {
            collection: collection.to_string(),
            reason: e.to_string(),
        })
    }

    /// Legacy plain-text form: a bare decimal offset, no watermark.
    pub fn decode_legacy(collection: &CollectionId, bytes: &[u8]) -> QuarryResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| QuarryError::CheckpointCorrupt {
            collection: collection.to_string(),
            reason: e.to_string(),
        })?;
        let cursor = text
            .trim()
            .parse::<u64>()
            .map_err(|e| QuarryError::CheckpointCorrupt {
                collection: collection.to_string(),
                reason: format!("legacy offset {text:?}: {e}"),
            })?;
        Ok(Self {
            cursor,
            watermark: None,
        })
    }
}

/// A checkpoint together with the collection it belongs to, as exposed on
/// the read-only inspection surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCheckpoint {
    pub collection: CollectionId,
    #[serde(flatten)]
    pub checkpoint: Checkpoint,
}
