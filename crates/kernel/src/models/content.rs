//! Content records: a title plus an ordered list of typed blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::lifecycle::{Lifecycle, LifecycleRecord};

/// The closed set of block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
    Video,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized block within a content record.
///
/// Media blocks carry either a direct `url` or a `file_id` whose resolved
/// url/content_type/size/filename are denormalized into `metadata` at
/// write time. Every block's `metadata` holds its zero-based `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: BlockKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Raw block input as submitted by a client.
///
/// The type is a free string here so that an unknown value is rejected by
/// block processing with its index and the offending type, rather than
/// failing wholesale at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockInput {
    #[serde(rename = "type")]
    pub block_type: String,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub file_id: Option<Uuid>,

    /// Video-only: playback length in seconds, copied into metadata.
    #[serde(default)]
    pub duration: Option<f64>,

    /// Video-only: preview image url, copied into metadata.
    #[serde(default)]
    pub thumbnail: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Content record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Ordered blocks; replaced wholesale on update.
    pub blocks: Vec<Block>,

    /// Free-form record-level metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub created_by: Uuid,

    pub updated_by: Uuid,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Build a new active record with audit fields stamped to `actor`.
    pub fn new(
        title: String,
        description: Option<String>,
        blocks: Vec<Block>,
        metadata: Map<String, Value>,
        actor: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title,
            description,
            blocks,
            metadata,
            created_by: actor,
            updated_by: actor,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl LifecycleRecord for ContentItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    fn mark_updated(&mut self, actor: Uuid, at: DateTime<Utc>) {
        self.updated_by = actor;
        self.updated_at = at;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Input for creating a content record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateContent {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub blocks: Vec<BlockInput>,

    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Input for updating a content record. Absent fields are left untouched;
/// a supplied block list replaces the stored one wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContent {
    pub title: Option<String>,

    pub description: Option<String>,

    pub blocks: Option<Vec<BlockInput>>,

    pub metadata: Option<Map<String, Value>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn new_record_stamps_audit_fields() {
        let actor = Uuid::now_v7();
        let item = ContentItem::new("Launch".to_string(), None, vec![], Map::new(), actor);

        assert_eq!(item.created_by, actor);
        assert_eq!(item.updated_by, actor);
        assert!(item.lifecycle.is_active());
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn block_kind_serializes_lowercase() {
        let block = Block {
            kind: BlockKind::Video,
            text: None,
            url: Some("https://cdn.example/v.mp4".to_string()),
            file_id: None,
            metadata: Map::new(),
        };

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "video");
        // empty optionals are omitted entirely
        assert!(json.get("text").is_none());
    }

    #[test]
    fn block_input_accepts_unknown_types() {
        let input: BlockInput =
            serde_json::from_str(r#"{"type":"carousel","text":"x"}"#).unwrap();
        assert_eq!(input.block_type, "carousel");
    }
}
