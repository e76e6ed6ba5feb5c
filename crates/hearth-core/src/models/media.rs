//! Media asset and parent entity models

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored object tied to a parent entity.
///
/// `storage_path` is the public URL handed back by the object store when the
/// object was written. It is never rewritten; replacing an image means deleting
/// the asset and creating a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaAsset {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub storage_path: String,
    pub bucket: String,
    pub created_at: DateTime<Utc>,
}

/// The row that owns a set of media assets (an event, a campaign, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ParentEntity {
    pub id: Uuid,
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A file as received from the intake layer, before compression.
#[derive(Debug, Clone)]
pub struct NewMediaFile {
    /// Form field the file arrived under; becomes the storage key prefix.
    pub field_label: String,
    pub original_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl NewMediaFile {
    pub fn new(
        field_label: impl Into<String>,
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            field_label: field_label.into(),
            original_name: original_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
