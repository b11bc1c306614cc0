//! The cached unit: one rendered radar image plus its provenance.

use crate::bbox::BoundingBox;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rendered radar mosaic.
///
/// Built once at the end of a successful refresh and never mutated
/// afterwards; callers share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarFrame {
    /// Encoded PNG
    pub image: Bytes,
    /// Upstream file the image was decoded from
    pub source_name: String,
    /// When the upstream file was downloaded
    pub fetched_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub bounds: BoundingBox,
    /// Product reference time, when the payload carried one
    pub valid_time: Option<DateTime<Utc>>,
}

impl RadarFrame {
    /// Whether this frame may replace `current`.
    ///
    /// Upstream names embed a fixed-width timestamp, so a strictly greater
    /// name is a strictly newer product.
    pub fn supersedes(&self, current: &RadarFrame) -> bool {
        self.source_name > current.source_name
    }

    /// Age relative to `now`, clamped at zero.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.fetched_at).max(chrono::Duration::zero())
    }

    /// Metadata without the image payload.
    pub fn metadata(&self) -> FrameMetadata {
        FrameMetadata {
            source_name: self.source_name.clone(),
            fetched_at: self.fetched_at,
            width: self.width,
            height: self.height,
            bounds: self.bounds,
            valid_time: self.valid_time,
        }
    }

    /// Rebuild a frame from stored metadata and image bytes.
    pub fn from_parts(metadata: FrameMetadata, image: Bytes) -> Self {
        Self {
            image,
            source_name: metadata.source_name,
            fetched_at: metadata.fetched_at,
            width: metadata.width,
            height: metadata.height,
            bounds: metadata.bounds,
            valid_time: metadata.valid_time,
        }
    }
}

/// Serializable description of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub source_name: String,
    pub fetched_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub bounds: BoundingBox,
    pub valid_time: Option<DateTime<Utc>>,
}
