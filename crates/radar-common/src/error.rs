//! Error types for the radar acquisition pipeline.

use thiserror::Error;

/// Failure of one refresh stage.
///
/// Cloneable so a single failed refresh can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RadarError {
    // === Acquisition Errors ===
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("No files ending in '{suffix}' listed at {url}")]
    EmptyListing { url: String, suffix: String },

    // === Data Errors ===
    #[error("Failed to decode radar grid: {0}")]
    Decode(String),

    // === Rendering Errors ===
    #[error("Failed to encode radar image: {0}")]
    Encode(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RadarError {
    /// Build a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        RadarError::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Short stable name of the error class, used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RadarError::Fetch { .. } => "fetch",
            RadarError::EmptyListing { .. } => "empty_listing",
            RadarError::Decode(_) => "decode",
            RadarError::Encode(_) => "encode",
            RadarError::Internal(_) => "internal",
        }
    }

    /// Whether a retry of the same stage could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RadarError::Fetch { .. })
    }
}

impl From<std::io::Error> for RadarError {
    fn from(err: std::io::Error) -> Self {
        RadarError::Internal(err.to_string())
    }
}
