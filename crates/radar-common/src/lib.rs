//! Common types shared by the radar mosaic crates.

pub mod bbox;
pub mod error;
pub mod frame;
pub mod grid;

pub use bbox::BoundingBox;
pub use error::RadarError;
pub use frame::{FrameMetadata, RadarFrame};
pub use grid::{GridSpec, RawGrid, ScanMode};
