//! Radar mosaic service library.
//!
//! Keeps the latest MRMS reflectivity mosaic as a color-coded PNG:
//! list the upstream directory, pick the newest file, download it, decode
//! the GRIB2 grid, render it and cache the frame.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod listing;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod selection;
pub mod server;
pub mod state;
pub mod storage;

pub use cache::{CacheSnapshot, RadarCache};
pub use config::{RadarConfig, SelectorKind, StalenessPolicy};
pub use pipeline::{FrameSource, RefreshOutcome, RefreshPipeline};
pub use state::AppState;
