//! Image rendering for radar reflectivity grids.
//!
//! - Stepped color ramps (built-in NWS scale or loaded from a style file)
//! - Indexed PNG encoding

pub mod gradient;
pub mod png;
pub mod raster;
pub mod style;

pub use gradient::{Color, ColorRamp, TRANSPARENT_INDEX};
pub use raster::{Rasterizer, RenderedImage};
pub use style::StyleConfig;

use radar_common::RadarError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Grid has no cells")]
    EmptyGrid,

    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Palette of {0} entries does not fit an indexed PNG")]
    PaletteOverflow(usize),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("Style error: {0}")]
    Style(String),
}

impl From<RenderError> for RadarError {
    fn from(err: RenderError) -> Self {
        RadarError::Encode(err.to_string())
    }
}
