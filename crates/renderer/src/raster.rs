//! Grid to PNG rasterization.

use crate::gradient::ColorRamp;
use crate::png::create_png_indexed;
use crate::RenderError;
use flate2::Compression;
use radar_common::grid::RawGrid;
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

/// An encoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Colors a reflectivity grid and encodes it as an indexed PNG.
///
/// One grid cell becomes one pixel; row 0 is the northernmost row.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    ramp: ColorRamp,
    compression: Compression,
}

impl Rasterizer {
    pub fn new(ramp: ColorRamp) -> Self {
        Self {
            ramp,
            compression: Compression::fast(),
        }
    }

    /// zlib level 0-9 for the IDAT stream.
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    pub fn ramp(&self) -> &ColorRamp {
        &self.ramp
    }

    /// Palette index for every cell, row-major.
    pub fn indices(&self, grid: &RawGrid) -> Result<Vec<u8>, RenderError> {
        let (width, height) = (grid.width(), grid.height());
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyGrid);
        }
        if grid.values.len() != width * height {
            return Err(RenderError::DimensionMismatch {
                expected: width * height,
                actual: grid.values.len(),
            });
        }

        let mut indices = vec![0u8; width * height];
        indices
            .par_chunks_mut(width)
            .zip(grid.values.par_chunks(width))
            .for_each(|(out, row)| {
                for (px, value) in out.iter_mut().zip(row) {
                    *px = self.ramp.bucket(*value);
                }
            });

        Ok(indices)
    }

    pub fn render(&self, grid: &RawGrid) -> Result<RenderedImage, RenderError> {
        let start = Instant::now();
        let indices = self.indices(grid)?;
        let (width, height) = (grid.width(), grid.height());

        let png = create_png_indexed(
            width,
            height,
            &self.ramp.palette(),
            &indices,
            self.compression,
        )?;

        debug!(
            width,
            height,
            bytes = png.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Rendered radar frame"
        );

        Ok(RenderedImage {
            png,
            width: width as u32,
            height: height as u32,
        })
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(ColorRamp::nws_reflectivity())
    }
}
