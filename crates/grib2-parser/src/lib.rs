//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! This crate provides a pure Rust implementation for decoding the gridded
//! radar products published as gzip-compressed GRIB2 files. It covers the
//! subset those products use: the lat/lon grid template (3.0) with simple
//! (5.0) or PNG (5.41) packing and an optional bitmap.

pub mod decoder;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use decoder::{decode_gzipped, DecodeOptions, GridDecoder};
pub use tables::Grib2Tables;

use bytes::Bytes;
use radar_common::RadarError;
use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
use thiserror::Error;

/// Errors raised while decoding a GRIB2 payload.
#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported GRIB2 feature: {0}")]
    Unsupported(String),

    #[error("Grid size mismatch: {0}")]
    GridSizeMismatch(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),
}

impl From<Grib2Error> for RadarError {
    fn from(err: Grib2Error) -> Self {
        RadarError::Decode(err.to_string())
    }
}

/// A single parsed GRIB2 message.
///
/// Section headers are parsed eagerly; the data section is only unpacked on
/// request.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    raw_data: Bytes,
}

impl Grib2Message {
    /// Parse a message that starts at the beginning of `data`.
    pub fn parse(data: Bytes) -> Result<Self, Grib2Error> {
        Self::parse_with_tables(data, Grib2Tables::builtin())
    }

    /// Parse a message, naming its parameter with `tables`.
    pub fn parse_with_tables(data: Bytes, tables: &Grib2Tables) -> Result<Self, Grib2Error> {
        let indicator = sections::parse_indicator(&data)?;
        let message_length = indicator.message_length as usize;
        if message_length > data.len() {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message declares {} bytes but only {} are available",
                message_length,
                data.len()
            )));
        }

        let data = data.slice(..message_length);
        let identification = sections::parse_identification(&data)?;
        let grid_definition = sections::parse_grid_definition(&data)?;
        let product_definition =
            sections::parse_product_definition(&data, indicator.discipline, tables)?;
        let data_representation = sections::parse_data_representation(&data)?;
        let bitmap = sections::parse_bitmap(&data)?;
        let data_section = sections::parse_data_section(&data)?;

        Ok(Self {
            indicator,
            identification,
            grid_definition,
            product_definition,
            data_representation,
            bitmap,
            data_section,
            raw_data: data,
        })
    }

    /// Parameter short name (e.g. "REFL").
    pub fn parameter(&self) -> &str {
        &self.product_definition.parameter_short_name
    }

    /// Grid dimensions as (columns, rows).
    pub fn grid_dims(&self) -> (u32, u32) {
        (
            self.grid_definition.num_points_longitude,
            self.grid_definition.num_points_latitude,
        )
    }

    /// Total encoded length of this message.
    pub fn len(&self) -> usize {
        self.raw_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_data.is_empty()
    }

    /// Unpack the data section into values in scan order.
    ///
    /// Cells masked out by the bitmap are returned as `NaN`.
    pub fn unpack_data(&self) -> Result<Vec<f32>, Grib2Error> {
        unpacking::unpack_message(
            &self.data_representation,
            self.bitmap.as_ref(),
            &self.data_section.data,
            self.grid_definition.num_points(),
        )
    }
}

/// Iterates over the GRIB2 messages contained in a buffer.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
}

impl Grib2Reader {
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Parse the next message, `Ok(None)` once the buffer is exhausted.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        // Skip any padding between messages
        let remaining = &self.data[self.offset..];
        let start = match remaining.windows(4).position(|w| w == b"GRIB") {
            Some(pos) => self.offset + pos,
            None => {
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        let message = Grib2Message::parse(self.data.slice(start..))?;
        self.offset = start + message.len();
        Ok(Some(message))
    }
}

impl Iterator for Grib2Reader {
    type Item = Result<Grib2Message, Grib2Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => None,
            Err(e) => {
                // Stop after the first malformed message
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}
