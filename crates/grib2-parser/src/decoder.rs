//! Turns a downloaded radar file into a north-up [`RawGrid`].

use crate::{Grib2Error, Grib2Message, Grib2Reader};
use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use radar_common::grid::{GridSpec, RawGrid, ScanMode};
use std::io::Read;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Options controlling how decoded values are post-processed.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Values at or below this threshold are treated as missing.
    ///
    /// MRMS encodes "no coverage" as -999 and "missing" as -99.
    pub missing_at_or_below: Option<f32>,
    /// Reorder rows and columns to north-up, west-to-east.
    pub normalize_orientation: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            missing_at_or_below: Some(-99.0),
            normalize_orientation: true,
        }
    }
}

/// Decodes gzip-compressed GRIB2 reflectivity files.
#[derive(Debug, Clone, Default)]
pub struct GridDecoder {
    options: DecodeOptions,
}

impl GridDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    /// Decode the first GRIB2 message of `compressed`.
    ///
    /// Input without the gzip magic is taken as raw GRIB2.
    pub fn decode(&self, compressed: &[u8]) -> Result<RawGrid, Grib2Error> {
        let raw = inflate(compressed)?;
        let message = Grib2Reader::new(raw)
            .next()
            .ok_or_else(|| Grib2Error::InvalidFormat("No GRIB2 message found".to_string()))??;
        self.decode_message(&message)
    }

    /// Convert a parsed message into a raster.
    pub fn decode_message(&self, message: &Grib2Message) -> Result<RawGrid, Grib2Error> {
        let gd = &message.grid_definition;
        let (nx, ny) = (
            gd.num_points_longitude as usize,
            gd.num_points_latitude as usize,
        );

        if nx == 0 || ny == 0 {
            return Err(Grib2Error::InvalidSection {
                section: 3,
                reason: format!("Empty grid {}x{}", nx, ny),
            });
        }
        if gd.num_data_points as usize != gd.num_points() {
            return Err(Grib2Error::GridSizeMismatch(format!(
                "Section 3 declares {} points but Ni x Nj is {}x{}",
                gd.num_data_points, nx, ny
            )));
        }

        let mut values = message.unpack_data()?;

        if let Some(threshold) = self.options.missing_at_or_below {
            for v in values.iter_mut() {
                if *v <= threshold {
                    *v = RawGrid::MISSING;
                }
            }
        }

        let scan_mode = ScanMode::from_grib2_flag(gd.scanning_mode);
        let spec = grid_spec(message, scan_mode);

        if self.options.normalize_orientation && !scan_mode.is_standard() {
            values = reorder(&values, scan_mode, nx, ny);
        }

        debug!(
            parameter = message.parameter(),
            nx,
            ny,
            template = message.data_representation.template_number,
            "Decoded GRIB2 grid"
        );

        Ok(RawGrid {
            spec,
            values,
            reference_time: Some(message.identification.reference_time),
        })
    }
}

/// Decode with default options.
pub fn decode_gzipped(bytes: &[u8]) -> Result<RawGrid, Grib2Error> {
    GridDecoder::default().decode(bytes)
}

/// Gunzip `data`, or pass it through when it is not gzip.
fn inflate(data: &[u8]) -> Result<Bytes, Grib2Error> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Ok(Bytes::copy_from_slice(data));
    }

    let mut out = Vec::with_capacity(data.len() * 4);
    MultiGzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Grib2Error::Decompression(e.to_string()))?;

    if out.is_empty() {
        return Err(Grib2Error::Decompression(
            "Gzip stream inflated to zero bytes".to_string(),
        ));
    }
    Ok(Bytes::from(out))
}

/// Grid geometry with the first point moved to the north-west corner.
fn grid_spec(message: &Grib2Message, scan_mode: ScanMode) -> GridSpec {
    let gd = &message.grid_definition;
    let nx = gd.num_points_longitude as usize;
    let ny = gd.num_points_latitude as usize;
    let dx = gd.i_increment as f64 / 1e6;
    let dy = gd.j_increment as f64 / 1e6;
    let la1 = gd.first_latitude as f64 / 1e6;
    let lo1 = gd.first_longitude as f64 / 1e6;

    let span_x = nx.saturating_sub(1) as f64 * dx;
    let span_y = ny.saturating_sub(1) as f64 * dy;

    let west = if scan_mode.i_negative { lo1 - span_x } else { lo1 };
    let north = if scan_mode.j_positive { la1 + span_y } else { la1 };

    GridSpec {
        nx,
        ny,
        dx,
        dy,
        first_lat: north,
        first_lon: west,
        scan_mode,
    }
}

/// Reorder values from scan order into north-up, west-to-east rows.
fn reorder(values: &[f32], scan_mode: ScanMode, nx: usize, ny: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(nx * ny);
    for row in 0..ny {
        for col in 0..nx {
            out.push(values[scan_mode.source_index(col, row, nx, ny)]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_flips_south_to_north() {
        // Stored south row first: [s0 s1 / n0 n1]
        let values = [1.0, 2.0, 3.0, 4.0];
        let out = reorder(&values, ScanMode::from_grib2_flag(0x40), 2, 2);
        assert_eq!(out, vec![3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_reorder_east_to_west() {
        let values = [1.0, 2.0, 3.0];
        let out = reorder(&values, ScanMode::from_grib2_flag(0x80), 3, 1);
        assert_eq!(out, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_inflate_passes_raw_grib_through() {
        let raw = b"GRIB....".to_vec();
        assert_eq!(inflate(&raw).unwrap().as_ref(), raw.as_slice());
    }

    #[test]
    fn test_truncated_gzip_is_decompression_error() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&[7u8; 4096]).unwrap();
        let gz = enc.finish().unwrap();

        let err = inflate(&gz[..gz.len() / 2]).unwrap_err();
        assert!(matches!(err, Grib2Error::Decompression(_)));
    }
}
