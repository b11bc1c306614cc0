//! GRIB2 data unpacking algorithms.
//!
//! Implements the packing methods used by the radar products:
//! - Simple packing (template 5.0)
//! - PNG packing (template 5.41)
//!
//! Both store integers X that map to physical values with
//! `Y = (R + X * 2^E) * 10^-D`.

use crate::sections::{Bitmap, DataRepresentation};
use crate::Grib2Error;
use image::{DynamicImage, ImageFormat};

/// Scaling parameters shared by every packing template.
#[derive(Debug, Clone, Copy)]
pub struct PackingScale {
    reference: f64,
    binary: f64,
    decimal: f64,
}

impl PackingScale {
    pub fn new(reference_value: f32, binary_scale_factor: i16, decimal_scale_factor: i16) -> Self {
        Self {
            reference: reference_value as f64,
            binary: 2.0_f64.powi(binary_scale_factor as i32),
            decimal: 10.0_f64.powi(-(decimal_scale_factor as i32)),
        }
    }

    pub fn from_representation(drs: &DataRepresentation) -> Self {
        Self::new(
            drs.reference_value,
            drs.binary_scale_factor,
            drs.decimal_scale_factor,
        )
    }

    #[inline]
    pub fn apply(&self, packed: u32) -> f32 {
        ((self.reference + packed as f64 * self.binary) * self.decimal) as f32
    }
}

/// Unpack a whole data section and spread it over the grid using the bitmap.
///
/// Returns `num_points` values in scan order; cells without data are `NaN`.
pub fn unpack_message(
    drs: &DataRepresentation,
    bitmap: Option<&Bitmap>,
    packed_data: &[u8],
    num_points: usize,
) -> Result<Vec<f32>, Grib2Error> {
    let packed_count = drs.num_data_points as usize;

    match bitmap {
        Some(bm) => {
            if bm.bit_len() < num_points {
                return Err(Grib2Error::GridSizeMismatch(format!(
                    "Bitmap holds {} bits but the grid has {} points",
                    bm.bit_len(),
                    num_points
                )));
            }
            let present = bm.count_set(num_points);
            if present != packed_count {
                return Err(Grib2Error::GridSizeMismatch(format!(
                    "Bitmap flags {} points but section 5 declares {} values",
                    present, packed_count
                )));
            }
        }
        None => {
            if packed_count != num_points {
                return Err(Grib2Error::GridSizeMismatch(format!(
                    "Section 5 declares {} values but the grid has {} points",
                    packed_count, num_points
                )));
            }
        }
    }

    let scale = PackingScale::from_representation(drs);
    let values = match drs.template_number {
        0 => unpack_simple(packed_data, packed_count, drs.bits_per_value, scale)?,
        41 => unpack_png(packed_data, packed_count, drs.bits_per_value, scale)?,
        other => {
            return Err(Grib2Error::Unsupported(format!(
                "Data representation template 5.{}",
                other
            )))
        }
    };

    Ok(match bitmap {
        Some(bm) => apply_bitmap(&values, bm, num_points),
        None => values,
    })
}

/// Unpack simple packed GRIB2 data
pub fn unpack_simple(
    packed_data: &[u8],
    num_values: usize,
    bits_per_value: u8,
    scale: PackingScale,
) -> Result<Vec<f32>, Grib2Error> {
    if bits_per_value == 0 {
        // All values are the reference value
        return Ok(vec![scale.apply(0); num_values]);
    }
    if bits_per_value > 32 {
        return Err(Grib2Error::UnpackingError(format!(
            "Invalid number of bits per value: {}",
            bits_per_value
        )));
    }

    let bits = bits_per_value as usize;
    let required_bytes = (num_values * bits + 7) / 8;
    if packed_data.len() < required_bytes {
        return Err(Grib2Error::GridSizeMismatch(format!(
            "Data section holds {} bytes but {} values of {} bits need {}",
            packed_data.len(),
            num_values,
            bits,
            required_bytes
        )));
    }

    let values = (0..num_values)
        .map(|i| scale.apply(extract_bits(packed_data, i * bits, bits)))
        .collect();

    Ok(values)
}

/// Unpack PNG packed GRIB2 data (template 5.41).
pub fn unpack_png(
    packed_data: &[u8],
    num_values: usize,
    bits_per_value: u8,
    scale: PackingScale,
) -> Result<Vec<f32>, Grib2Error> {
    if bits_per_value == 0 || num_values == 0 {
        return Ok(vec![scale.apply(0); num_values]);
    }
    if packed_data.is_empty() {
        return Err(Grib2Error::GridSizeMismatch(format!(
            "Data section is empty but section 5 declares {} values of {} bits",
            num_values, bits_per_value
        )));
    }

    let image = image::load_from_memory_with_format(packed_data, ImageFormat::Png)
        .map_err(|e| Grib2Error::UnpackingError(format!("Embedded PNG: {}", e)))?;

    let pixel_count = image.width() as usize * image.height() as usize;
    if pixel_count != num_values {
        return Err(Grib2Error::GridSizeMismatch(format!(
            "Embedded PNG has {} pixels but section 5 declares {} values",
            pixel_count, num_values
        )));
    }

    let packed: Vec<u32> = match (bits_per_value, image) {
        (1 | 2 | 4, DynamicImage::ImageLuma8(buf)) => {
            // The decoder widens low bit depths to 8 bits
            let step = 255 / ((1u32 << bits_per_value) - 1);
            buf.into_raw().into_iter().map(|v| v as u32 / step).collect()
        }
        (8, DynamicImage::ImageLuma8(buf)) => {
            buf.into_raw().into_iter().map(u32::from).collect()
        }
        (16, DynamicImage::ImageLuma16(buf)) => {
            buf.into_raw().into_iter().map(u32::from).collect()
        }
        (24, DynamicImage::ImageRgb8(buf)) => buf
            .into_raw()
            .chunks_exact(3)
            .map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32)
            .collect(),
        (32, DynamicImage::ImageRgba8(buf)) => buf
            .into_raw()
            .chunks_exact(4)
            .map(|p| u32::from_be_bytes([p[0], p[1], p[2], p[3]]))
            .collect(),
        (bits, other) => {
            return Err(Grib2Error::Unsupported(format!(
                "PNG packing with {} bits per value and color type {:?}",
                bits,
                other.color()
            )))
        }
    };

    Ok(packed.into_iter().map(|x| scale.apply(x)).collect())
}

/// Spread packed values over the grid, leaving unset bitmap cells as `NaN`.
fn apply_bitmap(values: &[f32], bitmap: &Bitmap, num_points: usize) -> Vec<f32> {
    let mut packed = values.iter();
    (0..num_points)
        .map(|i| {
            if bitmap.is_set(i) {
                packed.next().copied().unwrap_or(f32::NAN)
            } else {
                f32::NAN
            }
        })
        .collect()
}

/// Extract `num_bits` (at most 32) bits starting at `start_bit`, MSB first.
///
/// Callers guarantee the range lies within `data`.
#[inline]
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> u32 {
    let first_byte = start_bit / 8;
    let last_byte = (start_bit + num_bits - 1) / 8;

    // Up to 5 bytes cover any 32-bit field at an arbitrary bit offset
    let mut window: u64 = 0;
    for byte in &data[first_byte..=last_byte] {
        window = (window << 8) | *byte as u64;
    }

    let trailing = (last_byte + 1) * 8 - (start_bit + num_bits);
    let mask = if num_bits == 32 {
        u32::MAX as u64
    } else {
        (1u64 << num_bits) - 1
    };
    ((window >> trailing) & mask) as u32
}
