//! Synthetic GRIB2 messages shaped like MRMS reflectivity products.
//!
//! The generated messages have a valid structure (sections 0-8) with a
//! lat/lon grid, simple or PNG packing and an optional bitmap.

use flate2::write::GzEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Luma};
use std::io::{Cursor, Write};

/// How section 7 is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    /// Template 5.0 with the given bits per value (1..=32)
    Simple { bits: u8 },
    /// Template 5.41, 8 or 16 bit grayscale
    Png { bits: u8 },
}

/// Build a GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    // Grid definition
    ni: u32,
    nj: u32,
    la1: i32, // first lat (microdegrees)
    lo1: i32, // first lon (microdegrees, 0-360)
    di: u32,
    dj: u32,
    scanning_mode: u8,
    declared_grid: Option<(u32, u32)>,
    // Product definition
    param_category: u8,
    param_number: u8,
    // Data
    packing: Packing,
    decimal_scale: i16,
    use_bitmap: bool,
    data_values: Vec<f32>,
}

impl Grib2Builder {
    /// Create a builder for MRMS-like data: a 20x15 corner of the CONUS
    /// domain at 0.01 degrees, scanned north to south, all cells at the
    /// -999 "no coverage" sentinel.
    pub fn new_mrms() -> Self {
        let ni = 20;
        let nj = 15;
        Self {
            discipline: 209, // MRMS local discipline
            center: 161,     // NSSL
            year: 2024,
            month: 1,
            day: 1,
            hour: 0,
            minute: 2,
            second: 0,
            ni,
            nj,
            la1: 54_995_000,
            lo1: 230_005_000, // -129.995
            di: 10_000,
            dj: 10_000,
            scanning_mode: 0,
            declared_grid: None,
            param_category: 0,
            param_number: 16, // REFL
            packing: Packing::Simple { bits: 16 },
            decimal_scale: 1,
            use_bitmap: false,
            data_values: vec![-999.0; (ni * nj) as usize],
        }
    }

    pub fn with_reference_time(
        mut self,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    /// Resize the grid; values reset to 0.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = vec![0.0; (ni * nj) as usize];
        self
    }

    /// Declare different dimensions in section 3 than the payload holds.
    pub fn with_declared_grid(mut self, ni: u32, nj: u32) -> Self {
        self.declared_grid = Some((ni, nj));
        self
    }

    /// Origin and increments, all in microdegrees.
    pub fn with_origin(mut self, la1: i32, lo1: i32, di: u32, dj: u32) -> Self {
        self.la1 = la1;
        self.lo1 = lo1;
        self.di = di;
        self.dj = dj;
        self
    }

    pub fn with_scanning_mode(mut self, flags: u8) -> Self {
        self.scanning_mode = flags;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_packing(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale: i16) -> Self {
        self.decimal_scale = decimal_scale;
        self
    }

    /// Emit a bitmap; `NaN` data values become absent points.
    pub fn with_bitmap(mut self) -> Self {
        self.use_bitmap = true;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    pub fn with_gradient(mut self, min_val: f32, max_val: f32) -> Self {
        let n = (self.ni * self.nj) as usize;
        self.data_values = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f32 / n as f32))
            .collect();
        self
    }

    /// Values in scan order.
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let packed = self.packed_values();

        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(&packed),
            self.build_section6(),
            self.build_section7(&packed),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        for section in &sections {
            message.extend_from_slice(section);
        }

        message.extend_from_slice(b"7777");
        message
    }

    /// Build and gzip, as published upstream.
    pub fn build_gzipped(&self) -> Vec<u8> {
        gzip(&self.build())
    }

    fn present_values(&self) -> Vec<f32> {
        if self.use_bitmap {
            self.data_values
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect()
        } else {
            self.data_values.clone()
        }
    }

    fn bits(&self) -> u8 {
        match self.packing {
            Packing::Simple { bits } | Packing::Png { bits } => bits,
        }
    }

    /// Reference value, binary scale and integers for the present values.
    fn packed_values(&self) -> PackedValues {
        let decimal = 10f64.powi(self.decimal_scale as i32);
        let scaled: Vec<f64> = self
            .present_values()
            .iter()
            .map(|v| *v as f64 * decimal)
            .collect();

        let (min_val, max_val) = scaled
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if scaled.is_empty() {
            return PackedValues {
                reference: 0.0,
                binary_scale: 0,
                bits: 0,
                integers: Vec::new(),
            };
        }

        let reference = min_val as f32;
        let range = max_val - reference as f64;
        if range <= 0.0 {
            return PackedValues {
                reference,
                binary_scale: 0,
                bits: 0,
                integers: vec![0; scaled.len()],
            };
        }

        // E = ceil(log2(range / max_packed)), so every value fits the width
        let max_packed = ((1u64 << self.bits()) - 1) as f64;
        let binary_scale = (range / max_packed).log2().ceil() as i16;
        let step = 2f64.powi(binary_scale as i32);

        let integers = scaled
            .iter()
            .map(|v| (((v - reference as f64) / step).round() as u64).min(max_packed as u64) as u32)
            .collect();

        PackedValues {
            reference,
            binary_scale,
            bits: self.bits(),
            integers,
        }
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1); // Section number

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(0); // Significance of reference time (analysis)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(self.minute);
        section.push(self.second);

        section.push(0); // Production status (operational)
        section.push(0); // Type of data (analysis)
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let (ni, nj) = self.declared_grid.unwrap_or((self.ni, self.nj));
        let mut section = Vec::new();

        // Template 3.0: 14 header bytes + 58 template bytes
        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3); // Section number

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(ni * nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Shape of Earth
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&ni.to_be_bytes());
        section.extend_from_slice(&nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFFFFFFu32.to_be_bytes()); // Subdivisions

        let (la2, lo2) = self.last_point(ni, nj);
        section.extend_from_slice(&encode_signed(self.la1));
        section.extend_from_slice(&encode_signed(self.lo1));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&encode_signed(la2));
        section.extend_from_slice(&encode_signed(lo2));
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(self.scanning_mode);

        section
    }

    /// Last grid point implied by the scanning direction.
    fn last_point(&self, ni: u32, nj: u32) -> (i32, i32) {
        let span_i = (ni.saturating_sub(1) * self.di) as i32;
        let span_j = (nj.saturating_sub(1) * self.dj) as i32;
        let lo2 = if self.scanning_mode & 0x80 != 0 {
            self.lo1 - span_i
        } else {
            self.lo1 + span_i
        };
        let la2 = if self.scanning_mode & 0x40 != 0 {
            self.la1 + span_j
        } else {
            self.la1 - span_j
        };
        (la2, lo2)
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 4.0: Analysis or forecast at horizontal level
        section.extend_from_slice(&34u32.to_be_bytes());
        section.push(4); // Section number

        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(0); // Type of generating process (analysis)
        section.push(0); // Background generating process
        section.push(0); // Analysis or forecast process
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(0); // Time range unit (minutes)
        section.extend_from_slice(&0u32.to_be_bytes()); // Forecast time

        section.push(102); // m above MSL
        section.push(0); // Scale factor
        section.extend_from_slice(&500u32.to_be_bytes());

        section.push(255); // No second fixed surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section
    }

    fn build_section5(&self, packed: &PackedValues) -> Vec<u8> {
        let mut section = Vec::new();

        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5); // Section number

        section.extend_from_slice(&(packed.integers.len() as u32).to_be_bytes());
        let template: u16 = match self.packing {
            Packing::Simple { .. } => 0,
            Packing::Png { .. } => 41,
        };
        section.extend_from_slice(&template.to_be_bytes());

        section.extend_from_slice(&packed.reference.to_be_bytes());
        section.extend_from_slice(&encode_signed_i16(packed.binary_scale));
        section.extend_from_slice(&encode_signed_i16(self.decimal_scale));
        section.push(packed.bits);
        section.push(0); // Original field type (floating point)

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();

        if !self.use_bitmap {
            section.extend_from_slice(&6u32.to_be_bytes());
            section.push(6);
            section.push(255); // No bitmap
            return section;
        }

        let mut bits = vec![0u8; (self.data_values.len() + 7) / 8];
        for (i, v) in self.data_values.iter().enumerate() {
            if !v.is_nan() {
                bits[i / 8] |= 0x80 >> (i % 8);
            }
        }

        section.extend_from_slice(&(6 + bits.len() as u32).to_be_bytes());
        section.push(6);
        section.push(0); // Bitmap follows
        section.extend_from_slice(&bits);
        section
    }

    fn build_section7(&self, packed: &PackedValues) -> Vec<u8> {
        let payload = match self.packing {
            _ if packed.bits == 0 => Vec::new(),
            Packing::Simple { .. } => pack_bits(&packed.integers, packed.bits),
            Packing::Png { .. } => self.pack_png(packed),
        };

        let mut section = Vec::new();
        section.extend_from_slice(&(5 + payload.len() as u32).to_be_bytes());
        section.push(7); // Section number
        section.extend_from_slice(&payload);
        section
    }

    fn pack_png(&self, packed: &PackedValues) -> Vec<u8> {
        let count = packed.integers.len() as u32;
        let (width, height) = if count == self.ni * self.nj {
            (self.ni, self.nj)
        } else {
            (count, 1)
        };

        let image = match packed.bits {
            8 => DynamicImage::ImageLuma8(
                ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(
                    width,
                    height,
                    packed.integers.iter().map(|x| *x as u8).collect(),
                )
                .expect("pixel count matches dimensions"),
            ),
            16 => DynamicImage::ImageLuma16(
                ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(
                    width,
                    height,
                    packed.integers.iter().map(|x| *x as u16).collect(),
                )
                .expect("pixel count matches dimensions"),
            ),
            other => panic!("PNG packing supports 8 or 16 bits, got {}", other),
        };

        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)
            .expect("PNG encoding of synthetic data");
        out
    }
}

struct PackedValues {
    reference: f32,
    binary_scale: i16,
    bits: u8,
    integers: Vec<u32>,
}

/// Pack integers MSB-first at a fixed bit width.
pub fn pack_bits(values: &[u32], bits: u8) -> Vec<u8> {
    let bits = bits as usize;
    let mut out = vec![0u8; (values.len() * bits + 7) / 8];
    for (i, value) in values.iter().enumerate() {
        for b in 0..bits {
            if (value >> (bits - 1 - b)) & 1 == 1 {
                let bit = i * bits + b;
                out[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
    }
    out
}

/// GRIB2 sign-magnitude encoding of a 32-bit value.
pub fn encode_signed(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 {
        magnitude | 0x8000_0000
    } else {
        magnitude
    };
    raw.to_be_bytes()
}

/// GRIB2 sign-magnitude encoding of a 16-bit value.
pub fn encode_signed_i16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}

/// Gzip a buffer with default compression.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write to Vec");
    encoder.finish().expect("gzip finish")
}
