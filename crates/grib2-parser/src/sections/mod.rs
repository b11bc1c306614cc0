//! GRIB2 section parsing.
//!
//! This module handles parsing of individual GRIB2 message sections.
//! Each GRIB2 message consists of multiple sections containing
//! metadata, grid information, and compressed data. Every parser takes the
//! whole message and locates its section by walking the section lengths.

use crate::tables::Grib2Tables;
use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
}

/// Section 3: Grid Definition Section (template 3.0)
///
/// Angles are in microdegrees.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template_number: u16,
    /// Number of data points declared by the section header
    pub num_data_points: u32,
    pub grid_shape: u8,
    pub num_points_longitude: u32,
    pub num_points_latitude: u32,
    pub first_latitude: i32,
    pub first_longitude: i32,
    pub last_latitude: i32,
    pub last_longitude: i32,
    pub i_increment: u32,
    pub j_increment: u32,
    pub scanning_mode: u8,
}

impl GridDefinition {
    /// Ni x Nj
    pub fn num_points(&self) -> usize {
        self.num_points_longitude as usize * self.num_points_latitude as usize
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template_number: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub parameter_short_name: String,
    pub level_type: u8,
    pub level_value: u32,
    pub level_description: String,
    pub forecast_time: u32,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    /// Number of values actually packed in section 7
    pub num_data_points: u32,
    pub template_number: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_data_type: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub data: Bytes,
}

impl Bitmap {
    /// Whether the point at `index` carries a value.
    #[inline]
    pub fn is_set(&self, index: usize) -> bool {
        self.data
            .get(index / 8)
            .map(|byte| (byte >> (7 - (index % 8))) & 1 == 1)
            .unwrap_or(false)
    }

    /// Number of points flagged as present among the first `len` bits.
    pub fn count_set(&self, len: usize) -> usize {
        let full_bytes = len / 8;
        let mut count: usize = self.data[..full_bytes.min(self.data.len())]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum();
        for index in full_bytes * 8..len {
            if self.is_set(index) {
                count += 1;
            }
        }
        count
    }

    /// Number of bits the section holds.
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8
    }
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 5-6 reserved, octet 7 discipline, octet 8 edition,
    // octets 9-16 total length (64-bit big-endian)
    let discipline = data[6];
    let edition = data[7];

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let mut length_bytes = [0u8; 8];
    length_bytes.copy_from_slice(&data[8..16]);
    let message_length = u64::from_be_bytes(length_bytes);

    if message_length < 16 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Message length {} is shorter than the indicator section",
            message_length
        )));
    }

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    let section_data = section_slice(data, 1)?;

    if section_data.len() < 19 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    // Skip section header (4 bytes) and section number (1 byte)
    let sec_data = &section_data[5..];

    let center = u16::from_be_bytes([sec_data[0], sec_data[1]]);
    let sub_center = u16::from_be_bytes([sec_data[2], sec_data[3]]);
    let significance_of_reference_time = sec_data[6];

    let year = u16::from_be_bytes([sec_data[7], sec_data[8]]);
    let month = sec_data[9];
    let day = sec_data[10];
    let hour = sec_data[11];
    let minute = sec_data[12];
    let second = sec_data[13];

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        significance_of_reference_time,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let section_data = section_slice(data, 3)?;
    if section_data.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 6-9: number of data points, bytes 12-13: template number,
    // template data from byte 14
    let num_data_points = u32::from_be_bytes([
        section_data[6],
        section_data[7],
        section_data[8],
        section_data[9],
    ]);
    let template_number = u16::from_be_bytes([section_data[12], section_data[13]]);

    if template_number != 0 {
        return Err(Grib2Error::Unsupported(format!(
            "Grid definition template 3.{}",
            template_number
        )));
    }

    let gd = &section_data[14..];

    // Template 3.0: Latitude/longitude
    //
    // Byte 0: Shape of the Earth
    // Bytes 16-19: Ni, 20-23: Nj
    // Bytes 32-35: La1, 36-39: Lo1 (microdegrees)
    // Byte 40: Resolution and component flags
    // Bytes 41-44: La2, 45-48: Lo2
    // Bytes 49-52: Di, 53-56: Dj
    // Byte 57: Scanning mode
    if gd.len() < 58 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("Template 0 needs at least 58 bytes, got {}", gd.len()),
        });
    }

    let read_u32 = |at: usize| u32::from_be_bytes([gd[at], gd[at + 1], gd[at + 2], gd[at + 3]]);

    Ok(GridDefinition {
        template_number,
        num_data_points,
        grid_shape: gd[0],
        num_points_longitude: read_u32(16),
        num_points_latitude: read_u32(20),
        first_latitude: decode_grib2_signed(&gd[32..36]),
        first_longitude: decode_grib2_signed(&gd[36..40]),
        last_latitude: decode_grib2_signed(&gd[41..45]),
        last_longitude: decode_grib2_signed(&gd[45..49]),
        i_increment: read_u32(49),
        j_increment: read_u32(53),
        scanning_mode: gd[57],
    })
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(
    data: &[u8],
    discipline: u8,
    tables: &Grib2Tables,
) -> Result<ProductDefinition, Grib2Error> {
    let section_data = section_slice(data, 4)?;

    if section_data.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 5-6: number of coordinate values, 7-8: template number,
    // 9: parameter category, 10: parameter number
    let template_number = u16::from_be_bytes([section_data[7], section_data[8]]);
    let parameter_category = section_data[9];
    let parameter_number = section_data[10];

    // Template 4.0 horizontal level fields; absent in shorter templates
    let forecast_time = if section_data.len() >= 22 {
        u32::from_be_bytes([section_data[18], section_data[19], section_data[20], section_data[21]])
    } else {
        0
    };
    let level_type = section_data.get(22).copied().unwrap_or(255);
    let level_value = if section_data.len() >= 28 {
        u32::from_be_bytes([section_data[24], section_data[25], section_data[26], section_data[27]])
    } else {
        0
    };

    Ok(ProductDefinition {
        template_number,
        parameter_category,
        parameter_number,
        parameter_short_name: tables.get_parameter_name(
            discipline,
            parameter_category,
            parameter_number,
        ),
        level_type,
        level_value,
        level_description: tables.get_level_description(level_type, level_value),
        forecast_time,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let section_data = section_slice(data, 5)?;

    if section_data.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9 [5-8]: Number of packed values
    // Octets 10-11 [9-10]: Template number
    //
    // Templates 5.0 and 5.41 share the same leading fields:
    // [11-14]: Reference value (R), IEEE 32-bit float
    // [15-16]: Binary scale factor (E), sign-magnitude
    // [17-18]: Decimal scale factor (D), sign-magnitude
    // [19]: Bits per packed value
    // [20]: Type of original field values
    let num_data_points = u32::from_be_bytes([
        section_data[5],
        section_data[6],
        section_data[7],
        section_data[8],
    ]);
    let template_number = u16::from_be_bytes([section_data[9], section_data[10]]);

    let t = &section_data[11..];
    Ok(DataRepresentation {
        num_data_points,
        template_number,
        reference_value: f32::from_be_bytes([t[0], t[1], t[2], t[3]]),
        binary_scale_factor: decode_grib2_signed_i16([t[4], t[5]]),
        decimal_scale_factor: decode_grib2_signed_i16([t[6], t[7]]),
        bits_per_value: t[8],
        original_data_type: t[9],
    })
}

/// Parse Section 6 (Bitmap)
///
/// Returns `None` when the indicator says no bitmap applies (255).
pub fn parse_bitmap(data: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let section_data = section_slice(data, 6)?;

    if section_data.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    match section_data[5] {
        255 => Ok(None),
        0 => Ok(Some(Bitmap {
            data: Bytes::copy_from_slice(&section_data[6..]),
        })),
        other => Err(Grib2Error::Unsupported(format!(
            "Bitmap indicator {}",
            other
        ))),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: &[u8]) -> Result<DataSection, Grib2Error> {
    let section_data = section_slice(data, 7)?;

    Ok(DataSection {
        data: Bytes::copy_from_slice(&section_data[5..]),
    })
}

// ===== Helper Functions =====

/// Decode a 32-bit GRIB2 signed integer.
///
/// GRIB2 uses sign-magnitude: the most significant bit is the sign and the
/// remaining 31 bits the magnitude. Slices of any other length decode to 0.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    if bytes.len() != 4 {
        return 0;
    }
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a 16-bit GRIB2 sign-magnitude integer (scale factors).
pub fn decode_grib2_signed_i16(bytes: [u8; 2]) -> i16 {
    let raw = u16::from_be_bytes(bytes);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Slice of the message covering section `section_num`, header included.
fn section_slice(data: &[u8], section_num: u8) -> Result<&[u8], Grib2Error> {
    let offset = find_section(data, section_num)?;
    let length = read_section_length(data, offset);
    Ok(&data[offset..offset + length])
}

fn read_section_length(data: &[u8], offset: usize) -> usize {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]) as usize
}

/// Find a section by number within a message
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 4 <= data.len() && &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Reached end of message without finding section".to_string(),
            });
        }

        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        let section_length = read_section_length(data, offset);

        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: data[offset + 4],
                reason: format!(
                    "Invalid section length {} at offset {}",
                    section_length, offset
                ),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += section_length;
    }
}
