//! Indexed (color type 3) PNG encoding.
//!
//! Radar frames use a handful of colors, so every pixel is a single palette
//! index. The palette goes into PLTE and per-entry alpha into tRNS.

use crate::RenderError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
pub const MAX_PALETTE_SIZE: usize = 256;

/// Encode `indices` (row-major, one byte per pixel) as an indexed PNG.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
    level: Compression,
) -> Result<Vec<u8>, RenderError> {
    if width == 0 || height == 0 || width > u32::MAX as usize || height > u32::MAX as usize {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    if indices.len() != width * height {
        return Err(RenderError::DimensionMismatch {
            expected: width * height,
            actual: indices.len(),
        });
    }
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(RenderError::PaletteOverflow(palette.len()));
    }
    if let Some(bad) = indices.iter().find(|i| **i as usize >= palette.len()) {
        return Err(RenderError::Encode(format!(
            "pixel index {} outside palette of {}",
            bad,
            palette.len()
        )));
    }

    let idat = deflate_scanlines(indices, width, level)?;
    let mut png = Vec::with_capacity(idat.len() + palette.len() * 4 + 64);
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(3); // indexed
    ihdr.push(0); // deflate
    ihdr.push(0); // adaptive filtering
    ihdr.push(0); // no interlace
    write_chunk(&mut png, b"IHDR", &ihdr);

    let plte: Vec<u8> = palette.iter().flat_map(|&(r, g, b, _)| [r, g, b]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS may stop after the last non-opaque entry
    if let Some(last) = palette.iter().rposition(|&(_, _, _, a)| a < 255) {
        let trns: Vec<u8> = palette[..=last].iter().map(|&(_, _, _, a)| a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Prefix each row with filter type 0 and zlib-compress the result.
fn deflate_scanlines(
    indices: &[u8],
    width: usize,
    level: Compression,
) -> Result<Vec<u8>, RenderError> {
    let rows = indices.len() / width;
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(rows * (width + 1) / 4), level);

    for row in indices.chunks_exact(width) {
        encoder
            .write_all(&[0])
            .and_then(|_| encoder.write_all(row))
            .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))?;
    }

    encoder
        .finish()
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))
}

/// Write a PNG chunk: length, type, data, CRC over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_types(png: &[u8]) -> Vec<String> {
        let mut types = Vec::new();
        let mut pos = 8;
        while pos + 8 <= png.len() {
            let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]])
                as usize;
            types.push(String::from_utf8_lossy(&png[pos + 4..pos + 8]).to_string());
            pos += 12 + len;
        }
        types
    }

    #[test]
    fn test_create_png_indexed() {
        let palette = vec![(0, 0, 0, 0), (255, 0, 0, 255)];
        let indices = vec![0, 1, 1, 0];
        let png = create_png_indexed(2, 2, &palette, &indices, Compression::fast()).unwrap();

        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        assert_eq!(png[25], 3, "color type should be indexed");
        assert_eq!(chunk_types(&png), vec!["IHDR", "PLTE", "tRNS", "IDAT", "IEND"]);
    }

    #[test]
    fn test_opaque_palette_has_no_trns() {
        let palette = vec![(10, 20, 30, 255), (40, 50, 60, 255)];
        let png = create_png_indexed(2, 1, &palette, &[0, 1], Compression::fast()).unwrap();
        assert!(!chunk_types(&png).contains(&"tRNS".to_string()));
    }

    #[test]
    fn test_trns_is_truncated_after_last_transparent_entry() {
        let palette = vec![(0, 0, 0, 0), (1, 1, 1, 255), (2, 2, 2, 255)];
        let png = create_png_indexed(3, 1, &palette, &[0, 1, 2], Compression::fast()).unwrap();

        // IHDR is 25 bytes after the signature, PLTE is 12 + 9
        let trns_start = 8 + 25 + 21;
        assert_eq!(&png[trns_start + 4..trns_start + 8], b"tRNS");
        assert_eq!(&png[trns_start..trns_start + 4], &1u32.to_be_bytes());
    }

    #[test]
    fn test_index_outside_palette_is_rejected() {
        let palette = vec![(0, 0, 0, 0)];
        let err = create_png_indexed(1, 1, &palette, &[3], Compression::fast()).unwrap_err();
        assert!(matches!(err, RenderError::Encode(_)));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let palette = vec![(0, 0, 0, 0)];
        let err = create_png_indexed(2, 2, &palette, &[0, 0, 0], Compression::fast()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::DimensionMismatch { expected: 4, actual: 3 }
        ));
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let palette = vec![(0, 0, 0, 0)];
        assert!(matches!(
            create_png_indexed(0, 5, &palette, &[], Compression::fast()),
            Err(RenderError::InvalidDimensions { .. })
        ));
    }
}
