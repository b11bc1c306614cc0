//! End-to-end decoding of synthetic MRMS-style GRIB2 files.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use grib2_parser::{decode_gzipped, DecodeOptions, Grib2Error, Grib2Reader, GridDecoder};
use radar_common::{RadarError, RawGrid};
use test_utils::{
    assert_approx_eq, create_storm_cell_grid, require_test_file, Grib2Builder, Packing,
    NO_COVERAGE,
};

fn assert_values_match(decoded: &[f32], expected: &[f32], epsilon: f32) {
    assert_eq!(decoded.len(), expected.len());
    for (i, (d, e)) in decoded.iter().zip(expected).enumerate() {
        if *e <= -99.0 || e.is_nan() {
            assert!(RawGrid::is_missing(*d), "cell {} should be missing, got {}", i, d);
        } else {
            assert!(
                (d - e).abs() <= epsilon,
                "cell {}: decoded {} expected {}",
                i,
                d,
                e
            );
        }
    }
}

#[test]
fn test_decode_all_no_coverage() {
    let gz = Grib2Builder::new_mrms().build_gzipped();
    let grid = decode_gzipped(&gz).expect("decode");

    assert_eq!(grid.width(), 20);
    assert_eq!(grid.height(), 15);
    assert_eq!(grid.missing_count(), 300);
    assert_eq!(
        grid.reference_time,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 0).unwrap())
    );
}

#[test]
fn test_decode_storm_cell_values() {
    let data = create_storm_cell_grid(20, 15, 6.0, 62.0);
    let gz = Grib2Builder::new_mrms().with_data(data.clone()).build_gzipped();

    let grid = decode_gzipped(&gz).expect("decode");
    assert_values_match(&grid.values, &data, 1e-3);
    assert!(grid.missing_count() > 0);
}

#[test]
fn test_decode_is_deterministic() {
    let data = create_storm_cell_grid(20, 15, 7.0, 55.0);
    let gz = Grib2Builder::new_mrms().with_data(data).build_gzipped();

    let first = decode_gzipped(&gz).unwrap();
    let second = decode_gzipped(&gz).unwrap();

    let bits = |g: &RawGrid| g.values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&first), bits(&second));
    assert_eq!(first.spec, second.spec);
}

#[test]
fn test_mrms_grid_geometry() {
    let grid = decode_gzipped(&Grib2Builder::new_mrms().build_gzipped()).unwrap();
    let bbox = grid.spec.bbox();

    assert_approx_eq!(bbox.max_lat, 54.995, 1e-6);
    assert_approx_eq!(bbox.min_lat, 54.995 - 14.0 * 0.01, 1e-6);
    assert_approx_eq!(bbox.min_lon, -129.995, 1e-6);
    assert_approx_eq!(bbox.max_lon, -129.995 + 19.0 * 0.01, 1e-6);
}

#[test]
fn test_declared_grid_larger_than_payload_is_rejected() {
    let gz = Grib2Builder::new_mrms()
        .with_grid(10, 10)
        .with_constant_value(20.0)
        .with_declared_grid(1000, 1000)
        .build_gzipped();

    let err = decode_gzipped(&gz).unwrap_err();
    assert!(
        matches!(err, Grib2Error::GridSizeMismatch(_)),
        "unexpected error: {:?}",
        err
    );

    let radar: RadarError = err.into();
    assert_eq!(radar.kind(), "decode");
}

#[test]
fn test_short_data_section_is_rejected() {
    let mut message = Grib2Builder::new_mrms()
        .with_grid(10, 10)
        .with_gradient(0.0, 50.0)
        .build();

    // Cut the data section in half and patch the lengths to match
    let data_start = message.len() - 4 - (5 + 200);
    message.truncate(data_start);
    message.extend_from_slice(&(5u32 + 100).to_be_bytes());
    message.push(7);
    message.extend_from_slice(&[0u8; 100]);
    message.extend_from_slice(b"7777");
    let total = message.len() as u64;
    message[8..16].copy_from_slice(&total.to_be_bytes());

    let err = GridDecoder::default().decode(&message).unwrap_err();
    assert!(matches!(err, Grib2Error::GridSizeMismatch(_)), "{:?}", err);
}

/// Replace section 7 with a header-only section and fix up the total length.
fn strip_data_section(message: &mut Vec<u8>) {
    let mut offset = 16;
    while offset + 5 <= message.len() && &message[offset..offset + 4] != b"7777" {
        let len = u32::from_be_bytes(message[offset..offset + 4].try_into().unwrap()) as usize;
        if message[offset + 4] == 7 {
            message.drain(offset + 5..offset + len);
            message[offset..offset + 4].copy_from_slice(&5u32.to_be_bytes());
            break;
        }
        offset += len;
    }
    let total = message.len() as u64;
    message[8..16].copy_from_slice(&total.to_be_bytes());
}

#[test]
fn test_empty_png_data_section_is_rejected() {
    let mut message = Grib2Builder::new_mrms()
        .with_grid(1000, 1000)
        .with_packing(Packing::Png { bits: 16 })
        .with_gradient(0.0, 60.0)
        .build();
    strip_data_section(&mut message);

    let err = GridDecoder::default().decode(&message).unwrap_err();
    assert!(matches!(err, Grib2Error::GridSizeMismatch(_)), "{:?}", err);
}

#[test]
fn test_empty_simple_data_section_is_rejected() {
    let mut message = Grib2Builder::new_mrms()
        .with_grid(10, 10)
        .with_gradient(0.0, 50.0)
        .build();
    strip_data_section(&mut message);

    let err = GridDecoder::default().decode(&message).unwrap_err();
    assert!(matches!(err, Grib2Error::GridSizeMismatch(_)), "{:?}", err);
}

#[test]
fn test_south_to_north_scan_is_flipped() {
    // Stored rows: 40N = [1 2 3], 41N = [4 5 6]
    let gz = Grib2Builder::new_mrms()
        .with_grid(3, 2)
        .with_origin(40_000_000, 260_000_000, 1_000_000, 1_000_000)
        .with_scanning_mode(0x40)
        .with_data(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .build_gzipped();

    let grid = decode_gzipped(&gz).unwrap();
    assert_values_match(&grid.values, &[4.0, 5.0, 6.0, 1.0, 2.0, 3.0], 1e-4);

    assert_approx_eq!(grid.spec.first_lat, 41.0, 1e-9);
    let bbox = grid.spec.bbox();
    assert_approx_eq!(bbox.min_lat, 40.0, 1e-9);
    assert_approx_eq!(bbox.min_lon, -100.0, 1e-9);
    assert_approx_eq!(bbox.max_lon, -98.0, 1e-9);
}

#[test]
fn test_orientation_can_be_kept() {
    let gz = Grib2Builder::new_mrms()
        .with_grid(3, 2)
        .with_scanning_mode(0x40)
        .with_data(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .build_gzipped();

    let decoder = GridDecoder::new(DecodeOptions {
        normalize_orientation: false,
        ..DecodeOptions::default()
    });
    let grid = decoder.decode(&gz).unwrap();
    assert_values_match(&grid.values, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 1e-4);
}

#[test]
fn test_png_packing_16_bit() {
    let data = create_storm_cell_grid(20, 15, 6.0, 70.0);
    let gz = Grib2Builder::new_mrms()
        .with_data(data.clone())
        .with_packing(Packing::Png { bits: 16 })
        .build_gzipped();

    let grid = decode_gzipped(&gz).expect("decode PNG packed");
    assert_values_match(&grid.values, &data, 1e-3);
}

#[test]
fn test_png_packing_8_bit() {
    let data: Vec<f32> = (0..300).map(|i| (i % 61) as f32).collect();
    let gz = Grib2Builder::new_mrms()
        .with_data(data.clone())
        .with_packing(Packing::Png { bits: 8 })
        .build_gzipped();

    let grid = decode_gzipped(&gz).expect("decode PNG packed");
    // 600 tenths over 255 levels: step of 4 tenths
    assert_values_match(&grid.values, &data, 0.25);
}

#[test]
fn test_bitmap_marks_absent_points_missing() {
    let mut data = vec![25.0_f32; 300];
    for i in (0..300).step_by(7) {
        data[i] = f32::NAN;
    }
    let gz = Grib2Builder::new_mrms()
        .with_data(data.clone())
        .with_bitmap()
        .build_gzipped();

    let grid = decode_gzipped(&gz).unwrap();
    assert_eq!(grid.missing_count(), (0..300).step_by(7).count());
    assert_values_match(&grid.values, &data, 1e-3);
}

#[test]
fn test_sentinel_threshold_is_configurable() {
    let gz = Grib2Builder::new_mrms()
        .with_grid(2, 1)
        .with_data(vec![NO_COVERAGE, 10.0])
        .build_gzipped();

    let decoder = GridDecoder::new(DecodeOptions {
        missing_at_or_below: None,
        ..DecodeOptions::default()
    });
    let grid = decoder.decode(&gz).unwrap();
    assert_approx_eq!(grid.values[0], NO_COVERAGE, 1e-3);
    assert_approx_eq!(grid.values[1], 10.0, 1e-3);
}

#[test]
fn test_uncompressed_grib_is_accepted() {
    let raw = Grib2Builder::new_mrms().with_constant_value(30.0).build();
    let grid = decode_gzipped(&raw).unwrap();
    assert!(grid.values.iter().all(|v| (*v - 30.0).abs() < 1e-4));
}

#[test]
fn test_truncated_gzip_is_rejected() {
    let gz = Grib2Builder::new_mrms()
        .with_data(create_storm_cell_grid(20, 15, 6.0, 50.0))
        .build_gzipped();

    let err = decode_gzipped(&gz[..gz.len() - 12]).unwrap_err();
    assert!(matches!(err, Grib2Error::Decompression(_)), "{:?}", err);
}

#[test]
fn test_not_grib_is_rejected() {
    let err = decode_gzipped(b"<html>Not Found</html>").unwrap_err();
    assert!(matches!(err, Grib2Error::InvalidFormat(_)), "{:?}", err);
}

#[test]
fn test_reader_iterates_concatenated_messages() {
    let mut buf = Grib2Builder::new_mrms().build();
    buf.extend(Grib2Builder::new_mrms().with_grid(4, 3).build());

    let messages: Vec<_> = Grib2Reader::new(Bytes::from(buf))
        .collect::<Result<_, _>>()
        .expect("both messages parse");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].parameter(), "REFL");
    assert_eq!(messages[0].grid_dims(), (20, 15));
    assert_eq!(messages[1].grid_dims(), (4, 3));
    assert_eq!(messages[1].identification.center, 161);
}

#[test]
fn test_real_capture_decodes() {
    let path = require_test_file!("mrms_rala_sample.grib2.gz");
    let bytes = std::fs::read(&path).expect("read capture");

    let grid = decode_gzipped(&bytes).expect("decode capture");
    assert_eq!(grid.width(), 7000);
    assert_eq!(grid.height(), 3500);
    assert_approx_eq!(grid.spec.bbox().min_lon, -129.995, 1e-3);
}
