//! Tests for loading color ramps from style files.

use renderer::{Color, ColorRamp, RenderError, StyleConfig};
use std::io::Write;

const STYLE_JSON: &str = r##"{
    "version": "1.0",
    "styles": {
        "reflectivity": {
            "name": "Reflectivity",
            "units": "dBZ",
            "stops": [
                {"value": 30, "color": "#00FF00", "label": "30 dBZ"},
                {"value": 10, "color": "#0000FF80", "label": "10 dBZ"},
                {"value": 50, "color": "#FF0000"}
            ]
        },
        "broken": {
            "name": "Broken",
            "stops": [{"value": 0, "color": "red"}]
        }
    }
}"##;

#[test]
fn test_style_builds_ramp() {
    let config = StyleConfig::from_json(STYLE_JSON).unwrap();
    let ramp = config.color_ramp("reflectivity").unwrap();

    assert_eq!(ramp.len(), 3);
    assert_eq!(ramp.thresholds(), &[10.0, 30.0, 50.0]);
    assert_eq!(ramp.color_for(5.0), Color::transparent());
    assert_eq!(ramp.color_for(15.0), Color::new(0, 0, 255, 128));
    assert_eq!(ramp.color_for(35.0), Color::opaque(0, 255, 0));
    assert_eq!(ramp.color_for(99.0), Color::opaque(255, 0, 0));
}

#[test]
fn test_style_units_and_labels_are_kept() {
    let config = StyleConfig::from_json(STYLE_JSON).unwrap();
    let style = config.get_style("reflectivity").unwrap();
    assert_eq!(style.units.as_deref(), Some("dBZ"));
    assert_eq!(style.stops[0].label.as_deref(), Some("30 dBZ"));
    assert!(style.stops[2].label.is_none());
}

#[test]
fn test_unknown_style_is_an_error() {
    let config = StyleConfig::from_json(STYLE_JSON).unwrap();
    assert!(matches!(
        config.color_ramp("velocity"),
        Err(RenderError::Style(_))
    ));
}

#[test]
fn test_invalid_color_is_an_error() {
    let config = StyleConfig::from_json(STYLE_JSON).unwrap();
    let err = config.color_ramp("broken").unwrap_err();
    assert!(err.to_string().contains("red"));
}

#[test]
fn test_malformed_json_is_an_error() {
    assert!(matches!(
        StyleConfig::from_json("{ not json"),
        Err(RenderError::Style(_))
    ));
}

#[test]
fn test_style_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(STYLE_JSON.as_bytes()).unwrap();

    let config = StyleConfig::from_file(file.path()).unwrap();
    assert!(config.get_style("reflectivity").is_some());

    assert!(StyleConfig::from_file("/nonexistent/styles.json").is_err());
}

#[test]
fn test_bundled_style_matches_builtin_ramp() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/styles/reflectivity.json");
    let config = StyleConfig::from_file(path).unwrap();
    let ramp = config.color_ramp("reflectivity").unwrap();

    assert_eq!(ramp, ColorRamp::nws_reflectivity());
}
