//! Style configuration for radar rendering.
//!
//! A style file holds named ramps in the form
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "styles": {
//!     "reflectivity": {
//!       "name": "Reflectivity",
//!       "units": "dBZ",
//!       "stops": [{ "value": 5, "color": "#04E9E7", "label": "5 dBZ" }]
//!     }
//!   }
//! }
//! ```

use crate::gradient::{Color, ColorRamp};
use crate::RenderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Style configuration loaded from JSON
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleConfig {
    pub version: String,
    pub styles: HashMap<String, StyleDefinition>,
}

/// A single style definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleDefinition {
    pub name: String,
    pub description: Option<String>,
    pub units: Option<String>,
    pub stops: Vec<ColorStop>,
}

/// Color stop: values at or above `value` take `color` until the next stop
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColorStop {
    pub value: f32,
    pub color: String,
    pub label: Option<String>,
}

impl StyleConfig {
    /// Load style configuration from JSON string
    pub fn from_json(json_str: &str) -> Result<Self, RenderError> {
        serde_json::from_str(json_str).map_err(|e| RenderError::Style(e.to_string()))
    }

    /// Load style configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RenderError::Style(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Get a specific style definition
    pub fn get_style(&self, name: &str) -> Option<&StyleDefinition> {
        self.styles.get(name)
    }

    /// Build the ramp for `name`.
    pub fn color_ramp(&self, name: &str) -> Result<ColorRamp, RenderError> {
        self.get_style(name)
            .ok_or_else(|| RenderError::Style(format!("style '{}' not found", name)))?
            .to_color_ramp()
    }
}

impl StyleDefinition {
    pub fn to_color_ramp(&self) -> Result<ColorRamp, RenderError> {
        let stops = self
            .stops
            .iter()
            .map(|stop| {
                parse_color(&stop.color)
                    .map(|color| (stop.value, color))
                    .ok_or_else(|| {
                        RenderError::Style(format!(
                            "invalid color '{}' in style '{}'",
                            stop.color, self.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        ColorRamp::from_stops(stops)
    }
}

/// Parse hex color string to RGB
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

/// Parse "#RRGGBB" or "#RRGGBBAA".
pub fn parse_color(hex: &str) -> Option<Color> {
    let trimmed = hex.trim_start_matches('#');
    match trimmed.len() {
        6 => hex_to_rgb(trimmed).map(|(r, g, b)| Color::opaque(r, g, b)),
        8 => {
            let (r, g, b) = hex_to_rgb(&trimmed[0..6])?;
            let a = u8::from_str_radix(&trimmed[6..8], 16).ok()?;
            Some(Color::new(r, g, b, a))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#FF0000"), Some((255, 0, 0)));
        assert_eq!(hex_to_rgb("00FF00"), Some((0, 255, 0)));
        assert_eq!(hex_to_rgb("#GGGGGG"), None);
        assert_eq!(hex_to_rgb("#FFF"), None);
    }

    #[test]
    fn test_parse_color_with_alpha() {
        assert_eq!(parse_color("#64646480"), Some(Color::new(100, 100, 100, 128)));
        assert_eq!(parse_color("#0000FF"), Some(Color::opaque(0, 0, 255)));
        assert_eq!(parse_color("blue"), None);
    }
}
