//! Discrete color ramps for reflectivity data.

use crate::RenderError;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    pub fn as_tuple(&self) -> (u8, u8, u8, u8) {
        (self.r, self.g, self.b, self.a)
    }
}

/// Palette index reserved for missing and below-scale cells.
pub const TRANSPARENT_INDEX: u8 = 0;

/// A stepped color scale.
///
/// Stop `i` covers values from its threshold up to (excluding) the next
/// stop's threshold; the last stop is open ended. Values below the first
/// threshold and missing values map to [`TRANSPARENT_INDEX`]. Palette index
/// `i + 1` holds the color of stop `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    thresholds: Vec<f32>,
    colors: Vec<Color>,
}

impl ColorRamp {
    /// Build a ramp from `(threshold, color)` pairs.
    ///
    /// Stops are sorted by threshold. At most 255 stops fit next to the
    /// transparent entry of an 8-bit palette.
    pub fn from_stops(mut stops: Vec<(f32, Color)>) -> Result<Self, RenderError> {
        if stops.is_empty() {
            return Err(RenderError::Style("color ramp has no stops".to_string()));
        }
        if stops.len() > 255 {
            return Err(RenderError::PaletteOverflow(stops.len() + 1));
        }
        if stops.iter().any(|(v, _)| !v.is_finite()) {
            return Err(RenderError::Style(
                "color ramp thresholds must be finite".to_string(),
            ));
        }

        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (thresholds, colors) = stops.into_iter().unzip();
        Ok(Self { thresholds, colors })
    }

    /// NWS-style base reflectivity scale, 5 dBZ steps from 5 to 80 dBZ.
    pub fn nws_reflectivity() -> Self {
        let colors = [
            Color::opaque(4, 233, 231),   // 5 light cyan
            Color::opaque(1, 159, 244),   // 10 light blue
            Color::opaque(3, 0, 244),     // 15 blue
            Color::opaque(2, 253, 2),     // 20 bright green
            Color::opaque(1, 197, 1),     // 25 green
            Color::opaque(0, 142, 0),     // 30 dark green
            Color::opaque(253, 248, 2),   // 35 yellow
            Color::opaque(229, 188, 0),   // 40 gold
            Color::opaque(253, 149, 0),   // 45 orange
            Color::opaque(253, 0, 0),     // 50 red
            Color::opaque(212, 0, 0),     // 55 dark red
            Color::opaque(188, 0, 0),     // 60 maroon
            Color::opaque(160, 0, 90),    // 65
            Color::opaque(200, 0, 200),   // 70
            Color::opaque(255, 0, 255),   // 75 magenta
            Color::opaque(153, 85, 201),  // 80+ purple
        ];

        Self {
            thresholds: (0..colors.len()).map(|i| 5.0 + 5.0 * i as f32).collect(),
            colors: colors.to_vec(),
        }
    }

    /// Number of colored stops.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Palette index for a value.
    #[inline]
    pub fn bucket(&self, value: f32) -> u8 {
        if value.is_nan() {
            return TRANSPARENT_INDEX;
        }
        // Number of thresholds at or below the value
        let above = self.thresholds.partition_point(|t| *t <= value);
        above as u8
    }

    /// Color a value renders as.
    pub fn color_for(&self, value: f32) -> Color {
        match self.bucket(value) {
            TRANSPARENT_INDEX => Color::transparent(),
            i => self.colors[i as usize - 1],
        }
    }

    /// Full palette: transparent entry followed by each stop's color.
    pub fn palette(&self) -> Vec<(u8, u8, u8, u8)> {
        std::iter::once(Color::transparent())
            .chain(self.colors.iter().copied())
            .map(|c| c.as_tuple())
            .collect()
    }

    /// Lower bound of every stop, in order.
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self::nws_reflectivity()
    }
}
