//! Grid specifications and decoded rasters.

use crate::bbox::{normalize_longitude, BoundingBox};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Specification of a regular lat/lon grid.
///
/// `first_lat`/`first_lon` describe the north-west cell of the grid after the
/// decoder has normalized it to north-up, west-to-east order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of points in X (longitude) direction
    pub nx: usize,
    /// Number of points in Y (latitude) direction
    pub ny: usize,
    /// Grid resolution in X direction (degrees)
    pub dx: f64,
    /// Grid resolution in Y direction (degrees)
    pub dy: f64,
    /// Latitude of the north-west grid point
    pub first_lat: f64,
    /// Longitude of the north-west grid point (-180..180)
    pub first_lon: f64,
    /// Scan mode the source data was encoded with
    pub scan_mode: ScanMode,
}

impl GridSpec {
    /// Calculate the bounding box of this grid from its cell centers.
    pub fn bbox(&self) -> BoundingBox {
        let west = normalize_longitude(self.first_lon);
        let east = west + self.nx.saturating_sub(1) as f64 * self.dx;
        let north = self.first_lat;
        let south = north - self.ny.saturating_sub(1) as f64 * self.dy;

        BoundingBox {
            min_lon: west.min(east),
            min_lat: south.min(north),
            max_lon: west.max(east),
            max_lat: south.max(north),
        }
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }
}

/// Scan mode flags for grid data ordering.
///
/// Based on GRIB2 scanning mode (Flag Table 3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMode {
    /// +i direction: false = +x (east), true = -x (west)
    pub i_negative: bool,
    /// +j direction: false = -y (south), true = +y (north)
    pub j_positive: bool,
    /// Adjacent points: false = i direction, true = j direction
    pub j_consecutive: bool,
    /// Row scan direction alternates
    pub alternating_rows: bool,
}

impl ScanMode {
    /// Most common mode: data starts at top-left, rows go west to east,
    /// columns go north to south.
    pub fn standard() -> Self {
        Self {
            i_negative: false,
            j_positive: false,
            j_consecutive: false,
            alternating_rows: false,
        }
    }

    /// Create from GRIB2 flag byte.
    pub fn from_grib2_flag(flag: u8) -> Self {
        Self {
            i_negative: (flag & 0x80) != 0,
            j_positive: (flag & 0x40) != 0,
            j_consecutive: (flag & 0x20) != 0,
            alternating_rows: (flag & 0x10) != 0,
        }
    }

    /// True when the data is already row-major, north-up, west-to-east.
    pub fn is_standard(&self) -> bool {
        *self == Self::standard()
    }

    /// Index in the source array of the cell at display position
    /// (`col`, `row`), where row 0 is the northernmost row and col 0 the
    /// westernmost column.
    pub fn source_index(&self, col: usize, row: usize, nx: usize, ny: usize) -> usize {
        // Position along the scan axes
        let i = if self.i_negative { nx - 1 - col } else { col };
        let j = if self.j_positive { ny - 1 - row } else { row };

        if self.j_consecutive {
            // Columns are contiguous; alternating flips every other column
            let j = if self.alternating_rows && i % 2 == 1 { ny - 1 - j } else { j };
            i * ny + j
        } else {
            let i = if self.alternating_rows && j % 2 == 1 { nx - 1 - i } else { i };
            j * nx + i
        }
    }
}

/// A decoded reflectivity raster.
///
/// Values are row-major with row 0 at the north edge. Cells without data hold
/// [`RawGrid::MISSING`].
#[derive(Debug, Clone)]
pub struct RawGrid {
    pub spec: GridSpec,
    pub values: Vec<f32>,
    /// Reference time from the product's identification section
    pub reference_time: Option<DateTime<Utc>>,
}

impl RawGrid {
    /// Sentinel stored in cells without a valid measurement.
    pub const MISSING: f32 = f32::NAN;

    /// Whether a cell value is the missing sentinel.
    #[inline]
    pub fn is_missing(value: f32) -> bool {
        value.is_nan()
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.spec.nx
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.spec.ny
    }

    /// Value at display position, `None` when out of range.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.spec.nx || row >= self.spec.ny {
            return None;
        }
        self.values.get(row * self.spec.nx + col).copied()
    }

    /// Number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| Self::is_missing(**v)).count()
    }

    /// Minimum and maximum over valid cells.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !Self::is_missing(*v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
