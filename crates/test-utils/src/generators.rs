//! Test data generators for synthetic reflectivity fields.
//!
//! The patterns are predictable so tests can verify individual cells after
//! a decode or render round trip.

/// MRMS "no coverage" sentinel.
pub const NO_COVERAGE: f32 = -999.0;

/// MRMS "missing" sentinel.
pub const MISSING: f32 = -99.0;

/// Creates a grid where each cell is `col * 1000 + row`.
///
/// Row-major, row 0 first.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// A single circular storm cell on a no-coverage background.
///
/// Reflectivity peaks at `peak_dbz` in the center and falls off linearly to
/// 0 dBZ at `radius` cells; outside the radius cells hold [`NO_COVERAGE`].
pub fn create_storm_cell_grid(width: usize, height: usize, radius: f32, peak_dbz: f32) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let d = ((col as f32 - cx).powi(2) + (row as f32 - cy).powi(2)).sqrt();
            if d <= radius {
                data.push((peak_dbz * (1.0 - d / radius)).round());
            } else {
                data.push(NO_COVERAGE);
            }
        }
    }
    data
}

/// One value per 5 dBZ bucket from 7.5 up to 82.5, repeated to fill the grid.
///
/// Every value sits in the middle of its bucket so quantization never moves
/// it across a boundary.
pub fn create_bucket_sweep_grid(width: usize, height: usize) -> Vec<f32> {
    (0..width * height)
        .map(|i| 7.5 + 5.0 * (i % 16) as f32)
        .collect()
}
