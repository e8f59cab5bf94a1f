//! Affine geotransformation for rasters

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up grids the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub pixel_width: f64,
    /// Cell size in Y direction, usually negative
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a north-up transform without rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Check that the transform can georeference a grid: finite
    /// coefficients, non-zero cell sizes and an invertible matrix.
    pub fn validate(&self) -> Result<()> {
        let coeffs = [
            self.origin_x,
            self.origin_y,
            self.pixel_width,
            self.pixel_height,
            self.row_rotation,
            self.col_rotation,
        ];
        if coeffs.iter().any(|v| !v.is_finite()) {
            return Err(Error::Conditioning(format!(
                "geotransform has non-finite coefficients: {:?}",
                coeffs
            )));
        }
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return Err(Error::Conditioning(format!(
                "geotransform has zero cell size ({} x {})",
                self.pixel_width, self.pixel_height
            )));
        }
        if self.determinant().abs() < f64::EPSILON {
            return Err(Error::Conditioning("geotransform is not invertible".into()));
        }
        Ok(())
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// Map coordinates of a fractional pixel position.
    ///
    /// `(0.0, 0.0)` is the upper-left corner of the grid, `(0.5, 0.5)` the
    /// center of the first cell.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Map coordinates of a cell center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of a cell's upper-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Fractional pixel position of a map coordinate; `.floor()` gives the
    /// cell index. Returns NaN for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Cell containing a map coordinate, if it falls inside a grid of the
    /// given shape.
    pub fn geo_to_cell(&self, x: f64, y: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < rows && col < cols).then_some((row, col))
    }

    /// Nominal cell size (absolute pixel width)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Ground distances between neighboring cell centers along columns (x)
    /// and rows (y).
    pub fn cell_sizes(&self) -> (f64, f64) {
        let dx = self.pixel_width.hypot(self.col_rotation);
        let dy = self.pixel_height.hypot(self.row_rotation);
        (dx, dy)
    }

    /// Ground area covered by one cell
    pub fn cell_area(&self) -> f64 {
        self.determinant().abs()
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10
            && self.col_rotation.abs() < 1e-10
            && self.pixel_height < 0.0
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of a grid with the given
    /// number of columns and rows.
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(500_000.0, 4_200_000.0, 30.0, -30.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        assert_relative_eq!(x, 500_165.0, epsilon = 1e-9);
        assert_relative_eq!(y, 4_199_685.0, epsilon = 1e-9);

        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
        assert_eq!(gt.geo_to_cell(x, y, 20, 20), Some((10, 5)));
        assert_eq!(gt.geo_to_cell(x, y, 5, 5), None);
    }

    #[test]
    fn test_bounds_and_area() {
        let gt = GeoTransform::new(0.0, 100.0, 2.0, -2.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(50, 50);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
        assert_relative_eq!(gt.cell_area(), 4.0, epsilon = 1e-12);
        assert_eq!(gt.cell_sizes(), (2.0, 2.0));
    }

    #[test]
    fn test_validate_rejects_degenerate() {
        assert!(GeoTransform::new(0.0, 0.0, 30.0, -30.0).validate().is_ok());
        assert!(matches!(
            GeoTransform::new(0.0, 0.0, 0.0, -30.0).validate(),
            Err(Error::Conditioning(_))
        ));
        assert!(matches!(
            GeoTransform::new(f64::NAN, 0.0, 30.0, -30.0).validate(),
            Err(Error::Conditioning(_))
        ));
    }
}
