//! Burn polygons into a grid by cell center

use geo::{BoundingRect, Geometry, Intersects, MultiPolygon, Point, Polygon};
use rillmap_core::raster::{Raster, RasterElement};

/// Areal parts of a geometry; points and lines have none
fn areal_parts(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
        Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]),
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(|g| areal_parts(g).0).collect(),
        _ => MultiPolygon::new(vec![]),
    }
}

/// Cells whose center lies inside or on the boundary of `polygon`
fn covered_cells<T: RasterElement>(polygon: &Polygon<f64>, grid: &Raster<T>) -> Vec<(usize, usize)> {
    let Some(rect) = polygon.bounding_rect() else {
        return Vec::new();
    };
    let (rows, cols) = grid.shape();
    let transform = grid.transform();

    // Pixel-space window of the bounding box, valid for rotated grids too
    let corners = [
        transform.geo_to_pixel(rect.min().x, rect.min().y),
        transform.geo_to_pixel(rect.min().x, rect.max().y),
        transform.geo_to_pixel(rect.max().x, rect.min().y),
        transform.geo_to_pixel(rect.max().x, rect.max().y),
    ];
    if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return Vec::new();
    }
    let (mut col_lo, mut col_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut row_lo, mut row_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(c, r) in &corners {
        col_lo = col_lo.min(c);
        col_hi = col_hi.max(c);
        row_lo = row_lo.min(r);
        row_hi = row_hi.max(r);
    }
    let col_min = col_lo.floor().max(0.0) as usize;
    let col_max = col_hi.ceil().clamp(0.0, cols as f64) as usize;
    let row_min = row_lo.floor().max(0.0) as usize;
    let row_max = row_hi.ceil().clamp(0.0, rows as f64) as usize;

    let mut cells = Vec::new();
    for row in row_min..row_max {
        for col in col_min..col_max {
            let (x, y) = grid.pixel_to_geo(col, row);
            if polygon.intersects(&Point::new(x, y)) {
                cells.push((row, col));
            }
        }
    }
    cells
}

/// Label raster on the grid of `template`: each geometry burns its label
/// into the cells it covers, later geometries overwriting earlier ones.
/// Uncovered cells are 0.
pub fn rasterize_labels<'a, T: RasterElement>(
    geometries: impl IntoIterator<Item = (i32, &'a Geometry<f64>)>,
    template: &Raster<T>,
) -> Raster<i32> {
    let (rows, cols) = template.shape();
    let mut labels: Raster<i32> = template.with_same_meta(rows, cols);
    labels.set_nodata(Some(0));

    for (label, geometry) in geometries {
        for polygon in areal_parts(geometry) {
            for (row, col) in covered_cells(&polygon, template) {
                labels.data_mut()[[row, col]] = label;
            }
        }
    }
    labels
}

/// 1/0 mask of cells covered by any of the geometries
pub fn rasterize_mask<'a, T: RasterElement>(
    geometries: impl IntoIterator<Item = &'a Geometry<f64>>,
    template: &Raster<T>,
) -> Raster<u8> {
    let (rows, cols) = template.shape();
    let mut mask: Raster<u8> = template.with_same_meta(rows, cols);
    mask.set_nodata(None);

    for geometry in geometries {
        for polygon in areal_parts(geometry) {
            for (row, col) in covered_cells(&polygon, template) {
                mask.data_mut()[[row, col]] = 1;
            }
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, Rect};
    use rillmap_core::GeoTransform;

    fn template() -> Raster<f64> {
        let mut r = Raster::filled(10, 10, 0.0);
        r.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
        r
    }

    #[test]
    fn test_square_covers_centers() {
        // x 0..30, y 70..100 covers rows 0..3, cols 0..3
        let square: Geometry<f64> = Rect::new((0.0, 70.0), (30.0, 100.0)).into();
        let mask = rasterize_mask([&square], &template());
        let covered: usize = mask.data().iter().map(|&v| v as usize).sum();
        assert_eq!(covered, 9);
        assert_eq!(mask.get(2, 2).unwrap(), 1);
        assert_eq!(mask.get(3, 3).unwrap(), 0);
    }

    #[test]
    fn test_center_rule_excludes_partial_cells() {
        // Covers only the western 40% of cell (0,0)
        let sliver: Geometry<f64> = polygon![(x: 0.0, y: 90.0), (x: 4.0, y: 90.0), (x: 4.0, y: 100.0), (x: 0.0, y: 100.0)].into();
        let mask = rasterize_mask([&sliver], &template());
        assert!(mask.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_points_and_lines_burn_nothing() {
        let p: Geometry<f64> = point!(x: 15.0, y: 85.0).into();
        let l: Geometry<f64> = line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 100.0)].into();
        let mask = rasterize_mask([&p, &l], &template());
        assert!(mask.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_labels_later_wins_and_clips_to_grid() {
        let a: Geometry<f64> = Rect::new((-50.0, 50.0), (50.0, 150.0)).into();
        let b: Geometry<f64> = Rect::new((20.0, 60.0), (40.0, 80.0)).into();
        let labels = rasterize_labels([(1, &a), (2, &b)], &template());
        assert_eq!(labels.get(0, 0).unwrap(), 1);
        assert_eq!(labels.get(3, 2).unwrap(), 2);
        assert_eq!(labels.get(9, 9).unwrap(), 0);
        assert_eq!(labels.data().iter().filter(|&&v| v > 0).count(), 25);
    }
}
