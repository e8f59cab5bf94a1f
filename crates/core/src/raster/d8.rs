//! D8 flow direction encoding
//!
//! Direction codes 1..=8 name the receiving neighbor, counter-clockwise from
//! east. The code order is also the tie-break order used by the flow router:
//! when two neighbors share the maximal descent, the lower code wins.
//!
//! ```text
//!   4 3 2
//!   5 . 1
//!   6 7 8
//! ```

use crate::raster::GeoTransform;

/// Cell with no descending neighbor (pit, flat or edge outlet)
pub const SINK: u8 = 0;

/// No-data marker in a direction grid
pub const NODATA: u8 = 255;

/// Direction codes in tie-break order: E, NE, N, NW, W, SW, S, SE
pub const CODES: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

/// (row, col) offsets indexed by direction code; index 0 is the sink
pub const OFFSETS: [(isize, isize); 9] = [
    (0, 0),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Whether a code is one of the eight directions
pub fn is_direction(code: u8) -> bool {
    (1..=8).contains(&code)
}

/// Direction pointing back at the source
pub fn opposite(code: u8) -> u8 {
    if is_direction(code) {
        ((code - 1 + 4) % 8) + 1
    } else {
        code
    }
}

/// Neighbor of (row, col) in direction `code`, if it is inside the grid
#[inline]
pub fn neighbor(row: usize, col: usize, code: u8, rows: usize, cols: usize) -> Option<(usize, usize)> {
    if !is_direction(code) {
        return None;
    }
    let (dr, dc) = OFFSETS[code as usize];
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
        None
    } else {
        Some((nr as usize, nc as usize))
    }
}

/// Distances to each neighbor in map units, indexed by direction code.
///
/// Cardinal steps use the cell size along their axis and diagonals the
/// hypotenuse, so rectangular cells are handled too.
pub fn distances(transform: &GeoTransform) -> [f64; 9] {
    let (dx, dy) = transform.cell_sizes();
    let diag = dx.hypot(dy);
    [0.0, dx, diag, dy, diag, dx, diag, dy, diag]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite() {
        assert_eq!(opposite(1), 5);
        assert_eq!(opposite(3), 7);
        assert_eq!(opposite(2), 6);
        assert_eq!(opposite(8), 4);
        assert_eq!(opposite(SINK), SINK);
    }

    #[test]
    fn test_neighbor_bounds() {
        assert_eq!(neighbor(0, 0, 1, 3, 3), Some((0, 1)));
        assert_eq!(neighbor(0, 0, 3, 3, 3), None);
        assert_eq!(neighbor(2, 2, 8, 3, 3), None);
        assert_eq!(neighbor(1, 1, SINK, 3, 3), None);
    }

    #[test]
    fn test_distances_square_cells() {
        let d = distances(&GeoTransform::new(0.0, 0.0, 30.0, -30.0));
        assert_eq!(d[1], 30.0);
        assert!((d[2] - 30.0 * std::f64::consts::SQRT_2).abs() < 1e-9);
    }
}
