//! Raster-to-polygon conversion by boundary tracing
//!
//! Cell boundaries are walked on the lattice of cell corners. Every side
//! separating a labelled cell from a different label becomes a directed
//! edge with the region on its right, so outer rings run clockwise on screen
//! (rows growing downward) and holes counter-clockwise. Where two cells of a
//! region touch only at a corner, the trace takes the right-most turn, which
//! keeps regions 4-connected and the rings free of self-touching vertices.
//!
//! Rings are emitted in map coordinates through the raster's transform and
//! re-oriented so exteriors are counter-clockwise, as GeoJSON expects.

use std::collections::{BTreeMap, HashMap};

use geo::algorithm::orient::{Direction, Orient};
use geo::{Area, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use rillmap_core::raster::{GeoTransform, Raster};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    East,
    South,
    West,
    North,
}

impl Heading {
    /// (d_row, d_col)
    fn delta(self) -> (isize, isize) {
        match self {
            Heading::East => (0, 1),
            Heading::South => (1, 0),
            Heading::West => (0, -1),
            Heading::North => (-1, 0),
        }
    }

    fn right(self) -> Self {
        match self {
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
            Heading::North => Heading::East,
        }
    }

    fn left(self) -> Self {
        match self {
            Heading::East => Heading::North,
            Heading::North => Heading::West,
            Heading::West => Heading::South,
            Heading::South => Heading::East,
        }
    }
}

/// Directed boundary edge starting at a (row, col) corner
#[derive(Debug, Clone, Copy)]
struct Edge {
    from: (usize, usize),
    heading: Heading,
}

impl Edge {
    fn end(&self) -> (usize, usize) {
        let (dr, dc) = self.heading.delta();
        (
            (self.from.0 as isize + dr) as usize,
            (self.from.1 as isize + dc) as usize,
        )
    }
}

/// Closed ring on the corner lattice as (x = col, y = row) coordinates
type LatticeRing = Vec<(f64, f64)>;

fn boundary_edges(labels: &Raster<i32>) -> BTreeMap<i32, Vec<Edge>> {
    let (rows, cols) = labels.shape();
    let at = |r: isize, c: isize| -> Option<i32> {
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            None
        } else {
            Some(unsafe { labels.get_unchecked(r as usize, c as usize) })
        }
    };

    let mut edges: BTreeMap<i32, Vec<Edge>> = BTreeMap::new();
    for row in 0..rows {
        for col in 0..cols {
            let label = unsafe { labels.get_unchecked(row, col) };
            if label <= 0 {
                continue;
            }
            let (r, c) = (row as isize, col as isize);
            let list = edges.entry(label).or_default();
            if at(r - 1, c) != Some(label) {
                list.push(Edge { from: (row, col), heading: Heading::East });
            }
            if at(r, c + 1) != Some(label) {
                list.push(Edge { from: (row, col + 1), heading: Heading::South });
            }
            if at(r + 1, c) != Some(label) {
                list.push(Edge { from: (row + 1, col + 1), heading: Heading::West });
            }
            if at(r, c - 1) != Some(label) {
                list.push(Edge { from: (row + 1, col), heading: Heading::North });
            }
        }
    }
    edges
}

/// Link the edges of one region into closed rings, keeping only the
/// corners where the heading changes.
fn trace_rings(edges: &[Edge]) -> Vec<LatticeRing> {
    let mut outgoing: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut trail: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            used[current] = true;
            trail.push(current);
            let edge = edges[current];
            let candidates = outgoing.get(&edge.end()).map(Vec::as_slice).unwrap_or(&[]);
            let pick = [edge.heading.right(), edge.heading, edge.heading.left()]
                .into_iter()
                .find_map(|h| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&i| edges[i].heading == h && (!used[i] || i == start))
                });
            match pick {
                Some(next) if next != start => current = next,
                _ => break,
            }
        }

        let n = trail.len();
        let mut ring: LatticeRing = trail
            .iter()
            .enumerate()
            .filter(|&(k, &i)| edges[trail[(k + n - 1) % n]].heading != edges[i].heading)
            .map(|(_, &i)| (edges[i].from.1 as f64, edges[i].from.0 as f64))
            .collect();
        if ring.len() >= 3 {
            ring.push(ring[0]);
            rings.push(ring);
        }
    }
    rings
}

/// Twice the signed area in lattice coordinates; positive for outer rings
fn signed_area2(ring: &LatticeRing) -> f64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

/// A point strictly inside the area left of the ring's first edge
fn point_left_of_first_edge(ring: &LatticeRing) -> Point<f64> {
    let (x0, y0) = ring[0];
    let (x1, y1) = ring[1];
    let (dx, dy) = ((x1 - x0).signum(), (y1 - y0).signum());
    // Left of heading (dx, dy) on screen is (dy, -dx)
    Point::new(x0 + dx * 0.5 + dy * 0.25, y0 + dy * 0.5 - dx * 0.25)
}

fn to_map(ring: &LatticeRing, transform: &GeoTransform) -> LineString<f64> {
    ring.iter()
        .map(|&(x, y)| {
            let (mx, my) = transform.apply(x, y);
            Coord { x: mx, y: my }
        })
        .collect()
}

fn assemble(rings: Vec<LatticeRing>, transform: &GeoTransform) -> MultiPolygon<f64> {
    let (shells, holes): (Vec<LatticeRing>, Vec<LatticeRing>) =
        rings.into_iter().partition(|r| signed_area2(r) > 0.0);

    let shell_polys: Vec<Polygon<f64>> = shells
        .iter()
        .map(|s| Polygon::new(s.iter().copied().collect(), vec![]))
        .collect();

    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
    for hole in &holes {
        let probe = point_left_of_first_edge(hole);
        let owner = shell_polys
            .iter()
            .enumerate()
            .filter(|(_, p)| p.contains(&probe))
            .min_by(|a, b| a.1.unsigned_area().total_cmp(&b.1.unsigned_area()))
            .map(|(i, _)| i);
        if let Some(i) = owner {
            interiors[i].push(to_map(hole, transform));
        }
    }

    let polygons: MultiPolygon<f64> = shells
        .iter()
        .zip(interiors)
        .map(|(shell, holes)| Polygon::new(to_map(shell, transform), holes))
        .collect();
    polygons.orient(Direction::Default)
}

/// Polygonize every positive label of a raster.
///
/// Labels `<= 0` are background. Each label maps to one multipolygon whose
/// parts are its 4-connected components, in map coordinates.
pub fn polygonize(labels: &Raster<i32>) -> BTreeMap<i32, MultiPolygon<f64>> {
    let transform = labels.transform();
    boundary_edges(labels)
        .into_iter()
        .map(|(label, edges)| (label, assemble(trace_rings(&edges), transform)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn labels(values: Vec<i32>, rows: usize, cols: usize) -> Raster<i32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(100.0, 200.0, 10.0, -10.0));
        r
    }

    #[test]
    fn test_single_cell_square() {
        let polys = polygonize(&labels(vec![0, 0, 0, 7], 2, 2));
        let mp = &polys[&7];
        assert_eq!(mp.0.len(), 1);
        let exterior = mp.0[0].exterior();
        assert_eq!(exterior.0.len(), 5);
        assert_relative_eq!(mp.unsigned_area(), 100.0);
        // Counter-clockwise in map coordinates
        assert!(mp.0[0].signed_area() > 0.0);
        assert!(exterior.0.contains(&Coord { x: 110.0, y: 190.0 }));
        assert!(exterior.0.contains(&Coord { x: 120.0, y: 180.0 }));
    }

    #[test]
    fn test_ring_with_hole() {
        #[rustfmt::skip]
        let polys = polygonize(&labels(vec![
            1, 1, 1,
            1, 0, 1,
            1, 1, 1,
        ], 3, 3));
        let mp = &polys[&1];
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert_relative_eq!(mp.unsigned_area(), 800.0);
        assert!(!polys.contains_key(&0));
    }

    #[test]
    fn test_diagonal_cells_stay_separate() {
        #[rustfmt::skip]
        let polys = polygonize(&labels(vec![
            1, 0,
            0, 1,
        ], 2, 2));
        let mp = &polys[&1];
        assert_eq!(mp.0.len(), 2);
        for p in &mp.0 {
            assert_eq!(p.exterior().0.len(), 5);
            assert_relative_eq!(p.unsigned_area(), 100.0);
        }
    }

    #[test]
    fn test_pinched_hole_and_island() {
        // Label 1 surrounds a hole holding an island of label 1
        #[rustfmt::skip]
        let polys = polygonize(&labels(vec![
            1, 1, 1, 1, 1,
            1, 0, 0, 0, 1,
            1, 0, 1, 0, 1,
            1, 0, 0, 0, 1,
            1, 1, 1, 1, 1,
        ], 5, 5));
        let mp = &polys[&1];
        assert_eq!(mp.0.len(), 2);
        let holes: usize = mp.0.iter().map(|p| p.interiors().len()).sum();
        assert_eq!(holes, 1);
        assert_relative_eq!(mp.unsigned_area(), 1700.0);
    }

    #[test]
    fn test_adjacent_labels_share_boundary() {
        let polys = polygonize(&labels(vec![1, 1, 2, 2, 1, 2], 2, 3));
        assert_relative_eq!(polys[&1].unsigned_area(), 300.0);
        assert_relative_eq!(polys[&2].unsigned_area(), 300.0);
        // L-shapes have six corners
        assert_eq!(polys[&1].0[0].exterior().0.len(), 7);
    }
}
