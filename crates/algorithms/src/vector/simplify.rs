//! Line simplification that never introduces self-intersections
//!
//! Douglas-Peucker keeps both endpoints but can make a meandering line cross
//! itself. When that happens the tolerance is halved and the original line
//! simplified again, down to the traced geometry itself.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Line, LineString, Simplify};

/// Halvings tried before giving up and returning the input line
const MAX_HALVINGS: usize = 24;

/// Whether no two segments of `line` cross or overlap, apart from the
/// endpoint shared by consecutive segments.
pub fn is_simple(line: &LineString<f64>) -> bool {
    let segments: Vec<Line<f64>> = line.lines().filter(|l| l.start != l.end).collect();

    for (i, a) in segments.iter().enumerate() {
        for (j, b) in segments.iter().enumerate().skip(i + 1) {
            match line_intersection(*a, *b) {
                None => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    let shared = j == i + 1 && intersection == a.end;
                    if !shared {
                        return false;
                    }
                }
                Some(LineIntersection::Collinear { .. }) => return false,
            }
        }
    }
    true
}

/// Simplify with Douglas-Peucker at `tolerance`, halving it until the
/// result is simple. Non-positive tolerance returns the line unchanged.
pub fn simplify_line(line: &LineString<f64>, tolerance: f64) -> LineString<f64> {
    if tolerance.is_nan() || tolerance <= 0.0 || line.0.len() <= 2 {
        return line.clone();
    }

    let mut eps = tolerance;
    for _ in 0..MAX_HALVINGS {
        let simplified = line.simplify(&eps);
        if is_simple(&simplified) {
            return simplified;
        }
        eps /= 2.0;
    }
    line.clone()
}
