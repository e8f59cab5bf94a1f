//! Focal (moving window) statistics
//!
//! Computes a statistic over the valid cells of a window centered on each
//! cell. Depression density is the focal mean of the resolver's depression
//! mask.

use crate::maybe_rayon::*;
use rillmap_core::raster::Raster;
use rillmap_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Available focal statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocalStatistic {
    Mean,
    Sum,
    /// Number of valid cells
    Count,
    Min,
    Max,
}

/// Parameters for focal statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocalParams {
    /// Window radius (window size = 2*radius + 1)
    pub radius: usize,
    pub statistic: FocalStatistic,
    /// Circular window instead of square
    pub circular: bool,
}

impl Default for FocalParams {
    fn default() -> Self {
        Self {
            radius: 1,
            statistic: FocalStatistic::Mean,
            circular: false,
        }
    }
}

fn window_offsets(radius: usize, circular: bool) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let r_sq = r * r;
    (-r..=r)
        .flat_map(|dr| (-r..=r).map(move |dc| (dr, dc)))
        .filter(|&(dr, dc)| !circular || dr * dr + dc * dc <= r_sq)
        .collect()
}

/// Compute focal statistics on a raster.
///
/// Nodata cells are skipped inside the window, and the center of a nodata
/// cell stays NaN.
pub fn focal_statistics(raster: &Raster<f64>, params: &FocalParams) -> Result<Raster<f64>> {
    if params.radius == 0 {
        return Err(Error::InvalidParameter {
            name: "radius",
            value: "0".into(),
            reason: "focal radius must be > 0".into(),
        });
    }

    let (rows, cols) = raster.shape();
    let offsets = window_offsets(params.radius, params.circular);

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                if !raster.is_valid_at(row, col) {
                    continue;
                }

                let mut count = 0usize;
                let mut sum = 0.0;
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                    if raster.is_nodata(v) {
                        continue;
                    }
                    count += 1;
                    sum += v;
                    min = min.min(v);
                    max = max.max(v);
                }

                *out = match params.statistic {
                    FocalStatistic::Mean => sum / count as f64,
                    FocalStatistic::Sum => sum,
                    FocalStatistic::Count => count as f64,
                    FocalStatistic::Min => min,
                    FocalStatistic::Max => max,
                };
            }

            row_data
        })
        .collect();

    raster.with_vec(output_data, Some(f64::NAN))
}

/// Fraction of depression cells in the square window around each valid
/// cell of `dem`.
///
/// `depressions` is the resolver's mask (non-zero = cell was below its
/// spill level). Cells that are nodata in `dem` neither count nor receive
/// a value.
pub fn depression_density(depressions: &Raster<u8>, dem: &Raster<f64>, radius: usize) -> Result<Raster<f64>> {
    dem.ensure_same_shape(depressions)?;

    let mask: Vec<f64> = depressions
        .data()
        .iter()
        .zip(dem.data().iter())
        .map(|(&d, &z)| {
            if dem.is_nodata(z) {
                f64::NAN
            } else if d != 0 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let mask = dem.with_vec(mask, Some(f64::NAN))?;

    focal_statistics(
        &mask,
        &FocalParams {
            radius,
            statistic: FocalStatistic::Mean,
            circular: false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rillmap_core::GeoTransform;

    fn raster(size: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut r = Raster::new(size, size);
        r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        for row in 0..size {
            for col in 0..size {
                r.set(row, col, f(row, col)).unwrap();
            }
        }
        r
    }

    fn params(radius: usize, statistic: FocalStatistic, circular: bool) -> FocalParams {
        FocalParams {
            radius,
            statistic,
            circular,
        }
    }

    #[test]
    fn test_focal_mean_uniform() {
        let r = raster(10, |_, _| 5.0);
        let result = focal_statistics(&r, &FocalParams::default()).unwrap();
        assert_relative_eq!(result.get(5, 5).unwrap(), 5.0);
        assert_relative_eq!(result.get(0, 0).unwrap(), 5.0);
    }

    #[test]
    fn test_focal_min_max() {
        let r = raster(10, |row, col| (row * 10 + col) as f64);
        let min = focal_statistics(&r, &params(1, FocalStatistic::Min, false)).unwrap();
        let max = focal_statistics(&r, &params(1, FocalStatistic::Max, false)).unwrap();
        // (5,5) = 55, neighbors span (4,4)=44 to (6,6)=66
        assert_relative_eq!(min.get(5, 5).unwrap(), 44.0);
        assert_relative_eq!(max.get(5, 5).unwrap(), 66.0);
    }

    #[test]
    fn test_focal_count_clips_at_edges() {
        let r = raster(10, |_, _| 1.0);
        let result = focal_statistics(&r, &params(1, FocalStatistic::Count, false)).unwrap();
        assert_relative_eq!(result.get(5, 5).unwrap(), 9.0);
        assert_relative_eq!(result.get(0, 0).unwrap(), 4.0);
    }

    #[test]
    fn test_focal_circular() {
        let r = raster(10, |_, _| 1.0);
        let result = focal_statistics(&r, &params(2, FocalStatistic::Sum, true)).unwrap();
        // dr² + dc² <= 4 covers 13 cells
        assert_relative_eq!(result.get(5, 5).unwrap(), 13.0);
    }

    #[test]
    fn test_focal_skips_nodata() {
        let mut r = raster(5, |_, _| 2.0);
        r.set(2, 3, f64::NAN).unwrap();
        let result = focal_statistics(&r, &params(1, FocalStatistic::Count, false)).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 8.0);
        assert!(result.get(2, 3).unwrap().is_nan());
    }

    #[test]
    fn test_focal_radius_zero_error() {
        let r = raster(5, |_, _| 1.0);
        assert!(matches!(
            focal_statistics(&r, &params(0, FocalStatistic::Mean, false)),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_depression_density() {
        let dem = raster(7, |_, _| 10.0);
        let mut mask: Raster<u8> = Raster::new(7, 7);
        mask.set(3, 3, 1).unwrap();
        mask.set(3, 4, 1).unwrap();

        let density = depression_density(&mask, &dem, 1).unwrap();
        assert_relative_eq!(density.get(3, 3).unwrap(), 2.0 / 9.0);
        assert_relative_eq!(density.get(0, 0).unwrap(), 0.0);
        // Window at (2,5) reaches (3,4)
        assert_relative_eq!(density.get(2, 5).unwrap(), 1.0 / 9.0);
    }
}
