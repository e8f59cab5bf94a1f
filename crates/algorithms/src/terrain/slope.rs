//! Slope calculation from DEMs
//!
//! Two gradient estimators are available:
//! - Central differences along both grid axes, falling back to one-sided
//!   differences at the grid edge or next to nodata. Every valid cell gets a
//!   value, which the wetness index relies on.
//! - Horn (1981) 3x3 weighted differences, which need a full valid
//!   neighborhood and leave edge cells as nodata.

use crate::maybe_rayon::*;
use rillmap_core::raster::Raster;
use rillmap_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};

/// Gradient estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeMethod {
    #[default]
    CentralDifference,
    Horn,
}

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent (0-infinity, typically 0-100+)
    Percent,
    /// Radians (0-π/2)
    Radians,
}

/// Parameters for slope calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeParams {
    pub method: SlopeMethod,
    pub units: SlopeUnits,
    /// Multiplier applied to horizontal distances
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            method: SlopeMethod::CentralDifference,
            units: SlopeUnits::Degrees,
            z_factor: 1.0,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope (rate of change of elevation) from a DEM"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, &params)
    }
}

/// One axis derivative from the values before and after the center.
fn axis_gradient(before: Option<f64>, center: f64, after: Option<f64>, spacing: f64) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => (a - b) / (2.0 * spacing),
        (None, Some(a)) => (a - center) / spacing,
        (Some(b), None) => (center - b) / spacing,
        (None, None) => 0.0,
    }
}

/// Calculate slope from a DEM.
///
/// Horn's method uses the 3x3 neighborhood:
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * dx)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * dy)
///
/// and slope = atan(sqrt(dz/dx² + dz/dy²)) for both methods. Nodata cells
/// come out as NaN.
pub fn slope(dem: &Raster<f64>, params: &SlopeParams) -> Result<Raster<f64>> {
    if !(params.z_factor.is_finite() && params.z_factor > 0.0) {
        return Err(Error::InvalidParameter {
            name: "z_factor",
            value: params.z_factor.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let (sx, sy) = dem.transform().cell_sizes();
    let (dx, dy) = (sx * params.z_factor, sy * params.z_factor);

    let value = |r: isize, c: isize| -> Option<f64> {
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            return None;
        }
        let v = unsafe { dem.get_unchecked(r as usize, c as usize) };
        (!dem.is_nodata(v) && v.is_finite()).then_some(v)
    };

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let r = row as isize;

            for (col, out) in row_data.iter_mut().enumerate() {
                let c = col as isize;
                let Some(e) = value(r, c) else {
                    continue;
                };

                let gradient = match params.method {
                    SlopeMethod::CentralDifference => {
                        let gx = axis_gradient(value(r, c - 1), e, value(r, c + 1), dx);
                        let gy = axis_gradient(value(r - 1, c), e, value(r + 1, c), dy);
                        Some((gx, gy))
                    }
                    SlopeMethod::Horn => {
                        let window = [
                            value(r - 1, c - 1),
                            value(r - 1, c),
                            value(r - 1, c + 1),
                            value(r, c - 1),
                            value(r, c + 1),
                            value(r + 1, c - 1),
                            value(r + 1, c),
                            value(r + 1, c + 1),
                        ];
                        match window {
                            [Some(a), Some(b), Some(c), Some(d), Some(f), Some(g), Some(h), Some(i)] => Some((
                                ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx),
                                ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy),
                            )),
                            _ => None,
                        }
                    }
                };

                let Some((gx, gy)) = gradient else {
                    continue;
                };
                let slope_rad = gx.hypot(gy).atan();

                *out = match params.units {
                    SlopeUnits::Degrees => slope_rad.to_degrees(),
                    SlopeUnits::Percent => slope_rad.tan() * 100.0,
                    SlopeUnits::Radians => slope_rad,
                };
            }

            row_data
        })
        .collect();

    dem.with_vec(output_data, Some(f64::NAN))
}
