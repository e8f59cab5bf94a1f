//! Topographic Wetness Index (TWI)
//!
//! TWI = ln(a / tan(β))
//! where a = specific catchment area (contributing cells × cell width)
//! and β = local slope.
//!
//! High TWI values indicate areas prone to saturation.

use crate::maybe_rayon::*;
use rillmap_core::raster::Raster;
use rillmap_core::{Error, Result};

/// Floor for tan(β) so flat cells stay finite
pub const MIN_TAN_SLOPE: f64 = 0.001;

/// Compute the Topographic Wetness Index
///
/// # Arguments
/// * `acc` - Flow accumulation in cells (each cell counts itself)
/// * `slope_deg` - Slope in degrees
/// * `cell_size` - Cell width in map units
///
/// # Returns
/// TWI raster, NaN wherever either input is nodata.
pub fn twi(acc: &Raster<f64>, slope_deg: &Raster<f64>, cell_size: f64) -> Result<Raster<f64>> {
    acc.ensure_same_shape(slope_deg)?;
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: cell_size.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    let (rows, cols) = acc.shape();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = unsafe { acc.get_unchecked(row, col) };
                let s = unsafe { slope_deg.get_unchecked(row, col) };
                if acc.is_nodata(a) || slope_deg.is_nodata(s) || !a.is_finite() || !s.is_finite() {
                    continue;
                }

                let sca = a * cell_size;
                let tan_beta = s.to_radians().tan().max(MIN_TAN_SLOPE);
                *out = (sca / tan_beta).ln();
            }
            row_data
        })
        .collect();

    acc.with_vec(output_data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rillmap_core::GeoTransform;

    fn filled(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(5, 5, value);
        r.set_transform(GeoTransform::new(0.0, 150.0, 30.0, -30.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_twi_basic() {
        let acc = filled(10.0);
        let slope = filled(45.0);
        let result = twi(&acc, &slope, 30.0).unwrap();
        // a = 300, tan 45° = 1
        assert_relative_eq!(result.get(2, 2).unwrap(), 300.0_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_flat_cells_use_slope_floor() {
        let acc = filled(1000.0);
        let slope = filled(0.0);
        let result = twi(&acc, &slope, 30.0).unwrap();
        let expected = (30_000.0 / MIN_TAN_SLOPE).ln();
        assert_relative_eq!(result.get(1, 1).unwrap(), expected, epsilon = 1e-9);
        assert!(result.get(1, 1).unwrap() > 17.0);
    }

    #[test]
    fn test_nodata_propagates() {
        let mut acc = filled(5.0);
        acc.set(0, 0, f64::NAN).unwrap();
        let result = twi(&acc, &filled(10.0), 30.0).unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
        assert!(result.get(0, 1).unwrap().is_finite());
    }

    #[test]
    fn test_twi_dimension_mismatch() {
        let acc: Raster<f64> = Raster::new(5, 5);
        let slp: Raster<f64> = Raster::new(3, 3);
        assert!(matches!(twi(&acc, &slp, 1.0), Err(Error::SizeMismatch { .. })));
    }
}
