//! Elevation grid conditioning
//!
//! Normalizes every missing-data encoding found in a raw DEM to one explicit
//! sentinel tagged in the raster metadata. Raw DEM exports often carry NaN
//! with no declared nodata, a declared value such as -32768, or sentinel
//! values with no declaration at all; leaving any of these in the grid (or
//! reading them as elevation 0) creates artificial basins at the domain edge.

use crate::maybe_rayon::*;
use rillmap_core::raster::Raster;
use rillmap_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters for [`condition_dem`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionParams {
    /// Sentinel written to every missing cell
    pub nodata: f64,
    /// Extra raw values to treat as missing (e.g. -32768, 32767)
    pub extra_nodata: Vec<f64>,
    /// Physically valid elevation range (inclusive); samples outside it are
    /// treated as missing. The sentinel must lie outside this range.
    pub valid_range: (f64, f64),
}

impl Default for ConditionParams {
    fn default() -> Self {
        Self {
            nodata: -9999.0,
            extra_nodata: Vec::new(),
            valid_range: (-1000.0, 9000.0),
        }
    }
}

/// Per-category counts of the cells rewritten to nodata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditioningReport {
    pub valid_cells: usize,
    pub non_finite_cells: usize,
    pub declared_nodata_cells: usize,
    pub extra_encoding_cells: usize,
    pub out_of_range_cells: usize,
}

impl ConditioningReport {
    pub fn missing_cells(&self) -> usize {
        self.non_finite_cells
            + self.declared_nodata_cells
            + self.extra_encoding_cells
            + self.out_of_range_cells
    }

    fn merge(mut self, other: Self) -> Self {
        self.valid_cells += other.valid_cells;
        self.non_finite_cells += other.non_finite_cells;
        self.declared_nodata_cells += other.declared_nodata_cells;
        self.extra_encoding_cells += other.extra_encoding_cells;
        self.out_of_range_cells += other.out_of_range_cells;
        self
    }
}

/// A DEM with a single explicit nodata sentinel
#[derive(Debug, Clone)]
pub struct ConditionedDem {
    pub dem: Raster<f64>,
    pub report: ConditioningReport,
}

/// Elevation grid conditioner
#[derive(Debug, Clone, Default)]
pub struct Conditioner;

impl Algorithm for Conditioner {
    type Input = Raster<f64>;
    type Output = ConditionedDem;
    type Params = ConditionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Condition"
    }

    fn description(&self) -> &'static str {
        "Normalize missing elevation samples to one explicit nodata sentinel"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        condition_dem(&input, &params)
    }
}

fn validate(raw: &Raster<f64>, params: &ConditionParams) -> Result<()> {
    let (rows, cols) = raw.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::Conditioning(format!("grid has no cells ({}x{})", cols, rows)));
    }
    raw.transform().validate()?;

    let (lo, hi) = params.valid_range;
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(Error::Conditioning(format!(
            "invalid elevation range [{}, {}]",
            lo, hi
        )));
    }
    if !params.nodata.is_finite() || (lo..=hi).contains(&params.nodata) {
        return Err(Error::Conditioning(format!(
            "nodata sentinel {} is not distinguishable from valid elevations in [{}, {}]",
            params.nodata, lo, hi
        )));
    }
    Ok(())
}

/// Condition a raw DEM.
///
/// Every non-finite sample, sample equal to the declared nodata or one of
/// `extra_nodata`, or sample outside `valid_range` becomes `params.nodata`,
/// which is then declared as the raster's nodata value.
///
/// # Errors
/// `Error::Conditioning` for an empty grid, a degenerate transform, a
/// sentinel inside the valid range, or a grid without any valid cell.
pub fn condition_dem(raw: &Raster<f64>, params: &ConditionParams) -> Result<ConditionedDem> {
    validate(raw, params)?;

    let (rows, cols) = raw.shape();
    let declared = raw.nodata().filter(|nd| nd.is_finite());
    let (lo, hi) = params.valid_range;
    let sentinel = params.nodata;

    let row_results: Vec<(Vec<f64>, ConditioningReport)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut values = Vec::with_capacity(cols);
            let mut report = ConditioningReport::default();
            for col in 0..cols {
                let z = unsafe { raw.get_unchecked(row, col) };
                let out = if !z.is_finite() {
                    report.non_finite_cells += 1;
                    sentinel
                } else if declared.is_some_and(|nd| z == nd) {
                    report.declared_nodata_cells += 1;
                    sentinel
                } else if params.extra_nodata.contains(&z) {
                    report.extra_encoding_cells += 1;
                    sentinel
                } else if z < lo || z > hi {
                    report.out_of_range_cells += 1;
                    sentinel
                } else {
                    report.valid_cells += 1;
                    z
                };
                values.push(out);
            }
            (values, report)
        })
        .collect();

    let mut data = Vec::with_capacity(rows * cols);
    let mut report = ConditioningReport::default();
    for (values, row_report) in row_results {
        data.extend(values);
        report = report.merge(row_report);
    }

    if report.valid_cells == 0 {
        return Err(Error::Conditioning(format!(
            "grid has no valid elevation cells ({} missing)",
            report.missing_cells()
        )));
    }

    debug!(
        valid = report.valid_cells,
        missing = report.missing_cells(),
        "conditioned DEM"
    );

    let dem = raw.with_vec(data, Some(sentinel))?;
    Ok(ConditionedDem { dem, report })
}
