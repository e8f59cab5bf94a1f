//! Zonal statistics
//!
//! Statistics of a value raster for each zone of an integer zone raster.
//! Zone `0` and negative ids are background.

use std::collections::BTreeMap;

use rillmap_core::raster::Raster;
use rillmap_core::Result;
use serde::Serialize;

/// Statistics of one zone over its valid cells
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonalResult {
    pub zone_id: i32,
    /// Cells of the zone, valid or not
    pub cells: usize,
    /// Cells with a valid value
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Compute zonal statistics.
///
/// Zones whose cells are all nodata in `values` are still reported, with
/// `count == 0` and NaN statistics.
pub fn zonal_statistics(values: &Raster<f64>, zones: &Raster<i32>) -> Result<BTreeMap<i32, ZonalResult>> {
    values.ensure_same_shape(zones)?;

    let mut results: BTreeMap<i32, ZonalResult> = BTreeMap::new();
    for (&zone, &val) in zones.data().iter().zip(values.data().iter()) {
        if zone <= 0 {
            continue;
        }
        let entry = results.entry(zone).or_insert(ZonalResult {
            zone_id: zone,
            cells: 0,
            count: 0,
            sum: 0.0,
            mean: f64::NAN,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        });
        entry.cells += 1;
        if values.is_nodata(val) {
            continue;
        }
        entry.count += 1;
        entry.sum += val;
        entry.min = entry.min.min(val);
        entry.max = entry.max.max(val);
    }

    for zr in results.values_mut() {
        if zr.count == 0 {
            zr.min = f64::NAN;
            zr.max = f64::NAN;
        } else {
            zr.mean = zr.sum / zr.count as f64;
        }
    }

    Ok(results)
}
