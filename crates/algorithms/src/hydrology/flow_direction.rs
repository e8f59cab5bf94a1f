//! D8 flow direction
//!
//! Each valid cell drains to the neighbor with the steepest descent
//! (elevation drop divided by the distance between cell centers).
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! `0` = sink or edge outlet (no descending neighbor), `255` = nodata.
//!
//! Neighbors are evaluated in code order and only a strictly greater descent
//! replaces the current best, so among equally steep neighbors the lowest
//! code wins. On a resolved DEM every interior cell has a descending
//! neighbor, which makes the induced graph acyclic.

use crate::maybe_rayon::*;
use rillmap_core::raster::{d8, Raster};
use rillmap_core::{Algorithm, Error, Result};

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Calculate D8 flow direction from a resolved DEM"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input)
    }
}

/// Calculate D8 flow direction from a resolved DEM.
///
/// Nodata cells get [`d8::NODATA`]; nodata and off-grid neighbors are never
/// receivers. Distances come from the transform, so rectangular cells are
/// weighted correctly.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let dist = d8::distances(dem.transform());

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![d8::NODATA; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(center) {
                    continue;
                }

                let mut max_drop = 0.0_f64;
                let mut best_dir = d8::SINK;

                for &code in &d8::CODES {
                    let Some((nr, nc)) = d8::neighbor(row, col, code, rows, cols) else {
                        continue;
                    };
                    let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                    if dem.is_nodata(neighbor) {
                        continue;
                    }

                    let drop = (center - neighbor) / dist[code as usize];
                    if drop > max_drop {
                        max_drop = drop;
                        best_dir = code;
                    }
                }

                *out = best_dir;
            }

            row_data
        })
        .collect();

    dem.with_vec(output_data, Some(d8::NODATA))
}
