//! Flow accumulation and outlet classification
//!
//! Accumulation counts the cells draining through each cell, the cell itself
//! included, so every valid cell has at least 1 and values never decrease
//! downstream. The traversal is Kahn's topological sort over the D8 graph
//! with an explicit queue, so deep drainage networks cannot overflow the
//! stack. A graph with a cycle leaves cells unprocessed, which is reported
//! as `Error::Resolution` instead of silently undercounting.

use std::collections::VecDeque;

use rillmap_core::raster::{d8, Raster};
use rillmap_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = Raster<u8>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Count the cells draining through each cell of a D8 direction grid"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(&input)
    }
}

/// Receiving cell of (row, col), if the cell is valid and its direction
/// points at a valid in-grid cell.
#[inline]
pub(crate) fn receiver(fdir: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let (rows, cols) = fdir.shape();
    let code = unsafe { fdir.get_unchecked(row, col) };
    let (nr, nc) = d8::neighbor(row, col, code, rows, cols)?;
    let target = unsafe { fdir.get_unchecked(nr, nc) };
    (target != d8::NODATA).then_some((nr, nc))
}

fn check_codes(fdir: &Raster<u8>) -> Result<()> {
    if let Some(((row, col), code)) = fdir
        .data()
        .indexed_iter()
        .find(|(_, c)| **c != d8::SINK && **c != d8::NODATA && !d8::is_direction(**c))
    {
        return Err(Error::InvalidParameter {
            name: "flow_direction",
            value: code.to_string(),
            reason: format!("cell ({}, {}) holds an unknown D8 code", row, col),
        });
    }
    Ok(())
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// # Algorithm
/// 1. Count incoming flows for each valid cell (in-degree)
/// 2. Start from cells with in-degree 0 (headwaters)
/// 3. Propagate downstream, adding each cell's total to its receiver
///
/// Directions that point off-grid or into nodata terminate there.
///
/// # Returns
/// `Raster<f64>` of cell counts, `NaN` on nodata.
///
/// # Errors
/// `Error::Resolution` if the direction graph contains a cycle.
pub fn flow_accumulation(fdir: &Raster<u8>) -> Result<Raster<f64>> {
    check_codes(fdir)?;
    let (rows, cols) = fdir.shape();
    let n = rows * cols;

    let mut in_degree = vec![0u32; n];
    let mut accumulation = vec![f64::NAN; n];
    let mut valid = 0usize;

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { fdir.get_unchecked(row, col) } == d8::NODATA {
                continue;
            }
            valid += 1;
            accumulation[row * cols + col] = 1.0;
            if let Some((nr, nc)) = receiver(fdir, row, col) {
                in_degree[nr * cols + nc] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n)
        .filter(|&i| in_degree[i] == 0 && !accumulation[i].is_nan())
        .collect();
    let mut processed = 0usize;

    while let Some(idx) = queue.pop_front() {
        processed += 1;
        let (row, col) = (idx / cols, idx % cols);
        let Some((nr, nc)) = receiver(fdir, row, col) else {
            continue;
        };
        let down = nr * cols + nc;
        accumulation[down] += accumulation[idx];
        in_degree[down] -= 1;
        if in_degree[down] == 0 {
            queue.push_back(down);
        }
    }

    if processed < valid {
        return Err(Error::Resolution(format!(
            "flow direction graph contains a cycle involving {} cells",
            valid - processed
        )));
    }

    debug!(cells = valid, "accumulated flow");
    fdir.with_vec(accumulation, Some(f64::NAN))
}

/// Where a sink cell sends its water
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutletKind {
    /// On the grid border
    Edge,
    /// Next to a nodata region
    NoDataBorder,
    /// Inside the valid domain with no descending neighbor
    Interior,
}

/// A valid cell without a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlet {
    pub row: usize,
    pub col: usize,
    pub kind: OutletKind,
}

/// Count of sink cells by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkSummary {
    pub edge_outlets: usize,
    pub nodata_outlets: usize,
    pub interior_sinks: usize,
}

impl SinkSummary {
    pub fn total(&self) -> usize {
        self.edge_outlets + self.nodata_outlets + self.interior_sinks
    }
}

/// Every valid cell that does not drain to a valid neighbor, row-major.
pub fn find_outlets(fdir: &Raster<u8>) -> Vec<Outlet> {
    let (rows, cols) = fdir.shape();
    let mut outlets = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { fdir.get_unchecked(row, col) } == d8::NODATA
                || receiver(fdir, row, col).is_some()
            {
                continue;
            }
            let kind = if fdir.is_edge(row, col) {
                OutletKind::Edge
            } else if d8::CODES.iter().any(|&code| {
                d8::neighbor(row, col, code, rows, cols)
                    .is_some_and(|(nr, nc)| unsafe { fdir.get_unchecked(nr, nc) } == d8::NODATA)
            }) {
                OutletKind::NoDataBorder
            } else {
                OutletKind::Interior
            };
            outlets.push(Outlet { row, col, kind });
        }
    }
    outlets
}

/// Classify the sinks of a direction grid
pub fn sink_summary(fdir: &Raster<u8>) -> SinkSummary {
    find_outlets(fdir)
        .iter()
        .fold(SinkSummary::default(), |mut s, o| {
            match o.kind {
                OutletKind::Edge => s.edge_outlets += 1,
                OutletKind::NoDataBorder => s.nodata_outlets += 1,
                OutletKind::Interior => s.interior_sinks += 1,
            }
            s
        })
}
