//! Strahler stream order
//!
//! Headwater channel cells have order 1. Where two or more tributaries of
//! the highest incoming order meet, the order increases by one; otherwise the
//! highest incoming order continues downstream. Ordering is a topological
//! pass over channel cells only, so every cell is finalized after all of its
//! tributaries.

use std::collections::VecDeque;

use super::flow_accumulation::receiver;
use rillmap_core::raster::{d8, Raster};
use rillmap_core::{Error, Result};

/// Downstream channel cell of (row, col), if any
fn channel_receiver(fdir: &Raster<u8>, mask: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    receiver(fdir, row, col).filter(|&(r, c)| unsafe { mask.get_unchecked(r, c) } == 1)
}

/// Strahler order of every channel cell; 0 elsewhere.
///
/// # Errors
/// `Error::SizeMismatch` if the grids differ in shape, `Error::Resolution`
/// if the channel graph contains a cycle.
pub fn strahler_order(fdir: &Raster<u8>, mask: &Raster<u8>) -> Result<Raster<u8>> {
    fdir.ensure_same_shape(mask)?;
    let (rows, cols) = fdir.shape();
    let n = rows * cols;

    let is_channel = |row: usize, col: usize| {
        let (m, code) = unsafe { (mask.get_unchecked(row, col), fdir.get_unchecked(row, col)) };
        m == 1 && code != d8::NODATA
    };

    let mut in_degree = vec![0u8; n];
    let mut channels = 0usize;
    for row in 0..rows {
        for col in 0..cols {
            if !is_channel(row, col) {
                continue;
            }
            channels += 1;
            if let Some((r, c)) = channel_receiver(fdir, mask, row, col) {
                in_degree[r * cols + c] += 1;
            }
        }
    }

    // Highest incoming order and how many tributaries carry it
    let mut max_in = vec![0u8; n];
    let mut max_count = vec![0u8; n];
    let mut order = vec![0u8; n];

    let mut queue: VecDeque<usize> = (0..n)
        .filter(|&i| in_degree[i] == 0 && is_channel(i / cols, i % cols))
        .collect();
    let mut processed = 0usize;

    while let Some(idx) = queue.pop_front() {
        processed += 1;
        let o = match max_count[idx] {
            0 => 1,
            1 => max_in[idx],
            _ => max_in[idx].saturating_add(1),
        };
        order[idx] = o;

        let Some((r, c)) = channel_receiver(fdir, mask, idx / cols, idx % cols) else {
            continue;
        };
        let down = r * cols + c;
        if o > max_in[down] {
            max_in[down] = o;
            max_count[down] = 1;
        } else if o == max_in[down] {
            max_count[down] = max_count[down].saturating_add(1);
        }
        in_degree[down] -= 1;
        if in_degree[down] == 0 {
            queue.push_back(down);
        }
    }

    if processed < channels {
        return Err(Error::Resolution(format!(
            "channel network contains a cycle involving {} cells",
            channels - processed
        )));
    }

    fdir.with_vec(order, Some(0))
}
