//! Stream link vectorization
//!
//! A link starts at every channel head and every confluence and runs
//! downstream to the next confluence, which is included as its last vertex
//! so the network stays connected, or to the outlet. Strahler order only
//! changes at confluences, so each link has a single order.

use std::collections::{BTreeMap, HashMap};

use geo::{Coord, Euclidean, Length, LineString};
use rillmap_core::crs::CRS;
use rillmap_core::raster::Raster;
use rillmap_core::vector::{AttributeValue, Feature, FeatureCollection};
use rillmap_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::flow_accumulation::receiver;
use super::stream_network::{max_accumulation, stream_mask, DerivedThresholds, StreamThresholds};
use super::stream_order::strahler_order;
use crate::vector::simplify_line;

/// Parameters for [`extract_stream_network`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub thresholds: StreamThresholds,
    /// Douglas-Peucker tolerance as a multiple of the cell size
    pub simplify_factor: f64,
    /// Drop segments below this Strahler order
    pub min_order: u8,
    /// Drop segments owning fewer cells than this
    pub min_cells: usize,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            thresholds: StreamThresholds::default(),
            simplify_factor: 0.5,
            min_order: 1,
            min_cells: 0,
        }
    }
}

/// One stream link
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSegment {
    pub id: usize,
    /// Simplified geometry in map coordinates, upstream to downstream
    pub geometry: LineString<f64>,
    pub order: u8,
    /// Length of the simplified geometry
    pub length: f64,
    /// Length of the cell-center trace
    pub traced_length: f64,
    /// Cells owned by this link (the closing confluence belongs downstream)
    pub source_cells: usize,
    /// Accumulation at the last owned cell
    pub contributing_cells: f64,
    /// Accumulation tier at the last owned cell
    pub tier: u8,
    /// First and last owned cell as (row, col)
    pub head: (usize, usize),
    pub mouth: (usize, usize),
    pub downstream_id: Option<usize>,
}

impl StreamSegment {
    pub fn to_feature(&self) -> Feature {
        let downstream = self
            .downstream_id
            .map_or(AttributeValue::Null, AttributeValue::from);
        Feature::new(self.geometry.clone())
            .with("stream_id", self.id)
            .with("stream_order", self.order as u32)
            .with("length", self.length)
            .with("traced_length", self.traced_length)
            .with("source_cells", self.source_cells)
            .with("contributing_cells", self.contributing_cells)
            .with("accumulation_tier", self.tier as u32)
            .with("downstream_id", downstream)
    }
}

/// Extracted channel network
#[derive(Debug, Clone)]
pub struct StreamNetwork {
    pub thresholds: DerivedThresholds,
    /// 1 on channel cells
    pub mask: Raster<u8>,
    /// Strahler order on channel cells, 0 elsewhere
    pub order: Raster<u8>,
    pub segments: Vec<StreamSegment>,
}

impl StreamNetwork {
    /// No segment survived extraction and filtering
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn count_by_order(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.segments {
            *counts.entry(s.order).or_insert(0) += 1;
        }
        counts
    }

    pub fn max_order(&self) -> u8 {
        self.segments.iter().map(|s| s.order).max().unwrap_or(0)
    }

    pub fn to_features(&self, crs: Option<&CRS>) -> FeatureCollection {
        let mut fc = FeatureCollection::new(crs.cloned());
        for s in &self.segments {
            fc.push(s.to_feature());
        }
        fc
    }
}

/// Trace stream links from a Strahler order grid.
///
/// `order` is 0 off-channel. Links of a single vertex (a confluence that is
/// also an outlet) have no length and are dropped. Ids are assigned from 1
/// in row-major order of link heads.
pub fn vectorize_streams(
    fdir: &Raster<u8>,
    order: &Raster<u8>,
    acc: &Raster<f64>,
    thresholds: &DerivedThresholds,
    simplify_factor: f64,
) -> Result<Vec<StreamSegment>> {
    fdir.ensure_same_shape(order)?;
    fdir.ensure_same_shape(acc)?;
    let (rows, cols) = fdir.shape();
    let n = rows * cols;
    let tolerance = simplify_factor * fdir.cell_size();

    let on_channel = |idx: usize| unsafe { order.get_unchecked(idx / cols, idx % cols) } > 0;
    let downstream = |idx: usize| {
        receiver(fdir, idx / cols, idx % cols)
            .map(|(r, c)| r * cols + c)
            .filter(|&d| on_channel(d))
    };

    let mut inflow = vec![0u8; n];
    let mut channel_cells = 0usize;
    for idx in (0..n).filter(|&i| on_channel(i)) {
        channel_cells += 1;
        if let Some(d) = downstream(idx) {
            inflow[d] += 1;
        }
    }

    // (path, closing confluence)
    let mut links: Vec<(Vec<usize>, Option<usize>)> = Vec::new();
    for head in (0..n).filter(|&i| on_channel(i) && inflow[i] != 1) {
        let mut path = vec![head];
        let mut confluence = None;
        let mut cur = head;
        while let Some(d) = downstream(cur) {
            path.push(d);
            if inflow[d] >= 2 {
                confluence = Some(d);
                break;
            }
            if path.len() > channel_cells {
                return Err(Error::Resolution(format!(
                    "stream trace from cell ({}, {}) does not terminate",
                    head / cols,
                    head % cols
                )));
            }
            cur = d;
        }
        if path.len() >= 2 {
            links.push((path, confluence));
        }
    }

    let ids: HashMap<usize, usize> = links
        .iter()
        .enumerate()
        .map(|(i, (path, _))| (path[0], i + 1))
        .collect();

    let transform = fdir.transform();
    let segments = links
        .into_iter()
        .enumerate()
        .map(|(i, (path, confluence))| {
            let owned = if confluence.is_some() { path.len() - 1 } else { path.len() };
            let head = path[0];
            let mouth = path[owned - 1];

            let coords: Vec<Coord<f64>> = path
                .iter()
                .map(|&idx| {
                    let (x, y) = transform.pixel_to_geo(idx % cols, idx / cols);
                    Coord { x, y }
                })
                .collect();
            let traced = LineString::new(coords);
            let geometry = simplify_line(&traced, tolerance);
            let contributing = unsafe { acc.get_unchecked(mouth / cols, mouth % cols) };

            StreamSegment {
                id: i + 1,
                order: unsafe { order.get_unchecked(head / cols, head % cols) },
                length: geometry.length::<Euclidean>(),
                traced_length: traced.length::<Euclidean>(),
                geometry,
                source_cells: owned,
                contributing_cells: contributing,
                tier: thresholds.tier(contributing),
                head: (head / cols, head % cols),
                mouth: (mouth / cols, mouth % cols),
                downstream_id: confluence.and_then(|c| ids.get(&c).copied()),
            }
        })
        .collect();

    Ok(segments)
}

/// Threshold accumulation, order the channels and vectorize them.
///
/// A grid whose accumulation never exceeds the initiation threshold yields
/// an empty network, not an error.
///
/// # Errors
/// `Error::Threshold` when accumulation has no positive finite maximum,
/// `Error::Resolution` for a cyclic direction graph.
pub fn extract_stream_network(
    fdir: &Raster<u8>,
    acc: &Raster<f64>,
    params: &StreamParams,
) -> Result<StreamNetwork> {
    fdir.ensure_same_shape(acc)?;
    let max_acc = max_accumulation(acc)
        .ok_or_else(|| Error::Threshold("flow accumulation has no valid cells".into()))?;
    let thresholds = params.thresholds.derive(max_acc)?;

    let mask = stream_mask(acc, &thresholds)?;
    let order = strahler_order(fdir, &mask)?;
    let traced = vectorize_streams(fdir, &order, acc, &thresholds, params.simplify_factor)?;
    let traced_count = traced.len();

    let mut segments: Vec<StreamSegment> = traced
        .into_iter()
        .filter(|s| s.order >= params.min_order && s.source_cells >= params.min_cells)
        .collect();
    let kept: std::collections::HashSet<usize> = segments.iter().map(|s| s.id).collect();
    for s in &mut segments {
        s.downstream_id = s.downstream_id.filter(|d| kept.contains(d));
    }

    debug!(
        initiation = thresholds.initiation(),
        traced = traced_count,
        kept = segments.len(),
        "extracted stream network"
    );

    Ok(StreamNetwork {
        thresholds,
        mask,
        order,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::{flow_accumulation, flow_direction};
    use approx::assert_relative_eq;
    use rillmap_core::raster::d8;
    use rillmap_core::GeoTransform;

    fn y_network() -> (Raster<u8>, Raster<u8>, Raster<f64>) {
        #[rustfmt::skip]
        let mut fdir = Raster::from_vec(vec![
            8, 0, 6,
            0, 7, 0,
            0, 7, 0,
        ], 3, 3).unwrap();
        fdir.set_nodata(Some(d8::NODATA));
        fdir.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        #[rustfmt::skip]
        let order = Raster::from_vec(vec![
            1, 0, 1,
            0, 2, 0,
            0, 2, 0,
        ], 3, 3).unwrap();
        #[rustfmt::skip]
        let acc = Raster::from_vec(vec![
            20.0, 1.0, 25.0,
            1.0, 46.0, 1.0,
            1.0, 47.0, 1.0,
        ], 3, 3).unwrap();
        (fdir, order, acc)
    }

    #[test]
    fn test_links_split_at_confluence() {
        let (fdir, order, acc) = y_network();
        let t = StreamThresholds::default().derive(47.0).unwrap();
        let segs = vectorize_streams(&fdir, &order, &acc, &t, 0.5).unwrap();

        assert_eq!(segs.len(), 3);
        let left = &segs[0];
        assert_eq!((left.id, left.order, left.head), (1, 1, (0, 0)));
        assert_eq!(left.downstream_id, Some(3));
        assert_eq!(left.source_cells, 1);
        assert_eq!(left.contributing_cells, 20.0);
        // Ends on the confluence cell center
        assert_eq!(left.geometry.0.last(), Some(&Coord { x: 15.0, y: 15.0 }));

        let stem = &segs[2];
        assert_eq!((stem.order, stem.head, stem.mouth), (2, (1, 1), (2, 1)));
        assert_eq!(stem.downstream_id, None);
        assert_relative_eq!(stem.traced_length, 10.0);
        assert_relative_eq!(left.traced_length, 200f64.sqrt());
    }

    #[test]
    fn test_confluence_outlet_is_dropped() {
        // Two channels meet at (1,1), which drains nowhere
        let (mut fdir, mut order, acc) = y_network();
        fdir.set(1, 1, d8::SINK).unwrap();
        order.set(2, 1, 0).unwrap();
        let t = StreamThresholds::default().derive(47.0).unwrap();
        let segs = vectorize_streams(&fdir, &order, &acc, &t, 0.5).unwrap();

        assert_eq!(segs.len(), 2);
        assert!(segs.iter().all(|s| s.downstream_id.is_none()));
    }

    fn valley(rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64 * 30.0, 30.0, -30.0));
        dem.set_nodata(Some(-9999.0));
        let mid = cols / 2;
        for row in 0..rows {
            for col in 0..cols {
                let z = 500.0 - row as f64 + 2.0 * (col as f64 - mid as f64).abs();
                dem.set(row, col, z).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_valley_single_channel() {
        let dem = valley(21, 9);
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir).unwrap();
        let net = extract_stream_network(&fdir, &acc, &StreamParams::default()).unwrap();

        assert_eq!(net.len(), 1);
        let seg = &net.segments[0];
        assert_eq!(seg.order, 1);
        assert_eq!(seg.head, (3, 4));
        assert_eq!(seg.mouth, (20, 4));
        // A straight channel simplifies to its endpoints
        assert_eq!(seg.geometry.0.len(), 2);
        assert_relative_eq!(seg.length, seg.traced_length, epsilon = 1e-9);
        assert_eq!(seg.contributing_cells, 189.0);
        // 189 exceeds 10, 50 and 100 but not 500
        assert_eq!(seg.tier, 3);
        assert_eq!(net.count_by_order().get(&1), Some(&1));
    }

    #[test]
    fn test_small_grid_gives_empty_network() {
        let dem = valley(3, 3);
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir).unwrap();
        let net = extract_stream_network(&fdir, &acc, &StreamParams::default()).unwrap();
        assert!(net.is_empty());
        assert_eq!(net.to_features(None).len(), 0);
    }

    #[test]
    fn test_min_order_filter() {
        let dem = valley(21, 9);
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir).unwrap();
        let params = StreamParams {
            min_order: 2,
            ..Default::default()
        };
        let net = extract_stream_network(&fdir, &acc, &params).unwrap();
        assert!(net.is_empty());
        assert_eq!(net.mask.get(20, 4).unwrap(), 1);
    }
}
