//! Per-boundary summaries of the extracted layers
//!
//! Boundaries (administrative units, study areas) usually come in a
//! geographic CRS while the layers live on the projected DEM grid. Every
//! boundary is reprojected to the grid CRS first; a boundary set that cannot
//! be reprojected aborts the summary instead of producing zero counts.

use std::collections::BTreeMap;

use geo::{Area, BooleanOps, Contains, Euclidean, Geometry, Length, MultiLineString, MultiPolygon, Point};
use rillmap_core::crs::CRS;
use rillmap_core::raster::Raster;
use rillmap_core::vector::{AttributeValue, FeatureCollection};
use rillmap_core::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::flood::{FloodRisk, RiskClass};
use crate::hydrology::{StreamNetwork, WatershedSet};
use crate::statistics::zonal_statistics;
use crate::vector::{rasterize_labels, reproject_collection};

/// Layers to summarize; any of them may be missing
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryLayers<'a> {
    pub streams: Option<&'a StreamNetwork>,
    pub watersheds: Option<&'a WatershedSet>,
    pub risk: Option<&'a FloodRisk>,
}

impl SummaryLayers<'_> {
    /// Label raster whose grid the layers share
    fn grid(&self) -> Option<Raster<i32>> {
        if let Some(ws) = self.watersheds {
            return Some(ws.labels.with_same_meta(ws.labels.rows(), ws.labels.cols()));
        }
        if let Some(risk) = self.risk {
            return Some(risk.classes.with_same_meta(risk.classes.rows(), risk.classes.cols()));
        }
        self.streams
            .map(|net| net.mask.with_same_meta(net.mask.rows(), net.mask.cols()))
    }
}

/// Area of each risk class in map units squared
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RiskAreas {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

/// Statistics of the layers inside one boundary polygon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundarySummary {
    /// Position in the boundary collection
    pub index: usize,
    pub name: Option<String>,
    /// Boundary area in the grid CRS
    pub area: f64,
    /// Grid cells whose center lies inside; 0 means no overlap with the grid
    pub grid_cells: usize,
    /// Segments with some length inside the boundary
    pub stream_segments: usize,
    /// Clipped stream length by Strahler order
    pub stream_length_by_order: BTreeMap<u8, f64>,
    /// Basins whose pour point lies inside
    pub basins: usize,
    /// Area of labelled basin cells inside
    pub basin_area: f64,
    pub risk_area: Option<RiskAreas>,
    pub mean_risk_score: Option<f64>,
}

fn boundary_name(props: &BTreeMap<String, AttributeValue>) -> Option<String> {
    ["name", "NAME", "id"].iter().find_map(|k| match props.get(*k) {
        Some(AttributeValue::String(s)) => Some(s.clone()),
        Some(AttributeValue::Int(i)) => Some(i.to_string()),
        _ => None,
    })
}

fn as_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        _ => None,
    }
}

/// Summarize streams, basins and risk classes inside each boundary polygon.
///
/// A boundary collection without a CRS is taken to be in `grid_crs`.
/// Non-areal features are skipped. Boundaries that miss the grid are
/// reported with `grid_cells == 0` and logged.
///
/// # Errors
/// `Error::CrsMismatch` when the boundaries cannot be reprojected.
pub fn summarize_by_boundary(
    boundaries: &FeatureCollection,
    grid_crs: Option<&CRS>,
    layers: &SummaryLayers<'_>,
) -> Result<Vec<BoundarySummary>> {
    let projected = reproject_collection(boundaries, grid_crs)?;
    let grid = layers.grid();
    let cell_area = grid.as_ref().map_or(0.0, |g| g.cell_area());

    let mut summaries = Vec::new();
    for (index, feature) in projected.iter().enumerate() {
        let Some(shape) = feature.geometry.as_ref().and_then(as_multipolygon) else {
            debug!(index, "skipping non-areal boundary feature");
            continue;
        };
        let shape_geometry = Geometry::MultiPolygon(shape.clone());

        let inside = grid
            .as_ref()
            .map(|g| rasterize_labels([(1, &shape_geometry)], g));
        let cell_in = |row: usize, col: usize| {
            inside
                .as_ref()
                .is_some_and(|m| unsafe { m.get_unchecked(row, col) } == 1)
        };
        let grid_cells = inside
            .as_ref()
            .map_or(0, |m| m.data().iter().filter(|&&v| v == 1).count());
        if grid.is_some() && grid_cells == 0 {
            warn!(index, "boundary does not overlap the grid");
        }

        let mut stream_segments = 0;
        let mut stream_length_by_order: BTreeMap<u8, f64> = BTreeMap::new();
        if let Some(net) = layers.streams {
            for seg in &net.segments {
                let clipped = shape.clip(&MultiLineString::new(vec![seg.geometry.clone()]), false);
                let length = clipped.length::<Euclidean>();
                if length > 0.0 {
                    stream_segments += 1;
                    *stream_length_by_order.entry(seg.order).or_insert(0.0) += length;
                }
            }
        }

        let (mut basins, mut basin_area) = (0, 0.0);
        if let Some(ws) = layers.watersheds {
            basins = ws
                .basins
                .iter()
                .filter(|b| shape.contains(&Point::new(b.pour_xy.0, b.pour_xy.1)))
                .count();
            let (rows, cols) = ws.labels.shape();
            let cells = (0..rows)
                .flat_map(|r| (0..cols).map(move |c| (r, c)))
                .filter(|&(r, c)| cell_in(r, c) && unsafe { ws.labels.get_unchecked(r, c) } > 0)
                .count();
            basin_area = cells as f64 * cell_area;
        }

        let (mut risk_area, mut mean_risk_score) = (None, None);
        if let (Some(risk), Some(mask)) = (layers.risk, inside.as_ref()) {
            let mut areas = RiskAreas::default();
            for (&class, &m) in risk.classes.data().iter().zip(mask.data().iter()) {
                if m != 1 {
                    continue;
                }
                match RiskClass::from_code(class) {
                    Some(RiskClass::Low) => areas.low += cell_area,
                    Some(RiskClass::Medium) => areas.medium += cell_area,
                    Some(RiskClass::High) => areas.high += cell_area,
                    None => {}
                }
            }
            risk_area = Some(areas);
            mean_risk_score = zonal_statistics(&risk.score, mask)?
                .get(&1)
                .filter(|z| z.count > 0)
                .map(|z| z.mean);
        }

        summaries.push(BoundarySummary {
            index,
            name: boundary_name(&feature.properties),
            area: shape.unsigned_area(),
            grid_cells,
            stream_segments,
            stream_length_by_order,
            basins,
            basin_area,
            risk_area,
            mean_risk_score,
        });
    }

    debug!(boundaries = summaries.len(), "summarized layers by boundary");
    Ok(summaries)
}
