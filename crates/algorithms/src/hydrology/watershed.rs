//! Watershed delineation
//!
//! Every pour point is labelled first, then a single breadth-first search
//! walks the D8 graph upstream from all of them at once. A cell that already
//! carries a label stops the traversal, so a pour point upstream of another
//! carves its own sub-basin out of the larger one and basins never overlap.
//! Cells that reach no pour point stay unlabelled (0).

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use geo::{Geometry, MultiPolygon, Point};
use rillmap_core::crs::CRS;
use rillmap_core::raster::{d8, Raster};
use rillmap_core::vector::{AttributeValue, Feature, FeatureCollection};
use rillmap_core::{Algorithm, Error, RasterElement, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::flow_accumulation::find_outlets;
use super::stream_vector::StreamNetwork;
use crate::vector::{polygonize, reproject_collection};

/// Where a pour point sits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PourPointLocation {
    Cell { row: usize, col: usize },
    /// Map coordinates in the grid CRS
    Map { x: f64, y: f64 },
}

/// Outlet of a basin to delineate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PourPoint {
    pub location: PourPointLocation,
    #[serde(default)]
    pub name: Option<String>,
}

impl PourPoint {
    pub fn cell(row: usize, col: usize) -> Self {
        Self {
            location: PourPointLocation::Cell { row, col },
            name: None,
        }
    }

    pub fn map(x: f64, y: f64) -> Self {
        Self {
            location: PourPointLocation::Map { x, y },
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Grid cell of this point, if it falls inside the grid
    pub fn resolve<T: RasterElement>(&self, grid: &Raster<T>) -> Option<(usize, usize)> {
        let (rows, cols) = grid.shape();
        match self.location {
            PourPointLocation::Cell { row, col } => (row < rows && col < cols).then_some((row, col)),
            PourPointLocation::Map { x, y } => grid.transform().geo_to_cell(x, y, rows, cols),
        }
    }

    /// Pour points from the point features of a collection, reprojected to
    /// `grid_crs`. A `name` property is carried over.
    ///
    /// # Errors
    /// `Error::CrsMismatch` if the collection cannot be reprojected.
    pub fn from_features(fc: &FeatureCollection, grid_crs: Option<&CRS>) -> Result<Vec<PourPoint>> {
        let projected = reproject_collection(fc, grid_crs)?;
        let points = projected
            .iter()
            .filter_map(|f| {
                let Some(Geometry::Point(p)) = &f.geometry else {
                    return None;
                };
                let mut pp = PourPoint::map(p.x(), p.y());
                pp.name = f
                    .get_property("name")
                    .and_then(AttributeValue::as_str)
                    .map(str::to_string);
                Some(pp)
            })
            .collect();
        Ok(points)
    }
}

/// How the pour points of a run are chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PourPointSource {
    /// Caller-supplied points
    Explicit { points: Vec<PourPoint> },
    /// The downstream end of every stream segment of at least `min_order`
    SegmentOutlets { min_order: u8 },
    /// Every cell without a receiver
    AllOutlets,
}

impl Default for PourPointSource {
    fn default() -> Self {
        PourPointSource::SegmentOutlets { min_order: 1 }
    }
}

impl PourPointSource {
    /// Materialize the pour points for a direction grid and its network
    pub fn resolve(&self, fdir: &Raster<u8>, network: Option<&StreamNetwork>) -> Vec<PourPoint> {
        match self {
            PourPointSource::Explicit { points } => points.clone(),
            PourPointSource::SegmentOutlets { min_order } => network
                .map(|net| {
                    net.segments
                        .iter()
                        .filter(|s| s.order >= *min_order)
                        .map(|s| PourPoint::cell(s.mouth.0, s.mouth.1).named(format!("segment {}", s.id)))
                        .collect()
                })
                .unwrap_or_default(),
            PourPointSource::AllOutlets => find_outlets(fdir)
                .into_iter()
                .map(|o| PourPoint::cell(o.row, o.col))
                .collect(),
        }
    }
}

/// Parameters for [`delineate_watersheds`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatershedParams {
    /// Basins with fewer cells are dropped and their cells unlabelled
    pub min_cells: usize,
}

impl Default for WatershedParams {
    fn default() -> Self {
        Self { min_cells: 100 }
    }
}

/// Why a pour point produced no basin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    OutsideGrid,
    NoData,
    /// Same cell as the pour point at `first`
    Duplicate { first: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPourPoint {
    /// Position in the input list
    pub index: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A delineated basin
#[derive(Debug, Clone, PartialEq)]
pub struct Watershed {
    pub id: i32,
    pub boundary: MultiPolygon<f64>,
    pub pour_cell: (usize, usize),
    /// Pour point cell center in map coordinates
    pub pour_xy: (f64, f64),
    pub name: Option<String>,
    pub cell_count: usize,
    /// Map units squared
    pub area: f64,
}

impl Watershed {
    pub fn to_feature(&self) -> Feature {
        let mut f = Feature::new(self.boundary.clone())
            .with("basin_id", self.id as i64)
            .with("pour_row", self.pour_cell.0)
            .with("pour_col", self.pour_cell.1)
            .with("pour_x", self.pour_xy.0)
            .with("pour_y", self.pour_xy.1)
            .with("cell_count", self.cell_count)
            .with("area", self.area);
        if let Some(name) = &self.name {
            f.set_property("name", name.as_str());
        }
        f
    }
}

/// Delineation result
#[derive(Debug, Clone)]
pub struct WatershedSet {
    /// Basin id per cell, 0 = unlabelled
    pub labels: Raster<i32>,
    pub basins: Vec<Watershed>,
    pub skipped: Vec<SkippedPourPoint>,
    /// Basins removed by `min_cells`
    pub dropped: usize,
}

impl WatershedSet {
    pub fn is_empty(&self) -> bool {
        self.basins.is_empty()
    }

    pub fn to_features(&self, crs: Option<&CRS>) -> FeatureCollection {
        let mut fc = FeatureCollection::new(crs.cloned());
        for b in &self.basins {
            fc.push(b.to_feature());
        }
        fc
    }
}

/// Watershed delineation algorithm
#[derive(Debug, Clone, Default)]
pub struct WatershedDelineator;

impl Algorithm for WatershedDelineator {
    type Input = (Raster<u8>, Vec<PourPoint>);
    type Output = WatershedSet;
    type Params = WatershedParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Watershed"
    }

    fn description(&self) -> &'static str {
        "Delineate disjoint basins upstream of pour points"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        delineate_watersheds(&input.0, &input.1, &params)
    }
}

/// Label every cell draining to one of `seeds` with that seed's id.
///
/// Seeds are `(row, col, id)` with distinct cells and positive ids.
///
/// # Errors
/// `Error::IndexOutOfBounds` for a seed outside the grid and
/// `Error::InvalidParameter` for a non-positive id.
pub fn label_watersheds(fdir: &Raster<u8>, seeds: &[(usize, usize, i32)]) -> Result<Raster<i32>> {
    let (rows, cols) = fdir.shape();
    let mut basins = vec![0i32; rows * cols];
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for &(row, col, id) in seeds {
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfBounds { row, col, rows, cols });
        }
        if id <= 0 {
            return Err(Error::InvalidParameter {
                name: "seed id",
                value: id.to_string(),
                reason: "must be positive".into(),
            });
        }
        basins[row * cols + col] = id;
        queue.push_back((row, col));
    }

    // A neighbor drains into (row, col) if its direction is the opposite of
    // the direction from (row, col) to it
    while let Some((row, col)) = queue.pop_front() {
        let basin_id = basins[row * cols + col];
        for &code in &d8::CODES {
            let Some((nr, nc)) = d8::neighbor(row, col, code, rows, cols) else {
                continue;
            };
            if basins[nr * cols + nc] != 0 {
                continue;
            }
            if unsafe { fdir.get_unchecked(nr, nc) } == d8::opposite(code) {
                basins[nr * cols + nc] = basin_id;
                queue.push_back((nr, nc));
            }
        }
    }

    fdir.with_vec(basins, Some(0))
}

/// Delineate one basin per usable pour point.
///
/// Pour points outside the grid, on nodata, or on a cell already taken by
/// an earlier pour point are skipped with a warning. Ids follow the input
/// order of the accepted points, starting at 1.
pub fn delineate_watersheds(
    fdir: &Raster<u8>,
    pour_points: &[PourPoint],
    params: &WatershedParams,
) -> Result<WatershedSet> {
    let mut seeds: Vec<(usize, usize, i32)> = Vec::new();
    let mut names: HashMap<i32, Option<String>> = HashMap::new();
    let mut taken: HashMap<(usize, usize), usize> = HashMap::new();
    let mut skipped = Vec::new();

    for (index, pp) in pour_points.iter().enumerate() {
        let reason = match pp.resolve(fdir) {
            None => Some(SkipReason::OutsideGrid),
            Some((r, c)) if unsafe { fdir.get_unchecked(r, c) } == d8::NODATA => Some(SkipReason::NoData),
            Some(cell) => match taken.get(&cell) {
                Some(&first) => Some(SkipReason::Duplicate { first }),
                None => {
                    taken.insert(cell, index);
                    let id = seeds.len() as i32 + 1;
                    seeds.push((cell.0, cell.1, id));
                    names.insert(id, pp.name.clone());
                    None
                }
            },
        };
        if let Some(reason) = reason {
            warn!(index, ?reason, "skipping pour point");
            skipped.push(SkippedPourPoint { index, reason });
        }
    }

    let mut labels = label_watersheds(fdir, &seeds)?;

    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for &id in labels.data().iter().filter(|&&id| id > 0) {
        *counts.entry(id).or_insert(0) += 1;
    }
    let small: HashSet<i32> = counts
        .iter()
        .filter(|&(_, &n)| n < params.min_cells)
        .map(|(&id, _)| id)
        .collect();
    if !small.is_empty() {
        labels
            .data_mut()
            .mapv_inplace(|id| if small.contains(&id) { 0 } else { id });
    }

    let mut boundaries = polygonize(&labels);
    let cell_area = fdir.cell_area();
    let basins: Vec<Watershed> = seeds
        .iter()
        .filter(|(_, _, id)| !small.contains(id))
        .map(|&(row, col, id)| {
            let cell_count = counts.get(&id).copied().unwrap_or(0);
            Watershed {
                id,
                boundary: boundaries.remove(&id).unwrap_or_else(|| MultiPolygon::new(vec![])),
                pour_cell: (row, col),
                pour_xy: fdir.pixel_to_geo(col, row),
                name: names.remove(&id).flatten(),
                cell_count,
                area: cell_count as f64 * cell_area,
            }
        })
        .collect();

    debug!(
        basins = basins.len(),
        dropped = small.len(),
        skipped = skipped.len(),
        "delineated watersheds"
    );

    Ok(WatershedSet {
        labels,
        basins,
        skipped,
        dropped: small.len(),
    })
}

/// Pour point of a basin as a point feature
pub fn pour_point_feature(basin: &Watershed) -> Feature {
    Feature::new(Point::new(basin.pour_xy.0, basin.pour_xy.1))
        .with("basin_id", basin.id as i64)
        .with("cell_count", basin.cell_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::flow_direction;
    use approx::assert_relative_eq;
    use geo::Area;
    use rillmap_core::GeoTransform;

    fn dem(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0));
        dem.set_nodata(Some(-9999.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    fn no_min() -> WatershedParams {
        WatershedParams { min_cells: 0 }
    }

    #[test]
    fn test_watershed_from_pour_point() {
        // 5x5 DEM sloping south: the bottom-center cell drains its column
        let fdir = flow_direction(&dem(5, 5, |row, _| (5 - row) as f64 * 10.0)).unwrap();
        let set = delineate_watersheds(&fdir, &[PourPoint::cell(4, 2)], &no_min()).unwrap();

        assert_eq!(set.basins.len(), 1);
        let basin = &set.basins[0];
        assert_eq!(basin.id, 1);
        assert_eq!(basin.cell_count, 5);
        assert_eq!(set.labels.get(2, 2).unwrap(), 1);
        assert_eq!(set.labels.get(2, 1).unwrap(), 0);
        assert_relative_eq!(basin.area, 500.0);
        assert_relative_eq!(basin.boundary.unsigned_area(), basin.area);
    }

    #[test]
    fn test_nested_pour_points_are_disjoint() {
        let fdir = flow_direction(&dem(5, 5, |row, _| (5 - row) as f64 * 10.0)).unwrap();
        let pps = [PourPoint::cell(4, 2), PourPoint::cell(2, 2)];
        let set = delineate_watersheds(&fdir, &pps, &no_min()).unwrap();

        assert_eq!(set.basins[0].cell_count, 2);
        assert_eq!(set.basins[1].cell_count, 3);
        assert_eq!(set.labels.get(0, 2).unwrap(), 2);
        assert_eq!(set.labels.get(3, 2).unwrap(), 1);
    }

    #[test]
    fn test_two_basins_across_ridge() {
        let fdir = flow_direction(&dem(5, 7, |_, col| 10.0 - (col as f64 - 3.0).abs())).unwrap();
        let set = delineate_watersheds(
            &fdir,
            &PourPointSource::AllOutlets.resolve(&fdir, None),
            &no_min(),
        )
        .unwrap();

        let left = set.labels.get(2, 0).unwrap();
        let right = set.labels.get(2, 6).unwrap();
        assert!(left > 0 && right > 0);
        assert_ne!(left, right);
        // Every valid cell reaches some outlet
        assert!(set.labels.data().iter().all(|&id| id > 0));
    }

    #[test]
    fn test_skipped_pour_points() {
        let mut fdir = flow_direction(&dem(5, 5, |row, _| (5 - row) as f64 * 10.0)).unwrap();
        fdir.set(0, 0, d8::NODATA).unwrap();
        let pps = [
            PourPoint::cell(4, 2),
            PourPoint::cell(9, 9),
            PourPoint::cell(0, 0),
            PourPoint::map(25.0, 5.0),
        ];
        let set = delineate_watersheds(&fdir, &pps, &no_min()).unwrap();

        assert_eq!(set.basins.len(), 1);
        let reasons: Vec<_> = set.skipped.iter().map(|s| (s.index, s.reason.clone())).collect();
        assert_eq!(
            reasons,
            vec![
                (1, SkipReason::OutsideGrid),
                (2, SkipReason::NoData),
                (3, SkipReason::Duplicate { first: 0 }),
            ]
        );
    }

    #[test]
    fn test_min_cells_drops_small_basins() {
        let fdir = flow_direction(&dem(5, 5, |row, _| (5 - row) as f64 * 10.0)).unwrap();
        let pps = [PourPoint::cell(4, 2), PourPoint::cell(4, 3)];
        let set = delineate_watersheds(&fdir, &pps, &WatershedParams { min_cells: 6 }).unwrap();

        assert!(set.is_empty());
        assert_eq!(set.dropped, 2);
        assert!(set.labels.data().iter().all(|&id| id == 0));
    }

    #[test]
    fn test_min_cells_keeps_large_basins() {
        let fdir = flow_direction(&dem(5, 5, |row, _| (5 - row) as f64 * 10.0)).unwrap();
        let pps = [PourPoint::cell(4, 2), PourPoint::cell(2, 3)];
        let set = delineate_watersheds(&fdir, &pps, &WatershedParams { min_cells: 4 }).unwrap();

        assert_eq!(set.dropped, 1);
        assert_eq!(set.basins.len(), 1);
        assert_eq!(set.basins[0].id, 1);
        assert_eq!(set.labels.get(0, 2).unwrap(), 1);
        assert!(set.labels.data().iter().all(|&id| id == 0 || id == 1));
    }

    #[test]
    fn test_label_watersheds_rejects_bad_seeds() {
        let fdir = flow_direction(&dem(3, 3, |row, _| (3 - row) as f64)).unwrap();
        assert!(matches!(
            label_watersheds(&fdir, &[(3, 1, 1)]),
            Err(Error::IndexOutOfBounds { row: 3, col: 1, .. })
        ));
        assert!(matches!(
            label_watersheds(&fdir, &[(2, 1, 0)]),
            Err(Error::InvalidParameter { .. })
        ));
        let labels = label_watersheds(&fdir, &[(2, 1, 7)]).unwrap();
        assert_eq!(labels.get(0, 1).unwrap(), 7);
    }

    #[test]
    fn test_segment_outlets_need_a_network() {
        let fdir = flow_direction(&dem(3, 3, |row, _| (3 - row) as f64)).unwrap();
        let source = PourPointSource::SegmentOutlets { min_order: 1 };
        assert!(source.resolve(&fdir, None).is_empty());
    }

    #[test]
    fn test_features_carry_attributes() {
        let fdir = flow_direction(&dem(5, 5, |row, _| (5 - row) as f64 * 10.0)).unwrap();
        let pps = [PourPoint::cell(4, 2).named("gauge")];
        let set = delineate_watersheds(&fdir, &pps, &no_min()).unwrap();
        let fc = set.to_features(None);

        assert_eq!(fc.len(), 1);
        let f = &fc.features[0];
        assert_eq!(f.get_property("name").and_then(|v| v.as_str()), Some("gauge"));
        assert_eq!(f.get_property("cell_count").and_then(|v| v.as_f64()), Some(5.0));
        assert_eq!(pour_point_feature(&set.basins[0]).get_property("basin_id"), Some(&AttributeValue::Int(1)));
    }
}
