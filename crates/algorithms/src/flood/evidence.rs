//! External inundation evidence
//!
//! Observed flooding (for example water masks from radar imagery) enters
//! the composite as a 0-1 factor on the DEM grid. An evidence layer that
//! holds nothing is not an error: it simply does not contribute.

use rillmap_core::crs::CRS;
use rillmap_core::raster::Raster;
use rillmap_core::vector::FeatureCollection;
use rillmap_core::{Error, Result};
use tracing::debug;

use crate::vector::{rasterize_mask, reproject_collection};

/// Evidence of past inundation
#[derive(Debug, Clone)]
pub enum EvidenceLayer {
    /// Values on the DEM grid; positive means flooded or flood-prone
    Raster(Raster<f64>),
    /// Flooded areas; cells whose center falls inside are flagged
    Polygons(FeatureCollection),
}

impl EvidenceLayer {
    pub fn is_empty(&self) -> bool {
        match self {
            EvidenceLayer::Raster(r) => r.is_empty(),
            EvidenceLayer::Polygons(fc) => fc.is_empty(),
        }
    }
}

fn ensure_same_crs(layer: Option<&CRS>, grid: Option<&CRS>) -> Result<()> {
    match (layer, grid) {
        (Some(a), Some(b)) if !a.is_equivalent(b) => Err(Error::CrsMismatch(a.identifier(), b.identifier())),
        _ => Ok(()),
    }
}

/// Evidence as a raw factor on the grid of `dem`.
///
/// Returns `None` when there is nothing to contribute: a collection without
/// features or a layer with no positive cell on the grid. Nodata cells of
/// `dem` are NaN.
///
/// # Errors
/// `Error::CrsMismatch` when polygons cannot be reprojected to the grid CRS
/// or a raster layer is in a different CRS. `Error::SizeMismatch` when a
/// raster layer is not on the DEM grid.
pub fn evidence_factor(layer: &EvidenceLayer, dem: &Raster<f64>) -> Result<Option<Raster<f64>>> {
    let values: Vec<f64> = match layer {
        EvidenceLayer::Raster(r) => {
            ensure_same_crs(r.crs(), dem.crs())?;
            dem.ensure_same_shape(r)?;
            r.data()
                .iter()
                .map(|&v| if r.is_nodata(v) { 0.0 } else { v.max(0.0) })
                .collect()
        }
        EvidenceLayer::Polygons(fc) => {
            if fc.is_empty() {
                debug!("evidence collection has no features");
                return Ok(None);
            }
            let projected = reproject_collection(fc, dem.crs())?;
            let mask = rasterize_mask(projected.iter().filter_map(|f| f.geometry.as_ref()), dem);
            mask.data().iter().map(|&m| f64::from(m)).collect()
        }
    };

    let values: Vec<f64> = values
        .into_iter()
        .zip(dem.data().iter())
        .map(|(v, &z)| if dem.is_nodata(z) { f64::NAN } else { v })
        .collect();

    let positive = values.iter().filter(|v| **v > 0.0).count();
    if positive == 0 {
        debug!("evidence layer has no positive cell on the grid");
        return Ok(None);
    }
    debug!(cells = positive, "evidence cells on the grid");

    dem.with_vec(values, Some(f64::NAN)).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Rect;
    use rillmap_core::vector::Feature;
    use rillmap_core::GeoTransform;

    fn dem() -> Raster<f64> {
        let mut dem = Raster::filled(10, 10, 5.0);
        dem.set_transform(GeoTransform::new(500_000.0, 4_000_100.0, 10.0, -10.0));
        dem.set_crs(Some(CRS::from_epsg(32643)));
        dem.set_nodata(Some(-9999.0));
        dem
    }

    #[test]
    fn test_empty_collection_is_absent() {
        let fc = FeatureCollection::new(Some(CRS::from_epsg(32643)));
        assert!(evidence_factor(&EvidenceLayer::Polygons(fc), &dem()).unwrap().is_none());
    }

    #[test]
    fn test_polygons_outside_grid_are_absent() {
        let mut fc = FeatureCollection::new(Some(CRS::from_epsg(32643)));
        fc.push(Feature::new(Rect::new((0.0, 0.0), (10.0, 10.0))));
        assert!(evidence_factor(&EvidenceLayer::Polygons(fc), &dem()).unwrap().is_none());
    }

    #[test]
    fn test_polygons_are_burned() {
        let mut fc = FeatureCollection::new(Some(CRS::from_epsg(32643)));
        fc.push(Feature::new(Rect::new((500_000.0, 4_000_080.0), (500_020.0, 4_000_100.0))));
        let mut dem = dem();
        dem.set(0, 0, -9999.0).unwrap();

        let factor = evidence_factor(&EvidenceLayer::Polygons(fc), &dem).unwrap().unwrap();
        assert!(factor.get(0, 0).unwrap().is_nan());
        assert_eq!(factor.get(1, 1).unwrap(), 1.0);
        assert_eq!(factor.get(2, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_unreprojectable_polygons_fail() {
        let mut fc = FeatureCollection::new(Some(CRS::from_epsg(2193)));
        fc.push(Feature::new(Rect::new((0.0, 0.0), (10.0, 10.0))));
        assert!(matches!(
            evidence_factor(&EvidenceLayer::Polygons(fc), &dem()),
            Err(Error::CrsMismatch(_, _))
        ));
    }

    #[test]
    fn test_raster_evidence() {
        let dem = dem();
        let mut ev = dem.clone();
        ev.data_mut().fill(0.0);
        assert!(evidence_factor(&EvidenceLayer::Raster(ev.clone()), &dem).unwrap().is_none());

        ev.set(4, 4, 3.0).unwrap();
        let factor = evidence_factor(&EvidenceLayer::Raster(ev), &dem).unwrap().unwrap();
        assert_eq!(factor.get(4, 4).unwrap(), 3.0);

        let mut other = dem.clone();
        other.set_crs(Some(CRS::from_epsg(32644)));
        assert!(matches!(
            evidence_factor(&EvidenceLayer::Raster(other), &dem),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
