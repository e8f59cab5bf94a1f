//! Geometry reprojection between the supported reference systems

use geo::{Coord, Geometry, MapCoords};
use rillmap_core::crs::{CoordinateTransform, CRS};
use rillmap_core::vector::FeatureCollection;
use rillmap_core::{Error, Result};

/// Apply a point transform to every coordinate of a geometry
pub fn reproject_geometry(geometry: &Geometry<f64>, transform: &CoordinateTransform) -> Geometry<f64> {
    if transform.is_identity() {
        return geometry.clone();
    }
    geometry.map_coords(|c| {
        let (x, y) = transform.transform(c.x, c.y);
        Coord { x, y }
    })
}

/// Reproject a collection into `target`.
///
/// A collection without a CRS is taken to be in `target` already and is
/// returned unchanged.
///
/// # Errors
/// `Error::CrsMismatch` when no transform exists between the two systems,
/// including a collection with a CRS and a target without one.
pub fn reproject_collection(fc: &FeatureCollection, target: Option<&CRS>) -> Result<FeatureCollection> {
    let (from, to) = match (fc.crs.as_ref(), target) {
        (Some(from), Some(to)) => (from, to),
        (Some(from), None) => return Err(Error::CrsMismatch(from.identifier(), "undefined".to_string())),
        (None, _) => {
            let mut out = fc.clone();
            out.crs = target.cloned();
            return Ok(out);
        }
    };

    let transform = CoordinateTransform::new(from, to)?;
    let mut out = FeatureCollection::new(Some(to.clone()));
    for feature in fc.iter() {
        let mut f = feature.clone();
        f.geometry = feature
            .geometry
            .as_ref()
            .map(|g| reproject_geometry(g, &transform));
        out.push(f);
    }
    Ok(out)
}

/// Copy of `fc` in geographic WGS84 coordinates
pub fn to_wgs84(fc: &FeatureCollection) -> Result<FeatureCollection> {
    reproject_collection(fc, Some(&CRS::wgs84()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::point;
    use rillmap_core::vector::Feature;

    #[test]
    fn test_utm_collection_to_wgs84() {
        let mut fc = FeatureCollection::new(Some(CRS::from_epsg(32630)));
        // Roughly Madrid in UTM 30N
        fc.push(Feature::new(point!(x: 440_298.0, y: 4_474_257.0)).with("name", "madrid"));

        let out = to_wgs84(&fc).unwrap();
        assert_eq!(out.crs, Some(CRS::wgs84()));
        let Some(Geometry::Point(p)) = &out.features[0].geometry else {
            panic!("expected a point");
        };
        assert_relative_eq!(p.x(), -3.7038, epsilon = 1e-3);
        assert_relative_eq!(p.y(), 40.4168, epsilon = 1e-3);
        assert_eq!(
            out.features[0].get_property("name").and_then(|v| v.as_str()),
            Some("madrid")
        );
    }

    #[test]
    fn test_missing_crs_is_passthrough() {
        let mut fc = FeatureCollection::new(None);
        fc.push(Feature::new(point!(x: 1.0, y: 2.0)));
        let out = reproject_collection(&fc, Some(&CRS::from_epsg(32643))).unwrap();
        assert_eq!(out.features, fc.features);
        assert_eq!(out.crs, Some(CRS::from_epsg(32643)));
    }

    #[test]
    fn test_crs_onto_undefined_target_is_mismatch() {
        let mut fc = FeatureCollection::new(Some(CRS::wgs84()));
        fc.push(Feature::new(point!(x: 75.0, y: 36.5)));
        assert!(matches!(
            reproject_collection(&fc, None),
            Err(Error::CrsMismatch(ref from, _)) if from == "EPSG:4326"
        ));
    }

    #[test]
    fn test_unsupported_pair_is_mismatch() {
        let fc = FeatureCollection::new(Some(CRS::from_epsg(2193)));
        assert!(matches!(
            reproject_collection(&fc, Some(&CRS::from_epsg(32643))),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
