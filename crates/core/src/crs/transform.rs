//! Pure-Rust point transforms between WGS84, UTM and Web Mercator.
//!
//! UTM uses the Snyder (1987, USGS Prof. Paper 1395) series for both
//! directions. Any pair of supported systems is chained through WGS84
//! geographic coordinates. Unsupported systems are a `CrsMismatch`: callers
//! comparing layers must not fall back to untransformed coordinates.

use super::CRS;
use crate::error::{Error, Result};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const E2: f64 = 2.0 * F - F * F;
const E_PRIME2: f64 = E2 / (1.0 - E2);
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, northern hemisphere
/// - EPSG 327xx → zone xx, southern hemisphere
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Projection {
    Geographic,
    WebMercator,
    Utm { zone: u32, north: bool },
}

impl Projection {
    fn from_crs(crs: &CRS) -> Option<Self> {
        match crs.epsg()? {
            4326 => Some(Projection::Geographic),
            3857 => Some(Projection::WebMercator),
            code => parse_utm_epsg(code).map(|(zone, north)| Projection::Utm { zone, north }),
        }
    }

    fn to_wgs84(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator => {
                let lon = (x / A).to_degrees();
                let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
                (lon, lat)
            }
            Projection::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }

    fn from_wgs84(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator => {
                let x = A * lon.to_radians();
                let y = A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
                (x, y)
            }
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        }
    }
}

/// Point transform between two coordinate reference systems.
#[derive(Debug, Clone)]
pub struct CoordinateTransform {
    source: Projection,
    target: Projection,
    identity: bool,
}

impl CoordinateTransform {
    /// Build a transform from `from` to `to`.
    ///
    /// Equivalent systems give an identity transform even when they are not
    /// otherwise supported (e.g. two identical WKT definitions).
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        let mismatch = || Error::CrsMismatch(from.identifier(), to.identifier());
        if from.is_equivalent(to) {
            return Ok(Self {
                source: Projection::Geographic,
                target: Projection::Geographic,
                identity: true,
            });
        }
        let source = Projection::from_crs(from).ok_or_else(mismatch)?;
        let target = Projection::from_crs(to).ok_or_else(mismatch)?;
        Ok(Self {
            source,
            target,
            identity: source == target,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transform one coordinate pair (x/easting/longitude first).
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.identity {
            return (x, y);
        }
        let (lon, lat) = self.source.to_wgs84(x, y);
        self.target.from_wgs84(lon, lat)
    }
}

// ── Core projection (Snyder 1987, pp. 61-64) ─────────────────────────────

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// WGS84 (longitude, latitude) degrees to UTM (easting, northing) metres.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// UTM (easting, northing) metres to WGS84 (longitude, latitude) degrees.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;

    // Footpoint latitude (Snyder eqs. 7-19, 3-24, 3-26)
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi = phi1.sin();
    let cos_phi = phi1.cos();
    let tan_phi = phi1.tan();

    let n1 = A / (1.0 - E2 * sin_phi * sin_phi).sqrt();
    let t1 = tan_phi * tan_phi;
    let c1 = E_PRIME2 * cos_phi * cos_phi;
    let r1 = A * (1.0 - E2) / (1.0 - E2 * sin_phi * sin_phi).powf(1.5);
    let d = x / (n1 * K0);
    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    // Snyder eqs. 8-17 and 8-18
    let lat = phi1
        - (n1 * tan_phi / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);
    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos_phi;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from the equator to `lat` radians (Snyder eq. 3-21)
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn parse_utm_zones() {
        assert_eq!(parse_utm_epsg(32643), Some((43, true)));
        assert_eq!(parse_utm_epsg(32721), Some((21, false)));
        assert_eq!(parse_utm_epsg(32600), None);
        assert_eq!(parse_utm_epsg(4326), None);
    }

    // pyproj: Transformer.from_crs(4326, 32630, always_xy=True)
    //   .transform(-3.7037, 40.4168) → (440298.94, 4474257.31)
    #[test]
    fn madrid_forward_and_back() {
        let t = CoordinateTransform::new(&CRS::wgs84(), &CRS::from_epsg(32630)).unwrap();
        let (e, n) = t.transform(-3.7037, 40.4168);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");

        let back = CoordinateTransform::new(&CRS::from_epsg(32630), &CRS::wgs84()).unwrap();
        let (lon, lat) = back.transform(e, n);
        assert_close(lon, -3.7037, 1e-6, "longitude");
        assert_close(lat, 40.4168, 1e-6, "latitude");
    }

    // pyproj: (-58.3816, -34.6037) → EPSG:32721 (373317.50, 6170036.17)
    #[test]
    fn southern_hemisphere_round_trip() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");

        let (lon, lat) = utm_to_wgs84(e, n, 21, false);
        assert_close(lon, -58.3816, 1e-6, "longitude");
        assert_close(lat, -34.6037, 1e-6, "latitude");
    }

    #[test]
    fn web_mercator_round_trip() {
        let t = CoordinateTransform::new(&CRS::from_epsg(32643), &CRS::web_mercator()).unwrap();
        let back = CoordinateTransform::new(&CRS::web_mercator(), &CRS::from_epsg(32643)).unwrap();
        let (x, y) = t.transform(610_000.0, 1_420_000.0);
        let (e, n) = back.transform(x, y);
        assert_close(e, 610_000.0, 1e-3, "easting");
        assert_close(n, 1_420_000.0, 1e-3, "northing");
    }

    #[test]
    fn identity_and_mismatch() {
        let t = CoordinateTransform::new(&CRS::from_epsg(32643), &CRS::from_epsg(32643)).unwrap();
        assert!(t.is_identity());
        assert_eq!(t.transform(1.0, 2.0), (1.0, 2.0));

        let err = CoordinateTransform::new(&CRS::from_epsg(2154), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(ref a, _) if a == "EPSG:2154"));

        let wkt = CRS::from_wkt("LOCAL_CS[\"site grid\"]");
        assert!(CoordinateTransform::new(&wkt, &CRS::from_epsg(32643)).is_err());
        assert!(CoordinateTransform::new(&wkt, &wkt.clone()).unwrap().is_identity());
    }
}
