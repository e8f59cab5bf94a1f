//! Coordinate reference systems and the transforms between them

mod transform;

pub use transform::{CoordinateTransform, parse_utm_epsg};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system, identified by EPSG code where known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    wkt: Option<String>,
    epsg: Option<u32>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    /// Parse the identifiers found in GeoJSON `crs` members and on the
    /// command line: `EPSG:32643`, `urn:ogc:def:crs:EPSG::32643`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` or a bare code.
    pub fn from_identifier(id: &str) -> Option<Self> {
        let id = id.trim();
        if id.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84")
            || id.eq_ignore_ascii_case("CRS84")
        {
            return Some(Self::wgs84());
        }
        let code = id
            .rsplit(':')
            .find(|part| !part.is_empty())?
            .parse::<u32>()
            .ok()?;
        let upper = id.to_ascii_uppercase();
        if upper.contains("EPSG") || !id.contains(':') {
            Some(Self::from_epsg(code))
        } else {
            None
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4326))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// Short identifier such as `EPSG:4326`
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", wkt.chars().take(50).collect::<String>());
        }
        "Unknown".to_string()
    }

    /// OGC URN form used by the GeoJSON `crs` member
    pub fn urn(&self) -> Option<String> {
        self.epsg.map(|code| format!("urn:ogc:def:crs:EPSG::{}", code))
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
