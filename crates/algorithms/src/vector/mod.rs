//! Vector helpers shared by the extraction stages
//!
//! - Polygonize: labelled raster regions to multipolygons
//! - Simplify: Douglas-Peucker without self-intersections
//! - Reproject: geometries and feature collections between CRSs
//! - Rasterize: polygons to label or mask grids by cell center

mod polygonize;
mod rasterize;
mod reproject;
mod simplify;

pub use polygonize::polygonize;
pub use rasterize::{rasterize_labels, rasterize_mask};
pub use reproject::{reproject_collection, reproject_geometry, to_wgs84};
pub use simplify::{is_simple, simplify_line};
