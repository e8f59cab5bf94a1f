//! # rillmap core
//!
//! Shared types for the rillmap terrain-hydrology engine:
//! - `Raster<T>`: georeferenced grid, row-major, with nodata metadata
//! - `GeoTransform`: affine georeferencing
//! - `CRS` and `CoordinateTransform`: reference systems and point transforms
//! - `raster::d8`: flow direction encoding and tie-break order
//! - `vector`: features exchanged with collaborators
//! - `io`: GeoTIFF and GeoJSON
//! - `Error`: the failure taxonomy shared by every stage

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{CoordinateTransform, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CoordinateTransform, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{d8, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
    pub use crate::Algorithm;
}

/// A pipeline stage with typed input, output and parameters.
///
/// Stages take their input by shared reference and allocate their output,
/// so one stage's result can be handed to several consumers.
pub trait Algorithm {
    type Input;
    type Output;
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
