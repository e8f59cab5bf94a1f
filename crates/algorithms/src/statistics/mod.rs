//! Window and zone statistics
//!
//! - **focal**: moving window statistics and depression density
//! - **zonal**: per-zone statistics of a value raster

pub mod focal;
pub mod zonal;

pub use focal::{depression_density, focal_statistics, FocalParams, FocalStatistic};
pub use zonal::{zonal_statistics, ZonalResult};
