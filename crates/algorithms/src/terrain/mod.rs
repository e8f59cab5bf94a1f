//! Terrain derivatives used by the flood risk compositor
//!
//! - Slope: central-difference or Horn gradient magnitude
//! - TWI: Topographic Wetness Index from accumulation and slope

mod slope;
mod twi;

pub use slope::{slope, Slope, SlopeMethod, SlopeParams, SlopeUnits};
pub use twi::{twi, MIN_TAN_SLOPE};
