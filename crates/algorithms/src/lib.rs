//! # rillmap algorithms
//!
//! The analysis stages of rillmap, from a raw elevation grid to drainage
//! and flood-risk layers.
//!
//! ## Modules
//!
//! - **hydrology**: conditioning, depression resolution, D8 routing,
//!   accumulation, stream networks and watersheds
//! - **terrain**: slope and topographic wetness
//! - **statistics**: focal windows and zonal aggregates
//! - **vector**: polygonize, rasterize, simplify, reproject
//! - **flood**: evidence layers and the weighted risk composite
//! - **summary**: per-boundary statistics of the derived layers
//! - **pipeline**: all stages in order with a run report

pub mod flood;
pub mod hydrology;
mod maybe_rayon;
pub mod pipeline;
pub mod statistics;
pub mod summary;
pub mod terrain;
pub mod vector;

pub use pipeline::{run_pipeline, PipelineConfig, PipelineInputs, PipelineOutput, RunReport, Warning};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::flood::{
        composite_flood_risk, EvidenceLayer, FloodRisk, RiskClass, RiskClassification, RiskInputs, RiskParams,
        RiskWeights,
    };
    pub use crate::hydrology::{
        condition_dem, delineate_watersheds, extract_stream_network, flow_accumulation, flow_direction,
        resolve_depressions, ConditionParams, PourPoint, PourPointSource, ResolveMode, ResolveParams,
        StreamNetwork, StreamParams, StreamThresholds, WatershedParams, WatershedSet,
    };
    pub use crate::pipeline::{run_pipeline, PipelineConfig, PipelineInputs, PipelineOutput, RunReport};
    pub use crate::summary::{summarize_by_boundary, BoundarySummary, SummaryLayers};
    pub use crate::terrain::{slope, twi, SlopeParams, SlopeUnits};
    pub use rillmap_core::prelude::*;
}
