//! Hydrological analysis from Digital Elevation Models
//!
//! - Condition: clamp implausible values, flag nodata
//! - Resolve: breach or fill depressions so every cell drains to an outlet
//! - Flow direction: D8 steepest descent
//! - Flow accumulation: contributing cell counts
//! - Stream network: scale-aware thresholds, Strahler order, vector segments
//! - Watershed: disjoint basins upstream of pour points

mod condition;
pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;
mod resolve;
mod stream_network;
mod stream_order;
mod stream_vector;
mod watershed;

pub use condition::{condition_dem, ConditionParams, ConditionedDem, Conditioner, ConditioningReport};
pub use flow_accumulation::{
    find_outlets, flow_accumulation, sink_summary, FlowAccumulation, Outlet, OutletKind, SinkSummary,
};
pub use flow_direction::{flow_direction, FlowDirection};
pub use resolve::{
    resolve_depressions, DepressionResolver, FallbackPolicy, ResolutionStats, ResolveMode, ResolveParams,
    ResolvedDem,
};
pub use stream_network::{
    accumulation_tiers, max_accumulation, stream_mask, DerivedThresholds, StreamThresholds, ThresholdTier,
};
pub use stream_order::strahler_order;
pub use stream_vector::{extract_stream_network, vectorize_streams, StreamNetwork, StreamParams, StreamSegment};
pub use watershed::{
    delineate_watersheds, label_watersheds, pour_point_feature, PourPoint, PourPointLocation, PourPointSource,
    SkipReason, SkippedPourPoint, Watershed, WatershedDelineator, WatershedParams, WatershedSet,
};
