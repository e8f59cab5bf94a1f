//! Flood risk compositing
//!
//! - Evidence: external inundation layers brought onto the DEM grid
//! - Composite: weighted factor blend, classification and risk zones

mod composite;
mod evidence;

pub use composite::{
    composite_flood_risk, ponding_zones, FactorFlags, FloodRisk, FloodRiskCompositor, RiskClass, RiskClassification,
    RiskFactor, RiskInputs, RiskParams, RiskThresholds, RiskWeights, RiskZone,
};
pub use evidence::{evidence_factor, EvidenceLayer};
