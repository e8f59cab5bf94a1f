//! End-to-end run from a raw DEM to every derived layer
//!
//! Stages run in order and each one borrows the output of the previous
//! stage. Recoverable conditions (breach fallbacks, an empty network, absent
//! risk factors, skipped pour points) are collected as [`Warning`]s in the
//! [`RunReport`]; everything else aborts the run with an error.

use std::collections::BTreeMap;
use std::path::Path;

use rillmap_core::raster::Raster;
use rillmap_core::vector::FeatureCollection;
use rillmap_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::flood::{
    composite_flood_risk, EvidenceLayer, FactorFlags, FloodRisk, RiskFactor, RiskInputs, RiskParams, RiskThresholds,
};
use crate::hydrology::{
    condition_dem, delineate_watersheds, extract_stream_network, flow_accumulation, flow_direction,
    resolve_depressions, sink_summary, ConditionParams, ConditionedDem, ConditioningReport, DerivedThresholds,
    PourPoint, PourPointSource, ResolutionStats, ResolveParams, ResolvedDem, SinkSummary, SkipReason,
    StreamNetwork, StreamParams, WatershedParams, WatershedSet,
};
use crate::summary::{summarize_by_boundary, BoundarySummary, SummaryLayers};

/// Parameters of every stage, loadable from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub condition: ConditionParams,
    pub resolve: ResolveParams,
    pub streams: StreamParams,
    /// Used when no pour point features are supplied
    pub pour_points: PourPointSource,
    pub watersheds: WatershedParams,
    pub risk: RiskParams,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Other(format!("invalid pipeline config: {e}")))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Other(format!("cannot serialize pipeline config: {e}")))
    }
}

/// Optional vector and evidence inputs
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    /// Point features; overrides the configured pour point source
    pub pour_points: Option<FeatureCollection>,
    pub evidence: Option<EvidenceLayer>,
    /// Polygons to summarize the layers by
    pub boundaries: Option<FeatureCollection>,
}

/// A recoverable condition met during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Breach searches that failed and were filled instead
    ResolutionFallback { cells: usize },
    /// Cells left as explicit sinks
    UnresolvedSinks { cells: usize },
    /// No cell exceeded the channel initiation threshold
    EmptyNetwork { initiation_threshold: f64, max_accumulation: f64 },
    FactorAbsent { factor: RiskFactor },
    PourPointSkipped {
        index: usize,
        #[serde(flatten)]
        reason: SkipReason,
    },
    /// Nothing to delineate basins from
    NoPourPoints,
}

/// Machine-readable account of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub conditioning: ConditioningReport,
    pub resolution: ResolutionStats,
    pub sinks: SinkSummary,
    pub thresholds: DerivedThresholds,
    pub segments_by_order: BTreeMap<u8, usize>,
    pub basins: usize,
    pub basins_dropped: usize,
    pub factors: FactorFlags,
    pub risk_thresholds: RiskThresholds,
    /// Low, medium and high cell counts
    pub risk_class_cells: [usize; 3],
    pub risk_zones: usize,
    pub summaries: Vec<BoundarySummary>,
    pub warnings: Vec<Warning>,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub conditioned: ConditionedDem,
    pub resolved: ResolvedDem,
    pub flow_direction: Raster<u8>,
    pub accumulation: Raster<f64>,
    pub network: StreamNetwork,
    pub watersheds: WatershedSet,
    pub risk: FloodRisk,
    pub report: RunReport,
}

/// Run every stage on a raw DEM.
///
/// # Errors
/// Any stage error: `Error::Conditioning` for unusable input,
/// `Error::Resolution` for a failed resolution or a cyclic flow graph,
/// `Error::Threshold` for a degenerate accumulation grid, and
/// `Error::CrsMismatch` when vector inputs cannot be brought onto the grid.
pub fn run_pipeline(raw_dem: &Raster<f64>, inputs: &PipelineInputs, config: &PipelineConfig) -> Result<PipelineOutput> {
    let mut warnings = Vec::new();

    info!("conditioning elevation grid");
    let conditioned = condition_dem(raw_dem, &config.condition)?;

    info!("resolving depressions");
    let resolved = resolve_depressions(&conditioned.dem, &config.resolve)?;
    if resolved.stats.fallbacks > 0 {
        warnings.push(Warning::ResolutionFallback {
            cells: resolved.stats.fallbacks,
        });
    }
    if resolved.stats.unresolved > 0 {
        warnings.push(Warning::UnresolvedSinks {
            cells: resolved.stats.unresolved,
        });
    }

    info!("routing flow");
    let fdir = flow_direction(&resolved.dem)?;
    let accumulation = flow_accumulation(&fdir)?;
    let sinks = sink_summary(&fdir);

    info!("extracting stream network");
    let network = extract_stream_network(&fdir, &accumulation, &config.streams)?;
    if network.is_empty() {
        warn!(
            threshold = network.thresholds.initiation(),
            "stream network is empty"
        );
        warnings.push(Warning::EmptyNetwork {
            initiation_threshold: network.thresholds.initiation(),
            max_accumulation: network.thresholds.max_accumulation,
        });
    }

    info!("delineating watersheds");
    let pour_points: Vec<PourPoint> = match &inputs.pour_points {
        Some(fc) => PourPoint::from_features(fc, fdir.crs())?,
        None => config.pour_points.resolve(&fdir, Some(&network)),
    };
    if pour_points.is_empty() {
        warn!("no pour points to delineate watersheds from");
        warnings.push(Warning::NoPourPoints);
    }
    let watersheds = delineate_watersheds(&fdir, &pour_points, &config.watersheds)?;
    warnings.extend(watersheds.skipped.iter().map(|s| Warning::PourPointSkipped {
        index: s.index,
        reason: s.reason.clone(),
    }));

    info!("compositing flood risk");
    let risk = composite_flood_risk(
        RiskInputs {
            dem: &resolved.dem,
            accumulation: &accumulation,
            depressions: Some(&resolved.depressions),
            evidence: inputs.evidence.as_ref(),
        },
        &config.risk,
    )?;
    warnings.extend(risk.factors.absent().into_iter().map(|factor| Warning::FactorAbsent { factor }));

    let summaries = match &inputs.boundaries {
        Some(boundaries) => {
            info!("summarizing by boundary");
            summarize_by_boundary(
                boundaries,
                fdir.crs(),
                &SummaryLayers {
                    streams: Some(&network),
                    watersheds: Some(&watersheds),
                    risk: Some(&risk),
                },
            )?
        }
        None => Vec::new(),
    };

    let report = RunReport {
        conditioning: conditioned.report,
        resolution: resolved.stats,
        sinks,
        thresholds: network.thresholds.clone(),
        segments_by_order: network.count_by_order(),
        basins: watersheds.basins.len(),
        basins_dropped: watersheds.dropped,
        factors: risk.factors,
        risk_thresholds: risk.thresholds,
        risk_class_cells: risk.class_counts(),
        risk_zones: risk.zones.len(),
        summaries,
        warnings,
    };
    info!(
        segments = network.len(),
        basins = report.basins,
        warnings = report.warnings.len(),
        "pipeline finished"
    );

    Ok(PipelineOutput {
        conditioned,
        resolved,
        flow_direction: fdir,
        accumulation,
        network,
        watersheds,
        risk,
        report,
    })
}
