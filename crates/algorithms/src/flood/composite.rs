//! Weighted flood risk composite
//!
//! Up to four factors are normalized to 0-1 over the valid cells and
//! blended with weights renormalized over the factors that contribute:
//!
//! | Factor | Source |
//! |---|---|
//! | wetness | Topographic Wetness Index |
//! | depression | focal density of resolver depression cells |
//! | ponding | lowest elevations that are also nearly flat |
//! | evidence | external inundation layer |
//!
//! A factor contributes when it was provided and has at least one positive
//! normalized cell. The score is then split into low, medium and high
//! classes, and the medium and high classes are polygonized into zones.

use std::fmt;

use geo::{Area, Polygon};
use rillmap_core::crs::CRS;
use rillmap_core::raster::Raster;
use rillmap_core::vector::{Feature, FeatureCollection};
use rillmap_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::evidence::{evidence_factor, EvidenceLayer};
use crate::maybe_rayon::*;
use crate::statistics::depression_density;
use crate::terrain::{slope, twi, SlopeParams, SlopeUnits};
use crate::vector::polygonize;

/// One input of the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    Wetness,
    Depression,
    Ponding,
    Evidence,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 4] = [
        RiskFactor::Wetness,
        RiskFactor::Depression,
        RiskFactor::Ponding,
        RiskFactor::Evidence,
    ];
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskFactor::Wetness => "wetness",
            RiskFactor::Depression => "depression",
            RiskFactor::Ponding => "ponding",
            RiskFactor::Evidence => "evidence",
        };
        f.write_str(name)
    }
}

/// Which factors contributed to a composite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorFlags {
    pub wetness: bool,
    pub depression: bool,
    pub ponding: bool,
    pub evidence: bool,
}

impl FactorFlags {
    pub fn contains(&self, factor: RiskFactor) -> bool {
        match factor {
            RiskFactor::Wetness => self.wetness,
            RiskFactor::Depression => self.depression,
            RiskFactor::Ponding => self.ponding,
            RiskFactor::Evidence => self.evidence,
        }
    }

    fn set(&mut self, factor: RiskFactor) {
        match factor {
            RiskFactor::Wetness => self.wetness = true,
            RiskFactor::Depression => self.depression = true,
            RiskFactor::Ponding => self.ponding = true,
            RiskFactor::Evidence => self.evidence = true,
        }
    }

    pub fn present(&self) -> Vec<RiskFactor> {
        RiskFactor::ALL.into_iter().filter(|f| self.contains(*f)).collect()
    }

    pub fn absent(&self) -> Vec<RiskFactor> {
        RiskFactor::ALL.into_iter().filter(|f| !self.contains(*f)).collect()
    }
}

/// Factor weights before renormalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub wetness: f64,
    pub depression: f64,
    pub ponding: f64,
    pub evidence: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            wetness: 0.4,
            depression: 0.15,
            ponding: 0.15,
            evidence: 0.3,
        }
    }
}

impl RiskWeights {
    pub fn get(&self, factor: RiskFactor) -> f64 {
        match factor {
            RiskFactor::Wetness => self.wetness,
            RiskFactor::Depression => self.depression,
            RiskFactor::Ponding => self.ponding,
            RiskFactor::Evidence => self.evidence,
        }
    }

    fn validate(&self) -> Result<()> {
        for factor in RiskFactor::ALL {
            let w = self.get(factor);
            if !(w.is_finite() && w >= 0.0) {
                return Err(Error::InvalidParameter {
                    name: "weights",
                    value: format!("{factor} = {w}"),
                    reason: "weights must be finite and non-negative".into(),
                });
            }
        }
        Ok(())
    }

    /// Weights of the contributing factors scaled to sum to 1; the rest 0.
    pub fn renormalized(&self, flags: &FactorFlags) -> RiskWeights {
        let pick = |f: RiskFactor| if flags.contains(f) { self.get(f) } else { 0.0 };
        let total: f64 = RiskFactor::ALL.into_iter().map(pick).sum();
        let scale = if total > 0.0 { 1.0 / total } else { 0.0 };
        RiskWeights {
            wetness: pick(RiskFactor::Wetness) * scale,
            depression: pick(RiskFactor::Depression) * scale,
            ponding: pick(RiskFactor::Ponding) * scale,
            evidence: pick(RiskFactor::Evidence) * scale,
        }
    }
}

/// How scores map to classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskClassification {
    /// Percentiles (0-100) of the valid scores
    Percentile { medium: f64, high: f64 },
    /// Absolute score thresholds
    Fixed { medium: f64, high: f64 },
}

impl Default for RiskClassification {
    fn default() -> Self {
        RiskClassification::Percentile {
            medium: 70.0,
            high: 85.0,
        }
    }
}

impl RiskClassification {
    fn validate(&self) -> Result<()> {
        let (medium, high, upper) = match *self {
            RiskClassification::Percentile { medium, high } => (medium, high, 100.0),
            RiskClassification::Fixed { medium, high } => (medium, high, f64::INFINITY),
        };
        if !(medium.is_finite() && high.is_finite() && 0.0 <= medium && medium <= high && high <= upper) {
            return Err(Error::InvalidParameter {
                name: "classification",
                value: format!("{self:?}"),
                reason: "thresholds must satisfy 0 <= medium <= high".into(),
            });
        }
        Ok(())
    }
}

/// Risk class codes stored in the class raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl RiskClass {
    pub const NODATA: i8 = -1;

    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(RiskClass::Low),
            1 => Some(RiskClass::Medium),
            2 => Some(RiskClass::High),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskClass::Low => "low",
            RiskClass::Medium => "medium",
            RiskClass::High => "high",
        }
    }
}

/// Parameters for [`composite_flood_risk`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    pub weights: RiskWeights,
    pub classification: RiskClassification,
    pub slope: SlopeParams,
    /// Half width of the depression density window, in cells
    pub depression_radius: usize,
    /// Elevation percentile below which a flat cell may pond
    pub ponding_percentile: f64,
    /// Maximum slope in degrees of a ponding cell
    pub ponding_max_slope: f64,
    /// Zones smaller than this (map units squared) are dropped
    pub min_zone_area: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            classification: RiskClassification::default(),
            slope: SlopeParams::default(),
            depression_radius: 3,
            ponding_percentile: 10.0,
            ponding_max_slope: 1.0,
            min_zone_area: 1000.0,
        }
    }
}

/// Inputs of the compositor, all on one grid
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs<'a> {
    /// Depression-resolved elevation
    pub dem: &'a Raster<f64>,
    /// D8 accumulation in cells
    pub accumulation: &'a Raster<f64>,
    /// Resolver depression mask
    pub depressions: Option<&'a Raster<u8>>,
    pub evidence: Option<&'a EvidenceLayer>,
}

/// Score thresholds that split the classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
}

/// A connected area of one risk class
#[derive(Debug, Clone, PartialEq)]
pub struct RiskZone {
    pub class: RiskClass,
    pub geometry: Polygon<f64>,
    /// Map units squared
    pub area: f64,
}

/// Compositor output
#[derive(Debug, Clone)]
pub struct FloodRisk {
    /// Slope in degrees
    pub slope: Raster<f64>,
    pub twi: Raster<f64>,
    /// Composite score in 0-1, NaN nodata
    pub score: Raster<f64>,
    /// [`RiskClass`] codes, -1 nodata
    pub classes: Raster<i8>,
    pub factors: FactorFlags,
    /// Weights actually applied
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
    pub zones: Vec<RiskZone>,
}

impl FloodRisk {
    /// Cell counts of the low, medium and high classes
    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for &c in self.classes.data().iter() {
            if let Some(class) = RiskClass::from_code(c) {
                counts[class as usize] += 1;
            }
        }
        counts
    }

    pub fn zones_to_features(&self, crs: Option<&CRS>) -> FeatureCollection {
        let mut fc = FeatureCollection::new(crs.cloned());
        for zone in &self.zones {
            fc.push(
                Feature::new(zone.geometry.clone())
                    .with("risk_level", i64::from(zone.class.code()))
                    .with("risk_label", zone.class.label())
                    .with("area_m2", zone.area)
                    .with("area_hectares", zone.area / 10_000.0)
                    .with("wetness_weight", self.weights.wetness)
                    .with("depression_weight", self.weights.depression)
                    .with("ponding_weight", self.weights.ponding)
                    .with("evidence_weight", self.weights.evidence),
            );
        }
        fc
    }
}

/// Flood risk compositor
#[derive(Debug, Clone, Default)]
pub struct FloodRiskCompositor;

impl Algorithm for FloodRiskCompositor {
    type Input = (Raster<f64>, Raster<f64>, Option<Raster<u8>>, Option<EvidenceLayer>);
    type Output = FloodRisk;
    type Params = RiskParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flood Risk"
    }

    fn description(&self) -> &'static str {
        "Composite wetness, depression, ponding and evidence factors into risk classes"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (dem, accumulation, depressions, evidence) = input;
        composite_flood_risk(
            RiskInputs {
                dem: &dem,
                accumulation: &accumulation,
                depressions: depressions.as_ref(),
                evidence: evidence.as_ref(),
            },
            &params,
        )
    }
}

/// Linear interpolation percentile (0-100) of sorted values
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn sorted_valid(raster: &Raster<f64>) -> Vec<f64> {
    let mut values: Vec<f64> = raster.data().iter().copied().filter(|v| !raster.is_nodata(*v)).collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Min-max normalization over valid cells. A constant factor is all 0.
fn normalize(raster: &Raster<f64>) -> Result<Raster<f64>> {
    let (min, max) = raster
        .data()
        .iter()
        .filter(|v| !raster.is_nodata(**v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f64::NAN
            } else if range > 0.0 {
                ((v - min) / range).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();
    raster.with_vec(data, Some(f64::NAN))
}

/// Cells in the lowest `percentile` of elevation with slope below
/// `max_slope` degrees, as 1/0 with NaN nodata.
pub fn ponding_zones(
    dem: &Raster<f64>,
    slope_deg: &Raster<f64>,
    elevation_percentile: f64,
    max_slope: f64,
) -> Result<Raster<f64>> {
    dem.ensure_same_shape(slope_deg)?;
    let cutoff = percentile(&sorted_valid(dem), elevation_percentile);

    let data: Vec<f64> = dem
        .data()
        .iter()
        .zip(slope_deg.data().iter())
        .map(|(&z, &s)| {
            if dem.is_nodata(z) {
                f64::NAN
            } else if z <= cutoff && !slope_deg.is_nodata(s) && s < max_slope {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    dem.with_vec(data, Some(f64::NAN))
}

/// Composite flood risk from terrain factors and optional evidence.
///
/// Missing or empty evidence is never an error; the factor is simply left
/// out of [`FactorFlags`] and its weight goes to the others. When no factor
/// contributes at all, every valid cell scores 0 and is classed low.
///
/// # Errors
/// `Error::CrsMismatch` if the evidence cannot be brought onto the grid,
/// `Error::SizeMismatch` if the rasters disagree in shape, and
/// `Error::InvalidParameter` for negative weights or inverted thresholds.
pub fn composite_flood_risk(inputs: RiskInputs<'_>, params: &RiskParams) -> Result<FloodRisk> {
    params.weights.validate()?;
    params.classification.validate()?;
    let dem = inputs.dem;
    dem.ensure_same_shape(inputs.accumulation)?;

    let slope_params = SlopeParams {
        units: SlopeUnits::Degrees,
        ..params.slope.clone()
    };
    let slope_deg = slope(dem, &slope_params)?;
    let wetness = twi(inputs.accumulation, &slope_deg, dem.cell_size())?;

    let mut raw: Vec<(RiskFactor, Raster<f64>)> = vec![(RiskFactor::Wetness, normalize(&wetness)?)];
    if let Some(depressions) = inputs.depressions {
        let density = depression_density(depressions, dem, params.depression_radius)?;
        raw.push((RiskFactor::Depression, normalize(&density)?));
    }
    raw.push((
        RiskFactor::Ponding,
        ponding_zones(dem, &slope_deg, params.ponding_percentile, params.ponding_max_slope)?,
    ));
    if let Some(layer) = inputs.evidence
        && let Some(ev) = evidence_factor(layer, dem)?
    {
        raw.push((RiskFactor::Evidence, normalize(&ev)?));
    }

    let mut flags = FactorFlags::default();
    let factors: Vec<(RiskFactor, Raster<f64>)> = raw
        .into_iter()
        .filter(|(_, r)| r.data().iter().any(|v| *v > 0.0))
        .collect();
    for (factor, _) in &factors {
        flags.set(*factor);
    }
    for factor in flags.absent() {
        warn!(%factor, "risk factor absent from composite");
    }

    let weights = params.weights.renormalized(&flags);
    let (rows, cols) = dem.shape();

    let score_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let z = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(z) {
                    continue;
                }
                *out = factors
                    .iter()
                    .map(|(factor, r)| {
                        let v = unsafe { r.get_unchecked(row, col) };
                        if v.is_finite() { weights.get(*factor) * v } else { 0.0 }
                    })
                    .sum();
            }
            row_data
        })
        .collect();
    let score = dem.with_vec(score_data, Some(f64::NAN))?;

    let thresholds = match params.classification {
        RiskClassification::Percentile { medium, high } => {
            let sorted = sorted_valid(&score);
            RiskThresholds {
                medium: percentile(&sorted, medium),
                high: percentile(&sorted, high),
            }
        }
        RiskClassification::Fixed { medium, high } => RiskThresholds { medium, high },
    };

    // Zero scores carry no risk signal and stay low even when a percentile
    // threshold collapses to 0
    let class_data: Vec<i8> = score
        .data()
        .iter()
        .map(|&s| {
            if s.is_nan() {
                RiskClass::NODATA
            } else if s > 0.0 && s >= thresholds.high {
                RiskClass::High.code()
            } else if s > 0.0 && s >= thresholds.medium {
                RiskClass::Medium.code()
            } else {
                RiskClass::Low.code()
            }
        })
        .collect();
    let classes = dem.with_vec(class_data, Some(RiskClass::NODATA))?;

    let zones = risk_zones(&classes, params.min_zone_area)?;

    debug!(
        factors = ?flags.present(),
        medium = thresholds.medium,
        high = thresholds.high,
        zones = zones.len(),
        "composited flood risk"
    );

    Ok(FloodRisk {
        slope: slope_deg,
        twi: wetness,
        score,
        classes,
        factors: flags,
        weights,
        thresholds,
        zones,
    })
}

/// Connected medium and high areas of at least `min_area`, high first.
fn risk_zones(classes: &Raster<i8>, min_area: f64) -> Result<Vec<RiskZone>> {
    let labels: Vec<i32> = classes
        .data()
        .iter()
        .map(|&c| if c >= RiskClass::Medium.code() { i32::from(c) } else { 0 })
        .collect();
    let labels = classes.with_vec(labels, Some(0))?;

    let mut polygons_by_class = polygonize(&labels);
    let mut zones = Vec::new();
    for class in [RiskClass::High, RiskClass::Medium] {
        let polygons = polygons_by_class.remove(&i32::from(class.code()));
        for polygon in polygons.into_iter().flat_map(|mp| mp.0) {
            let area = polygon.unsigned_area();
            if area > min_area {
                zones.push(RiskZone {
                    class,
                    geometry: polygon,
                    area,
                });
            }
        }
    }
    Ok(zones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rillmap_core::vector::FeatureCollection;
    use rillmap_core::GeoTransform;

    fn grid(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut r = Raster::new(rows, cols);
        r.set_transform(GeoTransform::new(0.0, rows as f64 * 30.0, 30.0, -30.0));
        r.set_nodata(Some(-9999.0));
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, f(row, col)).unwrap();
            }
        }
        r
    }

    /// A V-shaped valley draining south, with matching accumulation
    fn valley() -> (Raster<f64>, Raster<f64>) {
        let dem = grid(20, 20, |row, col| 100.0 - row as f64 + (col as f64 - 10.0).abs() * 2.0);
        let acc = grid(20, 20, |row, col| if col == 10 { (row + 1) as f64 * 20.0 } else { 1.0 });
        (dem, acc)
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&v, 50.0), 3.0);
        assert_relative_eq!(percentile(&v, 70.0), 3.8);
        assert_relative_eq!(percentile(&v, 100.0), 5.0);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_renormalized_weights() {
        let flags = FactorFlags {
            wetness: true,
            ponding: true,
            ..Default::default()
        };
        let w = RiskWeights::default().renormalized(&flags);
        assert_relative_eq!(w.wetness, 0.4 / 0.55);
        assert_relative_eq!(w.ponding, 0.15 / 0.55);
        assert_eq!(w.evidence, 0.0);
        assert_relative_eq!(w.wetness + w.depression + w.ponding + w.evidence, 1.0);
    }

    #[test]
    fn test_empty_evidence_is_flagged_absent() {
        let (dem, acc) = valley();
        let evidence = EvidenceLayer::Polygons(FeatureCollection::new(None));
        let inputs = RiskInputs {
            dem: &dem,
            accumulation: &acc,
            depressions: None,
            evidence: Some(&evidence),
        };
        let risk = composite_flood_risk(inputs, &RiskParams::default()).unwrap();

        assert!(risk.factors.wetness);
        assert!(!risk.factors.evidence);
        assert!(!risk.factors.depression);
        assert_eq!(risk.weights.evidence, 0.0);
        let [low, medium, high] = risk.class_counts();
        assert_eq!(low + medium + high, 400);
        assert!(high > 0);
        // The channel is the wettest place
        assert_eq!(risk.classes.get(19, 10).unwrap(), RiskClass::High.code());
    }

    #[test]
    fn test_scores_in_unit_range_with_nodata() {
        let (mut dem, acc) = valley();
        dem.set(0, 0, -9999.0).unwrap();
        let risk = composite_flood_risk(
            RiskInputs {
                dem: &dem,
                accumulation: &acc,
                depressions: None,
                evidence: None,
            },
            &RiskParams::default(),
        )
        .unwrap();

        assert!(risk.score.get(0, 0).unwrap().is_nan());
        assert_eq!(risk.classes.get(0, 0).unwrap(), RiskClass::NODATA);
        for &s in risk.score.data().iter().filter(|s| !s.is_nan()) {
            assert!((0.0..=1.0 + 1e-12).contains(&s));
        }
    }

    #[test]
    fn test_evidence_raises_risk() {
        let (dem, acc) = valley();
        let mut ev = dem.clone();
        ev.data_mut().fill(0.0);
        for row in 0..4 {
            for col in 0..4 {
                ev.set(row, col, 1.0).unwrap();
            }
        }
        let evidence = EvidenceLayer::Raster(ev);
        let params = RiskParams::default();
        let base = composite_flood_risk(
            RiskInputs { dem: &dem, accumulation: &acc, depressions: None, evidence: None },
            &params,
        )
        .unwrap();
        let with = composite_flood_risk(
            RiskInputs { dem: &dem, accumulation: &acc, depressions: None, evidence: Some(&evidence) },
            &params,
        )
        .unwrap();

        assert!(with.factors.evidence);
        assert!(with.score.get(1, 1).unwrap() > base.score.get(1, 1).unwrap());
    }

    #[test]
    fn test_fixed_classification_and_zones() {
        let (dem, acc) = valley();
        let params = RiskParams {
            classification: RiskClassification::Fixed { medium: 0.0, high: 0.0 },
            min_zone_area: 0.0,
            ..Default::default()
        };
        let risk = composite_flood_risk(
            RiskInputs { dem: &dem, accumulation: &acc, depressions: None, evidence: None },
            &params,
        )
        .unwrap();

        // Every positive score is high
        let positive = risk.score.data().iter().filter(|s| **s > 0.0).count();
        assert_eq!(risk.class_counts()[2], positive);
        assert!(risk.zones.iter().all(|z| z.class == RiskClass::High));
        let zone_area: f64 = risk.zones.iter().map(|z| z.area).sum();
        assert_relative_eq!(zone_area, positive as f64 * 900.0, epsilon = 1e-6);

        let fc = risk.zones_to_features(None);
        assert_eq!(fc.len(), risk.zones.len());
    }

    #[test]
    fn test_flat_grid_has_no_contributing_factor() {
        let dem = grid(6, 6, |_, _| 10.0);
        let acc = grid(6, 6, |_, _| 1.0);
        let params = RiskParams {
            ponding_percentile: 0.0,
            ..Default::default()
        };
        let risk = composite_flood_risk(
            RiskInputs { dem: &dem, accumulation: &acc, depressions: None, evidence: None },
            &params,
        )
        .unwrap();

        // Constant wetness normalizes to 0; every cell is at the 0th
        // percentile elevation and flat, so only ponding contributes
        assert!(!risk.factors.wetness);
        assert!(risk.factors.ponding);
        assert_relative_eq!(risk.weights.ponding, 1.0);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let (dem, acc) = valley();
        let params = RiskParams {
            classification: RiskClassification::Percentile { medium: 90.0, high: 80.0 },
            ..Default::default()
        };
        let inputs = RiskInputs { dem: &dem, accumulation: &acc, depressions: None, evidence: None };
        assert!(matches!(
            composite_flood_risk(inputs, &params),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
