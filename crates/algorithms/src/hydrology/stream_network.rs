//! Stream network extraction
//!
//! Channel cells are found by thresholding flow accumulation. The threshold
//! adapts to the drainage area of the grid: each tier is the larger of a
//! fixed cell-count floor and a fraction of the maximum accumulation, so a
//! small test grid and a continental DEM both produce a sensible network.
//! The first tier initiates channels; the higher tiers classify channel
//! cells and segments by contributing area.

use crate::maybe_rayon::*;
use rillmap_core::raster::Raster;
use rillmap_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One adaptive threshold: `max(floor, max_acc * fraction)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTier {
    /// Minimum threshold in cells
    pub floor: f64,
    /// Fraction of the maximum accumulation
    pub fraction: f64,
}

impl ThresholdTier {
    pub const fn new(floor: f64, fraction: f64) -> Self {
        Self { floor, fraction }
    }
}

/// Ordered set of threshold tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamThresholds {
    tiers: Vec<ThresholdTier>,
}

impl Default for StreamThresholds {
    fn default() -> Self {
        Self {
            tiers: vec![
                ThresholdTier::new(10.0, 0.04),
                ThresholdTier::new(50.0, 0.20),
                ThresholdTier::new(100.0, 0.40),
                ThresholdTier::new(500.0, 0.80),
            ],
        }
    }
}

impl StreamThresholds {
    /// Build a validated tier set.
    ///
    /// # Errors
    /// `Error::InvalidParameter` when there are no tiers, a value is
    /// negative or non-finite, fractions do not strictly increase, or
    /// floors decrease.
    pub fn new(tiers: Vec<ThresholdTier>) -> Result<Self> {
        let t = Self { tiers };
        t.validate()?;
        Ok(t)
    }

    pub fn tiers(&self) -> &[ThresholdTier] {
        &self.tiers
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidParameter {
            name: "stream_thresholds",
            value: format!("{:?}", self.tiers),
            reason: reason.to_string(),
        };

        if self.tiers.is_empty() {
            return Err(invalid("at least one tier is required"));
        }
        for tier in &self.tiers {
            if !(tier.floor.is_finite() && tier.floor >= 0.0) {
                return Err(invalid("floors must be finite and non-negative"));
            }
            if !(tier.fraction.is_finite() && tier.fraction > 0.0 && tier.fraction <= 1.0) {
                return Err(invalid("fractions must lie in (0, 1]"));
            }
        }
        for pair in self.tiers.windows(2) {
            if pair[1].fraction <= pair[0].fraction {
                return Err(invalid("fractions must strictly increase"));
            }
            if pair[1].floor < pair[0].floor {
                return Err(invalid("floors must not decrease"));
            }
        }
        Ok(())
    }

    /// Resolve the tiers against the maximum accumulation of a grid.
    ///
    /// # Errors
    /// `Error::Threshold` for a non-finite or non-positive `max_acc`, and
    /// `Error::InvalidParameter` for an invalid tier set.
    pub fn derive(&self, max_acc: f64) -> Result<DerivedThresholds> {
        self.validate()?;
        if !(max_acc.is_finite() && max_acc > 0.0) {
            return Err(Error::Threshold(format!(
                "maximum flow accumulation must be positive and finite, got {}",
                max_acc
            )));
        }

        let values = self
            .tiers
            .iter()
            .map(|t| t.floor.max(max_acc * t.fraction))
            .collect();
        Ok(DerivedThresholds {
            max_accumulation: max_acc,
            values,
        })
    }
}

/// Thresholds in cells for one grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedThresholds {
    pub max_accumulation: f64,
    /// Non-decreasing, one per tier
    pub values: Vec<f64>,
}

impl DerivedThresholds {
    /// Channel initiation threshold
    pub fn initiation(&self) -> f64 {
        self.values[0]
    }

    /// Number of thresholds that `acc` strictly exceeds
    pub fn tier(&self, acc: f64) -> u8 {
        self.values.iter().take_while(|&&t| acc > t).count() as u8
    }
}

/// Largest finite accumulation value, if any
pub fn max_accumulation(acc: &Raster<f64>) -> Option<f64> {
    acc.data()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |m, v| Some(m.map_or(v, |m: f64| m.max(v))))
}

/// Classify channel cells: 1 where `acc > initiation threshold`, else 0.
pub fn stream_mask(acc: &Raster<f64>, thresholds: &DerivedThresholds) -> Result<Raster<u8>> {
    let (rows, cols) = acc.shape();
    let t1 = thresholds.initiation();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let a = unsafe { acc.get_unchecked(row, col) };
                    u8::from(a.is_finite() && a > t1)
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    acc.with_vec(data, None)
}

/// Accumulation tier of every cell (0 below the initiation threshold).
pub fn accumulation_tiers(acc: &Raster<f64>, thresholds: &DerivedThresholds) -> Result<Raster<u8>> {
    let (rows, cols) = acc.shape();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let a = unsafe { acc.get_unchecked(row, col) };
                    if a.is_finite() { thresholds.tier(a) } else { 0 }
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    acc.with_vec(data, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_tiers_scale_with_area() {
        let t = StreamThresholds::default();

        let small = t.derive(100.0).unwrap();
        assert_eq!(small.values, vec![10.0, 50.0, 100.0, 500.0]);

        let large = t.derive(100_000.0).unwrap();
        assert_relative_eq!(large.values[0], 4_000.0);
        assert_relative_eq!(large.values[3], 80_000.0);
    }

    #[test]
    fn test_tier_counts_exceeded_thresholds() {
        let d = StreamThresholds::default().derive(1000.0).unwrap();
        // 40, 200, 400, 800
        assert_eq!(d.tier(40.0), 0);
        assert_eq!(d.tier(41.0), 1);
        assert_eq!(d.tier(450.0), 3);
        assert_eq!(d.tier(1000.0), 4);
    }

    #[test]
    fn test_degenerate_max_is_threshold_error() {
        let t = StreamThresholds::default();
        assert!(matches!(t.derive(0.0), Err(Error::Threshold(_))));
        assert!(matches!(t.derive(f64::NAN), Err(Error::Threshold(_))));
        assert!(matches!(t.derive(-3.0), Err(Error::Threshold(_))));
    }

    #[test]
    fn test_tiers_must_increase() {
        let err = StreamThresholds::new(vec![
            ThresholdTier::new(10.0, 0.2),
            ThresholdTier::new(50.0, 0.2),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(StreamThresholds::new(vec![]).is_err());
    }

    #[test]
    fn test_mask_and_tiers() {
        let acc = Raster::from_vec(vec![1.0, 11.0, 60.0, f64::NAN], 2, 2).unwrap();
        let d = StreamThresholds::default().derive(60.0).unwrap();
        let mask = stream_mask(&acc, &d).unwrap();
        assert_eq!(mask.data().iter().copied().collect::<Vec<_>>(), vec![0, 1, 1, 0]);

        let tiers = accumulation_tiers(&acc, &d).unwrap();
        assert_eq!(tiers.get(1, 0).unwrap(), 2);
        assert_eq!(max_accumulation(&acc), Some(60.0));
    }
}
