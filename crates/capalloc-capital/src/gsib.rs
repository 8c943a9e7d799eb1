use capalloc_types::{CapAllocError, Result};
use serde::{Deserialize, Serialize};

/// Continuous GSIB surcharge: `base_surcharge + sensitivity * score`.
///
/// The regulatory schedule is a step function of the score. The optimizer
/// only ever sees this straight line so that every capital constraint stays
/// differentiable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GsibConfig {
    /// Surcharge at a GSIB score of zero (ratio, e.g. 0.01 = 1%)
    pub base_surcharge: f64,
    /// Surcharge per unit of GSIB score
    pub sensitivity: f64,
}

impl GsibConfig {
    pub fn new(base_surcharge: f64, sensitivity: f64) -> Self {
        GsibConfig {
            base_surcharge,
            sensitivity,
        }
    }

    /// No surcharge at any score
    pub fn none() -> Self {
        GsibConfig::new(0.0, 0.0)
    }

    /// Linearized surcharge at a given score
    pub fn surcharge(&self, score: f64) -> f64 {
        self.base_surcharge + self.sensitivity * score
    }

    /// Straight line through two `(score, surcharge)` band boundary points.
    ///
    /// The resulting interpolation agrees with the step schedule exactly at
    /// both boundaries.
    pub fn through_band_boundaries(lower: (f64, f64), upper: (f64, f64)) -> Result<Self> {
        let (s0, c0) = lower;
        let (s1, c1) = upper;
        if ![s0, c0, s1, c1].iter().all(|v| v.is_finite()) {
            return Err(CapAllocError::Config(format!(
                "band boundaries must be finite: ({}, {}) ({}, {})",
                s0, c0, s1, c1
            )));
        }
        if s1 <= s0 {
            return Err(CapAllocError::Config(format!(
                "upper band score {} must exceed lower band score {}",
                s1, s0
            )));
        }

        let sensitivity = (c1 - c0) / (s1 - s0);
        Ok(GsibConfig::new(c0 - sensitivity * s0, sensitivity))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_surcharge.is_finite() || !self.sensitivity.is_finite() {
            return Err(CapAllocError::invalid_input(
                "gsib",
                format!("base_surcharge={} sensitivity={}", self.base_surcharge, self.sensitivity),
                "must be finite",
            ));
        }
        Ok(())
    }
}

impl Default for GsibConfig {
    fn default() -> Self {
        GsibConfig::none()
    }
}

/// One step of the surcharge schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurchargeBand {
    /// Lowest score that falls in this band
    pub score_floor: f64,
    pub surcharge: f64,
}

/// Discrete surcharge schedule, for diagnostics only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurchargeBands {
    bands: Vec<SurchargeBand>,
}

impl SurchargeBands {
    /// Bands must have strictly increasing floors and non-decreasing surcharges
    pub fn new(bands: Vec<SurchargeBand>) -> Result<Self> {
        if bands.is_empty() {
            return Err(CapAllocError::Config("surcharge schedule has no bands".to_string()));
        }
        for pair in bands.windows(2) {
            if pair[1].score_floor <= pair[0].score_floor || pair[1].surcharge < pair[0].surcharge {
                return Err(CapAllocError::Config(format!(
                    "surcharge bands out of order at score {}",
                    pair[1].score_floor
                )));
            }
        }
        Ok(SurchargeBands { bands })
    }

    /// Method-2 style schedule: 1.0% from a score of 130, then +0.5% every
    /// 100 points up to 4.5%.
    pub fn method_two() -> Self {
        let bands = (0..8)
            .map(|k| SurchargeBand {
                score_floor: 130.0 + 100.0 * k as f64,
                surcharge: 0.01 + 0.005 * k as f64,
            })
            .collect();
        SurchargeBands { bands }
    }

    pub fn bands(&self) -> &[SurchargeBand] {
        &self.bands
    }

    /// Surcharge of the highest band whose floor the score reaches, zero below the first band
    pub fn stepwise(&self, score: f64) -> f64 {
        self.bands
            .iter()
            .rev()
            .find(|band| score >= band.score_floor)
            .map(|band| band.surcharge)
            .unwrap_or(0.0)
    }

    /// Linearized minus stepwise surcharge at `score`
    pub fn interpolation_error(&self, gsib: &GsibConfig, score: f64) -> f64 {
        gsib.surcharge(score) - self.stepwise(score)
    }

    /// Line through the floors of bands `lower` and `upper`
    pub fn calibrate(&self, lower: usize, upper: usize) -> Result<GsibConfig> {
        let (a, b) = match (self.bands.get(lower), self.bands.get(upper)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(CapAllocError::Config(format!(
                    "band index out of range: {} / {} of {}",
                    lower,
                    upper,
                    self.bands.len()
                )))
            }
        };
        GsibConfig::through_band_boundaries(
            (a.score_floor, a.surcharge),
            (b.score_floor, b.surcharge),
        )
    }
}
