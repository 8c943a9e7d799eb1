use capalloc_types::{CandidateState, PortfolioModel};

/// Net spread income of a balance vector
#[derive(Debug, Clone)]
pub struct ObjectiveEvaluator {
    spreads: Vec<f64>,
}

impl ObjectiveEvaluator {
    pub fn new(portfolio: &PortfolioModel) -> Self {
        ObjectiveEvaluator {
            spreads: portfolio.unit_spreads(),
        }
    }

    /// Σ balance_i * spread_bps_i / 10000
    pub fn profitability(&self, state: &CandidateState) -> f64 {
        state.weighted_sum(&self.spreads)
    }

    /// Constant gradient of profitability
    pub fn gradient(&self) -> &[f64] {
        &self.spreads
    }

    /// Largest absolute unit spread
    pub fn max_abs_spread(&self) -> f64 {
        self.spreads.iter().fold(0.0, |m, c| m.max(c.abs()))
    }
}
