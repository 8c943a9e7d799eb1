use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Decision vector: one balance per line item, in portfolio order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateState {
    balances: Vec<f64>,
}

impl CandidateState {
    pub fn new(balances: Vec<f64>) -> Self {
        CandidateState { balances }
    }

    /// Number of line items covered
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.balances.get(idx).copied()
    }

    pub fn balances(&self) -> &[f64] {
        &self.balances
    }

    /// Inner product with a per-item coefficient vector
    pub fn weighted_sum(&self, coeffs: &[f64]) -> f64 {
        self.balances
            .iter()
            .zip(coeffs.iter())
            .map(|(x, c)| x * c)
            .sum()
    }

    /// Check every balance is finite
    pub fn is_finite(&self) -> bool {
        self.balances.iter().all(|x| x.is_finite())
    }

    /// Largest absolute per-item difference to another state
    pub fn max_abs_diff(&self, other: &CandidateState) -> f64 {
        self.balances
            .iter()
            .zip(other.balances.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl Index<usize> for CandidateState {
    type Output = f64;

    fn index(&self, idx: usize) -> &f64 {
        &self.balances[idx]
    }
}

impl From<Vec<f64>> for CandidateState {
    fn from(balances: Vec<f64>) -> Self {
        CandidateState::new(balances)
    }
}
