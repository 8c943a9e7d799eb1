use capalloc_capital::{CapitalRequirementEngine, CapitalTierRequirement};
use capalloc_types::{CandidateState, ConstraintId, PortfolioModel, Side};
use nalgebra::DMatrix;

/// The balance-sheet identity followed by one capital inequality per
/// requirement.
///
/// Constraint 0 is `Σ assets - Σ liabilities = 0`. Constraint `k >= 1` is
/// `available_k - required_capital_k(x) >= 0` for requirement `k - 1`. Every
/// method is side-effect free.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    engine: CapitalRequirementEngine,
    signs: Vec<f64>,
    ids: Vec<ConstraintId>,
    scales: Vec<f64>,
}

impl ConstraintSet {
    pub fn new(portfolio: &PortfolioModel, engine: CapitalRequirementEngine) -> Self {
        let baseline = portfolio.baseline();
        let total_assets = portfolio.total(Side::Asset, baseline.balances());

        let mut ids = vec![ConstraintId::BalanceSheetIdentity];
        let mut scales = vec![total_assets.abs().max(1.0)];
        for req in engine.requirements() {
            ids.push(req.id());
            scales.push(req.available_capital.abs().max(1.0));
        }

        ConstraintSet {
            engine,
            signs: portfolio.side_signs(),
            ids,
            scales,
        }
    }

    pub fn engine(&self) -> &CapitalRequirementEngine {
        &self.engine
    }

    /// Number of constraints, identity included
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[ConstraintId] {
        &self.ids
    }

    /// Normalization scale per constraint
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn is_equality(&self, idx: usize) -> bool {
        idx == 0
    }

    /// Requirement behind constraint `idx`, if it is a capital inequality
    pub fn requirement(&self, idx: usize) -> Option<&CapitalTierRequirement> {
        idx.checked_sub(1)
            .and_then(|k| self.engine.requirements().get(k))
    }

    /// Identity residual followed by the capital surplus of each requirement
    pub fn evaluate(&self, state: &CandidateState) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.len());
        values.push(state.weighted_sum(&self.signs));
        for req in self.engine.requirements() {
            values.push(self.engine.capital_surplus(req, state));
        }
        values
    }

    /// Analytic gradient of every constraint, one row per constraint.
    ///
    /// For a capital inequality with exposure weights `w`, GSIB coefficients
    /// `h` and `β = gsib_sensitivity * sensitivity`:
    /// `∇g = -(ratio(x) * w + β * (w·x) * h)`.
    pub fn gradients(&self, state: &CandidateState) -> Vec<Vec<f64>> {
        let h = self.engine.gsib_coefficients();
        let mut rows = Vec::with_capacity(self.len());
        rows.push(self.signs.clone());

        for req in self.engine.requirements() {
            let w = self.engine.weights(req.basis);
            let ratio = self.engine.required_ratio(req, state);
            let exposure = self.engine.exposure(req.basis, state);
            let beta = self.curvature_weight(req);
            rows.push(
                w.iter()
                    .zip(h.iter())
                    .map(|(wi, hi)| -(ratio * wi + beta * exposure * hi))
                    .collect(),
            );
        }
        rows
    }

    /// Constant Hessian of constraint `idx`: `-β (h wᵀ + w hᵀ)`, zero for the identity
    pub fn hessian(&self, idx: usize) -> DMatrix<f64> {
        let n = self.signs.len();
        match self.requirement(idx) {
            Some(req) => {
                let beta = self.curvature_weight(req);
                -beta * self.symmetric_outer(req)
            }
            None => DMatrix::zeros(n, n),
        }
    }

    /// Hessian of the Lagrangian `-Σ λ_k ∇²g_k` for multipliers indexed like the constraints
    pub fn lagrangian_hessian(&self, multipliers: &[f64]) -> DMatrix<f64> {
        let n = self.signs.len();
        let mut hess = DMatrix::zeros(n, n);
        for (idx, lambda) in multipliers.iter().enumerate().skip(1) {
            if let Some(req) = self.requirement(idx) {
                let beta = self.curvature_weight(req);
                if beta != 0.0 && *lambda != 0.0 {
                    hess += (lambda * beta) * self.symmetric_outer(req);
                }
            }
        }
        hess
    }

    /// Violation of each constraint divided by its scale
    pub fn scaled_violations(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.scales.iter())
            .enumerate()
            .map(|(idx, (v, s))| {
                let raw = if self.is_equality(idx) { v.abs() } else { (-v).max(0.0) };
                raw / s
            })
            .collect()
    }

    /// Sum of scaled violations (the ℓ1 infeasibility)
    pub fn violation(&self, values: &[f64]) -> f64 {
        self.scaled_violations(values).iter().sum()
    }

    /// Largest scaled violation
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        self.scaled_violations(values).iter().fold(0.0, |m, v| m.max(*v))
    }

    /// Pair each value with its constraint id
    pub fn slacks(&self, values: &[f64]) -> Vec<(ConstraintId, f64)> {
        self.ids.iter().copied().zip(values.iter().copied()).collect()
    }

    fn curvature_weight(&self, req: &CapitalTierRequirement) -> f64 {
        req.gsib_sensitivity * self.engine.config().gsib.sensitivity
    }

    // h wᵀ + w hᵀ
    fn symmetric_outer(&self, req: &CapitalTierRequirement) -> DMatrix<f64> {
        let h = self.engine.gsib_coefficients();
        let w = self.engine.weights(req.basis);
        let n = h.len();
        DMatrix::from_fn(n, n, |i, j| h[i] * w[j] + w[i] * h[j])
    }
}
