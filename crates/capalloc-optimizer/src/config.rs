use capalloc_types::{CapAllocError, Result, DEFAULT_BALANCE_TOLERANCE};
use serde::{Deserialize, Serialize};

/// What to do when the baseline violates a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Fail with `InfeasibleStart` before iterating
    #[default]
    RequireFeasible,
    /// Start anyway and let the elastic subproblem restore feasibility
    Restore,
}

/// Parameters for the SQP loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub max_iterations: usize,
    /// Largest scaled constraint violation accepted as feasible
    pub feasibility_tolerance: f64,
    /// Predicted merit decrease, relative to 1 + |profitability|, treated as stationary
    pub optimality_tolerance: f64,
    /// Scaled step length treated as stationary
    pub step_tolerance: f64,
    /// Initial trust radius as a fraction of each item's scale
    pub initial_trust_radius: f64,
    pub min_trust_radius: f64,
    pub max_trust_radius: f64,
    pub line_search_max_steps: usize,
    /// Sufficient-decrease fraction of the predicted merit decrease
    pub armijo_fraction: f64,
    /// Proximal weight relative to the largest unit spread
    pub proximal_weight: f64,
    /// Initial penalty on elastic slacks; derived from the spreads when absent
    pub initial_penalty: Option<f64>,
    pub penalty_growth: f64,
    /// Cap on the penalty as a multiple of its initial value
    pub max_penalty_factor: f64,
    pub qp_max_iterations: u32,
    pub qp_tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            max_iterations: 200,
            feasibility_tolerance: 1e-7,
            optimality_tolerance: 1e-8,
            step_tolerance: 1e-9,
            initial_trust_radius: 0.5,
            min_trust_radius: 1e-10,
            max_trust_radius: 1e3,
            line_search_max_steps: 10,
            armijo_fraction: 1e-4,
            proximal_weight: 1e-4,
            initial_penalty: None,
            penalty_growth: 10.0,
            max_penalty_factor: 1e6,
            qp_max_iterations: 200,
            qp_tolerance: 1e-10,
        }
    }
}

impl SolverParams {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("feasibility_tolerance", self.feasibility_tolerance),
            ("optimality_tolerance", self.optimality_tolerance),
            ("step_tolerance", self.step_tolerance),
            ("initial_trust_radius", self.initial_trust_radius),
            ("min_trust_radius", self.min_trust_radius),
            ("max_trust_radius", self.max_trust_radius),
            ("armijo_fraction", self.armijo_fraction),
            ("qp_tolerance", self.qp_tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CapAllocError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.proximal_weight < 0.0 || !self.proximal_weight.is_finite() {
            return Err(CapAllocError::Config(format!(
                "proximal_weight must be non-negative, got {}",
                self.proximal_weight
            )));
        }
        if self.min_trust_radius > self.initial_trust_radius || self.initial_trust_radius > self.max_trust_radius {
            return Err(CapAllocError::Config(format!(
                "trust radii out of order: min {} initial {} max {}",
                self.min_trust_radius, self.initial_trust_radius, self.max_trust_radius
            )));
        }
        if self.armijo_fraction >= 1.0 {
            return Err(CapAllocError::Config(format!(
                "armijo_fraction must be below 1, got {}",
                self.armijo_fraction
            )));
        }
        if let Some(mu) = self.initial_penalty {
            if !(mu.is_finite() && mu > 0.0) {
                return Err(CapAllocError::Config(format!("initial_penalty must be positive, got {}", mu)));
            }
        }
        if !(self.penalty_growth > 1.0) || !(self.max_penalty_factor >= 1.0) {
            return Err(CapAllocError::Config(format!(
                "penalty_growth must exceed 1 and max_penalty_factor be at least 1, got {} / {}",
                self.penalty_growth, self.max_penalty_factor
            )));
        }
        if self.max_iterations == 0 || self.line_search_max_steps == 0 || self.qp_max_iterations == 0 {
            return Err(CapAllocError::Config(
                "iteration limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Thresholds for binding-constraint and marginal-product diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Binding if |slack| <= binding_epsilon * constraint scale
    pub binding_epsilon: f64,
    /// Marginal if strictly inside bounds by more than bound_epsilon * max(1, range)
    pub bound_epsilon: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        AnalysisParams {
            binding_epsilon: 1e-6,
            bound_epsilon: 1e-6,
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("binding_epsilon", self.binding_epsilon), ("bound_epsilon", self.bound_epsilon)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CapAllocError::Config(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Full run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub solver: SolverParams,
    pub analysis: AnalysisParams,
    pub start_policy: StartPolicy,
    /// Relative tolerance on the baseline balance-sheet identity
    pub balance_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            solver: SolverParams::default(),
            analysis: AnalysisParams::default(),
            start_policy: StartPolicy::default(),
            balance_tolerance: DEFAULT_BALANCE_TOLERANCE,
        }
    }
}

impl OptimizerConfig {
    pub fn with_start_policy(mut self, start_policy: StartPolicy) -> Self {
        self.start_policy = start_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        self.analysis.validate()?;
        if !(self.balance_tolerance.is_finite() && self.balance_tolerance >= 0.0) {
            return Err(CapAllocError::Config(format!(
                "balance_tolerance must be non-negative, got {}",
                self.balance_tolerance
            )));
        }
        Ok(())
    }
}
