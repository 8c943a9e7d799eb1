use capalloc_types::{
    CandidateState, CapAllocError, ConstraintId, ExitStatus, FailureContext, LineItemId, Result, Side,
};
use serde::{Deserialize, Serialize};

/// How the SQP loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    Infeasible,
    MaxIterExceeded,
    Cancelled,
}

impl Termination {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Termination::Converged => ExitStatus::Success,
            Termination::Infeasible => ExitStatus::Infeasible,
            Termination::MaxIterExceeded => ExitStatus::NoConvergence,
            Termination::Cancelled => ExitStatus::Cancelled,
        }
    }
}

/// Final position of one line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemResult {
    pub id: LineItemId,
    pub side: Side,
    pub baseline_balance: f64,
    pub final_balance: f64,
    pub change: f64,
}

/// Slack of one constraint at the final state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSlack {
    pub id: ConstraintId,
    /// Identity residual, or available minus required capital
    pub slack: f64,
    pub scale: f64,
    pub binding: bool,
    /// Profit per unit of relaxation, from the last subproblem
    pub shadow_price: f64,
    pub required_capital: Option<f64>,
    pub available_capital: Option<f64>,
}

/// Diagnostic information from the solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub iterations: usize,
    pub qp_solves: usize,
    /// Interior-point iterations summed over all subproblems
    pub qp_iterations: usize,
    pub termination: Termination,
    /// Largest scaled constraint violation at the final state
    pub final_violation: f64,
    pub final_stationarity: f64,
    pub final_step_norm: f64,
    pub trust_radius: f64,
    pub penalty: f64,
    pub qp_status: String,
}

/// Outcome of one optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub status: ExitStatus,
    pub final_state: CandidateState,
    pub line_items: Vec<LineItemResult>,
    pub profitability: f64,
    pub baseline_profitability: f64,
    pub uplift: f64,
    /// Uplift relative to |baseline profitability|, in percent (0 when the baseline earns nothing)
    pub uplift_pct: f64,
    pub slacks: Vec<ConstraintSlack>,
    pub binding_constraints: Vec<ConstraintId>,
    pub marginal_products: Vec<LineItemId>,
    pub diagnostics: Diagnostics,
}

impl OptimizationResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn balance(&self, id: &str) -> Option<f64> {
        self.line_items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.final_balance)
    }

    pub fn slack(&self, id: ConstraintId) -> Option<&ConstraintSlack> {
        self.slacks.iter().find(|s| s.id == id)
    }

    /// Final balances and slacks, as attached to errors
    pub fn failure_context(&self) -> FailureContext {
        FailureContext::new(
            self.final_state.balances().to_vec(),
            self.slacks.iter().map(|s| (s.id, s.slack)).collect(),
        )
    }

    /// Turn a non-success outcome into the matching error
    pub fn into_outcome(self) -> Result<OptimizationResult> {
        let iterations = self.diagnostics.iterations;
        match self.status {
            ExitStatus::Success => Ok(self),
            ExitStatus::Infeasible => Err(CapAllocError::InfeasibleProblem(self.failure_context())),
            ExitStatus::Cancelled => Err(CapAllocError::Cancelled {
                iterations,
                context: self.failure_context(),
            }),
            ExitStatus::InfeasibleStart => Err(CapAllocError::InfeasibleStart(self.failure_context())),
            ExitStatus::NoConvergence | ExitStatus::InvalidInput => Err(CapAllocError::Convergence {
                iterations,
                context: self.failure_context(),
            }),
        }
    }
}
