use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CapAllocError;

/// Outcome of an optimization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatus {
    Success,
    InfeasibleStart,
    Infeasible,
    NoConvergence,
    InvalidInput,
    Cancelled,
}

impl ExitStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitStatus::Success => "SUCCESS",
            ExitStatus::InfeasibleStart => "INFEASIBLE_START",
            ExitStatus::Infeasible => "INFEASIBLE",
            ExitStatus::NoConvergence => "NO_CONVERGENCE",
            ExitStatus::InvalidInput => "INVALID_INPUT",
            ExitStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&CapAllocError> for ExitStatus {
    fn from(err: &CapAllocError) -> Self {
        match err {
            CapAllocError::InputValidation { .. }
            | CapAllocError::Config(_)
            | CapAllocError::Serialization(_) => ExitStatus::InvalidInput,
            CapAllocError::InfeasibleStart(_) => ExitStatus::InfeasibleStart,
            CapAllocError::InfeasibleProblem(_) => ExitStatus::Infeasible,
            CapAllocError::Cancelled { .. } => ExitStatus::Cancelled,
            CapAllocError::Convergence { .. }
            | CapAllocError::Numerical { .. }
            | CapAllocError::Solver(_) => ExitStatus::NoConvergence,
        }
    }
}
