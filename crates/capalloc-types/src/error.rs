use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::framework::ConstraintId;

/// Last evaluated iterate attached to solver-level errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Balances in portfolio order
    pub balances: Vec<f64>,
    /// Constraint slacks (identity residual and capital surpluses)
    pub slacks: Vec<(ConstraintId, f64)>,
}

impl FailureContext {
    pub fn new(balances: Vec<f64>, slacks: Vec<(ConstraintId, f64)>) -> Self {
        FailureContext { balances, slacks }
    }

    /// Constraint with the most negative slack, if any
    pub fn worst_slack(&self) -> Option<(ConstraintId, f64)> {
        self.slacks
            .iter()
            .copied()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.worst_slack() {
            Some((id, slack)) => write!(
                f,
                "{} balances, worst slack {} = {:.6e}",
                self.balances.len(),
                id,
                slack
            ),
            None => write!(f, "{} balances", self.balances.len()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CapAllocError {
    #[error("Invalid input: {field}={value} ({reason}){}", item_suffix(.item))]
    InputValidation {
        item: Option<String>,
        field: String,
        value: String,
        reason: String,
    },

    #[error("Baseline violates a declared constraint: {0}")]
    InfeasibleStart(FailureContext),

    #[error("No feasible point within bounds: {0}")]
    InfeasibleProblem(FailureContext),

    #[error("Convergence failed after {iterations} iterations: {context}")]
    Convergence {
        iterations: usize,
        context: FailureContext,
    },

    #[error("Numerical error on {constraint}: {detail}")]
    Numerical {
        constraint: ConstraintId,
        detail: String,
        context: FailureContext,
    },

    #[error("Run cancelled after {iterations} iterations: {context}")]
    Cancelled {
        iterations: usize,
        context: FailureContext,
    },

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CapAllocError {
    /// Validation error for a line-item attribute
    pub fn invalid_item(
        item: impl Into<String>,
        field: &str,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        CapAllocError::InputValidation {
            item: Some(item.into()),
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Validation error not tied to a single line item
    pub fn invalid_input(field: &str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        CapAllocError::InputValidation {
            item: None,
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Diagnostic iterate, for solver-level errors
    pub fn context(&self) -> Option<&FailureContext> {
        match self {
            CapAllocError::InfeasibleStart(ctx)
            | CapAllocError::InfeasibleProblem(ctx)
            | CapAllocError::Convergence { context: ctx, .. }
            | CapAllocError::Cancelled { context: ctx, .. }
            | CapAllocError::Numerical { context: ctx, .. } => Some(ctx),
            _ => None,
        }
    }
}

fn item_suffix(item: &Option<String>) -> String {
    item.as_ref()
        .map(|id| format!(" on line item {}", id))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, CapAllocError>;
