use capalloc_types::{CandidateState, ConstraintId, LineItem, LineItemId, PortfolioModel};

use crate::config::AnalysisParams;
use crate::constraints::ConstraintSet;
use crate::result::{ConstraintSlack, LineItemResult};

/// Binding-constraint and marginal-product diagnosis of a final state
pub struct ResultAnalyzer<'a> {
    portfolio: &'a PortfolioModel,
    constraints: &'a ConstraintSet,
    params: &'a AnalysisParams,
}

impl<'a> ResultAnalyzer<'a> {
    pub fn new(portfolio: &'a PortfolioModel, constraints: &'a ConstraintSet, params: &'a AnalysisParams) -> Self {
        ResultAnalyzer {
            portfolio,
            constraints,
            params,
        }
    }

    /// Slack record per constraint; `multipliers` are indexed like the constraints
    pub fn constraint_slacks(&self, state: &CandidateState, multipliers: &[f64]) -> Vec<ConstraintSlack> {
        let values = self.constraints.evaluate(state);
        let engine = self.constraints.engine();

        self.constraints
            .ids()
            .iter()
            .zip(values.iter())
            .zip(self.constraints.scales().iter())
            .enumerate()
            .map(|(idx, ((id, slack), scale))| {
                let requirement = self.constraints.requirement(idx);
                ConstraintSlack {
                    id: *id,
                    slack: *slack,
                    scale: *scale,
                    binding: slack.abs() <= self.params.binding_epsilon * scale,
                    shadow_price: multipliers.get(idx).copied().unwrap_or(0.0),
                    required_capital: requirement.map(|r| engine.required_capital(r, state)),
                    available_capital: requirement.map(|r| r.available_capital),
                }
            })
            .collect()
    }

    pub fn binding_constraints(slacks: &[ConstraintSlack]) -> Vec<ConstraintId> {
        slacks.iter().filter(|s| s.binding).map(|s| s.id).collect()
    }

    /// Line items strictly inside their bounds
    pub fn marginal_products(&self, state: &CandidateState) -> Vec<LineItemId> {
        self.portfolio
            .items()
            .zip(state.balances().iter())
            .filter(|(item, balance)| self.is_marginal(item, **balance))
            .map(|(item, _)| item.id.clone())
            .collect()
    }

    /// Inside both bounds by more than `bound_epsilon * max(1, range)`.
    ///
    /// With an open side the range is infinite, so the balance magnitude
    /// stands in for it.
    pub fn is_marginal(&self, item: &LineItem, balance: f64) -> bool {
        let range = item.range();
        let width = if range.is_finite() { range } else { balance.abs() };
        let margin = self.params.bound_epsilon * width.max(1.0);
        balance - item.lower_bound > margin && item.upper_bound - balance > margin
    }

    pub fn line_items(&self, state: &CandidateState) -> Vec<LineItemResult> {
        self.portfolio
            .items()
            .zip(state.balances().iter())
            .map(|(item, balance)| LineItemResult {
                id: item.id.clone(),
                side: item.side,
                baseline_balance: item.baseline_balance,
                final_balance: *balance,
                change: balance - item.baseline_balance,
            })
            .collect()
    }
}
