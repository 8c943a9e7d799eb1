use serde::Serialize;
use std::collections::HashSet;

use crate::error::{CapAllocError, Result};
use crate::line_item::{LineItem, Side};
use crate::state::CandidateState;

/// Default relative tolerance on the baseline balance-sheet identity
pub const DEFAULT_BALANCE_TOLERANCE: f64 = 1e-6;

/// Validated, immutable set of line items for one optimization run
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioModel {
    items: Vec<LineItem>,
    balance_tolerance: f64,
}

impl PortfolioModel {
    /// Validate line items and take ownership of them.
    ///
    /// `balance_tolerance` is relative: baseline assets and liabilities may
    /// differ by at most `balance_tolerance * max(1, total assets)`.
    pub fn new(items: Vec<LineItem>, balance_tolerance: f64) -> Result<Self> {
        if !(balance_tolerance.is_finite() && balance_tolerance >= 0.0) {
            return Err(CapAllocError::invalid_input(
                "balance_tolerance",
                balance_tolerance,
                "must be finite and non-negative",
            ));
        }
        if items.is_empty() {
            return Err(CapAllocError::invalid_input(
                "line_items",
                0,
                "portfolio must contain at least one line item",
            ));
        }

        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(CapAllocError::invalid_item(
                    &item.id,
                    "id",
                    &item.id,
                    "duplicate line item identifier",
                ));
            }
            validate_item(item)?;
        }

        let model = PortfolioModel {
            items,
            balance_tolerance,
        };

        let assets = model.total(Side::Asset, model.baseline().balances());
        let liabilities = model.total(Side::Liability, model.baseline().balances());
        let gap = assets - liabilities;
        if gap.abs() > balance_tolerance * assets.abs().max(1.0) {
            return Err(CapAllocError::invalid_input(
                "baseline_balance",
                format!("assets={} liabilities={}", assets, liabilities),
                format!("baseline assets and liabilities differ by {}", gap),
            ));
        }

        Ok(model)
    }

    /// Validate with the default balance tolerance
    pub fn from_items(items: Vec<LineItem>) -> Result<Self> {
        Self::new(items, DEFAULT_BALANCE_TOLERANCE)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter()
    }

    pub fn item(&self, idx: usize) -> Option<&LineItem> {
        self.items.get(idx)
    }

    /// Position of a line item by identifier
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn balance_tolerance(&self) -> f64 {
        self.balance_tolerance
    }

    /// Baseline balances as the starting candidate
    pub fn baseline(&self) -> CandidateState {
        CandidateState::new(self.items.iter().map(|i| i.baseline_balance).collect())
    }

    /// Spread income per unit of balance, per item
    pub fn unit_spreads(&self) -> Vec<f64> {
        self.items.iter().map(LineItem::unit_spread).collect()
    }

    pub fn std_rwa_weights(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.std_rwa_weight).collect()
    }

    pub fn adv_rwa_weights(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.adv_rwa_weight).collect()
    }

    pub fn leverage_weights(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.leverage_weight).collect()
    }

    pub fn gsib_coefficients(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.gsib_coefficient).collect()
    }

    /// +1 for assets, -1 for liabilities
    pub fn side_signs(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.side.sign()).collect()
    }

    pub fn lower_bounds(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.lower_bound).collect()
    }

    pub fn upper_bounds(&self) -> Vec<f64> {
        self.items.iter().map(|i| i.upper_bound).collect()
    }

    /// Sum of balances on one side
    pub fn total(&self, side: Side, balances: &[f64]) -> f64 {
        self.items
            .iter()
            .zip(balances.iter())
            .filter(|(item, _)| item.side == side)
            .map(|(_, x)| *x)
            .sum()
    }
}

fn validate_item(item: &LineItem) -> Result<()> {
    let finite_fields = [
        ("baseline_balance", item.baseline_balance),
        ("spread_bps", item.spread_bps),
        ("std_rwa_weight", item.std_rwa_weight),
        ("adv_rwa_weight", item.adv_rwa_weight),
        ("leverage_weight", item.leverage_weight),
        ("gsib_coefficient", item.gsib_coefficient),
    ];
    for (field, value) in finite_fields {
        if !value.is_finite() {
            return Err(CapAllocError::invalid_item(&item.id, field, value, "must be finite"));
        }
    }

    let weights = [
        ("std_rwa_weight", item.std_rwa_weight),
        ("adv_rwa_weight", item.adv_rwa_weight),
        ("leverage_weight", item.leverage_weight),
    ];
    for (field, value) in weights {
        if value < 0.0 {
            return Err(CapAllocError::invalid_item(&item.id, field, value, "must be non-negative"));
        }
    }

    if item.lower_bound.is_nan() || item.lower_bound == f64::INFINITY {
        return Err(CapAllocError::invalid_item(
            &item.id,
            "lower_bound",
            item.lower_bound,
            "must be a number below +inf",
        ));
    }
    if item.upper_bound.is_nan() || item.upper_bound == f64::NEG_INFINITY {
        return Err(CapAllocError::invalid_item(
            &item.id,
            "upper_bound",
            item.upper_bound,
            "must be a number above -inf",
        ));
    }
    if item.lower_bound > item.upper_bound {
        return Err(CapAllocError::invalid_item(
            &item.id,
            "lower_bound",
            item.lower_bound,
            format!("exceeds upper bound {}", item.upper_bound),
        ));
    }
    if !item.is_within_bounds(item.baseline_balance) {
        return Err(CapAllocError::invalid_item(
            &item.id,
            "baseline_balance",
            item.baseline_balance,
            format!("outside bounds [{}, {}]", item.lower_bound, item.upper_bound),
        ));
    }

    Ok(())
}
