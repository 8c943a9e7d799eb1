use serde::{Deserialize, Serialize};
use std::fmt;

/// Line item identifier
pub type LineItemId = String;

/// Which side of the balance sheet a line item sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Asset,
    Liability,
}

impl Side {
    /// Coefficient in the balance-sheet identity (assets - liabilities)
    pub fn sign(&self) -> f64 {
        match self {
            Side::Asset => 1.0,
            Side::Liability => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Asset => write!(f, "asset"),
            Side::Liability => write!(f, "liability"),
        }
    }
}

/// One balance-sheet product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub side: Side,
    pub baseline_balance: f64,
    /// Annualized spread in basis points per unit of balance
    pub spread_bps: f64,
    /// Standardized-framework risk weight (fraction of balance)
    pub std_rwa_weight: f64,
    /// Advanced-framework risk weight (fraction of balance)
    pub adv_rwa_weight: f64,
    /// Fraction of balance counted in total leverage exposure
    pub leverage_weight: f64,
    /// Marginal GSIB score per unit of balance
    pub gsib_coefficient: f64,
    #[serde(default = "unbounded_below", with = "lower_bound")]
    pub lower_bound: f64,
    #[serde(default = "unbounded_above", with = "upper_bound")]
    pub upper_bound: f64,
}

impl LineItem {
    /// Asset with zero risk weights, full leverage exposure and no bounds
    pub fn asset(id: impl Into<LineItemId>, baseline_balance: f64, spread_bps: f64) -> Self {
        LineItem::new(id, Side::Asset, baseline_balance, spread_bps)
    }

    /// Liability with no capital contributions and no bounds
    pub fn liability(id: impl Into<LineItemId>, baseline_balance: f64, spread_bps: f64) -> Self {
        LineItem::new(id, Side::Liability, baseline_balance, spread_bps)
    }

    fn new(id: impl Into<LineItemId>, side: Side, baseline_balance: f64, spread_bps: f64) -> Self {
        LineItem {
            id: id.into(),
            side,
            baseline_balance,
            spread_bps,
            std_rwa_weight: 0.0,
            adv_rwa_weight: 0.0,
            leverage_weight: match side {
                Side::Asset => 1.0,
                Side::Liability => 0.0,
            },
            gsib_coefficient: 0.0,
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
        }
    }

    pub fn with_risk_weights(mut self, std_rwa_weight: f64, adv_rwa_weight: f64) -> Self {
        self.std_rwa_weight = std_rwa_weight;
        self.adv_rwa_weight = adv_rwa_weight;
        self
    }

    pub fn with_leverage_weight(mut self, leverage_weight: f64) -> Self {
        self.leverage_weight = leverage_weight;
        self
    }

    pub fn with_gsib_coefficient(mut self, gsib_coefficient: f64) -> Self {
        self.gsib_coefficient = gsib_coefficient;
        self
    }

    pub fn with_bounds(mut self, lower_bound: f64, upper_bound: f64) -> Self {
        self.lower_bound = lower_bound;
        self.upper_bound = upper_bound;
        self
    }

    /// Spread income per unit of balance
    pub fn unit_spread(&self) -> f64 {
        self.spread_bps / 10_000.0
    }

    /// Width of the bound interval (infinite if either side is open)
    pub fn range(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// Check if a balance lies within the item's bounds
    pub fn is_within_bounds(&self, balance: f64) -> bool {
        balance >= self.lower_bound && balance <= self.upper_bound
    }
}

fn unbounded_below() -> f64 {
    f64::NEG_INFINITY
}

fn unbounded_above() -> f64 {
    f64::INFINITY
}

// Open bounds travel as `null`, JSON has no infinity.
mod lower_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_some(value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NEG_INFINITY))
    }
}

mod upper_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_some(value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}
