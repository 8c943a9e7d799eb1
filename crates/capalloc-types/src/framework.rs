use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk-weighted-asset calculation framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RwaFramework {
    Standardized,
    Advanced,
}

impl RwaFramework {
    /// Returns all frameworks
    pub fn all() -> &'static [RwaFramework] {
        &[RwaFramework::Standardized, RwaFramework::Advanced]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RwaFramework::Standardized => "standardized",
            RwaFramework::Advanced => "advanced",
        }
    }
}

impl fmt::Display for RwaFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Regulatory capital tier, from narrowest to broadest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalTier {
    Cet1,
    Tier1,
    Total,
    Tlac,
}

impl CapitalTier {
    /// Returns all tiers in order of breadth
    pub fn all() -> &'static [CapitalTier] {
        &[
            CapitalTier::Cet1,
            CapitalTier::Tier1,
            CapitalTier::Total,
            CapitalTier::Tlac,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapitalTier::Cet1 => "cet1",
            CapitalTier::Tier1 => "tier1",
            CapitalTier::Total => "total",
            CapitalTier::Tlac => "tlac",
        }
    }

    /// Parse a tier from a string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cet1" => Some(CapitalTier::Cet1),
            "tier1" | "t1" => Some(CapitalTier::Tier1),
            "total" | "tc" => Some(CapitalTier::Total),
            "tlac" => Some(CapitalTier::Tlac),
            _ => None,
        }
    }
}

impl fmt::Display for CapitalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exposure measure a capital requirement is expressed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementBasis {
    Rwa(RwaFramework),
    Leverage,
}

impl RequirementBasis {
    pub fn all() -> &'static [RequirementBasis] {
        &[
            RequirementBasis::Rwa(RwaFramework::Standardized),
            RequirementBasis::Rwa(RwaFramework::Advanced),
            RequirementBasis::Leverage,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementBasis::Rwa(RwaFramework::Standardized) => "standardized_rwa",
            RequirementBasis::Rwa(RwaFramework::Advanced) => "advanced_rwa",
            RequirementBasis::Leverage => "leverage",
        }
    }
}

impl fmt::Display for RequirementBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one constraint of the allocation problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintId {
    /// Assets minus liabilities equals zero
    BalanceSheetIdentity,
    /// Available capital covers the required ratio times exposure
    Capital {
        basis: RequirementBasis,
        tier: CapitalTier,
    },
}

impl ConstraintId {
    pub fn capital(basis: RequirementBasis, tier: CapitalTier) -> Self {
        ConstraintId::Capital { basis, tier }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, ConstraintId::BalanceSheetIdentity)
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintId::BalanceSheetIdentity => write!(f, "balance_sheet_identity"),
            ConstraintId::Capital { basis, tier } => write!(f, "{}/{}", basis, tier),
        }
    }
}
