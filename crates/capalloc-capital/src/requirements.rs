use capalloc_types::{
    CapAllocError, CapitalTier, ConstraintId, RequirementBasis, Result, RwaFramework,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::gsib::GsibConfig;

/// Minimum capital ratio for one (basis, tier) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalTierRequirement {
    pub basis: RequirementBasis,
    pub tier: CapitalTier,
    /// Base minimum ratio before any GSIB surcharge
    pub required_ratio: f64,
    /// Multiple of the bank-wide surcharge added to the minimum (0 = not GSIB-applicable)
    pub gsib_sensitivity: f64,
    /// Capital the bank actually holds at this tier
    pub available_capital: f64,
}

impl CapitalTierRequirement {
    pub fn new(
        basis: RequirementBasis,
        tier: CapitalTier,
        required_ratio: f64,
        gsib_sensitivity: f64,
        available_capital: f64,
    ) -> Self {
        CapitalTierRequirement {
            basis,
            tier,
            required_ratio,
            gsib_sensitivity,
            available_capital,
        }
    }

    /// Risk-based requirement that carries the full surcharge
    pub fn rwa(framework: RwaFramework, tier: CapitalTier, required_ratio: f64, available_capital: f64) -> Self {
        Self::new(RequirementBasis::Rwa(framework), tier, required_ratio, 1.0, available_capital)
    }

    /// Leverage requirement, never GSIB-applicable
    pub fn leverage(tier: CapitalTier, required_ratio: f64, available_capital: f64) -> Self {
        Self::new(RequirementBasis::Leverage, tier, required_ratio, 0.0, available_capital)
    }

    pub fn id(&self) -> ConstraintId {
        ConstraintId::capital(self.basis, self.tier)
    }

    pub fn is_gsib_applicable(&self) -> bool {
        self.gsib_sensitivity != 0.0
    }

    fn validate(&self) -> Result<()> {
        let id = self.id().to_string();
        let fields = [
            ("required_ratio", self.required_ratio),
            ("gsib_sensitivity", self.gsib_sensitivity),
            ("available_capital", self.available_capital),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(CapAllocError::invalid_item(&id, field, value, "must be finite"));
            }
            if value < 0.0 {
                return Err(CapAllocError::invalid_item(&id, field, value, "must be non-negative"));
            }
        }
        Ok(())
    }
}

/// Bank-wide capital configuration, immutable for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalConfig {
    pub requirements: Vec<CapitalTierRequirement>,
    #[serde(default)]
    pub gsib: GsibConfig,
}

impl CapitalConfig {
    /// Validate and build. Each (basis, tier) pair may appear once.
    pub fn new(requirements: Vec<CapitalTierRequirement>, gsib: GsibConfig) -> Result<Self> {
        let config = CapitalConfig { requirements, gsib };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.gsib.validate()?;

        let mut seen = HashSet::new();
        for req in &self.requirements {
            req.validate()?;
            if !seen.insert((req.basis, req.tier)) {
                return Err(CapAllocError::invalid_item(
                    req.id().to_string(),
                    "requirement",
                    req.id(),
                    "duplicate (basis, tier) pair",
                ));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirement(&self, basis: RequirementBasis, tier: CapitalTier) -> Option<&CapitalTierRequirement> {
        self.requirements
            .iter()
            .find(|r| r.basis == basis && r.tier == tier)
    }

    /// Ten-requirement layout of a US GSIB: both RWA frameworks across all
    /// four tiers (surcharge-applicable) plus CET1 and Tier 1 leverage.
    ///
    /// `available` gives the capital held at each tier; minimums are the
    /// statutory floors before buffers.
    pub fn reference_bank(available: &TierCapital, gsib: GsibConfig) -> Result<Self> {
        let mut requirements = Vec::with_capacity(10);
        for framework in RwaFramework::all() {
            for tier in CapitalTier::all() {
                let ratio = match tier {
                    CapitalTier::Cet1 => 0.045,
                    CapitalTier::Tier1 => 0.06,
                    CapitalTier::Total => 0.08,
                    CapitalTier::Tlac => 0.18,
                };
                requirements.push(CapitalTierRequirement::rwa(
                    *framework,
                    *tier,
                    ratio,
                    available.get(*tier),
                ));
            }
        }
        requirements.push(CapitalTierRequirement::leverage(
            CapitalTier::Cet1,
            0.03,
            available.get(CapitalTier::Cet1),
        ));
        requirements.push(CapitalTierRequirement::leverage(
            CapitalTier::Tier1,
            0.04,
            available.get(CapitalTier::Tier1),
        ));

        CapitalConfig::new(requirements, gsib)
    }
}

/// Capital held at each tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierCapital {
    pub cet1: f64,
    pub tier1: f64,
    pub total: f64,
    pub tlac: f64,
}

impl TierCapital {
    pub fn get(&self, tier: CapitalTier) -> f64 {
        match tier {
            CapitalTier::Cet1 => self.cet1,
            CapitalTier::Tier1 => self.tier1,
            CapitalTier::Total => self.total,
            CapitalTier::Tlac => self.tlac,
        }
    }
}
