use capalloc_types::{
    CandidateState, PortfolioModel, RequirementBasis, RwaFramework,
};

use crate::requirements::{CapitalConfig, CapitalTierRequirement};

/// Capital arithmetic over candidate balance vectors.
///
/// Holds the per-item coefficient vectors of one portfolio and the bank-wide
/// configuration. Every method is a pure function of its arguments.
#[derive(Debug, Clone)]
pub struct CapitalRequirementEngine {
    config: CapitalConfig,
    std_rwa: Vec<f64>,
    adv_rwa: Vec<f64>,
    leverage: Vec<f64>,
    gsib: Vec<f64>,
}

impl CapitalRequirementEngine {
    pub fn new(portfolio: &PortfolioModel, config: CapitalConfig) -> Self {
        CapitalRequirementEngine {
            config,
            std_rwa: portfolio.std_rwa_weights(),
            adv_rwa: portfolio.adv_rwa_weights(),
            leverage: portfolio.leverage_weights(),
            gsib: portfolio.gsib_coefficients(),
        }
    }

    pub fn config(&self) -> &CapitalConfig {
        &self.config
    }

    pub fn requirements(&self) -> &[CapitalTierRequirement] {
        &self.config.requirements
    }

    /// Per-item exposure weights for a basis
    pub fn weights(&self, basis: RequirementBasis) -> &[f64] {
        match basis {
            RequirementBasis::Rwa(RwaFramework::Standardized) => &self.std_rwa,
            RequirementBasis::Rwa(RwaFramework::Advanced) => &self.adv_rwa,
            RequirementBasis::Leverage => &self.leverage,
        }
    }

    pub fn gsib_coefficients(&self) -> &[f64] {
        &self.gsib
    }

    pub fn standardized_rwa(&self, state: &CandidateState) -> f64 {
        state.weighted_sum(&self.std_rwa)
    }

    pub fn advanced_rwa(&self, state: &CandidateState) -> f64 {
        state.weighted_sum(&self.adv_rwa)
    }

    pub fn leverage_exposure(&self, state: &CandidateState) -> f64 {
        state.weighted_sum(&self.leverage)
    }

    pub fn gsib_score(&self, state: &CandidateState) -> f64 {
        state.weighted_sum(&self.gsib)
    }

    /// Linearized bank-wide surcharge at this state
    pub fn surcharge(&self, state: &CandidateState) -> f64 {
        self.config.gsib.surcharge(self.gsib_score(state))
    }

    pub fn exposure(&self, basis: RequirementBasis, state: &CandidateState) -> f64 {
        state.weighted_sum(self.weights(basis))
    }

    /// Base minimum plus this requirement's share of the surcharge
    pub fn required_ratio(&self, requirement: &CapitalTierRequirement, state: &CandidateState) -> f64 {
        requirement.required_ratio + requirement.gsib_sensitivity * self.surcharge(state)
    }

    pub fn required_capital(&self, requirement: &CapitalTierRequirement, state: &CandidateState) -> f64 {
        self.required_ratio(requirement, state) * self.exposure(requirement.basis, state)
    }

    /// Available minus required capital; non-negative when the requirement is met
    pub fn capital_surplus(&self, requirement: &CapitalTierRequirement, state: &CandidateState) -> f64 {
        requirement.available_capital - self.required_capital(requirement, state)
    }
}
