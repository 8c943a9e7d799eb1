use capalloc_capital::{CapitalConfig, CapitalTierRequirement, GsibConfig};
use capalloc_types::{CapAllocError, LineItem, PortfolioModel, Result};
use serde::{Deserialize, Serialize};

/// Everything a collaborator supplies for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationInput {
    pub line_items: Vec<LineItem>,
    pub requirements: Vec<CapitalTierRequirement>,
    #[serde(default)]
    pub gsib: GsibConfig,
}

impl OptimizationInput {
    pub fn new(line_items: Vec<LineItem>, requirements: Vec<CapitalTierRequirement>, gsib: GsibConfig) -> Self {
        OptimizationInput {
            line_items,
            requirements,
            gsib,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CapAllocError::invalid_input("input", "<json>", e.to_string()))
    }

    /// Validate into the immutable portfolio and capital configuration
    pub fn build(&self, balance_tolerance: f64) -> Result<(PortfolioModel, CapitalConfig)> {
        let portfolio = PortfolioModel::new(self.line_items.clone(), balance_tolerance)?;
        let capital = CapitalConfig::new(self.requirements.clone(), self.gsib)?;
        Ok((portfolio, capital))
    }
}
