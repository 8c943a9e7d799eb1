mod engine;
mod gsib;
mod requirements;

pub use engine::CapitalRequirementEngine;
pub use gsib::{GsibConfig, SurchargeBand, SurchargeBands};
pub use requirements::{CapitalConfig, CapitalTierRequirement, TierCapital};
