mod analyzer;
mod audit;
mod config;
mod constraints;
mod driver;
mod input;
mod objective;
mod result;
mod sqp_builder;

pub use analyzer::ResultAnalyzer;
pub use audit::{compute_hash, compute_json_hash, HashRef, RunAudit};
pub use config::{AnalysisParams, OptimizerConfig, SolverParams, StartPolicy};
pub use constraints::ConstraintSet;
pub use driver::SolverDriver;
pub use input::OptimizationInput;
pub use objective::ObjectiveEvaluator;
pub use result::{ConstraintSlack, Diagnostics, LineItemResult, OptimizationResult, Termination};
pub use sqp_builder::{Linearization, SqpBuilder, SqpStep};

use capalloc_types::Result;

/// Validate `input`, run the optimizer and return the result record
pub fn optimize(input: &OptimizationInput, config: &OptimizerConfig) -> Result<OptimizationResult> {
    SolverDriver::from_input(input, config.clone())?.run()
}

#[cfg(test)]
mod tests;
