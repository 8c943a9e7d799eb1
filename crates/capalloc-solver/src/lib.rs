mod backend;
mod clarabel_backend;
mod qp_model;

pub use backend::{QpSolution, QpStatus, SolverBackend};
pub use clarabel_backend::ClarabelSolver;
pub use qp_model::{QpConstraint, QpModel, VarMeta};

#[cfg(test)]
mod tests;
