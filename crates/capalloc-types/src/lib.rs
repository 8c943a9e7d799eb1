mod error;
mod framework;
mod line_item;
mod portfolio;
mod state;
mod status;

pub use error::{CapAllocError, FailureContext, Result};
pub use framework::{CapitalTier, ConstraintId, RequirementBasis, RwaFramework};
pub use line_item::{LineItem, LineItemId, Side};
pub use portfolio::{PortfolioModel, DEFAULT_BALANCE_TOLERANCE};
pub use state::CandidateState;
pub use status::ExitStatus;
