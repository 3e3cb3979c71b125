//! Adaptive control of the search.
//!
//! - [`OperatorAgent`]: picks variation operators from observed reward
//! - [`RewardAgent`]: per-arm decay and fitness-rank rates
//! - [`AdaptiveGraphDepth`]: depth limit growing under stagnation
//! - [`ImprovementWatcher`]: stagnation bookkeeping

mod agent;
mod parameters;
mod reward;

pub use agent::{AgentState, OperatorAgent};
pub use parameters::{AdaptiveGraphDepth, AdaptiveParameter, ImprovementWatcher, ParameterError};
pub use reward::RewardAgent;
