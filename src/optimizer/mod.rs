//! Generational graph optimization.
//!
//! # Usage
//!
//! 1. Implement [`Objective`](crate::fitness::Objective) or wrap a closure
//!    in [`ObjectiveFn`](crate::fitness::ObjectiveFn)
//! 2. Pick a [`NodeFactory`](crate::operators::NodeFactory) supplying node
//!    contents
//! 3. Configure with [`OptimizerConfig`] (or a preset)
//! 4. Run with [`GraphOptimizer::run`]
//!
//! # Key Types
//!
//! - [`Individual`]: evaluated graph with lineage
//! - [`OptHistory`] / [`HistoryRecord`]: every generation, serializable
//! - [`Selection`] / [`Ranking`]: crowded-comparison parent selection

mod config;
mod initial;
mod runner;
mod selection;
mod types;

pub use config::{ConfigError, OptimizerConfig};
pub use initial::{random_graph, InitialPopulationBuilder};
pub use runner::{GenerationStats, GraphOptimizer, OptimizationResult, StopReason};
pub use selection::{environmental_selection, Ranking, Selection};
pub use types::{GenerationDiversity, HistoryRecord, Individual, IndividualRecord, OptHistory};
