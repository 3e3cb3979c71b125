//! Fitness representation and objective evaluation.
//!
//! # Key Types
//!
//! - [`Fitness`]: single/multi-objective values in minimization form
//! - [`Objective`]: the black-box metric interface, [`ObjectiveFn`] closure adapter
//! - [`ObjectiveEvaluator`]: failure isolation and the parallel batch pool
//! - [`Evaluate`]: object-safe single-graph scoring

mod evaluator;
mod objective;
mod types;

pub use evaluator::{Evaluate, ObjectiveEvaluator};
pub use objective::{validate_weights, EvaluationError, Objective, ObjectiveError, ObjectiveFn};
pub use types::Fitness;
