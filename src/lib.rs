//! Evolutionary search over DAG-structured candidate solutions.
//!
//! Candidates are directed acyclic graphs of operation nodes, scored by one
//! or more black-box objectives:
//!
//! - **DAG model** ([`dag`]): arena-backed graphs with cycle-safe edits and
//!   structural fingerprints.
//! - **Fitness** ([`fitness`]): single/multi-objective values, the
//!   objective interface and a failure-isolating parallel evaluator.
//! - **Operators** ([`operators`]): structural mutations and subtree
//!   crossovers under depth, arity and size bounds.
//! - **Adaptation** ([`adaptive`]): a reward-driven operator agent,
//!   stagnation tracking and adaptive depth.
//! - **Archive** ([`archive`]): bounded Pareto front with NSGA-II ranking.
//! - **Optimizer** ([`optimizer`]): the generational loop and its history.
//! - **Analysis** ([`analysis`]): per-node and per-edge sensitivity sweeps.
//!
//! # Example
//!
//! ```
//! use u_graphevo::dag::Graph;
//! use u_graphevo::fitness::ObjectiveFn;
//! use u_graphevo::operators::DefaultNodeFactory;
//! use u_graphevo::optimizer::{GraphOptimizer, OptimizerConfig};
//!
//! // prefer graphs of exactly four nodes
//! let objective = ObjectiveFn::minimize(|g: &Graph| Ok(vec![(g.length() as f64 - 4.0).abs()]));
//! let factory = DefaultNodeFactory::new(["x", "y"], ["add", "mul", "neg"]);
//! let config = OptimizerConfig::default()
//!     .with_pop_size(8)
//!     .with_max_generations(5)
//!     .with_seed(42);
//!
//! let result = GraphOptimizer::run(&objective, &factory, &[], &config).unwrap();
//! assert!(!result.best.is_empty());
//! ```

pub mod adaptive;
pub mod analysis;
pub mod archive;
pub mod dag;
pub mod fitness;
pub mod operators;
pub mod optimizer;
pub mod random;
