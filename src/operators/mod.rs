//! Variation operators.
//!
//! Operator kinds are a closed set ([`OperatorKind`]) dispatched by
//! exhaustive match. Mutations expose their behaviour through the
//! [`Proposal`] trait; the engines add random site choice, constraint
//! validation and bounded retries.
//!
//! # Key Types
//!
//! - [`MutationEngine`] / [`CrossoverEngine`]: apply one operator to copies
//! - [`GraphConstraints`]: depth, arity and size bounds
//! - [`NodeFactory`] / [`DefaultNodeFactory`]: content for new nodes

mod crossover;
mod factory;
mod mutation;
mod types;

pub use crossover::{replace_subtrees, CrossoverEngine};
pub use factory::{DefaultNodeFactory, NodeFactory};
pub use mutation::{MutationEngine, Proposal};
pub use types::{
    CrossoverKind, GraphConstraints, MutationError, MutationKind, OperatorKind, Site, Violation,
};
