//! Structural sensitivity analysis.
//!
//! Measures how much each node and edge contributes to a graph's fitness
//! by perturbing it in isolation and re-evaluating.
//!
//! # Key Types
//!
//! - [`StructuralAnalyzer`]: per-entity sweep and greedy pruning
//! - [`AnalyzeApproach`]: one way of perturbing an entity
//! - [`AnalysisResults`]: perturbations grouped by entity

mod analyzer;
mod approaches;

pub use analyzer::{AnalysisResults, EntityResult, StructuralAnalyzer};
pub use approaches::{
    AnalyzeApproach, EdgeDeletion, EdgeReplacement, Entity, NodeDeletion, NodeReplacement,
    Perturbation,
};
