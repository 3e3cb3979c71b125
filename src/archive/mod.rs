//! Pareto archive and NSGA-II ranking utilities.
//!
//! [`ParetoFront`] keeps the best mutually non-dominated entries seen during
//! a run. [`non_dominated_sort`] and [`crowding_distance`] rank arbitrary
//! fitness sets; the archive uses them for eviction and the optimizer for
//! selection.

mod multi_objective;
mod pareto;

pub use multi_objective::{crowding_distance, non_dominated_sort, NondominatedSortResult};
pub use pareto::{filter_duplicates, ArchiveEntry, ParetoFront};
