//! The objective interface: the boundary to domain-specific evaluation.

use crate::dag::Graph;

/// Why a single evaluation produced no usable values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("objective failed: {0}")]
    Failed(String),
    #[error("metric {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },
    #[error("objective returned {got} values, expected {expected}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("objective panicked: {0}")]
    Panicked(String),
}

/// Invalid objective definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjectiveError {
    #[error("an objective needs at least one weight")]
    NoWeights,
    #[error("weight {index} is {value}; weights must be finite and non-zero")]
    InvalidWeight { index: usize, value: f64 },
}

/// A black-box objective over graphs.
///
/// `weights` fixes the arity and the direction of every metric: a positive
/// weight maximizes, a negative one minimizes. Implementations must be
/// `Send + Sync` since evaluations run on a worker pool.
pub trait Objective: Send + Sync {
    /// One weight per metric. Must not change during a run.
    fn weights(&self) -> &[f64];

    /// Computes the raw metric values of `graph`.
    fn evaluate(&self, graph: &Graph) -> Result<Vec<f64>, EvaluationError>;

    /// Display names of the metrics.
    fn metric_names(&self) -> Vec<String> {
        (0..self.weights().len()).map(|i| format!("metric_{i}")).collect()
    }
}

/// Checks that `weights` is non-empty, finite and free of zeros.
pub fn validate_weights(weights: &[f64]) -> Result<(), ObjectiveError> {
    if weights.is_empty() {
        return Err(ObjectiveError::NoWeights);
    }
    match weights.iter().position(|w| !w.is_finite() || *w == 0.0) {
        Some(index) => Err(ObjectiveError::InvalidWeight {
            index,
            value: weights[index],
        }),
        None => Ok(()),
    }
}

/// [`Objective`] backed by a closure.
///
/// # Examples
///
/// ```
/// use u_graphevo::dag::Graph;
/// use u_graphevo::fitness::{Objective, ObjectiveFn};
///
/// let size = ObjectiveFn::minimize(|g: &Graph| Ok(vec![g.length() as f64]));
/// let mut g = Graph::new();
/// g.add_node("x");
/// assert_eq!(size.evaluate(&g).unwrap(), vec![1.0]);
/// assert_eq!(size.weights(), &[-1.0]);
/// ```
pub struct ObjectiveFn<F> {
    weights: Vec<f64>,
    names: Vec<String>,
    func: F,
}

impl<F> ObjectiveFn<F>
where
    F: Fn(&Graph) -> Result<Vec<f64>, EvaluationError> + Send + Sync,
{
    /// Objective with explicit weights.
    pub fn new(weights: Vec<f64>, func: F) -> Result<Self, ObjectiveError> {
        validate_weights(&weights)?;
        Ok(Self {
            names: Vec::new(),
            weights,
            func,
        })
    }

    /// Single metric to minimize.
    pub fn minimize(func: F) -> Self {
        Self {
            weights: vec![-1.0],
            names: Vec::new(),
            func,
        }
    }

    /// Single metric to maximize.
    pub fn maximize(func: F) -> Self {
        Self {
            weights: vec![1.0],
            names: Vec::new(),
            func,
        }
    }

    /// Sets the metric names reported by [`Objective::metric_names`].
    pub fn with_metric_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }
}

impl<F> Objective for ObjectiveFn<F>
where
    F: Fn(&Graph) -> Result<Vec<f64>, EvaluationError> + Send + Sync,
{
    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn evaluate(&self, graph: &Graph) -> Result<Vec<f64>, EvaluationError> {
        (self.func)(graph)
    }

    fn metric_names(&self) -> Vec<String> {
        if self.names.len() == self.weights.len() {
            self.names.clone()
        } else {
            (0..self.weights.len()).map(|i| format!("metric_{i}")).collect()
        }
    }
}
