//! Fitness values and their comparison semantics.

use super::objective::EvaluationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Evaluated quality of a candidate.
///
/// Values are stored in a uniform **minimization** form: objectives with a
/// positive weight (maximized) are negated on construction. All comparisons
/// ([`dominates`](Self::dominates), [`better_or_equal`](Self::better_or_equal),
/// [`total_cmp`](Self::total_cmp)) work on that form, so lower is better.
///
/// A failed evaluation is an *invalid* fitness carrying a worst sentinel
/// value per objective, never a missing entry, so every comparison stays
/// total.
///
/// # Examples
///
/// ```
/// use u_graphevo::fitness::Fitness;
///
/// // maximize accuracy, minimize size
/// let a = Fitness::multi(&[0.9, 10.0], &[1.0, -1.0]).unwrap();
/// let b = Fitness::multi(&[0.8, 12.0], &[1.0, -1.0]).unwrap();
/// assert!(a.dominates(&b));
/// assert_eq!(a.raw_values(), vec![0.9, 10.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fitness {
    values: Vec<f64>,
    weights: Vec<f64>,
    valid: bool,
}

impl Fitness {
    /// Single-objective fitness.
    pub fn single(value: f64, weight: f64) -> Self {
        Self {
            values: vec![if weight > 0.0 { -value } else { value }],
            weights: vec![weight],
            valid: true,
        }
    }

    /// Multi-objective fitness from raw objective values, one per weight.
    pub fn multi(raw: &[f64], weights: &[f64]) -> Result<Self, EvaluationError> {
        if raw.len() != weights.len() {
            return Err(EvaluationError::ArityMismatch {
                expected: weights.len(),
                got: raw.len(),
            });
        }
        Ok(Self {
            values: raw
                .iter()
                .zip(weights)
                .map(|(&v, &w)| if w > 0.0 { -v } else { v })
                .collect(),
            weights: weights.to_vec(),
            valid: true,
        })
    }

    /// Failed evaluation: every objective holds `worst` (minimization form).
    pub fn invalid(weights: &[f64], worst: f64) -> Self {
        Self {
            values: vec![worst; weights.len()],
            weights: weights.to_vec(),
            valid: false,
        }
    }

    /// Values in minimization form.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values in the objectives' own sense (maximized ones un-negated).
    pub fn raw_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .zip(&self.weights)
            .map(|(&v, &w)| if w > 0.0 { -v } else { v })
            .collect()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of objectives.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Scalarization `Σ |wᵢ| · valueᵢ` (minimization form).
    pub fn weighted_sum(&self) -> f64 {
        self.values
            .iter()
            .zip(&self.weights)
            .map(|(v, w)| v * w.abs())
            .sum()
    }

    /// Same number of objectives and same optimization direction for each.
    pub fn is_comparable(&self, other: &Fitness) -> bool {
        self.len() == other.len()
            && self
                .weights
                .iter()
                .zip(&other.weights)
                .all(|(a, b)| (*a > 0.0) == (*b > 0.0))
    }

    /// Pareto dominance: no worse in every objective, strictly better in one.
    ///
    /// Always `false` for incomparable values.
    pub fn dominates(&self, other: &Fitness) -> bool {
        if !self.is_comparable(other) {
            return false;
        }
        let mut strictly = false;
        for (a, b) in self.values.iter().zip(&other.values) {
            if a > b {
                return false;
            }
            if a < b {
                strictly = true;
            }
        }
        strictly
    }

    /// No worse than `other` in every objective.
    pub fn better_or_equal(&self, other: &Fitness) -> bool {
        self.is_comparable(other) && self.values.iter().zip(&other.values).all(|(a, b)| a <= b)
    }

    /// Total order for reporting: valid before invalid, then lexicographic
    /// on the minimization form.
    pub fn total_cmp(&self, other: &Fitness) -> Ordering {
        other.valid.cmp(&self.valid).then_with(|| {
            for (a, b) in self.values.iter().zip(&other.values) {
                match a.total_cmp(b) {
                    Ordering::Equal => continue,
                    ord => return ord,
                }
            }
            self.len().cmp(&other.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maximization_is_negated() {
        let f = Fitness::single(3.0, 1.0);
        assert_eq!(f.values(), &[-3.0]);
        assert_eq!(f.raw_values(), vec![3.0]);
        let g = Fitness::single(3.0, -1.0);
        assert_eq!(g.values(), &[3.0]);
    }

    #[test]
    fn test_multi_rejects_length_mismatch() {
        assert_eq!(
            Fitness::multi(&[1.0, 2.0], &[-1.0]).unwrap_err(),
            EvaluationError::ArityMismatch { expected: 1, got: 2 }
        );
        assert!(Fitness::multi(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_dominance() {
        let w = [-1.0, -1.0];
        let a = Fitness::multi(&[1.0, 1.0], &w).unwrap();
        let b = Fitness::multi(&[1.0, 2.0], &w).unwrap();
        let c = Fitness::multi(&[2.0, 0.5], &w).unwrap();
        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&c));
        assert!(!c.dominates(&a));
        assert!(!a.dominates(&a));
        assert!(a.better_or_equal(&a));
        assert!(a.better_or_equal(&b));
        assert!(!a.better_or_equal(&c));
    }

    #[test]
    fn test_incomparable_shapes() {
        let a = Fitness::multi(&[1.0, 1.0], &[-1.0, -1.0]).unwrap();
        let b = Fitness::multi(&[2.0, 2.0], &[-1.0, 1.0]).unwrap();
        let c = Fitness::single(5.0, -1.0);
        assert!(!a.is_comparable(&b));
        assert!(!a.is_comparable(&c));
        assert!(!a.dominates(&b));
        assert!(!a.better_or_equal(&c));
    }

    #[test]
    fn test_invalid_is_worst() {
        let w = [-1.0];
        let bad = Fitness::invalid(&w, f64::INFINITY);
        let good = Fitness::single(1e9, -1.0);
        assert!(!bad.is_valid());
        assert!(good.dominates(&bad));
        assert_eq!(good.total_cmp(&bad), Ordering::Less);
        assert_eq!(bad.total_cmp(&good), Ordering::Greater);
    }

    #[test]
    fn test_total_cmp_lexicographic() {
        let w = [-1.0, -1.0];
        let a = Fitness::multi(&[1.0, 5.0], &w).unwrap();
        let b = Fitness::multi(&[1.0, 3.0], &w).unwrap();
        assert_eq!(a.total_cmp(&b), Ordering::Greater);
        assert_eq!(a.total_cmp(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn test_weighted_sum() {
        let f = Fitness::multi(&[2.0, 3.0], &[0.5, -2.0]).unwrap();
        // -2 * 0.5 + 3 * 2
        assert!((f.weighted_sum() - 5.0).abs() < 1e-12);
    }
}
