//! Pareto ranking utilities over [`Fitness`] values.
//!
//! # Algorithms
//!
//! - [`non_dominated_sort`]: fast non-dominated sorting (Deb et al., 2002)
//! - [`crowding_distance`]: crowding distance for diversity preservation
//!
//! Both work on the minimization form of [`Fitness`], so maximized
//! objectives need no special handling here.
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - IEEE Transactions on Evolutionary Computation, 6(2), 182-197

use crate::fitness::Fitness;
use std::cmp::Ordering;

/// Result of non-dominated sorting.
///
/// `ranks[i]` is the Pareto rank of the i-th input. Rank 0 is the front.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NondominatedSortResult {
    /// Pareto rank for each solution (0 = front).
    pub ranks: Vec<usize>,

    /// Indices grouped by front: `fronts[0]` holds the rank-0 indices.
    pub fronts: Vec<Vec<usize>>,
}

/// Fast non-dominated sorting.
///
/// Dominance is [`Fitness::dominates`], so incomparable values never
/// dominate each other. An empty input gives an empty result.
///
/// # Complexity
///
/// O(m · n²) for n solutions with m objectives.
///
/// # Example
///
/// ```
/// use u_graphevo::archive::non_dominated_sort;
/// use u_graphevo::fitness::Fitness;
///
/// let w = [-1.0, -1.0];
/// let pop = vec![
///     Fitness::multi(&[1.0, 5.0], &w).unwrap(),
///     Fitness::multi(&[3.0, 3.0], &w).unwrap(),
///     Fitness::multi(&[4.0, 4.0], &w).unwrap(), // dominated by the second
/// ];
/// let refs: Vec<&Fitness> = pop.iter().collect();
/// let result = non_dominated_sort(&refs);
/// assert_eq!(result.ranks, vec![0, 0, 1]);
/// ```
pub fn non_dominated_sort(fitness: &[&Fitness]) -> NondominatedSortResult {
    let n = fitness.len();
    if n == 0 {
        return NondominatedSortResult::default();
    }

    let mut domination_count = vec![0usize; n];
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut ranks = vec![0usize; n];
    let mut front_0 = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            match dominance(fitness[i], fitness[j]) {
                Dominance::Left => {
                    dominated_by[i].push(j);
                    domination_count[j] += 1;
                }
                Dominance::Right => {
                    dominated_by[j].push(i);
                    domination_count[i] += 1;
                }
                Dominance::Neither => {}
            }
        }
        if domination_count[i] == 0 {
            front_0.push(i);
        }
    }

    let mut fronts = vec![front_0];
    loop {
        let mut next_front = Vec::new();
        if let Some(current) = fronts.last() {
            for &i in current {
                for &j in &dominated_by[i] {
                    domination_count[j] -= 1;
                    if domination_count[j] == 0 {
                        ranks[j] = fronts.len();
                        next_front.push(j);
                    }
                }
            }
        }
        if next_front.is_empty() {
            break;
        }
        fronts.push(next_front);
    }

    NondominatedSortResult { ranks, fronts }
}

#[derive(Debug, PartialEq)]
enum Dominance {
    Left,
    Right,
    Neither,
}

fn dominance(a: &Fitness, b: &Fitness) -> Dominance {
    if a.dominates(b) {
        Dominance::Left
    } else if b.dominates(a) {
        Dominance::Right
    } else {
        Dominance::Neither
    }
}

/// Crowding distance of each solution within one front.
///
/// Boundary solutions of every objective receive `f64::INFINITY`. An
/// objective whose range is zero or not finite (e.g. a front containing a
/// worst-sentinel value) adds nothing to interior distances.
///
/// # Example
///
/// ```
/// use u_graphevo::archive::crowding_distance;
/// use u_graphevo::fitness::Fitness;
///
/// let w = [-1.0, -1.0];
/// let front = vec![
///     Fitness::multi(&[1.0, 5.0], &w).unwrap(),
///     Fitness::multi(&[3.0, 3.0], &w).unwrap(),
///     Fitness::multi(&[5.0, 1.0], &w).unwrap(),
/// ];
/// let refs: Vec<&Fitness> = front.iter().collect();
/// let distances = crowding_distance(&refs);
/// assert!(distances[0].is_infinite());
/// assert!(distances[1].is_finite());
/// ```
pub fn crowding_distance(fitness: &[&Fitness]) -> Vec<f64> {
    let n = fitness.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let m = fitness.iter().map(|f| f.len()).min().unwrap_or(0);
    let mut distances = vec![0.0f64; n];

    for obj in 0..m {
        let value = |i: usize| fitness[i].values()[obj];
        let mut indices: Vec<usize> = (0..n).collect();
        indices.sort_by(|&a, &b| value(a).partial_cmp(&value(b)).unwrap_or(Ordering::Equal));

        distances[indices[0]] = f64::INFINITY;
        distances[indices[n - 1]] = f64::INFINITY;

        let range = value(indices[n - 1]) - value(indices[0]);
        if !range.is_finite() || range <= 0.0 {
            continue;
        }
        for i in 1..(n - 1) {
            let gap = value(indices[i + 1]) - value(indices[i - 1]);
            if gap.is_finite() {
                distances[indices[i]] += gap / range;
            }
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min2(a: f64, b: f64) -> Fitness {
        Fitness::multi(&[a, b], &[-1.0, -1.0]).unwrap()
    }

    fn sort(pop: &[Fitness]) -> NondominatedSortResult {
        let refs: Vec<&Fitness> = pop.iter().collect();
        non_dominated_sort(&refs)
    }

    fn crowding(pop: &[Fitness]) -> Vec<f64> {
        let refs: Vec<&Fitness> = pop.iter().collect();
        crowding_distance(&refs)
    }

    #[test]
    fn test_empty_input() {
        let result = non_dominated_sort(&[]);
        assert!(result.ranks.is_empty());
        assert!(result.fronts.is_empty());
        assert!(crowding_distance(&[]).is_empty());
    }

    #[test]
    fn test_chain_of_dominance() {
        let result = sort(&[min2(3.0, 3.0), min2(1.0, 1.0), min2(2.0, 2.0)]);
        assert_eq!(result.ranks, vec![2, 0, 1]);
        assert_eq!(result.fronts, vec![vec![1], vec![2], vec![0]]);
    }

    #[test]
    fn test_tradeoff_front() {
        let result = sort(&[min2(1.0, 5.0), min2(3.0, 3.0), min2(5.0, 1.0), min2(6.0, 6.0)]);
        assert_eq!(result.ranks, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_maximized_objective() {
        // maximize accuracy, minimize size
        let w = [1.0, -1.0];
        let pop = vec![Fitness::multi(&[0.7, 5.0], &w).unwrap(), Fitness::multi(&[0.9, 5.0], &w).unwrap()];
        assert_eq!(sort(&pop).ranks, vec![1, 0]);
    }

    #[test]
    fn test_identical_values_share_rank() {
        let result = sort(&[min2(2.0, 2.0), min2(2.0, 2.0)]);
        assert_eq!(result.ranks, vec![0, 0]);
    }

    #[test]
    fn test_invalid_ranks_last() {
        let pop = vec![Fitness::invalid(&[-1.0, -1.0], f64::INFINITY), min2(1.0, 1.0)];
        assert_eq!(sort(&pop).ranks, vec![1, 0]);
    }

    #[test]
    fn test_crowding_boundaries_and_interior() {
        let pop = vec![min2(0.0, 4.0), min2(1.0, 3.0), min2(2.0, 2.0), min2(3.0, 1.0), min2(4.0, 0.0)];
        let dist = crowding(&pop);
        assert!(dist[0].is_infinite());
        assert!(dist[4].is_infinite());
        assert!((dist[1] - dist[2]).abs() < 1e-10);
        assert!((dist[2] - dist[3]).abs() < 1e-10);
    }

    #[test]
    fn test_crowding_ignores_non_finite_range() {
        let pop = vec![
            min2(1.0, 3.0),
            min2(2.0, 2.0),
            Fitness::invalid(&[-1.0, -1.0], f64::INFINITY),
        ];
        let dist = crowding(&pop);
        assert!(dist.iter().all(|d| !d.is_nan()));
        assert!(dist[2].is_infinite());
    }
}
