//! Parent and survivor selection over Pareto rank and crowding distance.
//!
//! Individuals are ordered by the NSGA-II crowded comparison: lower Pareto
//! rank first, then larger crowding distance.
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - Baker (1985), "Adaptive Selection Methods for Genetic Algorithms"

use crate::archive::{crowding_distance, non_dominated_sort};
use crate::fitness::Fitness;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Parent selection strategy.
///
/// # Examples
///
/// ```
/// use u_graphevo::optimizer::{Ranking, Selection};
/// use u_graphevo::fitness::Fitness;
/// use u_graphevo::random::create_rng;
///
/// let pop = vec![Fitness::single(3.0, -1.0), Fitness::single(1.0, -1.0)];
/// let refs: Vec<&Fitness> = pop.iter().collect();
/// let ranking = Ranking::new(&refs);
/// assert_eq!(ranking.order(), vec![1, 0]);
///
/// let mut rng = create_rng(0);
/// let parent = Selection::Tournament(3).select(&ranking, &mut rng);
/// assert!(parent < 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// Pick `k` individuals at random, keep the best.
    ///
    /// Higher `k` = stronger selection pressure.
    Tournament(usize),

    /// Linear ranking: the i-th best of n gets weight `n - i`.
    Rank,
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Tournament(2)
    }
}

impl Selection {
    /// Selects an index into the ranked population.
    ///
    /// # Panics
    /// Panics if the ranking is empty.
    pub fn select<R: Rng>(&self, ranking: &Ranking, rng: &mut R) -> usize {
        assert!(!ranking.is_empty(), "cannot select from empty population");
        match self {
            Selection::Tournament(k) => tournament(ranking, *k, rng),
            Selection::Rank => rank(ranking, rng),
        }
    }
}

fn tournament<R: Rng>(ranking: &Ranking, k: usize, rng: &mut R) -> usize {
    let n = ranking.len();
    let mut best = rng.random_range(0..n);
    for _ in 1..k.max(1) {
        let idx = rng.random_range(0..n);
        if ranking.crowded_cmp(idx, best) == Ordering::Less {
            best = idx;
        }
    }
    best
}

fn rank<R: Rng>(ranking: &Ranking, rng: &mut R) -> usize {
    let order = ranking.order();
    let n = order.len();
    if n == 1 {
        return order[0];
    }
    let total = (n * (n + 1)) as f64 / 2.0;
    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (pos, &idx) in order.iter().enumerate() {
        cumulative += (n - pos) as f64;
        if cumulative > threshold {
            return idx;
        }
    }
    order[n - 1]
}

/// Pareto rank and in-front crowding distance of a population.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    ranks: Vec<usize>,
    crowding: Vec<f64>,
}

impl Ranking {
    pub fn new(fitness: &[&Fitness]) -> Self {
        let sorted = non_dominated_sort(fitness);
        let mut crowding = vec![0.0; fitness.len()];
        for front in &sorted.fronts {
            let members: Vec<&Fitness> = front.iter().map(|&i| fitness[i]).collect();
            for (&i, d) in front.iter().zip(crowding_distance(&members)) {
                crowding[i] = d;
            }
        }
        Self {
            ranks: sorted.ranks,
            crowding,
        }
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn rank(&self, i: usize) -> usize {
        self.ranks[i]
    }

    pub fn crowding(&self, i: usize) -> f64 {
        self.crowding[i]
    }

    /// Crowded comparison: `Less` means `a` is preferred.
    pub fn crowded_cmp(&self, a: usize, b: usize) -> Ordering {
        self.ranks[a]
            .cmp(&self.ranks[b])
            .then_with(|| self.crowding[b].total_cmp(&self.crowding[a]))
    }

    /// All indices, best first. Ties keep index order.
    pub fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.crowded_cmp(a, b));
        order
    }
}

/// NSGA-II survivor selection: the indices of the `n` best by crowded
/// comparison, in that order.
pub fn environmental_selection(fitness: &[&Fitness], n: usize) -> Vec<usize> {
    let mut order = Ranking::new(fitness).order();
    order.truncate(n);
    order
}
