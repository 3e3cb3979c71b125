//! Bounded Pareto archive.

use super::multi_objective::crowding_distance;
use crate::dag::Graph;
use crate::fitness::Fitness;
use std::cmp::Ordering;
use std::sync::Arc;

/// Something the archive can hold: a graph with its fitness.
pub trait ArchiveEntry {
    fn graph(&self) -> &Graph;
    fn fitness(&self) -> &Fitness;

    /// Archive identity: same structure and same fitness values.
    fn same_entry<E: ArchiveEntry + ?Sized>(&self, other: &E) -> bool {
        self.fitness().values() == other.fitness().values()
            && self.graph().descriptive_id() == other.graph().descriptive_id()
    }
}

impl<T: ArchiveEntry + ?Sized> ArchiveEntry for Arc<T> {
    fn graph(&self) -> &Graph {
        (**self).graph()
    }

    fn fitness(&self) -> &Fitness {
        (**self).fitness()
    }
}

/// Best non-dominated entries found so far, at most `maxsize` of them.
///
/// Invariants kept by [`update`](Self::update):
/// - no member dominates another,
/// - members are unique by `(descriptive_id, fitness values)`,
/// - only valid fitness is admitted.
///
/// On overflow the member with the smallest crowding distance is evicted;
/// among equally crowded members the most recently inserted one goes.
#[derive(Debug, Clone)]
pub struct ParetoFront<T> {
    maxsize: usize,
    items: Vec<T>,
}

impl<T: ArchiveEntry> ParetoFront<T> {
    /// Empty archive; `maxsize` is raised to at least 1.
    pub fn new(maxsize: usize) -> Self {
        Self {
            maxsize: maxsize.max(1),
            items: Vec::new(),
        }
    }

    pub fn maxsize(&self) -> usize {
        self.maxsize
    }

    /// Members in insertion order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains<E: ArchiveEntry + ?Sized>(&self, entry: &E) -> bool {
        self.items.iter().any(|m| m.same_entry(entry))
    }

    /// Offers candidates in order. Returns whether the membership changed.
    pub fn update<I: IntoIterator<Item = T>>(&mut self, candidates: I) -> bool {
        let mut changed = false;
        for candidate in candidates {
            changed |= self.insert(candidate);
        }
        changed
    }

    fn insert(&mut self, candidate: T) -> bool {
        let fitness = candidate.fitness();
        if !fitness.is_valid() || self.contains(&candidate) {
            return false;
        }
        if self.items.iter().any(|m| m.fitness().dominates(fitness)) {
            return false;
        }
        let before = self.items.len();
        self.items.retain(|m| !candidate.fitness().dominates(m.fitness()));
        let removed = before - self.items.len();
        self.items.push(candidate);

        if self.items.len() > self.maxsize {
            let evicted = self.evict_most_crowded();
            // the newcomer itself was evicted and nothing else moved
            if evicted == self.items.len() && removed == 0 {
                return false;
            }
        }
        true
    }

    /// Removes the member with the smallest crowding distance, returning
    /// its former index.
    fn evict_most_crowded(&mut self) -> usize {
        let refs: Vec<&Fitness> = self.items.iter().map(|m| m.fitness()).collect();
        let distances = crowding_distance(&refs);
        let mut victim = 0;
        for (i, d) in distances.iter().enumerate() {
            if d.total_cmp(&distances[victim]) != Ordering::Greater {
                victim = i;
            }
        }
        self.items.remove(victim);
        victim
    }

    /// Member with the lowest weighted fitness sum; ties broken by
    /// [`Fitness::total_cmp`].
    pub fn best(&self) -> Option<&T> {
        self.items.iter().min_by(|a, b| {
            let (fa, fb) = (a.fitness(), b.fitness());
            fa.weighted_sum()
                .total_cmp(&fb.weighted_sum())
                .then_with(|| fa.total_cmp(fb))
        })
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Archive members whose `(descriptive_id, fitness)` does not occur in
/// `population`, in archive order.
pub fn filter_duplicates<T, P>(archive: &ParetoFront<T>, population: &[P]) -> Vec<T>
where
    T: ArchiveEntry + Clone,
    P: ArchiveEntry,
{
    archive
        .items()
        .iter()
        .filter(|m| !population.iter().any(|p| p.same_entry(*m)))
        .cloned()
        .collect()
}
