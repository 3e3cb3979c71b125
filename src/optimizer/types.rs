//! Individuals, run history and their serializable records.

use crate::archive::ArchiveEntry;
use crate::dag::{Graph, GraphRecord};
use crate::fitness::Fitness;
use crate::operators::OperatorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// An evaluated candidate: graph snapshot, fitness and lineage.
///
/// Individuals are immutable once created. Parents are held weakly; the
/// [`OptHistory`] keeps every generation alive for the whole run, so
/// lineage stays resolvable while the history exists.
#[derive(Debug)]
pub struct Individual {
    uid: u64,
    graph: Graph,
    fitness: Fitness,
    native_generation: usize,
    parents: Vec<Weak<Individual>>,
    parent_uids: Vec<u64>,
    operator: Option<OperatorKind>,
}

impl Individual {
    pub(crate) fn new(
        uid: u64,
        graph: Graph,
        fitness: Fitness,
        native_generation: usize,
        parents: &[&Arc<Individual>],
        operator: Option<OperatorKind>,
    ) -> Self {
        Self {
            uid,
            graph,
            fitness,
            native_generation,
            parents: parents.iter().map(|p| Arc::downgrade(p)).collect(),
            parent_uids: parents.iter().map(|p| p.uid).collect(),
            operator,
        }
    }

    /// Run-local identifier.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn fitness(&self) -> &Fitness {
        &self.fitness
    }

    /// Generation in which the individual was created (0 = initial).
    pub fn native_generation(&self) -> usize {
        self.native_generation
    }

    /// Parents from the previous generation that are still alive.
    pub fn parents_from_prev_generation(&self) -> Vec<Arc<Individual>> {
        self.parents.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn parent_uids(&self) -> &[u64] {
        &self.parent_uids
    }

    /// Operator that produced this individual; `None` for the initial
    /// population.
    pub fn operator(&self) -> Option<OperatorKind> {
        self.operator
    }

    pub fn record(&self) -> IndividualRecord {
        IndividualRecord {
            uid: self.uid,
            graph: self.graph.to_record(),
            fitness: self.fitness.clone(),
            native_generation: self.native_generation,
            parents: self.parent_uids.clone(),
            operator: self.operator,
        }
    }
}

impl ArchiveEntry for Individual {
    fn graph(&self) -> &Graph {
        &self.graph
    }

    fn fitness(&self) -> &Fitness {
        &self.fitness
    }
}

/// Serializable form of an [`Individual`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    pub uid: u64,
    pub graph: GraphRecord,
    pub fitness: Fitness,
    pub native_generation: usize,
    pub parents: Vec<u64>,
    pub operator: Option<OperatorKind>,
}

/// Spread of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDiversity {
    /// Population standard deviation of each metric over valid fitness.
    pub fitness_std: Vec<f64>,

    /// Distinct structures divided by population size.
    pub unique_ratio: f64,
}

impl GenerationDiversity {
    pub fn of(population: &[Arc<Individual>]) -> Self {
        let valid: Vec<&Fitness> = population
            .iter()
            .map(|ind| ind.fitness())
            .filter(|f| f.is_valid())
            .collect();
        let metrics = valid.iter().map(|f| f.len()).min().unwrap_or(0);
        let fitness_std = (0..metrics)
            .map(|m| {
                let n = valid.len() as f64;
                let mean = valid.iter().map(|f| f.values()[m]).sum::<f64>() / n;
                let var = valid.iter().map(|f| (f.values()[m] - mean).powi(2)).sum::<f64>() / n;
                var.sqrt()
            })
            .collect();

        let unique: HashSet<&str> = population.iter().map(|ind| ind.graph().descriptive_id()).collect();
        let unique_ratio = if population.is_empty() {
            0.0
        } else {
            unique.len() as f64 / population.len() as f64
        };

        Self {
            fitness_std,
            unique_ratio,
        }
    }
}

/// Every population of a run plus the final choices.
#[derive(Debug, Clone, Default)]
pub struct OptHistory {
    generations: Vec<Vec<Arc<Individual>>>,
    diversity: Vec<GenerationDiversity>,
    final_choices: Vec<Arc<Individual>>,
}

impl OptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_generation(&mut self, population: &[Arc<Individual>]) {
        self.diversity.push(GenerationDiversity::of(population));
        self.generations.push(population.to_vec());
    }

    pub(crate) fn set_final_choices(&mut self, choices: Vec<Arc<Individual>>) {
        self.final_choices = choices;
    }

    pub fn generations(&self) -> &[Vec<Arc<Individual>>] {
        &self.generations
    }

    pub fn diversity(&self) -> &[GenerationDiversity] {
        &self.diversity
    }

    pub fn final_choices(&self) -> &[Arc<Individual>] {
        &self.final_choices
    }

    /// Every individual ever recorded, in generation order.
    pub fn all_individuals(&self) -> impl Iterator<Item = &Arc<Individual>> {
        self.generations.iter().flatten()
    }

    pub fn record(&self) -> HistoryRecord {
        HistoryRecord {
            generations: self
                .generations
                .iter()
                .map(|gen| gen.iter().map(|ind| ind.record()).collect())
                .collect(),
            diversity: self.diversity.clone(),
            final_choices: self.final_choices.iter().map(|ind| ind.record()).collect(),
        }
    }
}

/// Serializable form of an [`OptHistory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub generations: Vec<Vec<IndividualRecord>>,
    pub diversity: Vec<GenerationDiversity>,
    pub final_choices: Vec<IndividualRecord>,
}
