//! Sensitivity sweep over the nodes and edges of one graph.

use super::approaches::{
    AnalyzeApproach, EdgeDeletion, EdgeReplacement, Entity, NodeDeletion, NodeReplacement,
    Perturbation,
};
use crate::dag::Graph;
use crate::fitness::{Evaluate, Fitness};
use crate::operators::{GraphConstraints, NodeFactory};
use rayon::prelude::*;
use std::time::Instant;

/// Perturbations produced for a single entity, in approach order.
#[derive(Debug, Clone)]
pub struct EntityResult {
    pub entity: Entity,
    pub perturbations: Vec<Perturbation>,
}

/// Outcome of [`StructuralAnalyzer::analyze`].
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    /// Fitness of the unperturbed graph.
    pub original: Fitness,
    /// One entry per analyzed entity, in request order.
    pub entities: Vec<EntityResult>,
}

impl AnalysisResults {
    pub fn is_empty(&self) -> bool {
        self.entities.iter().all(|e| e.perturbations.is_empty())
    }

    pub fn perturbations(&self) -> impl Iterator<Item = &Perturbation> {
        self.entities.iter().flat_map(|e| e.perturbations.iter())
    }

    /// The perturbation that helps `metric` the most, i.e. the entity the
    /// graph is worst off keeping. Ties go to the earliest entity.
    pub fn worst_result(&self, metric: usize) -> Option<&Perturbation> {
        let mut best: Option<(&Perturbation, f64)> = None;
        for p in self.perturbations() {
            let Some(&gain) = p.improvement(&self.original).get(metric) else {
                continue;
            };
            if !gain.is_finite() {
                continue;
            }
            match best {
                Some((_, g)) if gain <= g => {}
                _ => best = Some((p, gain)),
            }
        }
        best.map(|(p, _)| p)
    }

    /// Gain of [`worst_result`](Self::worst_result) on `metric`.
    pub fn best_improvement(&self, metric: usize) -> Option<f64> {
        self.worst_result(metric)
            .and_then(|p| p.improvement(&self.original).get(metric).copied())
    }
}

/// Scores constraint violations as failures.
struct Constrained<'a> {
    inner: &'a dyn Evaluate,
    constraints: GraphConstraints,
}

impl Evaluate for Constrained<'_> {
    fn weights(&self) -> &[f64] {
        self.inner.weights()
    }

    fn worst(&self) -> f64 {
        self.inner.worst()
    }

    fn evaluate(&self, graph: &Graph) -> Fitness {
        match self.constraints.check(graph) {
            Ok(()) => self.inner.evaluate(graph),
            Err(violation) => {
                log::trace!("perturbation rejected: {violation}");
                Fitness::invalid(self.inner.weights(), self.inner.worst())
            }
        }
    }
}

/// Applies every approach to every entity of a graph and scores the
/// results.
///
/// # Example
///
/// ```
/// use u_graphevo::analysis::{Entity, NodeDeletion, StructuralAnalyzer};
/// use u_graphevo::dag::Graph;
/// use u_graphevo::fitness::{ObjectiveEvaluator, ObjectiveFn};
///
/// let size = ObjectiveFn::minimize(|g: &Graph| Ok(vec![g.length() as f64]));
/// let evaluator = ObjectiveEvaluator::new(&size);
///
/// let mut g = Graph::new();
/// let x = g.add_node("x");
/// let a = g.add_node_with_parents("a", &[x]).unwrap();
/// g.add_node_with_parents("out", &[a]).unwrap();
///
/// let analyzer = StructuralAnalyzer::new(vec![Box::new(NodeDeletion)]);
/// let results = analyzer.analyze(&g, None, &evaluator, None);
/// let worst = results.worst_result(0).unwrap();
/// assert_eq!(worst.entity, Entity::Node(x));
/// assert_eq!(results.best_improvement(0), Some(1.0));
/// ```
pub struct StructuralAnalyzer {
    approaches: Vec<Box<dyn AnalyzeApproach>>,
    constraints: Option<GraphConstraints>,
    pool: Option<rayon::ThreadPool>,
}

impl StructuralAnalyzer {
    /// Sequential analyzer without structural constraints.
    pub fn new(approaches: Vec<Box<dyn AnalyzeApproach>>) -> Self {
        Self {
            approaches,
            constraints: None,
            pool: None,
        }
    }

    /// Node and edge deletion plus three seeded replacements of each kind.
    pub fn default_approaches<F: NodeFactory + 'static>(
        factory: F,
        seed: u64,
    ) -> Vec<Box<dyn AnalyzeApproach>> {
        vec![
            Box::new(NodeDeletion),
            Box::new(NodeReplacement::new(factory, 3, seed)),
            Box::new(EdgeDeletion),
            Box::new(EdgeReplacement::new(3, seed)),
        ]
    }

    /// Perturbations breaking `constraints` are scored as failures.
    pub fn with_constraints(mut self, constraints: GraphConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Sets the worker count: `0` uses all available cores, `1` analyzes
    /// on the calling thread.
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        self.pool = match n_jobs {
            1 => None,
            n => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
        };
        Ok(self)
    }

    /// All nodes followed by all edges of `graph`.
    pub fn entities(graph: &Graph) -> Vec<Entity> {
        graph
            .node_ids()
            .into_iter()
            .map(Entity::Node)
            .chain(
                graph
                    .get_edges()
                    .into_iter()
                    .map(|(parent, child)| Entity::Edge { parent, child }),
            )
            .collect()
    }

    /// Analyzes `entities` (all of them when `None`).
    ///
    /// Entities not started before `deadline` are reported without
    /// perturbations.
    pub fn analyze(
        &self,
        graph: &Graph,
        entities: Option<&[Entity]>,
        evaluator: &dyn Evaluate,
        deadline: Option<Instant>,
    ) -> AnalysisResults {
        let entities = match entities {
            Some(e) => e.to_vec(),
            None => Self::entities(graph),
        };
        let constrained;
        let evaluator: &dyn Evaluate = match self.constraints {
            Some(constraints) => {
                constrained = Constrained {
                    inner: evaluator,
                    constraints,
                };
                &constrained
            }
            None => evaluator,
        };

        let original = evaluator.evaluate(graph);
        log::info!(
            "analyzing {} entities of {} with {} approaches",
            entities.len(),
            graph.descriptive_id(),
            self.approaches.len()
        );

        let run_one = |&entity: &Entity| -> EntityResult {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                log::debug!("deadline reached, {entity} skipped");
                return EntityResult {
                    entity,
                    perturbations: Vec::new(),
                };
            }
            let perturbations: Vec<Perturbation> = self
                .approaches
                .iter()
                .flat_map(|a| a.analyze(graph, entity, evaluator))
                .collect();
            log::debug!("{entity}: {} perturbations", perturbations.len());
            EntityResult {
                entity,
                perturbations,
            }
        };

        let results: Vec<EntityResult> = match &self.pool {
            Some(pool) => pool.install(|| entities.par_iter().map(run_one).collect()),
            None => entities.iter().map(run_one).collect(),
        };
        AnalysisResults {
            original,
            entities: results,
        }
    }

    /// Repeatedly applies the most helpful perturbation for `metric`.
    ///
    /// Stops after `max_iter` rounds or once no perturbation improves the
    /// metric. Returns the final graph and the analysis of every round.
    pub fn optimize(
        &self,
        graph: &Graph,
        evaluator: &dyn Evaluate,
        metric: usize,
        max_iter: usize,
    ) -> (Graph, Vec<AnalysisResults>) {
        let mut current = graph.clone();
        let mut rounds = Vec::new();
        for round in 0..max_iter {
            let results = self.analyze(&current, None, evaluator, None);
            let next = results
                .worst_result(metric)
                .filter(|p| p.improvement(&results.original)[metric] > 0.0)
                .map(|p| (p.graph.clone(), p.approach, p.entity));
            rounds.push(results);
            match next {
                Some((g, approach, entity)) => {
                    log::info!("round {round}: {approach} on {entity}");
                    current = g;
                }
                None => break,
            }
        }
        (current, rounds)
    }
}
