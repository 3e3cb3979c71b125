//! Generational optimization loop.
//!
//! [`GraphOptimizer`] orchestrates the complete search:
//! initial population → evaluation → selection → variation → evaluation →
//! archive and adaptation → repeat.

use super::config::{ConfigError, OptimizerConfig};
use super::initial::InitialPopulationBuilder;
use super::selection::{environmental_selection, Ranking};
use super::types::{Individual, OptHistory};
use crate::adaptive::{AdaptiveGraphDepth, AdaptiveParameter, ImprovementWatcher, OperatorAgent};
use crate::archive::{filter_duplicates, ArchiveEntry, ParetoFront};
use crate::dag::Graph;
use crate::fitness::{validate_weights, Fitness, Objective, ObjectiveEvaluator};
use crate::operators::{CrossoverEngine, MutationEngine, MutationError, NodeFactory, OperatorKind};
use crate::random::rng_from_option;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    MaxGenerations,
    Timeout,
    /// `early_stopping_iterations` generations without improvement.
    Stagnation,
    /// `early_stopping_timeout` elapsed without improvement.
    StagnationTimeout,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::MaxGenerations => "generation budget exhausted",
            StopReason::Timeout => "timeout",
            StopReason::Stagnation => "stagnation",
            StopReason::StagnationTimeout => "stagnation timeout",
            StopReason::Cancelled => "cancelled",
        })
    }
}

/// Snapshot taken at the end of each generation (0 = initial population).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    /// Lowest weighted fitness sum in the archive.
    pub best_weighted_sum: Option<f64>,
    pub archive_size: usize,
    /// Individuals evaluated in this generation.
    pub evaluated: usize,
    /// Of those, evaluations that failed.
    pub invalid: usize,
    /// Depth limit for the next generation.
    pub max_depth: usize,
    pub improved: bool,
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Final archive, best weighted fitness sum first.
    pub best: Vec<Arc<Individual>>,

    pub history: OptHistory,

    /// Generations executed after the initial population.
    pub generations: usize,

    pub stop_reason: StopReason,

    pub stats: Vec<GenerationStats>,

    /// Operator distribution of the agent at the end of the run.
    pub operator_probs: Vec<(OperatorKind, f64)>,

    /// Depth limit reached by the adaptive depth parameter.
    pub final_max_depth: usize,

    pub elapsed: Duration,
}

impl OptimizationResult {
    pub fn best_individual(&self) -> Option<&Arc<Individual>> {
        self.best.first()
    }
}

/// Executes the evolutionary graph search.
///
/// # Usage
///
/// ```
/// use u_graphevo::dag::Graph;
/// use u_graphevo::fitness::ObjectiveFn;
/// use u_graphevo::operators::DefaultNodeFactory;
/// use u_graphevo::optimizer::{GraphOptimizer, OptimizerConfig};
///
/// // grow towards four nodes
/// let objective = ObjectiveFn::minimize(|g: &Graph| Ok(vec![(g.length() as f64 - 4.0).abs()]));
/// let factory = DefaultNodeFactory::new(["x"], ["add", "neg"]);
/// let config = OptimizerConfig::fast().with_seed(1).with_n_jobs(1);
///
/// let result = GraphOptimizer::run(&objective, &factory, &[], &config).unwrap();
/// assert!(result.best_individual().is_some());
/// ```
pub struct GraphOptimizer;

impl GraphOptimizer {
    /// Runs the optimization.
    ///
    /// `initial_graphs` seed the population; when empty, random graphs are
    /// drawn from `factory`.
    pub fn run<O, F>(
        objective: &O,
        factory: &F,
        initial_graphs: &[Graph],
        config: &OptimizerConfig,
    ) -> Result<OptimizationResult, ConfigError>
    where
        O: Objective + ?Sized,
        F: NodeFactory,
    {
        Self::run_with_cancel(objective, factory, initial_graphs, config, None)
    }

    /// Runs the optimization with an optional cancellation token.
    ///
    /// If `cancel` is set to `true`, the run stops before the next
    /// generation and returns the archive as it stands.
    pub fn run_with_cancel<O, F>(
        objective: &O,
        factory: &F,
        initial_graphs: &[Graph],
        config: &OptimizerConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<OptimizationResult, ConfigError>
    where
        O: Objective + ?Sized,
        F: NodeFactory,
    {
        config.validate()?;
        validate_weights(objective.weights())?;

        let evaluator = ObjectiveEvaluator::new(objective)
            .with_worst(config.worst_fitness)
            .with_n_jobs(config.n_jobs)?;
        let agent = OperatorAgent::new(config.operators.clone(), config.decaying_factor)?
            .with_exploration(config.agent_exploration);
        let mut depth = AdaptiveGraphDepth::new(
            config.start_depth,
            config.max_depth,
            config.max_stagnation_gens,
            config.adaptive_depth,
        )?;
        let mut rng = rng_from_option(config.seed);
        let start = Instant::now();
        let deadline = config.timeout.map(|t| start + t);

        log::info!(
            "graph optimization started: pop_size={}, max_generations={}, operators={}, seed={:?}",
            config.pop_size,
            config.max_generations,
            config.operators.len(),
            config.seed
        );

        // 1. Initial population
        let builder = InitialPopulationBuilder::new(
            factory,
            config.constraints(config.max_depth),
            config.start_depth,
            config.max_mutation_attempts,
        );
        let graphs = builder.build(initial_graphs, config.pop_size, &mut rng);
        if graphs.is_empty() {
            return Err(ConfigError::NoInitialPopulation);
        }

        let fitness = {
            let refs: Vec<&Graph> = graphs.iter().collect();
            evaluator.evaluate_batch(&refs, deadline)
        };
        let mut next_uid = 0u64;
        let mut population: Vec<Arc<Individual>> = Vec::with_capacity(graphs.len());
        for (graph, fitness) in graphs.into_iter().zip(fitness) {
            let Some(fitness) = fitness else {
                continue;
            };
            population.push(Arc::new(Individual::new(next_uid, graph, fitness, 0, &[], None)));
            next_uid += 1;
        }

        let mut archive = ParetoFront::new(config.archive_size);
        archive.update(population.iter().cloned());

        let mut history = OptHistory::new();
        history.add_generation(&population);
        let mut watcher = ImprovementWatcher::new();
        let mut agent_state = agent.initial_state();
        let mut max_depth = depth.current();
        let mut stats = vec![GenerationStats {
            generation: 0,
            best_weighted_sum: best_weighted_sum(&archive),
            archive_size: archive.len(),
            evaluated: population.len(),
            invalid: population.iter().filter(|i| !i.fitness().is_valid()).count(),
            max_depth,
            improved: false,
        }];
        let mut stop_reason = StopReason::MaxGenerations;
        let mut generations = 0;

        // 2. Generational loop
        for generation in 1..=config.max_generations {
            if cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                stop_reason = StopReason::Cancelled;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                stop_reason = StopReason::Timeout;
                break;
            }
            if population.is_empty() {
                // every initial evaluation was skipped by the deadline
                stop_reason = StopReason::Timeout;
                break;
            }

            let constraints = config.constraints(max_depth);
            let variation = Variation {
                mutation: MutationEngine::new(constraints, config.max_mutation_attempts),
                crossover: CrossoverEngine::new(constraints, config.max_mutation_attempts),
                config,
                factory,
            };
            let ranking = {
                let refs: Vec<&Fitness> = population.iter().map(|i| i.fitness()).collect();
                Ranking::new(&refs)
            };

            // 3. Variation
            let mut seen: HashSet<String> = population
                .iter()
                .chain(archive.items())
                .map(|i| i.graph().descriptive_id().to_string())
                .collect();
            let mut offspring: Vec<Offspring> = Vec::new();
            for arm in agent.choose(&agent_state, config.pop_size, &mut rng) {
                let kind = agent.actions()[arm];
                match variation.apply(kind, &population, &ranking, &mut rng) {
                    Ok(children) => {
                        for (graph, parents) in children {
                            if seen.insert(graph.descriptive_id().to_string()) {
                                offspring.push(Offspring {
                                    graph,
                                    parents,
                                    kind,
                                    arm,
                                });
                            }
                        }
                    }
                    Err(err) => log::debug!("generation {generation}: {kind} skipped: {err}"),
                }
            }

            // 4. Evaluation
            let fitness = {
                let refs: Vec<&Graph> = offspring.iter().map(|o| &o.graph).collect();
                evaluator.evaluate_batch(&refs, deadline)
            };
            let mut children: Vec<Arc<Individual>> = Vec::with_capacity(offspring.len());
            let mut rewards = Vec::with_capacity(offspring.len());
            let mut arms = Vec::with_capacity(offspring.len());
            for (child, fitness) in offspring.into_iter().zip(fitness) {
                let Some(fitness) = fitness else {
                    continue;
                };
                let parents: Vec<&Arc<Individual>> = child.parents.iter().map(|&p| &population[p]).collect();
                rewards.push(reward(&fitness, &parents));
                arms.push(child.arm);
                children.push(Arc::new(Individual::new(
                    next_uid,
                    child.graph,
                    fitness,
                    generation,
                    &parents,
                    Some(child.kind),
                )));
                next_uid += 1;
            }
            let invalid = children.iter().filter(|i| !i.fitness().is_valid()).count();

            // 5. Archive and adaptation
            agent_state = agent.observe(agent_state, &rewards, &arms);
            let previous: Vec<Fitness> = archive.items().iter().map(|m| m.fitness().clone()).collect();
            archive.update(children.iter().cloned());
            let improved = archive
                .items()
                .iter()
                .filter(|m| m.native_generation() == generation)
                .any(|m| !previous.iter().any(|p| p.better_or_equal(m.fitness())));
            watcher.update(improved);
            max_depth = depth.next(&watcher);

            // 6. Next population
            let evaluated = children.len();
            let mut next = children;
            let elites = filter_duplicates(&archive, &next);
            next.extend(elites);
            for idx in ranking.order() {
                if next.len() >= config.pop_size {
                    break;
                }
                let candidate = &population[idx];
                if !next.iter().any(|n| n.same_entry(candidate)) {
                    next.push(Arc::clone(candidate));
                }
            }
            if next.len() > config.pop_size {
                let keep = {
                    let refs: Vec<&Fitness> = next.iter().map(|i| i.fitness()).collect();
                    environmental_selection(&refs, config.pop_size)
                };
                next = keep.into_iter().map(|i| Arc::clone(&next[i])).collect();
            }
            population = next;

            history.add_generation(&population);
            generations = generation;
            let best = best_weighted_sum(&archive);
            log::debug!(
                "generation {generation}: {evaluated} evaluated ({invalid} invalid), archive {}, best {best:?}, max depth {max_depth}",
                archive.len()
            );
            stats.push(GenerationStats {
                generation,
                best_weighted_sum: best,
                archive_size: archive.len(),
                evaluated,
                invalid,
                max_depth,
                improved,
            });

            if config.early_stopping_iterations > 0
                && watcher.stagnation_iter_count() >= config.early_stopping_iterations
            {
                stop_reason = StopReason::Stagnation;
                break;
            }
            if config
                .early_stopping_timeout
                .is_some_and(|t| watcher.stagnation_duration() >= t)
            {
                stop_reason = StopReason::StagnationTimeout;
                break;
            }
        }

        let mut best = archive.into_items();
        best.sort_by(|a, b| {
            let (fa, fb) = (a.fitness(), b.fitness());
            fa.weighted_sum()
                .total_cmp(&fb.weighted_sum())
                .then_with(|| fa.total_cmp(fb))
        });
        history.set_final_choices(best.clone());
        let operator_probs = agent
            .actions()
            .iter()
            .copied()
            .zip(agent.get_action_probs(&agent_state))
            .collect();

        log::info!(
            "graph optimization stopped after {generations} generations ({stop_reason}), {} individuals in the archive",
            best.len()
        );

        Ok(OptimizationResult {
            best,
            history,
            generations,
            stop_reason,
            stats,
            operator_probs,
            final_max_depth: max_depth,
            elapsed: start.elapsed(),
        })
    }
}

/// A varied graph waiting for evaluation.
struct Offspring {
    graph: Graph,
    /// Indices into the current population.
    parents: Vec<usize>,
    kind: OperatorKind,
    arm: usize,
}

/// Operator application for one generation.
struct Variation<'a, F: NodeFactory> {
    mutation: MutationEngine,
    crossover: CrossoverEngine,
    config: &'a OptimizerConfig,
    factory: &'a F,
}

impl<F: NodeFactory> Variation<'_, F> {
    /// Selects parents and applies `kind`, returning each child with the
    /// indices of its parents.
    fn apply<R: Rng>(
        &self,
        kind: OperatorKind,
        population: &[Arc<Individual>],
        ranking: &Ranking,
        rng: &mut R,
    ) -> Result<Vec<(Graph, Vec<usize>)>, MutationError> {
        match kind {
            OperatorKind::Mutation(m) => {
                let p = self.config.selection.select(ranking, rng);
                let child = self.mutation.mutate(population[p].graph(), m, self.factory, rng)?;
                Ok(vec![(child, vec![p])])
            }
            OperatorKind::Crossover(c) => {
                let p1 = self.config.selection.select(ranking, rng);
                let p2 = self.config.selection.select(ranking, rng);
                let parents = if p1 == p2 { vec![p1] } else { vec![p1, p2] };
                let (a, b) = self
                    .crossover
                    .crossover(c, population[p1].graph(), population[p2].graph(), rng)?;
                Ok(vec![(a, parents.clone()), (b, parents)])
            }
        }
    }
}

/// Relative improvement of the weighted fitness sum over the best valid
/// parent, clipped to `[0, 1]`. A failed child earns nothing; a valid
/// child of failed parents earns the full reward.
fn reward(child: &Fitness, parents: &[&Arc<Individual>]) -> f64 {
    if !child.is_valid() {
        return 0.0;
    }
    let best_parent = parents
        .iter()
        .map(|p| p.fitness())
        .filter(|f| f.is_valid())
        .map(Fitness::weighted_sum)
        .min_by(f64::total_cmp);
    let Some(parent) = best_parent else {
        return 1.0;
    };
    let improvement = (parent - child.weighted_sum()) / parent.abs().max(f64::EPSILON);
    if improvement.is_nan() {
        return 0.0;
    }
    improvement.clamp(0.0, 1.0)
}

fn best_weighted_sum<T: ArchiveEntry>(archive: &ParetoFront<T>) -> Option<f64> {
    archive.best().map(|b| b.fitness().weighted_sum())
}
