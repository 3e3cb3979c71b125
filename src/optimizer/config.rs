//! Optimizer configuration.
//!
//! [`OptimizerConfig`] holds every parameter of the generational loop.

use super::selection::Selection;
use crate::adaptive::{AdaptiveGraphDepth, ParameterError, RewardAgent};
use crate::fitness::ObjectiveError;
use crate::operators::{GraphConstraints, OperatorKind};
use std::time::Duration;

/// Problem detected before a run starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pop_size must be at least 2, got {0}")]
    PopSize(usize),
    #[error("max_generations must be at least 1")]
    MaxGenerations,
    #[error("{0} must be positive or None")]
    ZeroDuration(&'static str),
    #[error("at least one variation operator is required")]
    NoOperators,
    #[error("archive_size must be at least 1")]
    ArchiveSize,
    #[error("max_arity must be at least 1")]
    MaxArity,
    #[error("max_size must be at least 1")]
    MaxSize,
    #[error("tournament size must be at least 1")]
    TournamentSize,
    #[error("agent_exploration must lie in [0, 1], got {0}")]
    Exploration(f64),
    #[error("worst_fitness must not be NaN")]
    WorstFitness,
    #[error("no initial population: no usable graphs were supplied or generated")]
    NoInitialPopulation,
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Objective(#[from] ObjectiveError),
    #[error("failed to build the evaluation pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration of [`GraphOptimizer`](super::GraphOptimizer).
///
/// # Defaults
///
/// ```
/// use u_graphevo::optimizer::OptimizerConfig;
///
/// let config = OptimizerConfig::default();
/// assert_eq!(config.pop_size, 20);
/// assert_eq!(config.max_generations, 100);
/// assert!(config.validate().is_ok());
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_graphevo::optimizer::{OptimizerConfig, Selection};
/// use std::time::Duration;
///
/// let config = OptimizerConfig::default()
///     .with_pop_size(40)
///     .with_selection(Selection::Rank)
///     .with_timeout(Duration::from_secs(30))
///     .with_seed(7);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Individuals per generation.
    pub pop_size: usize,

    /// Generation budget.
    pub max_generations: usize,

    /// Wall-clock budget for the whole run. `None` disables it.
    pub timeout: Option<Duration>,

    /// Generations without archive improvement before stopping.
    ///
    /// Set to 0 to disable stagnation-based termination.
    pub early_stopping_iterations: usize,

    /// Time without archive improvement before stopping. `None` disables it.
    pub early_stopping_timeout: Option<Duration>,

    /// Parent selection strategy.
    pub selection: Selection,

    /// Operators the agent chooses from.
    pub operators: Vec<OperatorKind>,

    /// Capacity of the Pareto archive.
    pub archive_size: usize,

    /// Depth of randomly generated initial graphs and first depth limit
    /// when `adaptive_depth` is on.
    pub start_depth: usize,

    /// Hard depth limit.
    pub max_depth: usize,

    /// Maximum number of parents per node.
    pub max_arity: usize,

    /// Maximum node count.
    pub max_size: usize,

    /// Grow the depth limit from `start_depth` while the search stagnates.
    pub adaptive_depth: bool,

    /// Stagnant generations before the adaptive depth grows.
    pub max_stagnation_gens: usize,

    /// Reward decay of the operator agent, in `(0, 1]`.
    pub decaying_factor: f64,

    /// Share of the operator distribution spread uniformly, in `[0, 1]`.
    pub agent_exploration: f64,

    /// Sites tried per operator application before it is skipped.
    pub max_mutation_attempts: usize,

    /// Evaluation workers: `0` = available parallelism, `1` = sequential.
    pub n_jobs: usize,

    /// Random seed for reproducibility. `None` uses a random seed.
    pub seed: Option<u64>,

    /// Sentinel stored in every objective of a failed evaluation
    /// (minimization form).
    pub worst_fitness: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            pop_size: 20,
            max_generations: 100,
            timeout: None,
            early_stopping_iterations: 30,
            early_stopping_timeout: None,
            selection: Selection::default(),
            operators: OperatorKind::ALL.to_vec(),
            archive_size: 10,
            start_depth: 3,
            max_depth: 10,
            max_arity: 4,
            max_size: 50,
            adaptive_depth: false,
            max_stagnation_gens: 3,
            decaying_factor: 1.0,
            agent_exploration: 0.05,
            max_mutation_attempts: 50,
            n_jobs: 0,
            seed: None,
            worst_fitness: f64::INFINITY,
        }
    }
}

impl OptimizerConfig {
    pub fn with_pop_size(mut self, n: usize) -> Self {
        self.pop_size = n;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the stagnation limit in generations (0 to disable).
    pub fn with_early_stopping_iterations(mut self, n: usize) -> Self {
        self.early_stopping_iterations = n;
        self
    }

    pub fn with_early_stopping_timeout(mut self, timeout: Duration) -> Self {
        self.early_stopping_timeout = Some(timeout);
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_operators(mut self, operators: Vec<OperatorKind>) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_archive_size(mut self, n: usize) -> Self {
        self.archive_size = n;
        self
    }

    /// Sets start and maximum depth together.
    pub fn with_depth(mut self, start_depth: usize, max_depth: usize) -> Self {
        self.start_depth = start_depth;
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_arity(mut self, n: usize) -> Self {
        self.max_arity = n;
        self
    }

    pub fn with_max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Enables depth growth after `max_stagnation_gens` stagnant generations.
    pub fn with_adaptive_depth(mut self, max_stagnation_gens: usize) -> Self {
        self.adaptive_depth = true;
        self.max_stagnation_gens = max_stagnation_gens;
        self
    }

    pub fn with_decaying_factor(mut self, factor: f64) -> Self {
        self.decaying_factor = factor;
        self
    }

    /// Sets the exploration share of the operator agent.
    pub fn with_agent_exploration(mut self, exploration: f64) -> Self {
        self.agent_exploration = exploration.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_mutation_attempts(mut self, n: usize) -> Self {
        self.max_mutation_attempts = n.max(1);
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_worst_fitness(mut self, worst: f64) -> Self {
        self.worst_fitness = worst;
        self
    }

    /// Preset for quick feasibility checks.
    ///
    /// - Population: 10, Generations: 20, Time limit: 10s
    /// - Stagnation limit: 5
    pub fn fast() -> Self {
        Self {
            pop_size: 10,
            max_generations: 20,
            timeout: Some(Duration::from_secs(10)),
            early_stopping_iterations: 5,
            ..Self::default()
        }
    }

    /// Preset trading solution quality against computation time.
    ///
    /// - Population: 20, Generations: 100, Time limit: 60s
    /// - Stagnation limit: 20
    pub fn balanced() -> Self {
        Self {
            pop_size: 20,
            max_generations: 100,
            timeout: Some(Duration::from_secs(60)),
            early_stopping_iterations: 20,
            ..Self::default()
        }
    }

    /// Preset for long searches with a growing depth limit.
    ///
    /// - Population: 50, Generations: 300, Time limit: 300s
    /// - Stagnation limit: 50, adaptive depth
    pub fn quality() -> Self {
        Self {
            pop_size: 50,
            max_generations: 300,
            timeout: Some(Duration::from_secs(300)),
            early_stopping_iterations: 50,
            archive_size: 20,
            adaptive_depth: true,
            ..Self::default()
        }
    }

    /// Structural bounds at the given depth limit.
    pub fn constraints(&self, max_depth: usize) -> GraphConstraints {
        GraphConstraints {
            max_depth,
            max_arity: self.max_arity,
            max_size: self.max_size,
        }
    }

    /// Checks every parameter, including those validated by the adaptive
    /// components themselves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pop_size < 2 {
            return Err(ConfigError::PopSize(self.pop_size));
        }
        if self.max_generations == 0 {
            return Err(ConfigError::MaxGenerations);
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroDuration("timeout"));
        }
        if self.early_stopping_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroDuration("early_stopping_timeout"));
        }
        if self.operators.is_empty() {
            return Err(ConfigError::NoOperators);
        }
        if self.archive_size == 0 {
            return Err(ConfigError::ArchiveSize);
        }
        if self.max_arity == 0 {
            return Err(ConfigError::MaxArity);
        }
        if self.max_size == 0 {
            return Err(ConfigError::MaxSize);
        }
        if self.selection == Selection::Tournament(0) {
            return Err(ConfigError::TournamentSize);
        }
        if !(0.0..=1.0).contains(&self.agent_exploration) {
            return Err(ConfigError::Exploration(self.agent_exploration));
        }
        if self.worst_fitness.is_nan() {
            return Err(ConfigError::WorstFitness);
        }
        AdaptiveGraphDepth::new(
            self.start_depth,
            self.max_depth,
            self.max_stagnation_gens,
            self.adaptive_depth,
        )?;
        RewardAgent::new(self.decaying_factor)?;
        Ok(())
    }
}
