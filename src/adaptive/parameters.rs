//! Stagnation-driven parameters.
//!
//! A parameter reads the [`ImprovementWatcher`] once per generation and
//! reports its value for the next one.

use std::time::{Duration, Instant};

/// Invalid parameter bounds, reported before a run starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("start_depth must be at least 1, got {0}")]
    StartDepth(usize),
    #[error("max_depth ({max}) must not be below start_depth ({start})")]
    MaxDepth { start: usize, max: usize },
    #[error("max_stagnation_gens must be at least 1")]
    StagnationGens,
    #[error("decaying_factor must lie in (0, 1], got {0}")]
    DecayingFactor(f64),
    #[error("an operator agent needs at least one action")]
    NoActions,
}

/// Tracks whether the search still improves.
#[derive(Debug, Clone)]
pub struct ImprovementWatcher {
    stagnation_iter_count: usize,
    last_improvement: Instant,
    is_any_improved: bool,
}

impl Default for ImprovementWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImprovementWatcher {
    pub fn new() -> Self {
        Self {
            stagnation_iter_count: 0,
            last_improvement: Instant::now(),
            is_any_improved: false,
        }
    }

    /// Records the outcome of one generation.
    pub fn update(&mut self, improved: bool) {
        if improved {
            self.stagnation_iter_count = 0;
            self.last_improvement = Instant::now();
            self.is_any_improved = true;
        } else {
            self.stagnation_iter_count += 1;
        }
    }

    /// Consecutive generations without improvement.
    pub fn stagnation_iter_count(&self) -> usize {
        self.stagnation_iter_count
    }

    /// Wall-clock time since the last improvement (or since creation).
    pub fn stagnation_duration(&self) -> Duration {
        self.last_improvement.elapsed()
    }

    pub fn is_any_improved(&self) -> bool {
        self.is_any_improved
    }
}

/// A search parameter adapted between generations.
pub trait AdaptiveParameter {
    type Value;

    /// Value used before the first generation.
    fn initial(&self) -> Self::Value;

    /// Value for the next generation.
    fn next(&mut self, watcher: &ImprovementWatcher) -> Self::Value;
}

/// Maximum graph depth that grows while the search stagnates.
///
/// Non-adaptive instances always report `max_depth`. Adaptive ones start at
/// `start_depth` and grow by one each time the stagnation counter has
/// reached `max_stagnation_gens`, never beyond `max_depth`.
///
/// # Examples
///
/// ```
/// use u_graphevo::adaptive::{AdaptiveGraphDepth, AdaptiveParameter, ImprovementWatcher};
///
/// let mut depth = AdaptiveGraphDepth::new(2, 4, 1, true).unwrap();
/// let mut watcher = ImprovementWatcher::new();
/// assert_eq!(depth.next(&watcher), 2);
/// watcher.update(false);
/// assert_eq!(depth.next(&watcher), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveGraphDepth {
    start_depth: usize,
    max_depth: usize,
    current_depth: usize,
    max_stagnation_gens: usize,
    adaptive: bool,
}

impl AdaptiveGraphDepth {
    pub fn new(
        start_depth: usize,
        max_depth: usize,
        max_stagnation_gens: usize,
        adaptive: bool,
    ) -> Result<Self, ParameterError> {
        if start_depth == 0 {
            return Err(ParameterError::StartDepth(start_depth));
        }
        if max_depth < start_depth {
            return Err(ParameterError::MaxDepth {
                start: start_depth,
                max: max_depth,
            });
        }
        if max_stagnation_gens == 0 {
            return Err(ParameterError::StagnationGens);
        }
        Ok(Self {
            start_depth,
            max_depth,
            current_depth: start_depth,
            max_stagnation_gens,
            adaptive,
        })
    }

    /// Value last reported (or the start value).
    pub fn current(&self) -> usize {
        if self.adaptive {
            self.current_depth
        } else {
            self.max_depth
        }
    }
}

impl AdaptiveParameter for AdaptiveGraphDepth {
    type Value = usize;

    fn initial(&self) -> usize {
        self.start_depth
    }

    fn next(&mut self, watcher: &ImprovementWatcher) -> usize {
        if !self.adaptive {
            return self.max_depth;
        }
        if self.current_depth < self.max_depth
            && watcher.stagnation_iter_count() >= self.max_stagnation_gens
        {
            self.current_depth += 1;
        }
        self.current_depth
    }
}
