//! Failure-isolating, parallel objective evaluation.

use super::objective::{EvaluationError, Objective};
use super::types::Fitness;
use crate::dag::Graph;
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Object-safe view of an evaluator, for consumers that only need to score
/// single graphs (e.g. structural analysis).
pub trait Evaluate: Sync {
    fn weights(&self) -> &[f64];

    /// Scores a graph. Failures come back as invalid fitness.
    fn evaluate(&self, graph: &Graph) -> Fitness;

    /// Metric value given to every objective of an invalid fitness.
    fn worst(&self) -> f64 {
        f64::INFINITY
    }
}

/// Wraps an [`Objective`] with the worst sentinel and a bounded worker pool.
///
/// Every failure mode of the objective (error, panic, wrong arity,
/// non-finite metric) becomes an invalid [`Fitness`].
pub struct ObjectiveEvaluator<'a, O: Objective + ?Sized> {
    objective: &'a O,
    worst: f64,
    pool: Option<rayon::ThreadPool>,
}

impl<'a, O: Objective + ?Sized> ObjectiveEvaluator<'a, O> {
    /// Sequential evaluator with `f64::INFINITY` as the worst value.
    pub fn new(objective: &'a O) -> Self {
        Self {
            objective,
            worst: f64::INFINITY,
            pool: None,
        }
    }

    /// Sets the sentinel stored in invalid fitness (minimization form).
    pub fn with_worst(mut self, worst: f64) -> Self {
        self.worst = worst;
        self
    }

    /// Sets the worker count: `0` uses all available cores, `1` evaluates
    /// on the calling thread.
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        self.pool = match n_jobs {
            1 => None,
            n => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
        };
        Ok(self)
    }

    pub fn objective(&self) -> &O {
        self.objective
    }

    /// Evaluates and validates, reporting why a result is unusable.
    pub fn try_evaluate(&self, graph: &Graph) -> Result<Fitness, EvaluationError> {
        let weights = self.objective.weights();
        let values = catch_unwind(AssertUnwindSafe(|| self.objective.evaluate(graph)))
            .map_err(|payload| EvaluationError::Panicked(panic_message(payload.as_ref())))??;
        let fitness = Fitness::multi(&values, weights)?;
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(EvaluationError::NonFinite {
                index,
                value: values[index],
            });
        }
        Ok(fitness)
    }

    /// Evaluates a batch in input order.
    ///
    /// Items whose evaluation has not started by `deadline` come back as
    /// `None`; running evaluations are never interrupted.
    pub fn evaluate_batch(&self, graphs: &[&Graph], deadline: Option<Instant>) -> Vec<Option<Fitness>> {
        let run_one = |graph: &Graph| -> Option<Fitness> {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return None;
            }
            Some(Evaluate::evaluate(self, graph))
        };
        let results: Vec<Option<Fitness>> = match &self.pool {
            Some(pool) => pool.install(|| graphs.par_iter().map(|&g| run_one(g)).collect()),
            None => graphs.iter().map(|&g| run_one(g)).collect(),
        };
        let skipped = results.iter().filter(|r| r.is_none()).count();
        if skipped > 0 {
            log::warn!("evaluation deadline passed, {skipped} of {} candidates skipped", graphs.len());
        }
        results
    }
}

impl<O: Objective + ?Sized> Evaluate for ObjectiveEvaluator<'_, O> {
    fn weights(&self) -> &[f64] {
        self.objective.weights()
    }

    fn worst(&self) -> f64 {
        self.worst
    }

    fn evaluate(&self, graph: &Graph) -> Fitness {
        match self.try_evaluate(graph) {
            Ok(fitness) => fitness,
            Err(err) => {
                log::debug!("evaluation failed for {}: {err}", graph.descriptive_id());
                Fitness::invalid(self.objective.weights(), self.worst)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::ObjectiveFn;
    use std::time::Duration;

    fn chain(n: usize) -> Graph {
        let mut g = Graph::new();
        let mut prev = g.add_node("n0");
        for i in 1..n {
            prev = g.add_node_with_parents(format!("n{i}"), &[prev]).unwrap();
        }
        g
    }

    #[test]
    fn test_valid_evaluation() {
        let obj = ObjectiveFn::minimize(|g: &Graph| Ok(vec![g.length() as f64]));
        let eval = ObjectiveEvaluator::new(&obj);
        let f = Evaluate::evaluate(&eval, &chain(3));
        assert!(f.is_valid());
        assert_eq!(f.values(), &[3.0]);
    }

    #[test]
    fn test_failures_become_invalid() {
        let failing = ObjectiveFn::minimize(|_: &Graph| Err(EvaluationError::Failed("boom".into())));
        let panicking = ObjectiveFn::minimize(|_: &Graph| -> Result<Vec<f64>, EvaluationError> {
            panic!("objective exploded")
        });
        let wrong_arity = ObjectiveFn::minimize(|_: &Graph| Ok(vec![1.0, 2.0]));
        let non_finite = ObjectiveFn::minimize(|_: &Graph| Ok(vec![f64::NAN]));
        let g = chain(2);

        let e = ObjectiveEvaluator::new(&failing).with_worst(1e6);
        let f = Evaluate::evaluate(&e, &g);
        assert!(!f.is_valid());
        assert_eq!(f.values(), &[1e6]);

        let e = ObjectiveEvaluator::new(&panicking);
        assert_eq!(
            e.try_evaluate(&g),
            Err(EvaluationError::Panicked("objective exploded".into()))
        );
        assert!(!Evaluate::evaluate(&e, &g).is_valid());

        let e = ObjectiveEvaluator::new(&wrong_arity);
        assert_eq!(
            e.try_evaluate(&g),
            Err(EvaluationError::ArityMismatch { expected: 1, got: 2 })
        );

        let e = ObjectiveEvaluator::new(&non_finite);
        assert!(matches!(e.try_evaluate(&g), Err(EvaluationError::NonFinite { index: 0, .. })));
    }

    #[test]
    fn test_batch_preserves_order_in_parallel() {
        let obj = ObjectiveFn::minimize(|g: &Graph| Ok(vec![g.length() as f64]));
        let eval = ObjectiveEvaluator::new(&obj).with_n_jobs(4).unwrap();
        let graphs: Vec<Graph> = (1..=12).map(chain).collect();
        let refs: Vec<&Graph> = graphs.iter().collect();
        let results = eval.evaluate_batch(&refs, None);
        let lengths: Vec<f64> = results.iter().map(|r| r.as_ref().unwrap().values()[0]).collect();
        assert_eq!(lengths, (1..=12).map(|n| n as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_past_deadline_is_skipped() {
        let obj = ObjectiveFn::minimize(|g: &Graph| Ok(vec![g.length() as f64]));
        let eval = ObjectiveEvaluator::new(&obj);
        let g = chain(2);
        let past = Instant::now() - Duration::from_millis(5);
        let results = eval.evaluate_batch(&[&g, &g], Some(past));
        assert!(results.iter().all(Option::is_none));
    }
}
