//! Reward-driven operator selection.
//!
//! The agent itself is immutable configuration; everything it learns lives
//! in an [`AgentState`] value that the caller threads through the run.

use super::parameters::ParameterError;
use super::reward::RewardAgent;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What the agent has learned so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Decayed reward of each arm from the last observed batch.
    pub decay: Vec<f64>,

    /// Selection probability of each arm. All zeros after a batch whose
    /// decays are all zero; [`OperatorAgent::get_action_probs`] and
    /// sampling then use the uniform distribution.
    pub probs: Vec<f64>,
}

impl AgentState {
    /// Whether the distribution carries no information.
    pub fn is_degenerate(&self) -> bool {
        self.probs.iter().all(|&p| p <= 0.0)
    }
}

/// Multi-armed selector over a fixed set of actions.
///
/// # Examples
///
/// ```
/// use u_graphevo::adaptive::OperatorAgent;
/// use u_graphevo::random::create_rng;
///
/// let agent = OperatorAgent::new(vec!["grow", "shrink"], 1.0).unwrap();
/// let mut rng = create_rng(0);
/// let state = agent.initial_state();
///
/// let arms = agent.choose(&state, 4, &mut rng);
/// let state = agent.observe(state, &[0.0, 1.0, 0.0, 1.0], &[0, 1, 0, 1]);
/// assert_eq!(agent.get_action_probs(&state), vec![0.0, 1.0]);
/// # let _ = arms;
/// ```
#[derive(Debug, Clone)]
pub struct OperatorAgent<A> {
    actions: Vec<A>,
    reward_agent: RewardAgent,
    exploration: f64,
}

impl<A: Clone> OperatorAgent<A> {
    pub fn new(actions: Vec<A>, decaying_factor: f64) -> Result<Self, ParameterError> {
        if actions.is_empty() {
            return Err(ParameterError::NoActions);
        }
        Ok(Self {
            actions,
            reward_agent: RewardAgent::new(decaying_factor)?,
            exploration: 0.0,
        })
    }

    /// Mixes `exploration / n` into every arm's probability so no arm
    /// starves. Clamped to `[0, 1]`.
    pub fn with_exploration(mut self, exploration: f64) -> Self {
        self.exploration = exploration.clamp(0.0, 1.0);
        self
    }

    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    pub fn n_arms(&self) -> usize {
        self.actions.len()
    }

    /// Uniform distribution, no decay.
    pub fn initial_state(&self) -> AgentState {
        let n = self.n_arms();
        AgentState {
            decay: vec![0.0; n],
            probs: vec![1.0 / n as f64; n],
        }
    }

    /// Current distribution; uniform while `state` is degenerate.
    pub fn get_action_probs(&self, state: &AgentState) -> Vec<f64> {
        if state.is_degenerate() || state.probs.len() != self.n_arms() {
            return self.uniform();
        }
        state.probs.clone()
    }

    fn uniform(&self) -> Vec<f64> {
        let n = self.n_arms();
        vec![1.0 / n as f64; n]
    }

    /// Draws `n` arm indices from the distribution (uniform if degenerate).
    pub fn choose<R: Rng>(&self, state: &AgentState, n: usize, rng: &mut R) -> Vec<usize> {
        (0..n).map(|_| self.choose_one(state, rng)).collect()
    }

    /// Like [`choose`](Self::choose) but returns the actions.
    pub fn choose_actions<R: Rng>(&self, state: &AgentState, n: usize, rng: &mut R) -> Vec<A> {
        self.choose(state, n, rng)
            .into_iter()
            .map(|arm| self.actions[arm].clone())
            .collect()
    }

    /// Folds a reward batch into a new state.
    ///
    /// Decays are overwritten with this batch's decayed sums. Negative
    /// rates are clamped to zero and the rest renormalized. A batch with
    /// non-zero decays but no positive rate yields the uniform distribution.
    pub fn observe(&self, mut state: AgentState, rewards: &[f64], arms: &[usize]) -> AgentState {
        debug_assert_eq!(rewards.len(), arms.len(), "one reward per chosen arm");
        let n = self.n_arms();
        let decay = self.reward_agent.decay_values(rewards, arms, n);
        let mut probs: Vec<f64> = RewardAgent::fitness_rank_rate(&decay)
            .into_iter()
            .map(|p| p.max(0.0))
            .collect();
        let total: f64 = probs.iter().sum();
        if total > 0.0 {
            for p in &mut probs {
                *p = (1.0 - self.exploration) * (*p / total) + self.exploration / n as f64;
            }
        } else if decay.iter().any(|&d| d != 0.0) {
            probs = self.uniform();
        }
        log::trace!("operator agent probabilities: {probs:?}");
        state.decay = decay;
        state.probs = probs;
        state
    }

    /// Roulette over `probs`, mirroring weighted operator selection.
    fn choose_one<R: Rng>(&self, state: &AgentState, rng: &mut R) -> usize {
        let n = self.n_arms();
        let total: f64 = state.probs.iter().filter(|p| **p > 0.0).sum();
        if state.probs.len() != n || total <= 0.0 {
            return rng.random_range(0..n);
        }
        let mut roll = rng.random_range(0.0..total);
        for (i, &p) in state.probs.iter().enumerate() {
            if p <= 0.0 {
                continue;
            }
            roll -= p;
            if roll < 0.0 {
                return i;
            }
        }
        // floating-point fallback: last arm with mass
        state.probs.iter().rposition(|&p| p > 0.0).unwrap_or(n - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;
    use proptest::prelude::*;

    fn agent(n: usize) -> OperatorAgent<usize> {
        OperatorAgent::new((0..n).collect(), 1.0).unwrap()
    }

    #[test]
    fn test_rejects_empty_actions() {
        assert_eq!(
            OperatorAgent::<u8>::new(Vec::new(), 1.0).unwrap_err(),
            ParameterError::NoActions
        );
        assert!(OperatorAgent::new(vec![1], 0.0).is_err());
    }

    #[test]
    fn test_initial_uniform() {
        let a = agent(4);
        let state = a.initial_state();
        assert_eq!(a.get_action_probs(&state), vec![0.25; 4]);
    }

    #[test]
    fn test_zero_rewards_fall_back_to_uniform() {
        let a = agent(3);
        let state = a.observe(a.initial_state(), &[0.0, 0.0], &[0, 1]);
        assert!(state.is_degenerate());
        let mut rng = create_rng(3);
        let picks = a.choose(&state, 300, &mut rng);
        for arm in 0..3 {
            assert!(picks.contains(&arm), "arm {arm} never drawn");
        }
    }

    #[test]
    fn test_all_negative_rewards_give_uniform() {
        let a = agent(3);
        let state = a.observe(a.initial_state(), &[-1.0, -2.0], &[0, 1]);
        assert!(!state.is_degenerate());
        let probs = a.get_action_probs(&state);
        assert_eq!(probs, vec![1.0 / 3.0; 3]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_state_reports_uniform() {
        let a = agent(4);
        let state = a.observe(a.initial_state(), &[0.0], &[2]);
        assert_eq!(state.probs, vec![0.0; 4]);
        assert_eq!(a.get_action_probs(&state), vec![0.25; 4]);
    }

    #[test]
    fn test_observe_overwrites_previous_batch() {
        let a = agent(2);
        let s1 = a.observe(a.initial_state(), &[5.0], &[0]);
        assert_eq!(s1.probs, vec![1.0, 0.0]);
        let s2 = a.observe(s1, &[1.0], &[1]);
        assert_eq!(s2.probs, vec![0.0, 1.0]);
        assert_eq!(s2.decay, vec![0.0, 1.0]);
    }

    #[test]
    fn test_choose_follows_distribution() {
        let a = agent(3);
        let state = a.observe(a.initial_state(), &[1.0], &[2]);
        let mut rng = create_rng(11);
        assert!(a.choose(&state, 50, &mut rng).iter().all(|&arm| arm == 2));
    }

    #[test]
    fn test_exploration_keeps_every_arm_alive() {
        let a = agent(4).with_exploration(0.2);
        let state = a.observe(a.initial_state(), &[1.0], &[0]);
        assert!(state.probs.iter().all(|&p| p > 0.0));
        assert!((state.probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((state.probs[0] - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_choose_actions() {
        let a = OperatorAgent::new(vec!['x', 'y'], 1.0).unwrap();
        let state = a.observe(a.initial_state(), &[2.0], &[1]);
        let mut rng = create_rng(0);
        assert_eq!(a.choose_actions(&state, 3, &mut rng), vec!['y'; 3]);
    }

    proptest! {
        #[test]
        fn prop_probs_form_distribution(
            batch in proptest::collection::vec((-10.0f64..10.0, 0usize..5), 1..30),
            decaying_factor in 0.01f64..=1.0,
        ) {
            let a = OperatorAgent::new((0..5).collect::<Vec<usize>>(), decaying_factor).unwrap();
            let rewards: Vec<f64> = batch.iter().map(|(r, _)| *r).collect();
            let arms: Vec<usize> = batch.iter().map(|(_, a)| *a).collect();
            let state = a.observe(a.initial_state(), &rewards, &arms);
            let probs = a.get_action_probs(&state);
            prop_assert!(probs.iter().all(|&p| p >= 0.0));
            prop_assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
