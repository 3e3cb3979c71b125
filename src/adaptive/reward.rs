//! Reward shaping for the operator agent.
//!
//! Raw rewards are turned into per-arm decayed sums and then into
//! fitness-rank rates, which is what the agent's distribution is built from.

use super::parameters::ParameterError;

/// Turns a batch of observed rewards into per-arm rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardAgent {
    decaying_factor: f64,
}

impl RewardAgent {
    /// `decaying_factor` must lie in `(0, 1]`.
    pub fn new(decaying_factor: f64) -> Result<Self, ParameterError> {
        if !(decaying_factor > 0.0 && decaying_factor <= 1.0) {
            return Err(ParameterError::DecayingFactor(decaying_factor));
        }
        Ok(Self { decaying_factor })
    }

    pub fn decaying_factor(&self) -> f64 {
        self.decaying_factor
    }

    /// `decaying_factor * Σ rewards` per arm for this batch only.
    ///
    /// Arms absent from the batch get 0; out-of-range arms are ignored.
    pub fn decay_values(&self, rewards: &[f64], arms: &[usize], n_arms: usize) -> Vec<f64> {
        let mut decay = vec![0.0; n_arms];
        for (&reward, &arm) in rewards.iter().zip(arms) {
            if let Some(slot) = decay.get_mut(arm) {
                *slot += reward;
            }
        }
        for d in &mut decay {
            *d *= self.decaying_factor;
        }
        decay
    }

    /// `frr[i] = decay[i] / Σ |decay|`; all zeros when every decay is zero.
    pub fn fitness_rank_rate(decay: &[f64]) -> Vec<f64> {
        let total: f64 = decay.iter().map(|d| d.abs()).sum();
        if total == 0.0 {
            return vec![0.0; decay.len()];
        }
        decay.iter().map(|d| d / total).collect()
    }

    /// The rate of each observation's arm, aligned with `arms`.
    pub fn rewards_for_arms(&self, rewards: &[f64], arms: &[usize], n_arms: usize) -> Vec<f64> {
        let frr = Self::fitness_rank_rate(&self.decay_values(rewards, arms, n_arms));
        arms.iter()
            .map(|&arm| frr.get(arm).copied().unwrap_or(0.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_bounds() {
        assert!(RewardAgent::new(0.0).is_err());
        assert!(RewardAgent::new(1.5).is_err());
        assert!(RewardAgent::new(f64::NAN).is_err());
        assert!(RewardAgent::new(1.0).is_ok());
    }

    #[test]
    fn test_decay_is_batch_sum() {
        let agent = RewardAgent::new(0.5).unwrap();
        let decay = agent.decay_values(&[1.0, 2.0, 4.0], &[0, 2, 0], 3);
        assert_eq!(decay, vec![2.5, 0.0, 1.0]);
    }

    #[test]
    fn test_rank_rate() {
        let frr = RewardAgent::fitness_rank_rate(&[3.0, -1.0, 0.0]);
        assert_eq!(frr, vec![0.75, -0.25, 0.0]);
        assert_eq!(RewardAgent::fitness_rank_rate(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_rewards_for_arms() {
        let agent = RewardAgent::new(1.0).unwrap();
        let r = agent.rewards_for_arms(&[1.0, 3.0], &[1, 0], 2);
        assert_eq!(r, vec![0.25, 0.75]);
    }
}
