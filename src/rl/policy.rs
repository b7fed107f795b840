// src/rl/policy.rs
//
// Linear-softmax REINFORCE policy over the discrete action space.
//
// The policy is a weight matrix mapping encoded state features to action
// logits. Sampling, weight init and everything else stochastic flows
// through the policy's own seeded generator. Updates are Monte-Carlo over
// one full episode: backward discounted returns, standardized, one
// gradient-ascent step on log-probabilities, buffers cleared.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::PolicyConfig;
use crate::rl::trajectory::{Trajectory, Transition};

/// Policy schema/version tag carried into telemetry and run records.
pub const POLICY_VERSION: &str = "reinforce-linear-v1";

/// Floor for log-probability terms in the reported loss.
const PROB_FLOOR: f64 = 1e-12;

/// An action sampled (or argmaxed) from the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledAction {
    pub index: usize,
    /// Raw probability the policy assigned to `index`.
    pub probability: f64,
}

/// Outcome of one policy update, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyUpdate {
    /// Transitions consumed.
    pub transitions: usize,
    /// -sum(log p_t * standardized_return_t) over the episode.
    pub loss: f64,
    /// Mean raw discounted return across the episode.
    pub mean_return: f64,
}

impl PolicyUpdate {
    fn empty() -> Self {
        Self {
            transitions: 0,
            loss: 0.0,
            mean_return: 0.0,
        }
    }
}

/// Categorical policy with linear logits, trained by REINFORCE.
pub struct ReinforcePolicy {
    /// Row per action, column per state feature.
    weights: Vec<Vec<f64>>,
    state_dim: usize,
    action_dim: usize,
    learning_rate: f64,
    gamma: f64,
    rng: ChaCha8Rng,
    trajectory: Trajectory,
}

impl ReinforcePolicy {
    /// Build a policy for the given dimensions. Weight init and sampling
    /// both derive from `cfg.seed`, so two policies with identical configs
    /// behave identically.
    pub fn new(state_dim: usize, action_dim: usize, cfg: &PolicyConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let weights = (0..action_dim)
            .map(|_| {
                (0..state_dim)
                    .map(|_| {
                        if cfg.init_scale > 0.0 {
                            rng.gen_range(-cfg.init_scale..cfg.init_scale)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            weights,
            state_dim,
            action_dim,
            learning_rate: cfg.learning_rate,
            gamma: cfg.gamma,
            rng,
            trajectory: Trajectory::new(),
        }
    }

    pub fn version(&self) -> &'static str {
        POLICY_VERSION
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    pub fn trajectory_len(&self) -> usize {
        self.trajectory.len()
    }

    /// Softmax action distribution for a state vector.
    ///
    /// Logits are max-subtracted before exponentiation so extreme weights
    /// cannot overflow.
    pub fn action_probs(&self, state: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .map(|row| row.iter().zip(state).map(|(w, x)| w * x).sum())
            .collect();
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    /// Sample an action from the categorical distribution.
    pub fn select_action(&mut self, state: &[f64]) -> SampledAction {
        let probs = self.action_probs(state);
        let draw: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        for (index, p) in probs.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return SampledAction {
                    index,
                    probability: *p,
                };
            }
        }
        // Float rounding can leave the cumulative sum a hair under 1.
        let index = probs.len() - 1;
        SampledAction {
            index,
            probability: probs[index],
        }
    }

    /// Highest-probability action, no sampling. Used for evaluation
    /// rollouts after training.
    pub fn greedy_action(&self, state: &[f64]) -> SampledAction {
        let probs = self.action_probs(state);
        let index = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        SampledAction {
            index,
            probability: probs[index],
        }
    }

    /// Append one transition to the episode buffer.
    pub fn store_transition(
        &mut self,
        state: Vec<f64>,
        action_index: usize,
        reward: f64,
        probability: f64,
    ) {
        self.trajectory.push(Transition {
            state,
            action_index,
            reward,
            probability,
        });
    }

    /// Monte-Carlo update over the buffered episode.
    ///
    /// The buffer is consumed whatever happens: a zero-length trajectory is
    /// a no-op that still leaves the policy ready for the next episode.
    pub fn update_policy(&mut self) -> PolicyUpdate {
        if self.trajectory.is_empty() {
            return PolicyUpdate::empty();
        }

        let standardized = self.trajectory.standardized_returns(self.gamma);
        let raw = self.trajectory.discounted_returns(self.gamma);
        let mean_return = raw.iter().sum::<f64>() / raw.len() as f64;

        // Take the buffer out; this clears it no matter what follows.
        let trajectory = std::mem::take(&mut self.trajectory);
        let transitions = trajectory.len();
        let mut loss = 0.0;

        for (t, transition) in trajectory.transitions().iter().enumerate() {
            let g = standardized[t];
            loss -= transition.probability.max(PROB_FLOOR).ln() * g;

            // Softmax gradient of log pi(a|s):
            //   d/dw[a'] = state * (1{a'=a} - p[a'])
            let probs = self.action_probs(&transition.state);
            for a in 0..self.action_dim {
                let indicator = if a == transition.action_index { 1.0 } else { 0.0 };
                let coeff = self.learning_rate * g * (indicator - probs[a]);
                if coeff == 0.0 {
                    continue;
                }
                for (w, x) in self.weights[a].iter_mut().zip(&transition.state) {
                    *w += coeff * x;
                }
            }
        }

        PolicyUpdate {
            transitions,
            loss,
            mean_return,
        }
    }
}
