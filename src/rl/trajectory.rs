// src/rl/trajectory.rs
//
// Episode trajectory buffer: the (state, action, reward, probability)
// records a Monte-Carlo policy update consumes. Owned by one episode,
// consumed exactly once, then cleared.

/// Divisor guard for return standardization.
pub const RETURN_STD_EPS: f64 = 1e-8;

/// One env transition as stored for the policy update.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Encoded state the action was sampled from.
    pub state: Vec<f64>,
    /// Raw discrete action index.
    pub action_index: usize,
    /// Reward received for the step.
    pub reward: f64,
    /// Probability the policy assigned to the sampled action.
    pub probability: f64,
}

/// Ordered transition buffer for one episode.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    transitions: Vec<Transition>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Backward discounted returns: return_t = reward_t + gamma * return_{t+1}.
    pub fn discounted_returns(&self, gamma: f64) -> Vec<f64> {
        let mut returns = vec![0.0; self.transitions.len()];
        let mut acc = 0.0;
        for (i, t) in self.transitions.iter().enumerate().rev() {
            acc = t.reward + gamma * acc;
            returns[i] = acc;
        }
        returns
    }

    /// Discounted returns standardized to zero mean and unit-ish variance.
    ///
    /// A single-transition episode standardizes to 0.0 (no spread to scale
    /// by); the epsilon keeps that case and constant-return episodes finite.
    pub fn standardized_returns(&self, gamma: f64) -> Vec<f64> {
        let mut returns = self.discounted_returns(gamma);
        let n = returns.len();
        if n == 0 {
            return returns;
        }
        let mean = returns.iter().sum::<f64>() / n as f64;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
        let std = var.sqrt();
        for r in &mut returns {
            *r = (*r - mean) / (std + RETURN_STD_EPS);
        }
        returns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(reward: f64) -> Transition {
        Transition {
            state: vec![0.0; 4],
            action_index: 0,
            reward,
            probability: 0.25,
        }
    }

    #[test]
    fn test_backward_discounting() {
        let mut traj = Trajectory::new();
        for _ in 0..3 {
            traj.push(transition(1.0));
        }
        let returns = traj.discounted_returns(0.5);
        assert!((returns[2] - 1.0).abs() < 1e-12);
        assert!((returns[1] - 1.5).abs() < 1e-12);
        assert!((returns[0] - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_standardized_zero_mean() {
        let mut traj = Trajectory::new();
        for r in [1.0, -2.0, 3.0, 0.5] {
            traj.push(transition(r));
        }
        let std_returns = traj.standardized_returns(0.99);
        let mean: f64 = std_returns.iter().sum::<f64>() / std_returns.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!(std_returns.iter().any(|r| r.abs() > 0.1));
    }

    #[test]
    fn test_single_transition_standardizes_to_zero() {
        let mut traj = Trajectory::new();
        traj.push(transition(5.0));
        let std_returns = traj.standardized_returns(0.99);
        assert_eq!(std_returns.len(), 1);
        assert_eq!(std_returns[0], 0.0);
    }

    #[test]
    fn test_empty_trajectory() {
        let traj = Trajectory::new();
        assert!(traj.discounted_returns(0.99).is_empty());
        assert!(traj.standardized_returns(0.99).is_empty());
    }

    #[test]
    fn test_clear() {
        let mut traj = Trajectory::new();
        traj.push(transition(1.0));
        assert_eq!(traj.len(), 1);
        traj.clear();
        assert!(traj.is_empty());
    }
}
