// src/rl/trainer.rs
//
// Episode orchestration for policy training.
//
// One episode = reset -> repeated (encode -> sample -> step -> store)
// until the environment terminates, then exactly one policy update.
// After training, evaluation rollouts (all-hold baseline vs greedy
// policy) produce the baseline-vs-optimized comparison and the
// recommended action schedule for the run record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assets::AssetRecord;
use crate::config::{Config, TrainerConfig};
use crate::engine::FundEnv;
use crate::error::Result;
use crate::logging::EventSink;
use crate::metrics::{OnlineStats, TrailingWindow};
use crate::rl::action_space::ActionSpace;
use crate::rl::encoder::StateEncoder;
use crate::rl::policy::ReinforcePolicy;
use crate::runs::RecommendedAction;
use crate::types::{ActionMap, AssetAction};

/// Summary of one completed training episode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeSummary {
    pub episode: u64,
    /// Seed the environment was reset with (base_seed + episode).
    pub seed: u64,
    pub steps: u64,
    pub total_reward: f64,
    /// REINFORCE loss of the update that consumed this episode.
    pub loss: f64,
    /// Annualized terminal return; None if the episode hit the step cap
    /// before the environment terminated.
    pub terminal_return: Option<f64>,
    pub bankrupt: bool,
    pub final_cash_balance: f64,
}

/// Aggregate summary of a full training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingSummary {
    pub policy_version: String,
    /// Episodes actually executed (may fall short of the configured count
    /// when the stop flag is raised).
    pub episodes: u64,
    pub total_steps: u64,
    pub mean_reward: f64,
    pub reward_stddev: f64,
    pub mean_terminal_return: f64,
    pub best_terminal_return: f64,
    pub worst_terminal_return: f64,
    pub bankruptcies: u64,
    pub final_loss: f64,
}

/// Result of one evaluation rollout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalRollout {
    pub seed: u64,
    pub steps: u64,
    pub total_reward: f64,
    pub terminal_return: Option<f64>,
    pub bankrupt: bool,
    /// Capital actions the policy chose, in period order. Empty for the
    /// all-hold baseline.
    pub actions: Vec<RecommendedAction>,
}

/// Owns the environment, policy and encoder for one training run.
pub struct Trainer<S: EventSink> {
    env: FundEnv,
    policy: ReinforcePolicy,
    encoder: StateEncoder,
    action_space: ActionSpace,
    cfg: TrainerConfig,
    sink: S,
    stop: Option<Arc<AtomicBool>>,
}

impl<S: EventSink> Trainer<S> {
    /// Build a trainer from the config bundle and an asset list. Fails only
    /// if the asset list is malformed.
    pub fn new(config: &Config, records: &[AssetRecord], sink: S) -> Result<Self> {
        let env = FundEnv::new(
            config.sim.clone(),
            records.to_vec(),
            config.trainer.base_seed,
        )?;
        let encoder = StateEncoder::new(config.max_assets, config.encoder.clone());
        let action_space = ActionSpace::new(config.max_assets);
        let policy =
            ReinforcePolicy::new(encoder.encoded_len(), action_space.dim(), &config.policy);
        Ok(Self {
            env,
            policy,
            encoder,
            action_space,
            cfg: config.trainer.clone(),
            sink,
            stop: None,
        })
    }

    /// Install a shared stop flag, checked between episodes.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn policy(&self) -> &ReinforcePolicy {
        &self.policy
    }

    pub fn env(&self) -> &FundEnv {
        &self.env
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Run the configured number of episodes, updating the policy once per
    /// episode and emitting trailing-window metrics.
    pub fn train(&mut self) -> TrainingSummary {
        let mut reward_stats = OnlineStats::default();
        let mut return_stats = OnlineStats::default();
        let mut reward_window = TrailingWindow::new(self.cfg.metrics_window);
        let mut return_window = TrailingWindow::new(self.cfg.metrics_window);

        let mut executed = 0u64;
        let mut total_steps = 0u64;
        let mut bankruptcies = 0u64;
        let mut final_loss = 0.0;

        for episode in 0..self.cfg.num_episodes {
            if self.stop_requested() {
                info!(target: "trainer", episode, "stop flag raised, ending training early");
                break;
            }

            let summary = self.run_episode(episode);
            executed += 1;
            total_steps += summary.steps;
            reward_stats.add(summary.total_reward);
            reward_window.push(summary.total_reward);
            if let Some(r) = summary.terminal_return {
                return_stats.add(r);
                return_window.push(r);
            }
            if summary.bankrupt {
                bankruptcies += 1;
            }
            final_loss = summary.loss;

            if self.cfg.log_every > 0 && (episode + 1) % self.cfg.log_every == 0 {
                info!(
                    target: "trainer",
                    episode = episode + 1,
                    trailing_reward = reward_window.mean(),
                    trailing_return = return_window.mean(),
                    loss = summary.loss,
                    "training progress"
                );
            }

            self.sink.log_episode(&summary);
        }
        self.sink.flush();

        TrainingSummary {
            policy_version: self.policy.version().to_string(),
            episodes: executed,
            total_steps,
            mean_reward: reward_stats.mean(),
            reward_stddev: reward_stats.stddev(),
            mean_terminal_return: return_stats.mean(),
            best_terminal_return: return_stats.max(),
            worst_terminal_return: return_stats.min(),
            bankruptcies,
            final_loss,
        }
    }

    fn run_episode(&mut self, episode: u64) -> EpisodeSummary {
        let seed = self.cfg.base_seed.wrapping_add(episode);
        let mut obs = self.env.reset(seed);

        let mut total_reward = 0.0;
        let mut steps = 0u64;

        for _ in 0..self.cfg.max_steps {
            // 1) Encode the snapshot, sample, decode into a per-asset map.
            let features = self.encoder.encode(&obs);
            let sampled = self.policy.select_action(&features);
            let decoded = self.action_space.decode(sampled.index, &obs);

            // 2) Advance the fund one period.
            let result = self.env.step(&decoded.map);
            self.sink.log_step(episode, &result);

            // 3) Store the transition for the end-of-episode update.
            self.policy.store_transition(
                features,
                sampled.index,
                result.reward,
                sampled.probability,
            );

            total_reward += result.reward;
            steps += 1;

            let done = result.done;
            obs = result.observation;
            if done {
                break;
            }
        }

        // One Monte-Carlo update per episode; always clears the buffer.
        let update = self.policy.update_policy();

        EpisodeSummary {
            episode,
            seed,
            steps,
            total_reward,
            loss: update.loss,
            terminal_return: self.env.final_return(),
            bankrupt: self.env.state().bankrupt,
            final_cash_balance: self.env.state().cash_balance,
        }
    }

    /// Hold every asset every period. The do-nothing reference the trained
    /// policy is compared against.
    pub fn rollout_baseline(&mut self, seed: u64) -> EvalRollout {
        let hold = ActionMap::new();
        self.env.reset(seed);

        let mut total_reward = 0.0;
        let mut steps = 0u64;
        for _ in 0..self.cfg.max_steps {
            let result = self.env.step(&hold);
            total_reward += result.reward;
            steps += 1;
            if result.done {
                break;
            }
        }

        EvalRollout {
            seed,
            steps,
            total_reward,
            terminal_return: self.env.final_return(),
            bankrupt: self.env.state().bankrupt,
            actions: Vec::new(),
        }
    }

    /// Deterministic argmax rollout of the trained policy. Produces the
    /// recommended action schedule with per-action confidence.
    pub fn rollout_greedy(&mut self, seed: u64) -> EvalRollout {
        let mut obs = self.env.reset(seed);

        let mut total_reward = 0.0;
        let mut steps = 0u64;
        let mut actions = Vec::new();

        for _ in 0..self.cfg.max_steps {
            let features = self.encoder.encode(&obs);
            let choice = self.policy.greedy_action(&features);
            let decoded = self.action_space.decode(choice.index, &obs);

            if let Some((asset_id, action)) = &decoded.target {
                if *action != AssetAction::Hold {
                    actions.push(RecommendedAction {
                        period: obs.period,
                        asset_id: asset_id.clone(),
                        action: *action,
                        confidence: choice.probability,
                    });
                }
            }

            let result = self.env.step(&decoded.map);
            total_reward += result.reward;
            steps += 1;

            let done = result.done;
            obs = result.observation;
            if done {
                break;
            }
        }

        EvalRollout {
            seed,
            steps,
            total_reward,
            terminal_return: self.env.final_return(),
            bankrupt: self.env.state().bankrupt,
            actions,
        }
    }
}
