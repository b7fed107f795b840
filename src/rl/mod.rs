// src/rl/mod.rs
//
// Reinforcement-learning layer over the fund environment.
//
// Key components:
// - Observation: versioned, serializable portfolio snapshot for policy input
// - StateEncoder: fixed-length feature vector (global + per-asset blocks)
// - GraphEmbedder: structural embedding over the fully-connected asset graph
// - ActionSpace: flat discrete index <-> per-asset action map
// - Trajectory: episode buffer with discounted / standardized returns
// - ReinforcePolicy: linear-softmax categorical policy, Monte-Carlo updates
// - Trainer: episode orchestration, metrics, evaluation rollouts

pub mod action_space;
pub mod encoder;
pub mod graph;
pub mod observation;
pub mod policy;
pub mod trainer;
pub mod trajectory;

// Re-exports for convenience
pub use action_space::{ActionSpace, DecodedAction, ACTIONS_PER_ASSET};
pub use encoder::{StateEncoder, ENC_GLOBAL_DIM, ENC_PER_ASSET_DIM, ENC_VERSION};
pub use graph::{GraphEmbedder, GRAPH_VERSION};
pub use observation::{AssetObservation, Observation, OBS_VERSION};
pub use policy::{PolicyUpdate, ReinforcePolicy, SampledAction, POLICY_VERSION};
pub use trainer::{EpisodeSummary, EvalRollout, Trainer, TrainingSummary};
pub use trajectory::{Trajectory, Transition};
