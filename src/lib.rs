//! Mansard core library.
//!
//! This crate exposes a deterministic monthly simulation of a leveraged
//! real-estate fund (hold / refinance / sell / capex per asset, DSCR
//! tracking, bankruptcy, IRR-based terminal return) together with the
//! policy-gradient layer that learns an action schedule over it. The
//! binary (`src/main.rs`) is just a thin training / research harness
//! around these components.

pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod finance;
pub mod logging;
pub mod metrics;
pub mod rl;
pub mod runs;
pub mod state;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use assets::{demo_portfolio, load_portfolio, parse_portfolio, AssetRecord};

pub use config::{
    resolve_effective_profile, Config, EffectiveProfile, EncoderScales, PolicyConfig,
    ProfileSource, RiskProfile, SimConfig, TrainerConfig,
};

pub use engine::{FundEnv, StepInfo, StepResult};

pub use error::{MansardError, Result};

pub use logging::{EventSink, JsonlSink, NoopSink};

pub use rl::{
    ActionSpace, GraphEmbedder, Observation, ReinforcePolicy, StateEncoder, Trainer,
    TrainingSummary,
};

pub use runs::{InMemoryRunStore, RecommendedAction, RunId, RunRecord, RunStatus, RunStore};

pub use state::{AssetState, PortfolioState};

pub use types::{
    ActionMap, ActionOutcome, AppliedAction, AssetAction, DowngradeReason, Period,
    TerminationReason,
};
