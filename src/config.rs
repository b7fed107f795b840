// src/config.rs
//
// Static configuration for the fund engine, encoder, policy and trainer.
// Everything that shapes behaviour lives here; modules take a config struct
// instead of reaching for constants.

use tracing::{info, warn};

/// Risk profile presets for the simulation constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

impl RiskProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Balanced => "balanced",
            RiskProfile::Aggressive => "aggressive",
        }
    }

    /// Parse a profile name (accepts short aliases).
    pub fn parse(s: &str) -> Option<RiskProfile> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balanced" | "bal" | "b" => Some(RiskProfile::Balanced),
            "conservative" | "cons" | "c" => Some(RiskProfile::Conservative),
            "aggressive" | "agg" | "a" => Some(RiskProfile::Aggressive),
            _ => None,
        }
    }
}

/// Where the effective risk profile came from.
///
/// Precedence (highest to lowest):
/// 1. CLI flag
/// 2. Environment variable (MANSARD_RISK_PROFILE)
/// 3. Built-in default (Balanced)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Cli,
    Env,
    Default,
}

impl ProfileSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileSource::Cli => "cli",
            ProfileSource::Env => "env",
            ProfileSource::Default => "default",
        }
    }
}

/// Resolved profile with its source for logging.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveProfile {
    pub profile: RiskProfile,
    pub source: ProfileSource,
}

impl EffectiveProfile {
    /// Log the effective profile at startup.
    pub fn log_startup(&self) {
        info!(
            target: "config",
            profile = self.profile.as_str(),
            source = self.source.as_str(),
            "effective risk profile"
        );
    }
}

/// Resolve the effective risk profile using the documented precedence.
/// A non-empty but unparseable env value is warned about and ignored,
/// never fatal.
pub fn resolve_effective_profile(cli_profile: Option<RiskProfile>) -> EffectiveProfile {
    if let Some(p) = cli_profile {
        return EffectiveProfile {
            profile: p,
            source: ProfileSource::Cli,
        };
    }

    if let Ok(env_val) = std::env::var("MANSARD_RISK_PROFILE") {
        if !env_val.is_empty() {
            if let Some(p) = RiskProfile::parse(&env_val) {
                return EffectiveProfile {
                    profile: p,
                    source: ProfileSource::Env,
                };
            }
            warn!(
                target: "config",
                value = %env_val,
                "invalid MANSARD_RISK_PROFILE; ignoring"
            );
        }
    }

    EffectiveProfile {
        profile: RiskProfile::Balanced,
        source: ProfileSource::Default,
    }
}

/// Engine constants for one simulation episode.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Episode length in periods (months).
    pub horizon_periods: u32,
    /// DSCR floor; below it a period counts as a violation.
    pub min_dscr: f64,
    /// Leverage cap used to size a refinance loan.
    pub max_leverage: f64,
    /// Minimum periods between refinances of the same asset.
    pub refi_lockout_periods: u32,
    /// Nominal annual rate applied to a new refinance loan.
    pub refi_annual_rate: f64,
    /// Assumed loan-to-value of existing debt (payoff sizing).
    pub assumed_ltv: f64,
    /// Value uplift per unit of funded capex.
    pub capex_value_multiplier: f64,
    /// Std-dev of the relative sale-price noise.
    pub sale_noise_sigma: f64,
    /// Flat reward penalty for a period ending below the DSCR floor.
    pub dscr_penalty: f64,
    /// Consecutive violations that trigger bankruptcy.
    pub max_dscr_violations: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            horizon_periods: 120,
            min_dscr: 1.2,
            max_leverage: 0.75,
            refi_lockout_periods: 12,
            refi_annual_rate: 0.06,
            assumed_ltv: 0.6,
            capex_value_multiplier: 1.2,
            sale_noise_sigma: 0.05,
            dscr_penalty: 0.01,
            max_dscr_violations: 3,
        }
    }
}

impl SimConfig {
    /// Preset constraint levels per risk profile. Only the risk knobs move;
    /// the mechanical constants stay put.
    pub fn for_profile(profile: RiskProfile) -> Self {
        let mut cfg = Self::default();
        match profile {
            RiskProfile::Balanced => {}
            RiskProfile::Conservative => {
                cfg.min_dscr = 1.35;
                cfg.max_leverage = 0.65;
            }
            RiskProfile::Aggressive => {
                cfg.min_dscr = 1.05;
                cfg.max_leverage = 0.80;
            }
        }
        cfg
    }
}

/// Fixed reference scales for feature normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderScales {
    /// Periods; 360 = a 30-year window.
    pub period_scale: f64,
    /// Portfolio / asset value.
    pub value_scale: f64,
    /// Period noi.
    pub noi_scale: f64,
    /// Period debt service.
    pub debt_service_scale: f64,
    /// Cash balance.
    pub cash_scale: f64,
    /// Outstanding capex.
    pub capex_scale: f64,
    /// DSCR is capped here before normalization.
    pub dscr_cap: f64,
    /// Periods since last refinance.
    pub refi_age_scale: f64,
    /// Violation streak (the bankruptcy trigger count).
    pub violation_scale: f64,
}

impl Default for EncoderScales {
    fn default() -> Self {
        Self {
            period_scale: 360.0,
            value_scale: 1.0e8,
            noi_scale: 1.0e6,
            debt_service_scale: 1.0e6,
            cash_scale: 1.0e8,
            capex_scale: 1.0e7,
            dscr_cap: 3.0,
            refi_age_scale: 120.0,
            violation_scale: 3.0,
        }
    }
}

/// Policy-gradient hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Gradient-ascent step size.
    pub learning_rate: f64,
    /// Discount factor for backward returns.
    pub gamma: f64,
    /// Half-width of the uniform weight init.
    pub init_scale: f64,
    /// Seed for weight init and action sampling.
    pub seed: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            gamma: 0.99,
            init_scale: 0.05,
            seed: 7,
        }
    }
}

/// Training-loop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Episodes to run.
    pub num_episodes: u64,
    /// Hard per-episode step cap (episodes normally end on done).
    pub max_steps: u64,
    /// Base seed; episode e runs on base_seed + e.
    pub base_seed: u64,
    /// Emit trailing metrics every this many episodes (0 = never).
    pub log_every: u64,
    /// Trailing window length for the emitted metrics.
    pub metrics_window: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_episodes: 300,
            max_steps: 500,
            base_seed: 42,
            log_every: 10,
            metrics_window: 20,
        }
    }
}

/// Top-level configuration bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Config schema tag, included in run headers and telemetry.
    pub version: &'static str,
    /// Fixed capacity of the encoder and the discrete action space.
    pub max_assets: usize,
    pub sim: SimConfig,
    pub encoder: EncoderScales,
    pub policy: PolicyConfig,
    pub trainer: TrainerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "mansard-0.1",
            max_assets: 8,
            sim: SimConfig::default(),
            encoder: EncoderScales::default(),
            policy: PolicyConfig::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl Config {
    pub fn for_profile(profile: RiskProfile) -> Self {
        Self {
            sim: SimConfig::for_profile(profile),
            ..Self::default()
        }
    }
}
