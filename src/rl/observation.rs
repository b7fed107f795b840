// src/rl/observation.rs
//
// Versioned portfolio snapshot handed to policies and telemetry. Built from
// PortfolioState after every step; the engine's mutable state itself never
// crosses the policy boundary.

use serde::{Deserialize, Serialize};

use crate::state::PortfolioState;
use crate::types::Period;

/// Current observation schema version.
/// Increment when adding/removing/changing fields.
pub const OBS_VERSION: u32 = 1;

/// Per-asset observation features (owned assets only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetObservation {
    pub asset_id: String,
    /// Index in the reset-time asset ordering, stable for the episode.
    pub asset_index: usize,
    pub value: f64,
    pub noi: f64,
    pub debt_service: f64,
    pub cap_rate: f64,
    pub required_capex: f64,
    pub periods_since_refinance: Period,
    pub capex_completed: bool,
}

/// Full portfolio observation.
///
/// `assets` holds owned assets only, in reset order; sold assets drop out.
/// Note `dscr` serializes as JSON null when infinite (no debt service).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub obs_version: u32,
    /// Period the next step will process.
    pub period: Period,
    pub total_value: f64,
    pub total_noi: f64,
    pub total_debt_service: f64,
    pub dscr: f64,
    pub cash_balance: f64,
    pub consecutive_dscr_violations: u32,
    pub bankrupt: bool,
    pub assets: Vec<AssetObservation>,
}

impl Observation {
    /// Build an Observation from portfolio state.
    ///
    /// This is the canonical constructor for policy input; the observation
    /// is deterministic given the same state.
    pub fn from_state(state: &PortfolioState) -> Self {
        let mut assets = Vec::with_capacity(state.owned_count());
        for (index, asset) in state.assets.iter().enumerate() {
            if !asset.owned {
                continue;
            }
            assets.push(AssetObservation {
                asset_id: asset.id.clone(),
                asset_index: index,
                value: asset.value,
                noi: asset.noi,
                debt_service: asset.debt_service,
                cap_rate: asset.cap_rate,
                required_capex: asset.required_capex,
                periods_since_refinance: asset.periods_since_refinance(state.current_period),
                capex_completed: asset.capex_completed,
            });
        }

        Observation {
            obs_version: OBS_VERSION,
            period: state.current_period,
            total_value: state.total_value,
            total_noi: state.total_noi,
            total_debt_service: state.total_debt_service,
            dscr: state.dscr,
            cash_balance: state.cash_balance,
            consecutive_dscr_violations: state.consecutive_dscr_violations,
            bankrupt: state.bankrupt,
            assets,
        }
    }

    /// Serialize to JSON bytes for deterministic comparison.
    ///
    /// serde_json preserves struct field order, so equal observations
    /// produce byte-identical output.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn owned_count(&self) -> usize {
        self.assets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::demo_portfolio;

    fn setup_state() -> PortfolioState {
        PortfolioState::from_records(&demo_portfolio())
    }

    #[test]
    fn test_observation_from_state() {
        let state = setup_state();
        let obs = Observation::from_state(&state);

        assert_eq!(obs.obs_version, OBS_VERSION);
        assert_eq!(obs.period, 0);
        assert_eq!(obs.assets.len(), state.assets.len());
        assert!((obs.total_value - state.total_value).abs() < 1e-9);
        for (i, asset) in obs.assets.iter().enumerate() {
            assert_eq!(asset.asset_index, i);
            assert_eq!(asset.periods_since_refinance, 0);
        }
    }

    #[test]
    fn test_sold_assets_drop_out() {
        let mut state = setup_state();
        state.assets[1].owned = false;
        state.recompute_aggregates();
        let obs = Observation::from_state(&state);

        assert_eq!(obs.assets.len(), state.assets.len() - 1);
        assert!(obs.assets.iter().all(|a| a.asset_id != state.assets[1].id));
        // Reset-order indices survive the removal.
        assert_eq!(obs.assets[0].asset_index, 0);
        assert_eq!(obs.assets[1].asset_index, 2);
    }

    #[test]
    fn test_canonical_json_deterministic() {
        let state = setup_state();
        let a = Observation::from_state(&state).to_canonical_json().unwrap();
        let b = Observation::from_state(&state).to_canonical_json().unwrap();
        assert_eq!(a, b, "same state should produce identical JSON");
    }
}
