// src/rl/encoder.rs
//
// Fixed-length feature encoding of an Observation for policy input.
//
// Layout: one global block followed by one block per owned asset, in the
// canonical (reset-order) asset ordering, up to a fixed capacity. Fewer
// assets zero-pad; excess assets are silently truncated. The output length
// never changes within a configured encoder, whatever the portfolio does.

use crate::config::EncoderScales;
use crate::rl::observation::Observation;

/// Current encoding schema version.
pub const ENC_VERSION: u32 = 1;

/// Global feature count: period, value, noi, dscr, cash, bankrupt flag,
/// violation streak.
pub const ENC_GLOBAL_DIM: usize = 7;

/// Per-asset feature count: value, noi, debt service, cap rate, required
/// capex, periods since refinance, capex-completed flag.
pub const ENC_PER_ASSET_DIM: usize = 7;

/// Observation-to-vector encoder with a fixed asset capacity.
#[derive(Debug, Clone)]
pub struct StateEncoder {
    max_assets: usize,
    scales: EncoderScales,
}

impl StateEncoder {
    pub fn new(max_assets: usize, scales: EncoderScales) -> Self {
        Self { max_assets, scales }
    }

    pub fn max_assets(&self) -> usize {
        self.max_assets
    }

    /// Encoding schema version, for telemetry and stored artifacts.
    pub fn version(&self) -> u32 {
        ENC_VERSION
    }

    /// Fixed output length: global block plus `max_assets` asset blocks.
    pub fn encoded_len(&self) -> usize {
        ENC_GLOBAL_DIM + self.max_assets * ENC_PER_ASSET_DIM
    }

    /// Encode an observation into the fixed-length feature vector.
    pub fn encode(&self, obs: &Observation) -> Vec<f64> {
        let s = &self.scales;
        let mut features = Vec::with_capacity(self.encoded_len());

        // ----- Global block -----
        features.push(obs.period as f64 / s.period_scale);
        features.push(obs.total_value / s.value_scale);
        features.push(obs.total_noi / s.noi_scale);
        // +inf DSCR caps cleanly to the top of the range.
        features.push(obs.dscr.min(s.dscr_cap) / s.dscr_cap);
        features.push(obs.cash_balance / s.cash_scale);
        features.push(if obs.bankrupt { 1.0 } else { 0.0 });
        features.push(obs.consecutive_dscr_violations as f64 / s.violation_scale);

        // ----- Per-asset blocks (truncate at capacity) -----
        for asset in obs.assets.iter().take(self.max_assets) {
            features.push(asset.value / s.value_scale);
            features.push(asset.noi / s.noi_scale);
            features.push(asset.debt_service / s.debt_service_scale);
            features.push(asset.cap_rate);
            features.push(asset.required_capex / s.capex_scale);
            features.push(asset.periods_since_refinance as f64 / s.refi_age_scale);
            features.push(if asset.capex_completed { 1.0 } else { 0.0 });
        }

        // Zero-pad the remaining asset slots.
        features.resize(self.encoded_len(), 0.0);
        features
    }
}
