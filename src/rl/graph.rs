// src/rl/graph.rs
//
// Structural portfolio embedding over a fully-connected asset graph.
//
// Each owned asset gets one slot describing its neighborhood: the
// degree-normalized mean of the other owned assets' feature rows. The
// output honors the same fixed-capacity pad/truncate contract as the flat
// encoder, so it can replace the per-asset blocks or be concatenated onto
// the full encoding without touching the environment contract.

use crate::config::EncoderScales;
use crate::rl::encoder::ENC_PER_ASSET_DIM;
use crate::rl::observation::{AssetObservation, Observation};

pub const GRAPH_VERSION: u32 = 1;

pub struct GraphEmbedder {
    max_assets: usize,
    scales: EncoderScales,
}

impl GraphEmbedder {
    pub fn new(max_assets: usize, scales: EncoderScales) -> Self {
        Self { max_assets, scales }
    }

    pub fn max_assets(&self) -> usize {
        self.max_assets
    }

    /// Embedding schema version, for telemetry and stored artifacts.
    pub fn version(&self) -> u32 {
        GRAPH_VERSION
    }

    /// Output length, constant for the life of the embedder.
    pub fn embedded_len(&self) -> usize {
        self.max_assets * ENC_PER_ASSET_DIM
    }

    /// Neighborhood summary per asset slot.
    ///
    /// In the fully-connected reference topology every owned asset borders
    /// every other, so slot `i` aggregates all rows except its own, divided
    /// by the degree. A lone asset has no neighbors and embeds as zeros, as
    /// do padding slots past the owned count.
    pub fn embed(&self, obs: &Observation) -> Vec<f64> {
        let rows: Vec<[f64; ENC_PER_ASSET_DIM]> =
            obs.assets.iter().map(|a| self.asset_row(a)).collect();
        let degree = rows.len().saturating_sub(1);

        let mut out = Vec::with_capacity(self.embedded_len());
        for i in 0..rows.len().min(self.max_assets) {
            let mut aggregate = [0.0; ENC_PER_ASSET_DIM];
            if degree > 0 {
                for (j, row) in rows.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    for (slot, value) in aggregate.iter_mut().zip(row) {
                        *slot += value;
                    }
                }
                for slot in aggregate.iter_mut() {
                    *slot /= degree as f64;
                }
            }
            out.extend_from_slice(&aggregate);
        }
        out.resize(self.embedded_len(), 0.0);
        out
    }

    /// Flat encoding with the structural embedding appended.
    pub fn augment(&self, encoded: &[f64], obs: &Observation) -> Vec<f64> {
        let mut out = Vec::with_capacity(encoded.len() + self.embedded_len());
        out.extend_from_slice(encoded);
        out.extend(self.embed(obs));
        out
    }

    // Same normalization as the flat encoder's per-asset block.
    fn asset_row(&self, asset: &AssetObservation) -> [f64; ENC_PER_ASSET_DIM] {
        let s = &self.scales;
        [
            asset.value / s.value_scale,
            asset.noi / s.noi_scale,
            asset.debt_service / s.debt_service_scale,
            asset.cap_rate,
            asset.required_capex / s.capex_scale,
            asset.periods_since_refinance as f64 / s.refi_age_scale,
            if asset.capex_completed { 1.0 } else { 0.0 },
        ]
    }
}
