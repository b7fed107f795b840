// src/rl/action_space.rs
//
// Discrete action space over (asset slot, action type) pairs.
//
// Index layout: action_index = asset_index * 4 + action_type_index, with
// action types ordered hold, refinance, sell, capex. The space is sized by
// a fixed asset capacity, not the live portfolio: decoding an index whose
// asset slot has no owned asset behind it falls back to holding everything.
//
// Known limitation: assets beyond the fixed capacity can never be targeted
// by the policy (they hold forever and are truncated out of the encoding).
// Removing this needs a variable-size policy head (attention over assets)
// rather than a bigger constant.

use crate::rl::observation::Observation;
use crate::types::{ActionMap, AssetAction};

/// Discrete action types per asset slot.
pub const ACTIONS_PER_ASSET: usize = 4;

/// Fixed-capacity discrete action space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpace {
    max_assets: usize,
}

/// A decoded policy action: the full per-asset map the engine consumes,
/// plus what the raw index actually addressed, for auditing.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAction {
    /// Action for every owned asset (non-targets hold).
    pub map: ActionMap,
    /// Target asset and action when the index addressed a live slot.
    pub target: Option<(String, AssetAction)>,
    /// True when the asset slot was out of range and everything holds.
    pub fallback_hold: bool,
}

impl ActionSpace {
    pub fn new(max_assets: usize) -> Self {
        Self { max_assets }
    }

    pub fn max_assets(&self) -> usize {
        self.max_assets
    }

    /// Total number of discrete actions.
    pub fn dim(&self) -> usize {
        self.max_assets * ACTIONS_PER_ASSET
    }

    /// Action type for a raw index (index mod 4).
    pub fn action_type(action_index: usize) -> AssetAction {
        match action_index % ACTIONS_PER_ASSET {
            0 => AssetAction::Hold,
            1 => AssetAction::Refinance,
            2 => AssetAction::Sell,
            _ => AssetAction::Capex,
        }
    }

    /// Decode a raw index into a full action map for the observed portfolio.
    ///
    /// The indexed slot counts over currently owned assets in canonical
    /// order. A slot at or beyond the owned count decodes to hold-everything
    /// rather than an error, keeping the policy/engine contract total.
    pub fn decode(&self, action_index: usize, obs: &Observation) -> DecodedAction {
        let asset_slot = action_index / ACTIONS_PER_ASSET;
        let action = Self::action_type(action_index);

        let mut map = ActionMap::new();
        for asset in &obs.assets {
            map.insert(asset.asset_id.clone(), AssetAction::Hold);
        }

        if asset_slot >= obs.assets.len() {
            return DecodedAction {
                map,
                target: None,
                fallback_hold: true,
            };
        }

        let target_id = obs.assets[asset_slot].asset_id.clone();
        map.insert(target_id.clone(), action);
        DecodedAction {
            map,
            target: Some((target_id, action)),
            fallback_hold: false,
        }
    }
}
