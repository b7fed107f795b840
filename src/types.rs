// src/types.rs
//
// Common shared types for the mansard fund engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Zero-based simulation period (one period = one month).
pub type Period = u32;

/// Per-asset action supplied to the engine each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetAction {
    /// Collect noi minus debt service, change nothing.
    Hold,
    /// Cash-out refinance up to the configured leverage cap.
    Refinance,
    /// Dispose of the asset at a noisy sale price.
    Sell,
    /// Fund outstanding capex and realize the value/noi uplift.
    Capex,
}

impl AssetAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetAction::Hold => "hold",
            AssetAction::Refinance => "refinance",
            AssetAction::Sell => "sell",
            AssetAction::Capex => "capex",
        }
    }

    /// Parse a lowercase action name. Returns `None` on anything else.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hold" => Some(AssetAction::Hold),
            "refinance" => Some(AssetAction::Refinance),
            "sell" => Some(AssetAction::Sell),
            "capex" => Some(AssetAction::Capex),
            _ => None,
        }
    }
}

/// Why a requested action was downgraded to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DowngradeReason {
    /// Refinance requested within the lockout window.
    RefinanceLockout,
    /// Sell requested while capex is still outstanding.
    CapexOutstanding,
}

impl DowngradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DowngradeReason::RefinanceLockout => "refinance_lockout",
            DowngradeReason::CapexOutstanding => "capex_outstanding",
        }
    }
}

/// Outcome of applying one requested action to one asset.
///
/// Ineligible requests are never errors: the engine downgrades them to a
/// plain hold and tags the outcome so callers can audit what actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// The requested action ran as asked.
    Accepted,
    /// The request was ineligible; the asset held instead.
    DowngradedToHold { reason: DowngradeReason },
}

impl ActionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ActionOutcome::Accepted)
    }
}

/// One asset's requested action paired with what the engine actually did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedAction {
    pub asset_id: String,
    pub requested: AssetAction,
    pub outcome: ActionOutcome,
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Three consecutive DSCR violations.
    Bankruptcy,
    /// The configured horizon ran out.
    HorizonComplete,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Bankruptcy => "bankruptcy",
            TerminationReason::HorizonComplete => "horizon_complete",
        }
    }
}

/// Action map consumed by `FundEnv::step`: asset id -> requested action.
///
/// BTreeMap keeps iteration order deterministic for logging and tests.
/// Owned assets absent from the map hold; ids matching no owned asset are
/// ignored.
pub type ActionMap = BTreeMap<String, AssetAction>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse_round_trip() {
        for action in [
            AssetAction::Hold,
            AssetAction::Refinance,
            AssetAction::Sell,
            AssetAction::Capex,
        ] {
            assert_eq!(AssetAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AssetAction::parse("HOLD"), None);
        assert_eq!(AssetAction::parse("buy"), None);
    }

    #[test]
    fn test_outcome_accepted_flag() {
        assert!(ActionOutcome::Accepted.is_accepted());
        assert!(!ActionOutcome::DowngradedToHold {
            reason: DowngradeReason::RefinanceLockout
        }
        .is_accepted());
    }
}
