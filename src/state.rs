// src/state.rs
//
// Mutable portfolio state for one simulation episode. Built from asset
// records at reset, mutated only by the engine's step, discarded between
// episodes.

use crate::assets::AssetRecord;
use crate::finance;
use crate::types::Period;

/// Per-asset mutable state derived from an `AssetRecord` at reset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetState {
    /// Caller-assigned id, stable for the whole episode.
    pub id: String,
    /// Current market value.
    pub value: f64,
    /// Period net operating income.
    pub noi: f64,
    /// Period debt service.
    pub debt_service: f64,
    /// Cap rate used for the capex noi uplift.
    pub cap_rate: f64,
    /// Outstanding capex still to be funded.
    pub required_capex: f64,
    /// False once sold; a sold asset never re-enters aggregates or actions.
    pub owned: bool,
    /// Period of the most recent (re)financing; 0 = acquisition financing.
    pub last_refinance_period: Period,
    /// True once capex has been funded (or none was required to begin with).
    pub capex_completed: bool,
}

impl AssetState {
    pub fn from_record(record: &AssetRecord) -> Self {
        Self {
            id: record.id.clone(),
            value: record.value,
            noi: record.noi,
            debt_service: record.debt_service,
            cap_rate: record.cap_rate,
            required_capex: record.required_capex,
            owned: true,
            last_refinance_period: 0,
            capex_completed: record.required_capex <= 0.0,
        }
    }

    /// Period cash flow when the asset simply holds.
    pub fn hold_cash_flow(&self) -> f64 {
        self.noi - self.debt_service
    }

    pub fn periods_since_refinance(&self, current: Period) -> Period {
        current.saturating_sub(self.last_refinance_period)
    }

    /// Sell gate: nothing left to fund and the work is done.
    pub fn sellable(&self) -> bool {
        self.required_capex == 0.0 && self.capex_completed
    }
}

/// Whole-portfolio state for one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    /// Zero-based period about to be processed by the next step.
    pub current_period: Period,

    /// Assets in reset order. This ordering is the canonical iteration
    /// order everywhere (aggregates, encoding, action decoding).
    pub assets: Vec<AssetState>,

    // ----- Derived aggregates (owned assets only, recomputed every step) -----
    pub total_value: f64,
    pub total_noi: f64,
    pub total_debt_service: f64,
    /// Portfolio DSCR; +inf when there is no debt service.
    pub dscr: f64,

    // ----- Cash & risk -----
    /// Cumulative realized cash across the episode.
    pub cash_balance: f64,
    /// Consecutive periods with DSCR below the configured floor.
    pub consecutive_dscr_violations: u32,
    /// Terminal and irreversible once set.
    pub bankrupt: bool,

    // ----- Return bookkeeping -----
    /// Sparse signed cash-flow series: initial outflow, yearly samples,
    /// terminal entry. Feeds the IRR solve.
    pub cash_flow_history: Vec<f64>,
    /// Annualized terminal return, set exactly once at termination.
    pub final_return: Option<f64>,
}

impl PortfolioState {
    /// Build episode state from caller records. Seeds the cash-flow history
    /// with the initial investment as an outflow.
    pub fn from_records(records: &[AssetRecord]) -> Self {
        let assets: Vec<AssetState> = records.iter().map(AssetState::from_record).collect();
        let initial_value: f64 = assets.iter().map(|a| a.value).sum();
        let mut state = Self {
            current_period: 0,
            assets,
            total_value: 0.0,
            total_noi: 0.0,
            total_debt_service: 0.0,
            dscr: f64::INFINITY,
            cash_balance: 0.0,
            consecutive_dscr_violations: 0,
            bankrupt: false,
            cash_flow_history: vec![-initial_value],
            final_return: None,
        };
        state.recompute_aggregates();
        state
    }

    /// Recompute value/noi/debt-service/DSCR strictly from owned assets.
    pub fn recompute_aggregates(&mut self) {
        let mut value = 0.0;
        let mut noi = 0.0;
        let mut debt_service = 0.0;
        for asset in self.assets.iter().filter(|a| a.owned) {
            value += asset.value;
            noi += asset.noi;
            debt_service += asset.debt_service;
        }
        self.total_value = value;
        self.total_noi = noi;
        self.total_debt_service = debt_service;
        self.dscr = finance::dscr(noi, debt_service);
    }

    pub fn owned_assets(&self) -> impl Iterator<Item = &AssetState> {
        self.assets.iter().filter(|a| a.owned)
    }

    pub fn owned_count(&self) -> usize {
        self.assets.iter().filter(|a| a.owned).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::demo_portfolio;

    #[test]
    fn test_from_records_seeds_history_with_outflow() {
        let records = demo_portfolio();
        let total: f64 = records.iter().map(|r| r.value).sum();
        let state = PortfolioState::from_records(&records);
        assert_eq!(state.cash_flow_history.len(), 1);
        assert!((state.cash_flow_history[0] + total).abs() < 1e-9);
        assert_eq!(state.current_period, 0);
        assert!(!state.bankrupt);
        assert_eq!(state.consecutive_dscr_violations, 0);
        assert!(state.final_return.is_none());
    }

    #[test]
    fn test_capex_completed_derivation() {
        let records = demo_portfolio();
        let state = PortfolioState::from_records(&records);
        for (record, asset) in records.iter().zip(&state.assets) {
            assert_eq!(asset.capex_completed, record.required_capex <= 0.0);
            assert_eq!(asset.last_refinance_period, 0);
            assert!(asset.owned);
        }
    }

    #[test]
    fn test_aggregates_skip_sold_assets() {
        let mut state = PortfolioState::from_records(&demo_portfolio());
        let before = state.total_value;
        let sold_value = state.assets[0].value;
        state.assets[0].owned = false;
        state.recompute_aggregates();
        assert!((state.total_value - (before - sold_value)).abs() < 1e-6);
        assert_eq!(state.owned_count(), state.assets.len() - 1);
    }

    #[test]
    fn test_dscr_infinite_without_debt() {
        let mut records = demo_portfolio();
        for r in &mut records {
            r.debt_service = 0.0;
        }
        let state = PortfolioState::from_records(&records);
        assert_eq!(state.dscr, f64::INFINITY);
    }

    #[test]
    fn test_sellable_gate() {
        let mut asset = AssetState::from_record(&demo_portfolio()[0]);
        assert!(asset.sellable());
        asset.required_capex = 1000.0;
        asset.capex_completed = false;
        assert!(!asset.sellable());
        asset.required_capex = 0.0;
        assert!(!asset.sellable());
        asset.capex_completed = true;
        assert!(asset.sellable());
    }
}
