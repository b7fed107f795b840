// src/assets.rs
//
// Asset-source collaborator: the records an environment is built from.
//
// Records are structural input only. The engine trusts the caller on
// business-domain validity (plausible cap rates, sane leverage); validation
// here is limited to what would otherwise break the numeric machinery:
// missing fields, non-finite numbers, blank or duplicate ids, empty lists.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MansardError, Result};

/// One asset as supplied by the caller at reset time.
///
/// All money fields are per-period (monthly) amounts except `value` and
/// `required_capex`, which are stocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Caller-assigned identifier, unique within the portfolio.
    pub id: String,
    /// Current market value.
    pub value: f64,
    /// Period net operating income.
    pub noi: f64,
    /// Period debt service.
    pub debt_service: f64,
    /// Capitalization rate used to translate capex into an noi uplift.
    pub cap_rate: f64,
    /// Outstanding capital expenditure; 0 means nothing left to fund.
    #[serde(default)]
    pub required_capex: f64,
}

impl AssetRecord {
    /// Structural validation of a single record.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(MansardError::InvalidAsset {
                id: self.id.clone(),
                reason: "id is blank".to_string(),
            });
        }
        let fields = [
            ("value", self.value),
            ("noi", self.noi),
            ("debt_service", self.debt_service),
            ("cap_rate", self.cap_rate),
            ("required_capex", self.required_capex),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(MansardError::InvalidAsset {
                    id: self.id.clone(),
                    reason: format!("{name} is not finite ({v})"),
                });
            }
        }
        Ok(())
    }
}

/// Validate a whole portfolio: non-empty, per-record structure, unique ids.
pub fn validate_portfolio(records: &[AssetRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(MansardError::EmptyPortfolio);
    }
    let mut seen = BTreeSet::new();
    for record in records {
        record.validate()?;
        if !seen.insert(record.id.as_str()) {
            return Err(MansardError::DuplicateAssetId(record.id.clone()));
        }
    }
    Ok(())
}

/// Parse a portfolio from a JSON array of records and validate it.
pub fn parse_portfolio(json: &str) -> Result<Vec<AssetRecord>> {
    let records: Vec<AssetRecord> = serde_json::from_str(json)?;
    validate_portfolio(&records)?;
    Ok(records)
}

/// Load a portfolio from a JSON file and validate it.
pub fn load_portfolio(path: &Path) -> Result<Vec<AssetRecord>> {
    let raw = fs::read_to_string(path)?;
    parse_portfolio(&raw)
}

/// Built-in portfolio used by the CLI when no asset file is given, and by
/// tests that want a realistic multi-asset setup.
pub fn demo_portfolio() -> Vec<AssetRecord> {
    vec![
        AssetRecord {
            id: "maple-court".to_string(),
            value: 10_000_000.0,
            noi: 62_500.0,
            debt_service: 45_000.0,
            cap_rate: 0.075,
            required_capex: 0.0,
        },
        AssetRecord {
            id: "harbor-point".to_string(),
            value: 18_500_000.0,
            noi: 104_000.0,
            debt_service: 88_000.0,
            cap_rate: 0.0675,
            required_capex: 350_000.0,
        },
        AssetRecord {
            id: "gaslight-lofts".to_string(),
            value: 6_250_000.0,
            noi: 41_500.0,
            debt_service: 29_500.0,
            cap_rate: 0.0795,
            required_capex: 120_000.0,
        },
        AssetRecord {
            id: "stonebridge-plaza".to_string(),
            value: 24_000_000.0,
            noi: 130_000.0,
            debt_service: 115_000.0,
            cap_rate: 0.065,
            required_capex: 0.0,
        },
        AssetRecord {
            id: "fernworth-mill".to_string(),
            value: 9_300_000.0,
            noi: 58_000.0,
            debt_service: 51_000.0,
            cap_rate: 0.0748,
            required_capex: 475_000.0,
        },
    ]
}
