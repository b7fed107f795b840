// src/error.rs
//
// Library error type. The engine itself never fails mid-episode; fatal,
// caller-visible failures are limited to constructing an environment from a
// malformed asset list and run-store operations on unknown ids.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MansardError {
    /// An asset record failed structural validation.
    #[error("invalid asset record `{id}`: {reason}")]
    InvalidAsset { id: String, reason: String },

    /// The supplied asset list was empty.
    #[error("asset list is empty")]
    EmptyPortfolio,

    /// Two records share the same id.
    #[error("duplicate asset id `{0}`")]
    DuplicateAssetId(String),

    /// A run store operation referenced an id that was never created.
    #[error("unknown run id {0}")]
    UnknownRun(u64),

    /// Asset file could not be read.
    #[error("failed to read asset file: {0}")]
    Io(#[from] std::io::Error),

    /// Asset file could not be parsed.
    #[error("failed to parse asset file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MansardError>;
