//! Typed errors for catalog loading, case editing, and configuration.

use thiserror::Error;

use crate::constants::{CaseId, ParamId, TreatmentId};

/// Errors raised while loading or validating a case catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON is invalid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate parameter id {0}")]
    DuplicateParameter(ParamId),

    #[error("duplicate treatment id {0}")]
    DuplicateTreatment(TreatmentId),

    #[error("duplicate case id {0}")]
    DuplicateCase(CaseId),

    #[error("parameter {0} has inconsistent bounds")]
    InconsistentBounds(ParamId),

    #[error("treatment {treatment} references unknown parameter {param}")]
    UnknownEffectParameter { treatment: TreatmentId, param: ParamId },

    #[error("correct-treatment entry references unknown treatment {0}")]
    UnknownTreatment(TreatmentId),

    #[error("condition {condition} ranks treatment {treatment} with invalid rank 0")]
    ZeroRank { condition: u8, treatment: TreatmentId },

    #[error("condition {condition} uses rank {rank} more than once")]
    DuplicateRank { condition: u8, rank: u8 },

    #[error("case {case} is invalid: {source}")]
    InvalidCase {
        case: CaseId,
        #[source]
        source: CaseError,
    },

    #[error("case {0} not found")]
    CaseNotFound(CaseId),
}

/// Errors raised when a clinical case definition is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum CaseError {
    #[error("case title cannot be empty")]
    EmptyTitle,

    #[error("case must track at least one parameter")]
    NoParameters,

    #[error("unknown species {0}")]
    UnknownSpecies(u8),

    #[error("unknown condition {0}")]
    UnknownCondition(u8),

    #[error("difficulty {0} is out of range 1-3")]
    InvalidDifficulty(u8),

    #[error("unknown parameter {0}")]
    UnknownParameter(ParamId),

    #[error("initial value {value} for parameter {param} is outside limits [{min}, {max}]")]
    ValueOutOfLimits {
        param: ParamId,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Errors raised when a simulation configuration is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config JSON is invalid: {0}")]
    Parse(String),

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} must be at most {max}")]
    OutOfRange { field: &'static str, max: u32 },

    #[error("initial HP {0} must be between 1 and 99")]
    InitialHpOutOfRange(u8),
}
