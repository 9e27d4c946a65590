use thiserror::Error;

use crate::environment::Cell;

/// Rejected grid configurations. Raised before an `Env` exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("grid must have at least one row and one column")]
    EmptyGrid,
    #[error("grid row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown terrain symbol {symbol:?} at row {row}, column {col}")]
    UnknownTerrain {
        symbol: String,
        row: usize,
        col: usize,
    },
    #[error("reward for {cell} cells is not finite")]
    NonFiniteReward { cell: Cell },
}

/// Solver settings that would make a solve diverge or loop forever.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SolverError {
    #[error("discount factor must lie strictly between 0 and 1, got {0}")]
    InvalidDiscount(f64),
    #[error("error bound must be positive and finite, got {0}")]
    InvalidErrorBound(f64),
    #[error("policy evaluation needs at least one sweep per round")]
    NoEvaluationSweeps,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to write trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode trace as csv: {0}")]
    Csv(#[from] csv::Error),
}

pub(crate) fn check_discount(discount: f64) -> Result<f64, SolverError> {
    if discount > 0.0 && discount < 1.0 {
        Ok(discount)
    } else {
        Err(SolverError::InvalidDiscount(discount))
    }
}
