//! Error type shared by every pipeline stage.
use thiserror::Error;

use crate::cell::CellIndex;

#[derive(Debug, Error)]
pub enum PyramidError {
    #[error("invalid base dimensions {rows}×{cols}: both must be positive")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read grid source: {0}")]
    Io(#[from] std::io::Error),

    #[error("grid source is empty: missing header line")]
    MissingHeader,

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid {field} value {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("cell identifier {id} outside base grid of {cells} cells")]
    IdOutOfRange { id: u64, cells: u64 },

    #[error("duplicate record for cell identifier {id}")]
    DuplicateRecord { id: u64 },

    #[error("structural invariant violated at {index}: {reason}")]
    Invariant {
        index: CellIndex,
        reason: String,
    },

    #[error("linking did not converge within {cap} sweeps")]
    NonConvergence { cap: usize },
}

pub type Result<T> = std::result::Result<T, PyramidError>;
