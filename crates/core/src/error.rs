//! Error types for regen

use thiserror::Error;

/// Main error type for sampling, matching and partitioning operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster grid: {0}")]
    InvalidGrid(String),

    #[error("Band size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: expected {expected}, got {actual}")]
    CrsMismatch { expected: String, actual: String },

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Duplicate name: {0}")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {actual} values, table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value in column '{column}' at row {row}")]
    NonFiniteValue { column: String, row: usize },

    #[error("k = {k} exceeds the number of candidates ({candidates})")]
    InvalidK { k: usize, candidates: usize },

    #[error(
        "Placebo pool exhausted: {placebo} of {total} points assigned, target was {target}"
    )]
    PlaceboExhausted {
        placebo: usize,
        target: usize,
        total: usize,
    },

    #[error("Matrix is not positive definite: {0}")]
    SingularMatrix(String),

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`]
    pub fn invalid_param(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for regen operations
pub type Result<T> = std::result::Result<T, Error>;
