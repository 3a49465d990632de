//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// The caller supplied invalid or incompatible arguments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("at least 2 resolution columns are required, found {found}")]
    TooFewResolutions { found: usize },

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column selected more than once: {0}")]
    DuplicateColumn(String),

    #[error("no column matches prefix '{prefix}'")]
    NoMatchingColumns { prefix: String },

    #[error("no resolution columns selected: set a prefix or an explicit column list")]
    EmptySelection,

    #[error("unknown aggregation function: {0}")]
    UnknownAggregation(String),

    #[error("aggregation '{function}' requires a numeric column, '{column}' is not numeric")]
    NonNumericAttribute { column: String, function: String },

    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// The input table violates the assumptions of the builder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("empty table: no samples")]
    EmptyTable,

    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' holds non-discrete labels (e.g. '{example}')")]
    NonDiscreteLabels { column: String, example: String },

    #[error("row {row} has {found} fields, expected {expected}")]
    RaggedRow {
        row: u64,
        expected: u64,
        found: u64,
    },

    #[error("invalid table: {0}")]
    Malformed(String),
}

/// Domain errors represent violations of the clustering-tree model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

impl DomainError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, DomainError::Configuration(_))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, DomainError::Data(_))
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
