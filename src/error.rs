use thiserror::Error;

/// Validation failures raised before any query executes.
#[derive(Debug, Error, PartialEq)]
pub enum CriteriaError {
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("`{field}` must be within 0..=100, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("malformed criteria: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid criteria: {0}")]
    InvalidCriteria(#[from] CriteriaError),
    /// A metrics table holds rows pointing at students that do not exist.
    /// Surfaced rather than dropped so a broken ingest cannot hide students.
    #[error("{table} has {orphans} rows referencing students that do not exist")]
    MissingReference { table: String, orphans: i64 },
}
