// Error types for alignment, merge and decimation
use super::timestamp::Timestamp;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    #[error("channel {channel} has {samples} samples but axis {axis} has {timestamps} timestamps")]
    AxisLengthMismatch {
        channel: String,
        axis: String,
        samples: usize,
        timestamps: usize,
    },
    #[error("channel {channel} references unknown time axis {}", .axis.as_deref().unwrap_or("<none>"))]
    UnresolvedAxis {
        channel: String,
        axis: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("table {table}: column {channel} has {actual} rows, datetime has {expected}")]
    ColumnLength {
        table: usize,
        channel: String,
        expected: usize,
        actual: usize,
    },
    #[error("table {table}: datetime is not sorted at row {row}")]
    Unsorted { table: usize, row: usize },
}

/// Argument misuse, or a table whose column does not match its `datetime`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecimateError {
    #[error("point budget must be at least 1")]
    ZeroBudget,
    #[error("unknown channel {0}")]
    UnknownChannel(String),
    #[error("range start {start} is after range end {end}")]
    InvalidRange { start: Timestamp, end: Timestamp },
    #[error("bucket count {buckets} must be between 1 and {max} for a budget of {budget}")]
    InvalidBucketCount {
        buckets: usize,
        budget: usize,
        max: usize,
    },
    #[error("column {channel} has {actual} rows, datetime has {expected}")]
    ColumnLength {
        channel: String,
        expected: usize,
        actual: usize,
    },
}
