use thiserror::Error;

use crate::domain::{LedgerError, RecordId};
use crate::storage::InvalidRecordField;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Invalid window: {0} days")]
    InvalidWindow(i64),

    #[error("Account name cannot be empty")]
    EmptyAccount,

    #[error("Data invariant violated: record {record_id} has a non-numeric {field}")]
    DataInvariantViolation {
        record_id: RecordId,
        field: &'static str,
    },

    #[error("Aggregation failed: {0}")]
    Aggregation(#[from] LedgerError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Lift a storage error, keeping corrupt rows distinguishable from I/O failures.
    pub fn from_storage(err: anyhow::Error) -> Self {
        match err.downcast::<InvalidRecordField>() {
            Ok(InvalidRecordField { id, field }) => AppError::DataInvariantViolation {
                record_id: id,
                field,
            },
            Err(err) => AppError::Database(err),
        }
    }
}
