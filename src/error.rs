// Expense Tracker - Store errors
// Failures raised by the persistence layer

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The blocking task running a store call panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}
