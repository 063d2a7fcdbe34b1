// Expense Tracker - Core Library
// Exposes the store, validation and HTTP layer for the CLI, API server, and tests

pub mod db;
pub mod error;
pub mod logging;
pub mod validation;

// Only compile the HTTP layer when the server feature is enabled
#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use db::{
    CategoryTotal, Expense, ExpenseStore, ImportReport, NewExpense, StoreConfig, Summary,
    DEFAULT_BUSY_TIMEOUT,
};
pub use error::{StoreError, StoreResult};
pub use validation::{expense_from_json, InvalidField, ValidationErrors};

#[cfg(feature = "server")]
pub use api::{router, ApiError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
