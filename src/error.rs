//! Error types for the ledger exporter.

use crate::quantity::QuantityError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Causes that abort an export run.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Failed to create, write or flush a file or sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A split references an account the ledger does not know
    #[error("Split references unknown account {account_id}")]
    BrokenReference { account_id: String },

    /// Arithmetic failure on an amount (e.g. a split with zero value)
    #[error("Amount error: {0}")]
    Quantity(#[from] QuantityError),

    /// Split values of a transaction do not sum to zero
    #[error("Transaction {transaction_id} is not balanced")]
    Unbalanced { transaction_id: String },

    /// Split amount below zero; direction is carried by the split type only
    #[error("Transaction {transaction_id} has a negative amount on account {account_id}")]
    NegativeAmount {
        transaction_id: String,
        account_id: String,
    },

    /// Transaction id reappearing after its splits were already closed
    #[error("Duplicate transaction ID {transaction_id} at row {row}")]
    DuplicateTransaction { transaction_id: String, row: usize },

    /// Transaction without splits
    #[error("Transaction {transaction_id} has no splits")]
    EmptyTransaction { transaction_id: String },

    /// Invalid ledger input record
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// The checkpoint store holds something that is not a timestamp
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// A previous run panicked while holding the export lock
    #[error("Export checkpoint lock poisoned")]
    CheckpointPoisoned,

    /// Separator cannot be used as a CSV delimiter
    #[error("Invalid separator {0:?}: must be a single ASCII character other than a quote or line break")]
    InvalidSeparator(char),

    /// Missing positional argument
    #[error("Missing argument. Usage: ledger-export <accounts.csv> <splits.csv> <output.csv> [--separator C] [--checkpoint FILE] [--all] [--decimal-comma] [--utc-offset +HH:MM]")]
    MissingArgument,

    /// Unrecognised or malformed option
    #[error("Invalid option: {0}")]
    UnknownOption(String),
}

/// Run-level failure returned to callers of
/// [`CsvTransactionsExporter::generate_export`](crate::CsvTransactionsExporter::generate_export).
///
/// The output file may be partially written; it must not be trusted.
#[derive(Error, Debug)]
#[error("Export to {} failed: {cause}", output.display())]
pub struct ExporterError {
    /// File the run was writing to
    pub output: PathBuf,

    /// Underlying cause
    #[source]
    pub cause: ExportError,
}

impl ExporterError {
    pub fn new(output: impl Into<PathBuf>, cause: ExportError) -> Self {
        ExporterError {
            output: output.into(),
            cause,
        }
    }
}
