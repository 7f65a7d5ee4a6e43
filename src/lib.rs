//! # Ledger Export
//!
//! Incremental export of a double-entry ledger to the GnuCash CSV
//! transactions format.
//!
//! ## Design Principles
//!
//! - **Exact arithmetic**: amounts are big-integer rationals; rounding only
//!   happens when rendering at a commodity's display scale
//! - **Balanced output**: every exported transaction's split values sum to
//!   exactly zero
//! - **Uniform rows**: continuation rows keep the column count constant and
//!   fields are quoted whenever they contain the separator or a line break
//! - **Safe repetition**: the checkpoint only advances after a complete run,
//!   so a failed export is retried from the same point
//!
//! ## Example
//!
//! ```no_run
//! use ledger_export::{
//!     CsvTransactionsExporter, ExportCheckpoint, ExportParams, FileCheckpoint, InMemoryLedger,
//! };
//! use std::fs::File;
//!
//! let ledger = InMemoryLedger::from_csv(
//!     File::open("accounts.csv").unwrap(),
//!     File::open("splits.csv").unwrap(),
//! )
//! .unwrap();
//! let checkpoint = ExportCheckpoint::new(FileCheckpoint::new("last-export"));
//! let exporter =
//!     CsvTransactionsExporter::new(ExportParams::new("transactions.csv"), &ledger, &checkpoint);
//! let files = exporter.generate_export().unwrap();
//! ```

pub mod account;
pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod params;
pub mod quantity;
pub mod splits;
pub mod token_writer;
pub mod transaction;

pub use account::Account;
pub use checkpoint::{CheckpointLease, CheckpointStore, ExportCheckpoint, FileCheckpoint, MemoryCheckpoint};
pub use engine::{Clock, CsvTransactionsExporter, ExportState, ExportSummary, SystemClock, HEADER};
pub use error::{ExportError, ExporterError, Result};
pub use ledger::{InMemoryLedger, LedgerSource, TransactionCursor};
pub use params::{CliConfig, ExportParams};
pub use quantity::{Commodity, ExactQuantity, NumberLocale, QuantityError};
pub use splits::{SplitRow, SplitRowEmitter};
pub use token_writer::TokenWriter;
pub use transaction::{ReconcileState, Split, SplitType, Transaction};
