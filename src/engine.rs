//! Incremental CSV transactions export.
//!
//! A run moves through `Init -> HeaderWritten -> RowWritten* ->
//! CheckpointAdvanced`, or ends in `Failed` from any state. Only a run that
//! reaches the end of the transaction cursor and flushes the sink advances
//! the checkpoint.

use crate::checkpoint::{CheckpointStore, ExportCheckpoint};
use crate::error::{ExportError, ExporterError, Result};
use crate::ledger::LedgerSource;
use crate::params::ExportParams;
use crate::splits::{format_date, SplitRowEmitter, SPLIT_FIELD_COUNT, TRANSACTION_FIELD_COUNT};
use crate::token_writer::TokenWriter;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Column names of the header row.
pub const HEADER: [&str; TRANSACTION_FIELD_COUNT + SPLIT_FIELD_COUNT] = [
    "Date",
    "Transaction ID",
    "Number",
    "Description",
    "Notes",
    "Commodity/Currency",
    "Void Reason",
    "Action",
    "Memo",
    "Full Account Name",
    "Account Name",
    "Amount With Sym",
    "Amount Num.",
    "Reconcile",
    "Reconcile Date",
    "Rate/Price",
];

/// Prefix of the commodity cell.
pub const CURRENCY_PREFIX: &str = "CURRENCY::";

/// Source of the timestamp a successful run advances the checkpoint to.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F: Fn() -> DateTime<Utc>> Clock for F {
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Progress of one export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Init,
    HeaderWritten,
    RowWritten,
    CheckpointAdvanced,
    Failed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Transactions exported.
    pub transactions: usize,

    /// Data rows written, excluding the header.
    pub rows: usize,

    /// New checkpoint value.
    pub checkpoint: DateTime<Utc>,
}

/// Exports transactions modified since the last successful export.
///
/// # Example
///
/// ```
/// use ledger_export::{
///     Account, Commodity, CsvTransactionsExporter, ExactQuantity, ExportCheckpoint,
///     ExportParams, InMemoryLedger, MemoryCheckpoint, Split, SplitType, Transaction,
/// };
/// use chrono::Utc;
///
/// let usd = Commodity::from_code("USD");
/// let mut ledger = InMemoryLedger::new();
/// ledger.insert_account(Account::new("rent", "Expenses:Rent", usd.clone()));
/// ledger.insert_account(Account::new("bank", "Assets:Checking", usd.clone()));
///
/// let amount = ExactQuantity::new(120000, 100, usd.clone()).unwrap();
/// ledger
///     .upsert_transaction(
///         Transaction::new("t1", Utc::now(), usd)
///             .with_description("Rent")
///             .with_split(Split::new("rent", amount.clone(), SplitType::Debit))
///             .with_split(Split::new("bank", amount, SplitType::Credit)),
///     )
///     .unwrap();
///
/// let checkpoint = ExportCheckpoint::new(MemoryCheckpoint::new());
/// let exporter = CsvTransactionsExporter::new(ExportParams::new("out.csv"), &ledger, &checkpoint);
///
/// let mut out = Vec::new();
/// let summary = exporter.export_to(&mut out).unwrap();
/// assert_eq!(summary.rows, 2);
/// ```
pub struct CsvTransactionsExporter<'a, L: LedgerSource + ?Sized, S: CheckpointStore> {
    params: ExportParams,
    ledger: &'a L,
    checkpoint: &'a ExportCheckpoint<S>,
    clock: Box<dyn Clock + 'a>,
}

impl<'a, L: LedgerSource + ?Sized, S: CheckpointStore> CsvTransactionsExporter<'a, L, S> {
    pub fn new(params: ExportParams, ledger: &'a L, checkpoint: &'a ExportCheckpoint<S>) -> Self {
        CsvTransactionsExporter {
            params,
            ledger,
            checkpoint,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock(mut self, clock: impl Clock + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Writes the export to the configured output file.
    ///
    /// Returns the produced file paths. On failure the checkpoint is left
    /// untouched and the output file may hold a partial export, which the
    /// caller should discard.
    pub fn generate_export(&self) -> std::result::Result<Vec<PathBuf>, ExporterError> {
        let output = self.params.output_path.clone();

        let result = File::create(&output)
            .map_err(ExportError::from)
            .and_then(|file| self.export_to(BufWriter::new(file)));

        match result {
            Ok(summary) => {
                info!(
                    "Exported {} transactions ({} rows) to {}",
                    summary.transactions,
                    summary.rows,
                    output.display()
                );
                Ok(vec![output])
            }
            Err(cause) => {
                if output.exists() {
                    warn!("Leaving incomplete export at {}", output.display());
                }
                Err(ExporterError::new(output, cause))
            }
        }
    }

    /// Runs one export into `sink`.
    ///
    /// Holds the checkpoint lock for the whole run; concurrent callers
    /// block until this run has advanced the checkpoint or failed.
    pub fn export_to<W: Write>(&self, sink: W) -> Result<ExportSummary> {
        let mut state = ExportState::Init;
        let result = self.run(sink, &mut state);
        if let Err(e) = &result {
            warn!("Export failed after reaching {:?}: {}", state, e);
            state = ExportState::Failed;
        }
        debug!("Export finished in state {:?}", state);
        result
    }

    fn run<W: Write>(&self, sink: W, state: &mut ExportState) -> Result<ExportSummary> {
        let lease = self.checkpoint.begin()?;
        let since = if self.params.export_all {
            DateTime::<Utc>::UNIX_EPOCH
        } else {
            lease.since()
        };

        let mut writer = TokenWriter::new(sink, self.params.separator)?;
        for name in HEADER {
            writer.write_token(Some(name))?;
        }
        writer.new_line()?;
        *state = ExportState::HeaderWritten;

        // Captured before the query so that anything modified while the run
        // is reading lies after the new checkpoint.
        let now = self.clock.now();
        let cursor = self.ledger.transactions_modified_since(since)?;
        debug!("Exporting transactions modified after {}", since);

        let mut emitter = SplitRowEmitter::new(self.ledger, self.params.locale);
        let mut transactions = 0;
        let mut rows = 0;

        for transaction in cursor {
            let transaction = transaction?;
            transaction.validate()?;

            let split_rows = emitter.prepare(&transaction.splits)?;
            let currency = format!("{}{}", CURRENCY_PREFIX, transaction.currency.mnemonic());
            let date = format_date(transaction.timestamp, self.params.utc_offset);

            writer.write_token(Some(&date))?;
            writer.write_token(Some(&transaction.id))?;
            writer.write_token(None)?; // number
            writer.write_token(Some(&transaction.description))?;
            writer.write_token(transaction.notes.as_deref())?;
            writer.write_token(Some(&currency))?;
            writer.write_token(None)?; // void reason
            writer.write_token(None)?; // action
            emitter.write_rows(&split_rows, &mut writer)?;

            transactions += 1;
            rows += split_rows.len();
            *state = ExportState::RowWritten;
            debug!(
                "Exported transaction {} with {} splits",
                transaction.id,
                split_rows.len()
            );
        }

        writer.flush()?;
        lease.advance(now)?;
        *state = ExportState::CheckpointAdvanced;

        Ok(ExportSummary {
            transactions,
            rows,
            checkpoint: now,
        })
    }
}
