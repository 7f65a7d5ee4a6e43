//! Split rows of the CSV transactions format.
//!
//! The first split of a transaction continues the record that holds the
//! transaction's own fields. Every further split starts a continuation row
//! padded with empty transaction fields, so all rows have the same width.

use crate::account::Account;
use crate::error::Result;
use crate::ledger::LedgerSource;
use crate::quantity::NumberLocale;
use crate::token_writer::TokenWriter;
use crate::transaction::Split;
use chrono::{DateTime, FixedOffset, Utc};
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Write;

/// Number of transaction-level columns that precede the split columns.
pub const TRANSACTION_FIELD_COUNT: usize = 8;

/// Number of split-level columns.
pub const SPLIT_FIELD_COUNT: usize = 8;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Renders a timestamp as a `YYYY-MM-DD` calendar date in `offset`.
pub fn format_date(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format(DATE_FORMAT).to_string()
}

/// The cells of one split, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRow {
    pub memo: Option<String>,
    pub full_account_name: String,
    pub account_name: String,
    pub amount: String,
    pub amount_locale: String,
    pub reconcile: String,
    pub reconcile_date: Option<String>,
    pub rate: String,
}

/// Turns a transaction's splits into rows, resolving accounts through a
/// run-scoped cache.
pub struct SplitRowEmitter<'a, L: LedgerSource + ?Sized> {
    ledger: &'a L,
    accounts: HashMap<String, Account>,
    locale: NumberLocale,
}

impl<'a, L: LedgerSource + ?Sized> SplitRowEmitter<'a, L> {
    pub fn new(ledger: &'a L, locale: NumberLocale) -> Self {
        SplitRowEmitter {
            ledger,
            accounts: HashMap::new(),
            locale,
        }
    }

    /// Number of distinct accounts fetched so far.
    pub fn cached_accounts(&self) -> usize {
        self.accounts.len()
    }

    fn account(&mut self, id: &str) -> Result<&Account> {
        match self.accounts.entry(id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let account = self.ledger.account(id)?;
                debug!("Caching account {} ({})", id, account.full_name);
                Ok(entry.insert(account))
            }
        }
    }

    /// Computes every cell of every split.
    ///
    /// Nothing is written, so a missing account or a zero value fails the
    /// transaction before any of its bytes reach the output.
    pub fn prepare(&mut self, splits: &[Split]) -> Result<Vec<SplitRow>> {
        let locale = self.locale;

        splits
            .iter()
            .map(|split| -> Result<SplitRow> {
                let account = self.account(&split.account_id)?;
                let full_account_name = account.full_name.clone();
                let account_name = account.name.clone();

                let sign = split.split_type.sign();
                let magnitude = split.quantity.abs();
                let rate = split.exchange_rate()?;

                Ok(SplitRow {
                    memo: split.memo.clone(),
                    full_account_name,
                    account_name,
                    amount: format!("{}{}", sign, magnitude.format_machine()),
                    amount_locale: format!("{}{}", sign, magnitude.format_locale(&locale)),
                    reconcile: split.reconcile.code().to_string(),
                    reconcile_date: split
                        .reconcile
                        .date()
                        .map(|date| date.format(DATE_FORMAT).to_string()),
                    rate: rate.format_locale(&locale),
                })
            })
            .collect()
    }

    /// Writes prepared rows. The first row continues the current record.
    pub fn write_rows<W: Write>(&self, rows: &[SplitRow], writer: &mut TokenWriter<W>) -> Result<()> {
        for (index, row) in rows.iter().enumerate() {
            if index > 0 {
                for _ in 0..TRANSACTION_FIELD_COUNT {
                    writer.write_token(None)?;
                }
            }
            writer.write_token(row.memo.as_deref())?;
            writer.write_token(Some(&row.full_account_name))?;
            writer.write_token(Some(&row.account_name))?;
            writer.write_token(Some(&row.amount))?;
            writer.write_token(Some(&row.amount_locale))?;
            writer.write_token(Some(&row.reconcile))?;
            writer.write_token(row.reconcile_date.as_deref())?;
            writer.write_end_token(Some(&row.rate))?;
        }
        Ok(())
    }

    /// Prepares and writes `splits`, returning the number of rows written.
    pub fn write_splits<W: Write>(
        &mut self,
        splits: &[Split],
        writer: &mut TokenWriter<W>,
    ) -> Result<usize> {
        let rows = self.prepare(splits)?;
        self.write_rows(&rows, writer)?;
        Ok(rows.len())
    }
}
