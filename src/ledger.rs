//! Read access to the ledger being exported.
//!
//! [`LedgerSource`] is the seam to the persistent store. [`InMemoryLedger`]
//! implements it over a snapshot, which the CLI loads from two CSV files.

use crate::account::Account;
use crate::error::{ExportError, Result};
use crate::quantity::{Commodity, ExactQuantity};
use crate::transaction::{ReconcileState, Split, SplitType, Transaction};
use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, Trim};
use log::debug;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// Forward-only cursor over transactions.
pub type TransactionCursor<'a> = Box<dyn Iterator<Item = Result<Transaction>> + 'a>;

/// Read-only view of a ledger.
pub trait LedgerSource {
    /// Looks up an account, failing with [`ExportError::BrokenReference`]
    /// when it does not exist.
    fn account(&self, id: &str) -> Result<Account>;

    /// Transactions whose modification time is strictly after `since`.
    fn transactions_modified_since(&self, since: DateTime<Utc>) -> Result<TransactionCursor<'_>>;
}

/// A ledger snapshot held in memory.
///
/// Transactions are yielded in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<String, Account>,
    transactions: Vec<Transaction>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Adds a transaction, replacing any previous version with the same id
    /// in place.
    ///
    /// Empty and unbalanced transactions, and splits with negative
    /// amounts, are refused.
    pub fn upsert_transaction(&mut self, transaction: Transaction) -> Result<()> {
        transaction.validate()?;

        match self.transactions.iter_mut().find(|t| t.id == transaction.id) {
            Some(existing) => *existing = transaction,
            None => self.transactions.push(transaction),
        }
        Ok(())
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Loads accounts and splits from CSV.
    ///
    /// Consecutive split rows sharing a transaction id form one
    /// transaction; the transaction-level columns are taken from its first
    /// row. An id that reappears after other transactions is a duplicate.
    pub fn from_csv<A: Read, S: Read>(accounts: A, splits: S) -> Result<Self> {
        let mut ledger = InMemoryLedger::new();

        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(accounts);
        for (row_idx, result) in reader.deserialize::<AccountRecord>().enumerate() {
            let row = row_idx + 2; // 1-indexed, accounting for header row
            let record = result?;
            ledger.insert_account(record.into_account(row)?);
        }

        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(splits);
        let mut pending: Option<Transaction> = None;
        let mut seen = HashSet::new();
        for (row_idx, result) in reader.deserialize::<SplitRecord>().enumerate() {
            let row = row_idx + 2;
            let record = result?;

            let continues = pending
                .as_ref()
                .is_some_and(|tx| tx.id == record.transaction_id);
            if !continues {
                if let Some(done) = pending.take() {
                    ledger.upsert_transaction(done)?;
                }
                if !seen.insert(record.transaction_id.clone()) {
                    return Err(ExportError::DuplicateTransaction {
                        transaction_id: record.transaction_id,
                        row,
                    });
                }
                pending = Some(record.transaction(row)?);
            }

            if let Some(tx) = pending.as_mut() {
                let quantity_commodity = ledger
                    .accounts
                    .get(&record.account_id)
                    .map(|account| account.commodity.clone())
                    .unwrap_or_else(|| tx.currency.clone());
                let split = record.split(row, &tx.currency, quantity_commodity)?;
                tx.splits.push(split);
            }
        }
        if let Some(done) = pending {
            ledger.upsert_transaction(done)?;
        }

        debug!(
            "Loaded {} accounts and {} transactions",
            ledger.accounts.len(),
            ledger.transactions.len()
        );
        Ok(ledger)
    }
}

impl LedgerSource for InMemoryLedger {
    fn account(&self, id: &str) -> Result<Account> {
        self.accounts
            .get(id)
            .cloned()
            .ok_or_else(|| ExportError::BrokenReference {
                account_id: id.to_string(),
            })
    }

    fn transactions_modified_since(&self, since: DateTime<Utc>) -> Result<TransactionCursor<'_>> {
        Ok(Box::new(
            self.transactions
                .iter()
                .filter(move |tx| tx.modified_at > since)
                .cloned()
                .map(Ok),
        ))
    }
}

/// Raw account row.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: String,
    name: Option<String>,
    full_name: String,
    commodity: String,
}

impl AccountRecord {
    fn into_account(self, row: usize) -> Result<Account> {
        if self.id.is_empty() {
            return Err(invalid(row, "account id is empty"));
        }
        let mut account = Account::new(self.id, self.full_name, Commodity::from_code(&self.commodity));
        if let Some(name) = self.name.filter(|n| !n.is_empty()) {
            account.name = name;
        }
        Ok(account)
    }
}

/// Raw split row, repeating its transaction's columns.
#[derive(Debug, Deserialize)]
struct SplitRecord {
    transaction_id: String,
    timestamp: String,
    modified_at: Option<String>,
    description: Option<String>,
    notes: Option<String>,
    currency: String,
    memo: Option<String>,
    account_id: String,
    quantity: Option<String>,
    value: String,
    split_type: String,
    reconcile_state: Option<String>,
    reconcile_date: Option<String>,
}

impl SplitRecord {
    fn transaction(&self, row: usize) -> Result<Transaction> {
        let timestamp = parse_timestamp(&self.timestamp, row)?;
        let modified_at = match non_empty(&self.modified_at) {
            Some(text) => parse_timestamp(text, row)?,
            None => timestamp,
        };

        let mut tx = Transaction::new(
            self.transaction_id.clone(),
            timestamp,
            Commodity::from_code(&self.currency),
        )
        .modified(modified_at)
        .with_description(self.description.clone().unwrap_or_default());
        tx.notes = non_empty(&self.notes).map(str::to_string);
        Ok(tx)
    }

    /// Values are in the transaction currency, quantities in the account's
    /// commodity. A missing quantity means both are the same amount.
    fn split(&self, row: usize, currency: &Commodity, quantity_commodity: Commodity) -> Result<Split> {
        let value = ExactQuantity::parse(&self.value, currency.clone())
            .map_err(|e| invalid(row, &e.to_string()))?;
        let quantity = match non_empty(&self.quantity) {
            Some(text) => ExactQuantity::parse(text, quantity_commodity)
                .map_err(|e| invalid(row, &e.to_string()))?,
            None => ExactQuantity::parse(&self.value, quantity_commodity)
                .map_err(|e| invalid(row, &e.to_string()))?,
        };
        if value.is_negative() || quantity.is_negative() {
            return Err(invalid(
                row,
                "negative amount, direction is given by split_type",
            ));
        }
        let split_type = SplitType::parse(&self.split_type)
            .ok_or_else(|| invalid(row, &format!("unknown split type {:?}", self.split_type)))?;

        let reconcile = match non_empty(&self.reconcile_state).unwrap_or("n") {
            "n" | "N" => ReconcileState::NotReconciled,
            "c" | "C" => ReconcileState::Cleared,
            "y" | "Y" => {
                let text = non_empty(&self.reconcile_date)
                    .ok_or_else(|| invalid(row, "reconciled split without reconcile date"))?;
                let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|e| invalid(row, &format!("bad reconcile date {:?}: {}", text, e)))?;
                ReconcileState::Reconciled { date }
            }
            other => return Err(invalid(row, &format!("unknown reconcile state {:?}", other))),
        };

        let mut split = Split::new(self.account_id.clone(), value, split_type)
            .with_quantity(quantity)
            .with_reconcile(reconcile);
        split.memo = non_empty(&self.memo).map(str::to_string);
        Ok(split)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn parse_timestamp(text: &str, row: usize) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(row, &format!("bad timestamp {:?}: {}", text, e)))
}

fn invalid(row: usize, message: &str) -> ExportError {
    ExportError::InvalidRecord {
        row,
        message: message.to_string(),
    }
}
