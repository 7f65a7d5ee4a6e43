//! Transaction and split models.

use crate::error::ExportError;
use crate::quantity::{Commodity, ExactQuantity, QuantityError};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// Direction of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitType {
    Debit,
    Credit,
}

impl SplitType {
    /// Parses `DEBIT`/`CREDIT`, case-insensitively.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_uppercase().as_str() {
            "DEBIT" => Some(SplitType::Debit),
            "CREDIT" => Some(SplitType::Credit),
            _ => None,
        }
    }

    /// Prefix applied to amounts of this direction: credits are negative.
    pub fn sign(self) -> &'static str {
        match self {
            SplitType::Debit => "",
            SplitType::Credit => "-",
        }
    }
}

/// Reconciliation status of a split. The date only exists once reconciled.
///
/// The date is a calendar date as entered, independent of any offset the
/// export renders timestamps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    NotReconciled,
    Cleared,
    Reconciled { date: NaiveDate },
}

impl ReconcileState {
    /// Single-character code used in the interchange file.
    pub fn code(&self) -> char {
        match self {
            ReconcileState::NotReconciled => 'n',
            ReconcileState::Cleared => 'c',
            ReconcileState::Reconciled { .. } => 'y',
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ReconcileState::Reconciled { date } => Some(*date),
            _ => None,
        }
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One debit or credit leg of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub account_id: String,

    pub memo: Option<String>,

    /// Unsigned amount in the account's commodity.
    pub quantity: ExactQuantity,

    /// Unsigned amount in the transaction's currency.
    pub value: ExactQuantity,

    pub split_type: SplitType,

    pub reconcile: ReconcileState,
}

impl Split {
    /// Creates an unreconciled split whose quantity equals its value.
    pub fn new(account_id: impl Into<String>, value: ExactQuantity, split_type: SplitType) -> Self {
        Split {
            account_id: account_id.into(),
            memo: None,
            quantity: value.clone(),
            value,
            split_type,
            reconcile: ReconcileState::NotReconciled,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_quantity(mut self, quantity: ExactQuantity) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_reconcile(mut self, reconcile: ReconcileState) -> Self {
        self.reconcile = reconcile;
        self
    }

    /// Value with the double-entry sign applied: credits negated.
    pub fn signed_value(&self) -> ExactQuantity {
        match self.split_type {
            SplitType::Debit => self.value.clone(),
            SplitType::Credit => self.value.negate(),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_negative() || self.quantity.is_negative()
    }

    /// Units of the account commodity per unit of transaction currency.
    pub fn exchange_rate(&self) -> Result<ExactQuantity, QuantityError> {
        self.quantity.divide(&self.value)
    }
}

/// A balanced set of splits recorded at one point in time.
///
/// Split order is significant: the first split shares the transaction's
/// row in the export, later splits become continuation rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,

    /// When the transaction happened.
    pub timestamp: DateTime<Utc>,

    /// Last modification, used to select incremental exports.
    pub modified_at: DateTime<Utc>,

    pub description: String,

    pub notes: Option<String>,

    /// Currency all split values are expressed in.
    pub currency: Commodity,

    pub splits: Vec<Split>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, currency: Commodity) -> Self {
        Transaction {
            id: id.into(),
            timestamp,
            modified_at: timestamp,
            description: String::new(),
            notes: None,
            currency,
            splits: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn modified(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = modified_at;
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.splits.push(split);
        self
    }

    /// Signed sum of split values; zero for a balanced transaction.
    pub fn imbalance(&self) -> Result<ExactQuantity, QuantityError> {
        self.splits
            .iter()
            .try_fold(ExactQuantity::zero(self.currency.clone()), |acc, split| {
                acc.add(&split.signed_value())
            })
    }

    /// Returns `true` if the split values cancel out exactly.
    ///
    /// Splits valued in a currency other than the transaction's make the
    /// transaction unbalanced.
    pub fn is_balanced(&self) -> bool {
        self.imbalance().map(|sum| sum.is_zero()).unwrap_or(false)
    }

    /// Checks what every stored and exported transaction must hold: at
    /// least one split, no negative amounts, and values that cancel out.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.splits.is_empty() {
            return Err(ExportError::EmptyTransaction {
                transaction_id: self.id.clone(),
            });
        }
        if let Some(split) = self.splits.iter().find(|split| split.is_negative()) {
            return Err(ExportError::NegativeAmount {
                transaction_id: self.id.clone(),
                account_id: split.account_id.clone(),
            });
        }
        if !self.is_balanced() {
            return Err(ExportError::Unbalanced {
                transaction_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn usd(numerator: i64, denominator: i64) -> ExactQuantity {
        ExactQuantity::new(numerator, denominator, Commodity::from_code("USD")).unwrap()
    }

    fn rent() -> Transaction {
        Transaction::new(
            "t1",
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            Commodity::from_code("USD"),
        )
        .with_description("Rent")
        .with_split(Split::new("expenses", usd(120000, 100), SplitType::Debit))
        .with_split(Split::new("checking", usd(120000, 100), SplitType::Credit))
    }

    #[test]
    fn test_split_type_parse() {
        assert_eq!(SplitType::parse("debit"), Some(SplitType::Debit));
        assert_eq!(SplitType::parse(" CREDIT "), Some(SplitType::Credit));
        assert_eq!(SplitType::parse("both"), None);
    }

    #[test]
    fn test_signed_value_negates_credits() {
        let tx = rent();
        assert_eq!(tx.splits[0].signed_value(), usd(1200, 1));
        assert_eq!(tx.splits[1].signed_value(), usd(-1200, 1));
    }

    #[test]
    fn test_balanced_transaction() {
        assert!(rent().is_balanced());
        assert!(rent().imbalance().unwrap().is_zero());
    }

    #[test]
    fn test_unbalanced_transaction() {
        let tx = rent().with_split(Split::new("fees", usd(1, 100), SplitType::Debit));
        assert!(!tx.is_balanced());
        assert_eq!(tx.imbalance().unwrap(), usd(1, 100));
    }

    #[test]
    fn test_three_way_split_balances_exactly() {
        let tx = Transaction::new("t2", Utc::now(), Commodity::from_code("USD"))
            .with_split(Split::new("a", usd(1, 1), SplitType::Credit))
            .with_split(Split::new("b", usd(1, 3), SplitType::Debit))
            .with_split(Split::new("c", usd(2, 3), SplitType::Debit));
        assert!(tx.is_balanced());
    }

    #[test]
    fn test_foreign_value_is_unbalanced() {
        let eur = ExactQuantity::new(1200, 1, Commodity::from_code("EUR")).unwrap();
        let tx = Transaction::new("t3", Utc::now(), Commodity::from_code("USD"))
            .with_split(Split::new("a", usd(1200, 1), SplitType::Debit))
            .with_split(Split::new("b", eur, SplitType::Credit));
        assert!(!tx.is_balanced());
    }

    #[test]
    fn test_reconcile_codes() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(ReconcileState::NotReconciled.code(), 'n');
        assert_eq!(ReconcileState::Cleared.code(), 'c');
        assert_eq!(ReconcileState::Reconciled { date }.code(), 'y');
        assert_eq!(ReconcileState::Cleared.date(), None);
        assert_eq!(ReconcileState::Reconciled { date }.date(), Some(date));
    }

    #[test]
    fn test_validate_accepts_balanced() {
        assert!(rent().validate().is_ok());
    }

    #[test]
    fn test_negative_value_is_refused_even_when_balanced() {
        let tx = Transaction::new("t4", Utc::now(), Commodity::from_code("USD"))
            .with_split(Split::new("a", usd(10, 1), SplitType::Debit))
            .with_split(Split::new("b", usd(-10, 1), SplitType::Debit));
        assert!(tx.is_balanced());
        assert!(matches!(
            tx.validate(),
            Err(ExportError::NegativeAmount { account_id, .. }) if account_id == "b"
        ));
    }

    #[test]
    fn test_negative_quantity_is_refused() {
        let split = Split::new("a", usd(10, 1), SplitType::Debit).with_quantity(usd(-10, 1));
        assert!(split.is_negative());
        let tx = Transaction::new("t5", Utc::now(), Commodity::from_code("USD"))
            .with_split(split)
            .with_split(Split::new("b", usd(10, 1), SplitType::Credit));
        assert!(matches!(tx.validate(), Err(ExportError::NegativeAmount { .. })));
    }

    #[test]
    fn test_exchange_rate() {
        let eur = ExactQuantity::new(110, 1, Commodity::from_code("EUR")).unwrap();
        let split = Split::new("eur-account", usd(100, 1), SplitType::Debit).with_quantity(eur);
        assert_eq!(split.exchange_rate().unwrap().format_machine(), "1.10");
    }
}
