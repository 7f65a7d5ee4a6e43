//! Ledger account model.

use crate::quantity::Commodity;

/// An account as seen by the exporter.
///
/// Accounts are owned by the ledger and read-only for the duration of an
/// export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Stable unique identifier referenced by splits.
    pub id: String,

    /// Short display name, e.g. `Rent`.
    pub name: String,

    /// Colon-separated path from the root, e.g. `Expenses:Rent`.
    pub full_name: String,

    /// Commodity the account keeps its balance in.
    pub commodity: Commodity,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        commodity: Commodity,
    ) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit(Self::SEPARATOR)
            .next()
            .unwrap_or_default()
            .to_string();
        Account {
            id: id.into(),
            name,
            full_name,
            commodity,
        }
    }

    /// Separator between levels of the account hierarchy.
    pub const SEPARATOR: char = ':';
}
