//! Centsible keeps a personal budget ledger: accounts, income/expense/transfer
//! transactions, and monthly budgets.
//!
//! The crate's core is [Ledger], which enforces one invariant: every account's
//! balance equals its opening balance plus the signed effects of all
//! transactions that reference it. The ledger is written once and is generic
//! over a [LedgerStore](stores::LedgerStore) backend. Two backends ship with
//! the crate:
//!
//! - [SqliteLedgerStore](stores::SqliteLedgerStore) applies each unit of
//!   change inside a single SQL transaction, so a transaction insert and its
//!   balance updates commit together or not at all.
//! - [JsonLedgerStore](stores::JsonLedgerStore) persists each collection as a
//!   JSON file and applies changes as sequential whole-file rewrites. A crash
//!   between steps can leave the ledger inconsistent; this is a documented
//!   limitation of that backend, not something the ledger papers over.

#![warn(missing_docs)]

mod ledger;
pub mod models;
pub mod stores;

pub use ledger::{BudgetUsage, Ledger, LedgerSnapshot, MonthlySummary};

use models::{AccountId, TransactionId};

/// The errors that may occur in the ledger and its storage backends.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A transaction or budget amount was zero, negative, or not a number.
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(f64),

    /// A transfer named the same account as both source and destination.
    #[error("a transfer must name two different accounts")]
    TransferToSameAccount,

    /// An income or expense transaction was created without a category.
    #[error("income and expense transactions require a category")]
    MissingCategory,

    /// A transfer was created without a destination account.
    #[error("transfers require a destination account")]
    MissingTransferDestination,

    /// A referenced account does not exist.
    #[error("no account with ID {0}")]
    AccountNotFound(AccountId),

    /// The requested record could not be found.
    #[error("the requested record could not be found")]
    NotFound,

    /// Tried to delete an account that transactions still reference.
    ///
    /// The referencing transactions must be deleted first. Deleting them
    /// automatically would silently rewrite history the user may be auditing.
    #[error("account {0} still has transactions referencing it")]
    AccountInUse(AccountId),

    /// The record exists but belongs to a different owner scope.
    ///
    /// Only returned by the multi-tenant SQLite backend.
    #[error("the record belongs to a different owner")]
    Unauthorized,

    /// A month key could not be parsed as `YYYY-MM`.
    #[error("invalid month key {0:?}, expected YYYY-MM")]
    InvalidMonth(String),

    /// An unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// The underlying file storage failed to read, write, or parse.
    #[error("ledger storage failed: {0}")]
    StorageFailure(String),

    /// A stored transfer is missing its destination account reference.
    ///
    /// This indicates the stored data was edited outside the ledger; the
    /// balance effects of such a record cannot be reversed safely.
    #[error("transaction {0} is missing its transfer destination")]
    CorruptTransfer(TransactionId),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
