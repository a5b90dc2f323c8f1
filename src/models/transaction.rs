//! The transaction model and the draft type used to create transactions.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::{AccountId, CategoryId, TransactionId};

/// A recorded movement of money.
///
/// Income and expense transactions touch one account and carry a category;
/// transfers move money between two accounts and carry no category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Whether money was earned, spent, or moved between accounts.
    pub kind: TransactionKind,
    /// The amount of money moved. Always positive; the sign of the effect on
    /// each account follows from `kind`.
    pub amount: f64,
    /// The source account.
    pub account_id: AccountId,
    /// The destination account. `Some` exactly when `kind` is
    /// [Transfer](TransactionKind::Transfer).
    pub to_account_id: Option<AccountId>,
    /// The category for income and expense transactions, `None` for transfers.
    pub category: Option<CategoryId>,
    /// When the transaction happened.
    pub date: Date,
    /// A free-text note.
    pub note: Option<String>,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The details needed to create a [Transaction].
///
/// Use [TransactionDraft::income], [TransactionDraft::expense], or
/// [TransactionDraft::transfer] so the kind-specific fields are filled in
/// consistently; the ledger validates the draft either way.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    /// Whether money was earned, spent, or moved between accounts.
    pub kind: TransactionKind,
    /// The amount of money moved. Must be positive.
    pub amount: f64,
    /// The source account.
    pub account_id: AccountId,
    /// The destination account, required for transfers.
    pub to_account_id: Option<AccountId>,
    /// The category, required for income and expense.
    pub category: Option<CategoryId>,
    /// When the transaction happened.
    pub date: Date,
    /// A free-text note.
    pub note: Option<String>,
}

impl TransactionDraft {
    /// A draft for money earned into `account`.
    pub fn income(amount: f64, account: AccountId, category: CategoryId, date: Date) -> Self {
        Self {
            kind: TransactionKind::Income,
            amount,
            account_id: account,
            to_account_id: None,
            category: Some(category),
            date,
            note: None,
        }
    }

    /// A draft for money spent from `account`.
    pub fn expense(amount: f64, account: AccountId, category: CategoryId, date: Date) -> Self {
        Self {
            kind: TransactionKind::Expense,
            amount,
            account_id: account,
            to_account_id: None,
            category: Some(category),
            date,
            note: None,
        }
    }

    /// A draft for money moved from `from` to `to`.
    pub fn transfer(amount: f64, from: AccountId, to: AccountId, date: Date) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            amount,
            account_id: from,
            to_account_id: Some(to),
            category: None,
            date,
            note: None,
        }
    }

    /// Attach a free-text note to the draft.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// The three kinds of transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money earned into an account.
    Income,
    /// Money spent from an account.
    Expense,
    /// Money moved between two accounts.
    Transfer,
}

impl TransactionKind {
    /// The lowercase tag used in storage and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            "transfer" => Ok(TransactionKind::Transfer),
            other => Err(format!(
                "unknown transaction kind {other:?}, expected income, expense, or transfer"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::models::{AccountId, CategoryId};

    use super::{TransactionDraft, TransactionKind};

    #[test]
    fn income_draft_has_category_and_no_destination() {
        let account = AccountId::new();

        let draft = TransactionDraft::income(
            100.0,
            account,
            CategoryId::from("salary"),
            date!(2024 - 06 - 01),
        );

        assert_eq!(draft.kind, TransactionKind::Income);
        assert_eq!(draft.account_id, account);
        assert_eq!(draft.to_account_id, None);
        assert_eq!(draft.category, Some(CategoryId::from("salary")));
    }

    #[test]
    fn transfer_draft_has_destination_and_no_category() {
        let from = AccountId::new();
        let to = AccountId::new();

        let draft = TransactionDraft::transfer(50.0, from, to, date!(2024 - 06 - 01));

        assert_eq!(draft.kind, TransactionKind::Transfer);
        assert_eq!(draft.to_account_id, Some(to));
        assert_eq!(draft.category, None);
    }

    #[test]
    fn note_is_attached() {
        let draft = TransactionDraft::expense(
            5.0,
            AccountId::new(),
            CategoryId::from("food"),
            date!(2024 - 06 - 01),
        )
        .note("coffee");

        assert_eq!(draft.note.as_deref(), Some("coffee"));
    }
}
