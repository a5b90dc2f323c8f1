//! The account model.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::AccountId;

/// A place money lives, e.g. a bank account, a wallet, or a credit card.
///
/// The balance is maintained by the ledger: it always equals the opening
/// balance plus the signed effects of every transaction that references this
/// account as source or destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The ID of the account.
    pub id: AccountId,
    /// The display name of the account.
    pub name: String,
    /// What kind of account this is.
    pub kind: AccountKind,
    /// The current balance. May be negative, e.g. for credit cards.
    pub balance: f64,
    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The details needed to create an [Account].
///
/// The storage backend assigns the ID and creation timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// The display name of the account.
    pub name: String,
    /// What kind of account this is.
    pub kind: AccountKind,
    /// The opening balance.
    pub balance: f64,
}

/// An edit to an account's descriptive fields.
///
/// Fields left `None` keep their stored value. The balance is deliberately
/// absent: it is maintained by the ledger and only changes through
/// transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountUpdate {
    /// The new display name, if it changes.
    pub name: Option<String>,
    /// The new kind, if it changes.
    pub kind: Option<AccountKind>,
}

/// The kinds of account a user can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// A checking or everyday bank account.
    Bank,
    /// Physical cash.
    Cash,
    /// A credit card.
    Credit,
    /// A savings account.
    Savings,
    /// Anything else.
    Other,
}

impl AccountKind {
    /// The lowercase tag used in storage and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Bank => "bank",
            AccountKind::Cash => "cash",
            AccountKind::Credit => "credit",
            AccountKind::Savings => "savings",
            AccountKind::Other => "other",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" => Ok(AccountKind::Bank),
            "cash" => Ok(AccountKind::Cash),
            "credit" => Ok(AccountKind::Credit),
            "savings" => Ok(AccountKind::Savings),
            "other" => Ok(AccountKind::Other),
            other => Err(format!(
                "unknown account kind {other:?}, expected one of bank, cash, credit, savings, other"
            )),
        }
    }
}
