//! The storage capability the ledger is written against, and its two
//! implementations.
//!
//! [LedgerStore] exposes collection primitives plus one compound operation,
//! [apply_change](LedgerStore::apply_change), which persists a transaction
//! insert or removal together with its account balance updates. The SQLite
//! backend commits that unit atomically; the JSON backend applies it as
//! sequential file writes and accepts the partial-failure window.

mod json;
mod sqlite;

pub use json::JsonLedgerStore;
pub use sqlite::{SqliteLedgerStore, initialize};

use time::Date;

use crate::{
    Error,
    models::{
        Account, AccountId, AccountUpdate, Budget, BudgetId, CategoryId, Month, NewAccount,
        Transaction, TransactionDraft, TransactionId, TransactionKind,
    },
};

/// A persistence backend for one owner's ledger.
///
/// Implementations generate record IDs and creation timestamps on insert.
/// Reads and writes are scoped to a single owner; the SQLite backend stores
/// many owners in one database and returns [Error::Unauthorized] when an ID
/// resolves to another owner's record.
pub trait LedgerStore {
    /// Create a new account with a generated ID.
    fn create_account(&mut self, new_account: NewAccount) -> Result<Account, Error>;

    /// Retrieve an account by ID.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if `id` does not resolve.
    fn get_account(&self, id: AccountId) -> Result<Account, Error>;

    /// Retrieve all accounts in creation order.
    fn get_accounts(&self) -> Result<Vec<Account>, Error>;

    /// Update an account's name and/or kind, returning the updated record.
    ///
    /// Fields left `None` in `update` keep their stored value. The balance
    /// cannot be edited through this method.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if `id` does not resolve.
    fn update_account(&mut self, id: AccountId, update: AccountUpdate) -> Result<Account, Error>;

    /// Delete an account by ID.
    ///
    /// Callers are expected to have checked for referencing transactions;
    /// [Ledger](crate::Ledger) enforces the reject-while-referenced policy.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if `id` does not resolve.
    fn delete_account(&mut self, id: AccountId) -> Result<(), Error>;

    /// Retrieve a transaction by ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if `id` does not resolve.
    fn get_transaction(&self, id: TransactionId) -> Result<Transaction, Error>;

    /// Retrieve the transactions matching `filter`, newest date first, ties
    /// in insertion order.
    fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error>;

    /// Persist one unit of change: a transaction insert or removal together
    /// with the balance deltas it causes.
    ///
    /// Returns the created transaction for inserts, `None` for removals.
    ///
    /// Transactional backends must commit the unit atomically and apply each
    /// delta against the balance as currently stored, not a value read before
    /// the unit began. Non-transactional backends apply the steps
    /// sequentially and may leave the ledger inconsistent if interrupted.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if a delta references a missing
    /// account, or [Error::NotFound] if a removal references a missing
    /// transaction.
    fn apply_change(&mut self, change: LedgerChange) -> Result<Option<Transaction>, Error>;

    /// Create or overwrite the budget for `(category, month)`.
    fn upsert_budget(
        &mut self,
        category: CategoryId,
        month: Month,
        amount: f64,
    ) -> Result<Budget, Error>;

    /// Retrieve budgets, optionally only those for `month`.
    fn get_budgets(&self, month: Option<Month>) -> Result<Vec<Budget>, Error>;

    /// Delete a budget by ID.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if `id` does not resolve.
    fn delete_budget(&mut self, id: BudgetId) -> Result<(), Error>;

    /// Replace all three collections wholesale with the given records.
    fn replace_all(
        &mut self,
        accounts: Vec<Account>,
        transactions: Vec<Transaction>,
        budgets: Vec<Budget>,
    ) -> Result<(), Error>;
}

/// One unit of change against the ledger.
///
/// Groups a transaction insert or removal with the account balance deltas the
/// ledger computed for it, so backends can persist both sides together.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerChange {
    /// Insert a new transaction and apply its balance deltas.
    Insert {
        /// The transaction to create.
        draft: TransactionDraft,
        /// The balance adjustments the insert causes.
        deltas: Vec<BalanceDelta>,
    },
    /// Remove a transaction and apply the inverse balance deltas.
    Remove {
        /// The transaction to remove.
        id: TransactionId,
        /// The balance adjustments that undo the original insert.
        deltas: Vec<BalanceDelta>,
    },
}

/// A signed adjustment to one account's balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceDelta {
    /// The account to adjust.
    pub account_id: AccountId,
    /// The signed amount to add to the balance.
    pub change: f64,
}

/// Defines which transactions [LedgerStore::get_transactions] returns.
///
/// All supplied filters must match. The default filter matches everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionFilter {
    /// Match transactions with this account as source or destination.
    pub account_id: Option<AccountId>,
    /// Match transactions of this kind.
    pub kind: Option<TransactionKind>,
    /// Match transactions on or after this date.
    pub date_from: Option<Date>,
    /// Match transactions on or before this date.
    pub date_to: Option<Date>,
    /// Match transactions within this calendar month.
    pub month: Option<Month>,
}

impl TransactionFilter {
    /// A filter that matches every transaction within `month`.
    pub fn for_month(month: Month) -> Self {
        Self {
            month: Some(month),
            ..Self::default()
        }
    }

    /// A filter that matches every transaction touching `account_id`.
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    /// The effective inclusive date bounds once the month filter is folded
    /// into the from/to bounds.
    pub fn date_bounds(&self) -> (Option<Date>, Option<Date>) {
        let mut from = self.date_from;
        let mut to = self.date_to;

        if let Some(month) = self.month {
            let first = month.first_day();
            let last = month.last_day();

            from = Some(from.map_or(first, |date| date.max(first)));
            to = Some(to.map_or(last, |date| date.min(last)));
        }

        (from, to)
    }

    /// Whether `transaction` matches every supplied filter.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(account_id) = self.account_id
            && transaction.account_id != account_id
            && transaction.to_account_id != Some(account_id)
        {
            return false;
        }

        if let Some(kind) = self.kind
            && transaction.kind != kind
        {
            return false;
        }

        let (from, to) = self.date_bounds();

        if let Some(from) = from
            && transaction.date < from
        {
            return false;
        }

        if let Some(to) = to
            && transaction.date > to
        {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod filter_tests {
    use time::macros::date;

    use crate::models::{AccountId, CategoryId, Month, TransactionDraft, TransactionKind};

    use super::TransactionFilter;

    fn sample(date: time::Date) -> crate::models::Transaction {
        let draft =
            TransactionDraft::expense(10.0, AccountId::new(), CategoryId::from("food"), date);

        crate::models::Transaction {
            id: crate::models::TransactionId::new(),
            kind: draft.kind,
            amount: draft.amount,
            account_id: draft.account_id,
            to_account_id: draft.to_account_id,
            category: draft.category,
            date: draft.date,
            note: draft.note,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = TransactionFilter::default();

        assert!(filter.matches(&sample(date!(2024 - 06 - 15))));
    }

    #[test]
    fn month_folds_into_date_bounds() {
        let filter = TransactionFilter::for_month("2024-06".parse().unwrap());

        assert_eq!(
            filter.date_bounds(),
            (Some(date!(2024 - 06 - 01)), Some(date!(2024 - 06 - 30)))
        );
    }

    #[test]
    fn month_and_explicit_bounds_intersect() {
        let filter = TransactionFilter {
            date_from: Some(date!(2024 - 06 - 10)),
            date_to: Some(date!(2024 - 07 - 15)),
            month: Some(Month::new(2024, time::Month::June)),
            ..TransactionFilter::default()
        };

        assert_eq!(
            filter.date_bounds(),
            (Some(date!(2024 - 06 - 10)), Some(date!(2024 - 06 - 30)))
        );
    }

    #[test]
    fn account_filter_matches_source_or_destination() {
        let mut transaction = sample(date!(2024 - 06 - 15));
        let other = AccountId::new();
        transaction.kind = TransactionKind::Transfer;
        transaction.to_account_id = Some(other);

        assert!(TransactionFilter::for_account(transaction.account_id).matches(&transaction));
        assert!(TransactionFilter::for_account(other).matches(&transaction));
        assert!(!TransactionFilter::for_account(AccountId::new()).matches(&transaction));
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let filter = TransactionFilter {
            date_from: Some(date!(2024 - 06 - 01)),
            date_to: Some(date!(2024 - 06 - 30)),
            ..TransactionFilter::default()
        };

        assert!(filter.matches(&sample(date!(2024 - 06 - 01))));
        assert!(filter.matches(&sample(date!(2024 - 06 - 30))));
        assert!(!filter.matches(&sample(date!(2024 - 05 - 31))));
        assert!(!filter.matches(&sample(date!(2024 - 07 - 01))));
    }
}
