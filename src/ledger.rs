//! The ledger: validation and balance consistency over a storage backend.
//!
//! All invariant logic lives here, written once against [LedgerStore]. The
//! ledger validates drafts, computes the balance deltas a transaction causes,
//! and hands the store one [LedgerChange] so record and balances are
//! persisted together.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    models::{
        Account, AccountId, AccountUpdate, Budget, BudgetId, CategoryId, Month, NewAccount,
        Transaction, TransactionDraft, TransactionId, TransactionKind,
    },
    stores::{BalanceDelta, LedgerChange, LedgerStore, TransactionFilter},
};

/// A budget ledger over a storage backend.
pub struct Ledger<S> {
    store: S,
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a ledger over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a new account.
    pub fn create_account(&mut self, new_account: NewAccount) -> Result<Account, Error> {
        self.store.create_account(new_account)
    }

    /// Retrieve an account by ID.
    pub fn account(&self, id: AccountId) -> Result<Account, Error> {
        self.store.get_account(id)
    }

    /// Retrieve all accounts in creation order.
    pub fn accounts(&self) -> Result<Vec<Account>, Error> {
        self.store.get_accounts()
    }

    /// The sum of all account balances.
    pub fn total_balance(&self) -> Result<f64, Error> {
        Ok(self
            .store
            .get_accounts()?
            .iter()
            .map(|account| account.balance)
            .sum())
    }

    /// Edit an account's name and/or kind.
    ///
    /// Fields left `None` keep their stored value. The balance cannot be
    /// edited; it only changes through transactions.
    pub fn update_account(&mut self, id: AccountId, update: AccountUpdate) -> Result<Account, Error> {
        self.store.update_account(id, update)
    }

    /// Delete an account.
    ///
    /// # Errors
    /// Returns [Error::AccountInUse] while any transaction references the
    /// account as source or destination. Delete those transactions first.
    pub fn delete_account(&mut self, id: AccountId) -> Result<(), Error> {
        self.store.get_account(id)?;

        let referencing = self
            .store
            .get_transactions(&TransactionFilter::for_account(id))?;

        if !referencing.is_empty() {
            return Err(Error::AccountInUse(id));
        }

        self.store.delete_account(id)
    }

    /// Record a transaction and adjust the affected account balances.
    ///
    /// Income adds the amount to the source account, an expense subtracts it,
    /// and a transfer moves it from the source to the destination account.
    /// Fields that do not apply to the kind (a category on a transfer, a
    /// destination on income or an expense) are cleared before the record is
    /// stored.
    ///
    /// # Errors
    /// Returns [Error::NonPositiveAmount] unless the amount is strictly
    /// positive, [Error::MissingCategory] for income or an expense without a
    /// category, [Error::MissingTransferDestination] or
    /// [Error::TransferToSameAccount] for malformed transfers, and
    /// [Error::AccountNotFound] when a referenced account does not exist.
    /// On error no record is stored and no balance changes.
    pub fn add_transaction(&mut self, draft: TransactionDraft) -> Result<Transaction, Error> {
        let draft = validate_draft(draft)?;

        self.store.get_account(draft.account_id)?;
        if let Some(to_account_id) = draft.to_account_id {
            self.store.get_account(to_account_id)?;
        }

        let deltas = balance_effects(
            draft.kind,
            draft.amount,
            draft.account_id,
            draft.to_account_id,
        )
        .ok_or(Error::MissingTransferDestination)?;

        self.store
            .apply_change(LedgerChange::Insert { draft, deltas })?
            .ok_or_else(|| {
                Error::StorageFailure("backend returned no record for an insert".to_owned())
            })
    }

    /// Retrieve a transaction by ID.
    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        self.store.get_transaction(id)
    }

    /// Retrieve the transactions matching `filter`, newest date first.
    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error> {
        self.store.get_transactions(filter)
    }

    /// Delete a transaction and undo its effect on account balances.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if `id` does not resolve, and
    /// [Error::CorruptTransfer] if a stored transfer is missing its
    /// destination account and its effect cannot be undone.
    pub fn delete_transaction(&mut self, id: TransactionId) -> Result<(), Error> {
        let transaction = self.store.get_transaction(id)?;

        let deltas = balance_effects(
            transaction.kind,
            transaction.amount,
            transaction.account_id,
            transaction.to_account_id,
        )
        .ok_or(Error::CorruptTransfer(id))?
        .into_iter()
        .map(|delta| BalanceDelta {
            change: -delta.change,
            ..delta
        })
        .collect();

        self.store.apply_change(LedgerChange::Remove { id, deltas })?;

        Ok(())
    }

    /// Create or overwrite the budget for `(category, month)`.
    ///
    /// # Errors
    /// Returns [Error::NonPositiveAmount] unless `amount` is strictly
    /// positive.
    pub fn upsert_budget(
        &mut self,
        category: CategoryId,
        month: Month,
        amount: f64,
    ) -> Result<Budget, Error> {
        if !(amount > 0.0) {
            return Err(Error::NonPositiveAmount(amount));
        }

        self.store.upsert_budget(category, month, amount)
    }

    /// Retrieve budgets, optionally only those for `month`.
    pub fn budgets(&self, month: Option<Month>) -> Result<Vec<Budget>, Error> {
        self.store.get_budgets(month)
    }

    /// Delete a budget by ID.
    pub fn delete_budget(&mut self, id: BudgetId) -> Result<(), Error> {
        self.store.delete_budget(id)
    }

    /// Total income and expenses for `month`. Transfers are excluded since
    /// they move money between accounts without changing the total.
    pub fn monthly_summary(&self, month: Month) -> Result<MonthlySummary, Error> {
        let transactions = self
            .store
            .get_transactions(&TransactionFilter::for_month(month))?;

        let mut summary = MonthlySummary {
            income: 0.0,
            expense: 0.0,
        };

        for transaction in &transactions {
            match transaction.kind {
                TransactionKind::Income => summary.income += transaction.amount,
                TransactionKind::Expense => summary.expense += transaction.amount,
                TransactionKind::Transfer => {}
            }
        }

        Ok(summary)
    }

    /// How much of the budget for `category` has been spent in `month`.
    ///
    /// The target is `None` when no budget has been set for the pair.
    pub fn budget_usage(&self, category: &CategoryId, month: Month) -> Result<BudgetUsage, Error> {
        let expenses = self.store.get_transactions(&TransactionFilter {
            kind: Some(TransactionKind::Expense),
            month: Some(month),
            ..TransactionFilter::default()
        })?;

        let spent = expenses
            .iter()
            .filter(|transaction| transaction.category.as_ref() == Some(category))
            .map(|transaction| transaction.amount)
            .sum();

        let target = self
            .store
            .get_budgets(Some(month))?
            .into_iter()
            .find(|budget| &budget.category == category)
            .map(|budget| budget.amount);

        Ok(BudgetUsage { spent, target })
    }

    /// Export the whole ledger as one snapshot.
    pub fn export(&self) -> Result<LedgerSnapshot, Error> {
        Ok(LedgerSnapshot {
            accounts: self.store.get_accounts()?,
            transactions: self.store.get_transactions(&TransactionFilter::default())?,
            budgets: self.store.get_budgets(None)?,
            exported_at: OffsetDateTime::now_utc(),
        })
    }

    /// Replace the whole ledger with `snapshot`, keeping the snapshot's IDs
    /// and timestamps.
    pub fn import(&mut self, snapshot: LedgerSnapshot) -> Result<(), Error> {
        tracing::info!(
            "importing snapshot with {} account(s), {} transaction(s) and {} budget(s)",
            snapshot.accounts.len(),
            snapshot.transactions.len(),
            snapshot.budgets.len()
        );

        self.store
            .replace_all(snapshot.accounts, snapshot.transactions, snapshot.budgets)
    }
}

/// Totals for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlySummary {
    /// Total income recorded in the month.
    pub income: f64,
    /// Total expenses recorded in the month.
    pub expense: f64,
}

impl MonthlySummary {
    /// Income minus expenses.
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }
}

/// Spending against the budget for one category and month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetUsage {
    /// Total expenses in the category for the month.
    pub spent: f64,
    /// The budgeted amount, if a budget has been set.
    pub target: Option<f64>,
}

impl BudgetUsage {
    /// How much budget is left, if a budget has been set.
    pub fn remaining(&self) -> Option<f64> {
        self.target.map(|target| target - self.spent)
    }
}

/// A full copy of a ledger, used for export and import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// All accounts.
    pub accounts: Vec<Account>,
    /// All transactions.
    pub transactions: Vec<Transaction>,
    /// All budgets.
    pub budgets: Vec<Budget>,
    /// When the snapshot was taken.
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
}

fn validate_draft(mut draft: TransactionDraft) -> Result<TransactionDraft, Error> {
    // Written as a negated comparison so NaN is rejected too.
    if !(draft.amount > 0.0) {
        return Err(Error::NonPositiveAmount(draft.amount));
    }

    match draft.kind {
        TransactionKind::Transfer => {
            let to_account_id = draft
                .to_account_id
                .ok_or(Error::MissingTransferDestination)?;

            if to_account_id == draft.account_id {
                return Err(Error::TransferToSameAccount);
            }

            draft.category = None;
        }
        TransactionKind::Income | TransactionKind::Expense => {
            if draft.category.is_none() {
                return Err(Error::MissingCategory);
            }

            draft.to_account_id = None;
        }
    }

    Ok(draft)
}

/// The balance deltas a transaction causes.
///
/// Returns `None` for a transfer without a destination.
fn balance_effects(
    kind: TransactionKind,
    amount: f64,
    account_id: AccountId,
    to_account_id: Option<AccountId>,
) -> Option<Vec<BalanceDelta>> {
    match kind {
        TransactionKind::Income => Some(vec![BalanceDelta {
            account_id,
            change: amount,
        }]),
        TransactionKind::Expense => Some(vec![BalanceDelta {
            account_id,
            change: -amount,
        }]),
        TransactionKind::Transfer => to_account_id.map(|to_account_id| {
            vec![
                BalanceDelta {
                    account_id,
                    change: -amount,
                },
                BalanceDelta {
                    account_id: to_account_id,
                    change: amount,
                },
            ]
        }),
    }
}

#[cfg(test)]
mod ledger_tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use tempfile::TempDir;
    use time::macros::date;

    use crate::{
        Error,
        models::{AccountId, AccountKind, AccountUpdate, CategoryId, NewAccount, TransactionDraft},
        stores::{
            JsonLedgerStore, LedgerStore, SqliteLedgerStore, TransactionFilter, initialize,
        },
    };

    use super::Ledger;

    fn sqlite_ledger() -> Ledger<SqliteLedgerStore> {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        Ledger::new(SqliteLedgerStore::new(
            Arc::new(Mutex::new(connection)),
            "test-user",
        ))
    }

    fn json_ledger(directory: &TempDir) -> Ledger<JsonLedgerStore> {
        Ledger::new(JsonLedgerStore::new(directory.path()))
    }

    fn open_account(
        ledger: &mut Ledger<impl LedgerStore>,
        name: &str,
        balance: f64,
    ) -> crate::models::Account {
        ledger
            .create_account(NewAccount {
                name: name.to_owned(),
                kind: AccountKind::Bank,
                balance,
            })
            .unwrap()
    }

    fn food() -> CategoryId {
        CategoryId::from("food")
    }

    fn expense_and_transfer_update_balances(mut ledger: Ledger<impl LedgerStore>) {
        let a = open_account(&mut ledger, "A", 1000.0);
        let b = open_account(&mut ledger, "B", 500.0);

        ledger
            .add_transaction(TransactionDraft::expense(
                200.0,
                a.id,
                food(),
                date!(2024 - 06 - 01),
            ))
            .unwrap();
        let transfer = ledger
            .add_transaction(TransactionDraft::transfer(
                300.0,
                a.id,
                b.id,
                date!(2024 - 06 - 02),
            ))
            .unwrap();

        assert_eq!(ledger.account(a.id).unwrap().balance, 500.0);
        assert_eq!(ledger.account(b.id).unwrap().balance, 800.0);

        ledger.delete_transaction(transfer.id).unwrap();

        assert_eq!(ledger.account(a.id).unwrap().balance, 800.0);
        assert_eq!(ledger.account(b.id).unwrap().balance, 500.0);
        assert_eq!(ledger.total_balance().unwrap(), 1300.0);
    }

    #[test]
    fn expense_and_transfer_update_balances_sqlite() {
        expense_and_transfer_update_balances(sqlite_ledger());
    }

    #[test]
    fn expense_and_transfer_update_balances_json() {
        let directory = TempDir::new().unwrap();
        expense_and_transfer_update_balances(json_ledger(&directory));
    }

    fn add_then_delete_is_a_no_op(mut ledger: Ledger<impl LedgerStore>) {
        let account = open_account(&mut ledger, "Checking", 250.0);

        let transaction = ledger
            .add_transaction(TransactionDraft::income(
                75.0,
                account.id,
                CategoryId::from("salary"),
                date!(2024 - 06 - 10),
            ))
            .unwrap();
        ledger.delete_transaction(transaction.id).unwrap();

        assert_eq!(ledger.account(account.id).unwrap().balance, 250.0);
        assert_eq!(
            ledger.transaction(transaction.id),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn add_then_delete_is_a_no_op_sqlite() {
        add_then_delete_is_a_no_op(sqlite_ledger());
    }

    #[test]
    fn add_then_delete_is_a_no_op_json() {
        let directory = TempDir::new().unwrap();
        add_then_delete_is_a_no_op(json_ledger(&directory));
    }

    fn invalid_drafts_are_rejected_without_side_effects(mut ledger: Ledger<impl LedgerStore>) {
        let account = open_account(&mut ledger, "Checking", 100.0);

        let cases = [
            (
                TransactionDraft::expense(0.0, account.id, food(), date!(2024 - 06 - 01)),
                Error::NonPositiveAmount(0.0),
            ),
            (
                TransactionDraft::expense(-5.0, account.id, food(), date!(2024 - 06 - 01)),
                Error::NonPositiveAmount(-5.0),
            ),
            (
                TransactionDraft::transfer(10.0, account.id, account.id, date!(2024 - 06 - 01)),
                Error::TransferToSameAccount,
            ),
        ];

        for (draft, expected) in cases {
            assert_eq!(ledger.add_transaction(draft), Err(expected));
        }

        let mut no_category =
            TransactionDraft::expense(10.0, account.id, food(), date!(2024 - 06 - 01));
        no_category.category = None;
        assert_eq!(
            ledger.add_transaction(no_category),
            Err(Error::MissingCategory)
        );

        let mut no_destination =
            TransactionDraft::transfer(10.0, account.id, account.id, date!(2024 - 06 - 01));
        no_destination.to_account_id = None;
        assert_eq!(
            ledger.add_transaction(no_destination),
            Err(Error::MissingTransferDestination)
        );

        let missing = AccountId::new();
        assert_eq!(
            ledger.add_transaction(TransactionDraft::expense(
                10.0,
                missing,
                food(),
                date!(2024 - 06 - 01)
            )),
            Err(Error::AccountNotFound(missing))
        );

        // None of the rejected drafts may have left a record or moved money.
        assert_eq!(
            ledger.transactions(&TransactionFilter::default()).unwrap(),
            []
        );
        assert_eq!(ledger.account(account.id).unwrap().balance, 100.0);
    }

    #[test]
    fn invalid_drafts_are_rejected_without_side_effects_sqlite() {
        invalid_drafts_are_rejected_without_side_effects(sqlite_ledger());
    }

    #[test]
    fn invalid_drafts_are_rejected_without_side_effects_json() {
        let directory = TempDir::new().unwrap();
        invalid_drafts_are_rejected_without_side_effects(json_ledger(&directory));
    }

    fn irrelevant_fields_are_cleared(mut ledger: Ledger<impl LedgerStore>) {
        let a = open_account(&mut ledger, "A", 100.0);
        let b = open_account(&mut ledger, "B", 100.0);

        let mut transfer_with_category =
            TransactionDraft::transfer(10.0, a.id, b.id, date!(2024 - 06 - 01));
        transfer_with_category.category = Some(food());
        let stored = ledger.add_transaction(transfer_with_category).unwrap();
        assert_eq!(stored.category, None);

        let mut expense_with_destination =
            TransactionDraft::expense(10.0, a.id, food(), date!(2024 - 06 - 01));
        expense_with_destination.to_account_id = Some(b.id);
        let stored = ledger.add_transaction(expense_with_destination).unwrap();
        assert_eq!(stored.to_account_id, None);
        // The stray destination must not have received money.
        assert_eq!(ledger.account(b.id).unwrap().balance, 110.0);
    }

    #[test]
    fn irrelevant_fields_are_cleared_sqlite() {
        irrelevant_fields_are_cleared(sqlite_ledger());
    }

    #[test]
    fn irrelevant_fields_are_cleared_json() {
        let directory = TempDir::new().unwrap();
        irrelevant_fields_are_cleared(json_ledger(&directory));
    }

    fn account_edits_keep_the_balance(mut ledger: Ledger<impl LedgerStore>) {
        let account = open_account(&mut ledger, "Chequing", 100.0);

        ledger
            .add_transaction(TransactionDraft::expense(
                40.0,
                account.id,
                food(),
                date!(2024 - 06 - 01),
            ))
            .unwrap();

        let updated = ledger
            .update_account(
                account.id,
                AccountUpdate {
                    name: Some("Everyday".to_owned()),
                    kind: Some(AccountKind::Savings),
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Everyday");
        assert_eq!(updated.kind, AccountKind::Savings);
        assert_eq!(updated.balance, 60.0);
        assert_eq!(ledger.account(account.id).unwrap(), updated);

        // A partial update leaves the other field alone.
        let renamed = ledger
            .update_account(
                account.id,
                AccountUpdate {
                    name: Some("Spending".to_owned()),
                    ..AccountUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(renamed.name, "Spending");
        assert_eq!(renamed.kind, AccountKind::Savings);
        assert_eq!(renamed.balance, 60.0);

        let missing = AccountId::new();
        assert_eq!(
            ledger.update_account(missing, AccountUpdate::default()),
            Err(Error::AccountNotFound(missing))
        );
    }

    #[test]
    fn account_edits_keep_the_balance_sqlite() {
        account_edits_keep_the_balance(sqlite_ledger());
    }

    #[test]
    fn account_edits_keep_the_balance_json() {
        let directory = TempDir::new().unwrap();
        account_edits_keep_the_balance(json_ledger(&directory));
    }

    fn account_deletion_is_rejected_while_referenced(mut ledger: Ledger<impl LedgerStore>) {
        let a = open_account(&mut ledger, "A", 100.0);
        let b = open_account(&mut ledger, "B", 100.0);

        let transfer = ledger
            .add_transaction(TransactionDraft::transfer(
                10.0,
                a.id,
                b.id,
                date!(2024 - 06 - 01),
            ))
            .unwrap();

        // Both sides of the transfer are referenced.
        assert_eq!(ledger.delete_account(a.id), Err(Error::AccountInUse(a.id)));
        assert_eq!(ledger.delete_account(b.id), Err(Error::AccountInUse(b.id)));

        ledger.delete_transaction(transfer.id).unwrap();

        assert!(ledger.delete_account(b.id).is_ok());
        assert_eq!(ledger.account(b.id), Err(Error::AccountNotFound(b.id)));
    }

    #[test]
    fn account_deletion_is_rejected_while_referenced_sqlite() {
        account_deletion_is_rejected_while_referenced(sqlite_ledger());
    }

    #[test]
    fn account_deletion_is_rejected_while_referenced_json() {
        let directory = TempDir::new().unwrap();
        account_deletion_is_rejected_while_referenced(json_ledger(&directory));
    }

    fn month_query_is_inclusive_and_newest_first(mut ledger: Ledger<impl LedgerStore>) {
        let account = open_account(&mut ledger, "Checking", 0.0);
        let salary = CategoryId::from("salary");

        let mut add = |date| {
            ledger
                .add_transaction(TransactionDraft::income(
                    10.0,
                    account.id,
                    salary.clone(),
                    date,
                ))
                .unwrap()
        };

        add(date!(2024 - 05 - 31));
        let first_of_june = add(date!(2024 - 06 - 01));
        let last_of_june = add(date!(2024 - 06 - 30));
        add(date!(2024 - 07 - 01));

        let in_june = ledger
            .transactions(&TransactionFilter::for_month("2024-06".parse().unwrap()))
            .unwrap();
        let ids: Vec<_> = in_june.iter().map(|t| t.id).collect();

        assert_eq!(ids, vec![last_of_june.id, first_of_june.id]);
    }

    #[test]
    fn month_query_is_inclusive_and_newest_first_sqlite() {
        month_query_is_inclusive_and_newest_first(sqlite_ledger());
    }

    #[test]
    fn month_query_is_inclusive_and_newest_first_json() {
        let directory = TempDir::new().unwrap();
        month_query_is_inclusive_and_newest_first(json_ledger(&directory));
    }

    fn summary_excludes_transfers(mut ledger: Ledger<impl LedgerStore>) {
        let a = open_account(&mut ledger, "A", 1000.0);
        let b = open_account(&mut ledger, "B", 0.0);
        let june = "2024-06".parse().unwrap();

        ledger
            .add_transaction(TransactionDraft::income(
                900.0,
                a.id,
                CategoryId::from("salary"),
                date!(2024 - 06 - 01),
            ))
            .unwrap();
        ledger
            .add_transaction(TransactionDraft::expense(
                250.0,
                a.id,
                food(),
                date!(2024 - 06 - 05),
            ))
            .unwrap();
        ledger
            .add_transaction(TransactionDraft::transfer(
                400.0,
                a.id,
                b.id,
                date!(2024 - 06 - 10),
            ))
            .unwrap();

        let summary = ledger.monthly_summary(june).unwrap();

        assert_eq!(summary.income, 900.0);
        assert_eq!(summary.expense, 250.0);
        assert_eq!(summary.net(), 650.0);

        let empty = ledger.monthly_summary("2024-01".parse().unwrap()).unwrap();

        assert_eq!(empty.income, 0.0);
        assert_eq!(empty.expense, 0.0);
    }

    #[test]
    fn summary_excludes_transfers_sqlite() {
        summary_excludes_transfers(sqlite_ledger());
    }

    #[test]
    fn summary_excludes_transfers_json() {
        let directory = TempDir::new().unwrap();
        summary_excludes_transfers(json_ledger(&directory));
    }

    fn budget_usage_tracks_category_spending(mut ledger: Ledger<impl LedgerStore>) {
        let account = open_account(&mut ledger, "Checking", 1000.0);
        let june = "2024-06".parse().unwrap();

        ledger.upsert_budget(food(), june, 500.0).unwrap();
        ledger
            .add_transaction(TransactionDraft::expense(
                120.0,
                account.id,
                food(),
                date!(2024 - 06 - 03),
            ))
            .unwrap();
        ledger
            .add_transaction(TransactionDraft::expense(
                80.0,
                account.id,
                food(),
                date!(2024 - 06 - 20),
            ))
            .unwrap();
        // A different category and a different month must not count.
        ledger
            .add_transaction(TransactionDraft::expense(
                60.0,
                account.id,
                CategoryId::from("transport"),
                date!(2024 - 06 - 21),
            ))
            .unwrap();
        ledger
            .add_transaction(TransactionDraft::expense(
                40.0,
                account.id,
                food(),
                date!(2024 - 07 - 01),
            ))
            .unwrap();

        let usage = ledger.budget_usage(&food(), june).unwrap();

        assert_eq!(usage.spent, 200.0);
        assert_eq!(usage.target, Some(500.0));
        assert_eq!(usage.remaining(), Some(300.0));

        let unbudgeted = ledger
            .budget_usage(&CategoryId::from("transport"), june)
            .unwrap();

        assert_eq!(unbudgeted.spent, 60.0);
        assert_eq!(unbudgeted.target, None);
        assert_eq!(unbudgeted.remaining(), None);
    }

    #[test]
    fn budget_usage_tracks_category_spending_sqlite() {
        budget_usage_tracks_category_spending(sqlite_ledger());
    }

    #[test]
    fn budget_usage_tracks_category_spending_json() {
        let directory = TempDir::new().unwrap();
        budget_usage_tracks_category_spending(json_ledger(&directory));
    }

    fn budget_upsert_overwrites_existing(mut ledger: Ledger<impl LedgerStore>) {
        let june = "2024-06".parse().unwrap();

        ledger.upsert_budget(food(), june, 5000.0).unwrap();
        ledger.upsert_budget(food(), june, 6000.0).unwrap();

        let budgets = ledger.budgets(Some(june)).unwrap();

        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].amount, 6000.0);

        assert_eq!(
            ledger.upsert_budget(food(), june, 0.0),
            Err(Error::NonPositiveAmount(0.0))
        );
    }

    #[test]
    fn budget_upsert_overwrites_existing_sqlite() {
        budget_upsert_overwrites_existing(sqlite_ledger());
    }

    #[test]
    fn budget_upsert_overwrites_existing_json() {
        let directory = TempDir::new().unwrap();
        budget_upsert_overwrites_existing(json_ledger(&directory));
    }

    fn filters_combine(mut ledger: Ledger<impl LedgerStore>) {
        let a = open_account(&mut ledger, "A", 1000.0);
        let b = open_account(&mut ledger, "B", 1000.0);

        ledger
            .add_transaction(TransactionDraft::expense(
                10.0,
                a.id,
                food(),
                date!(2024 - 06 - 01),
            ))
            .unwrap();
        ledger
            .add_transaction(TransactionDraft::expense(
                20.0,
                b.id,
                food(),
                date!(2024 - 06 - 02),
            ))
            .unwrap();
        let transfer = ledger
            .add_transaction(TransactionDraft::transfer(
                30.0,
                a.id,
                b.id,
                date!(2024 - 06 - 03),
            ))
            .unwrap();

        // The account filter matches source and destination positions.
        let touching_b = ledger
            .transactions(&TransactionFilter::for_account(b.id))
            .unwrap();
        assert_eq!(touching_b.len(), 2);
        assert_eq!(touching_b[0].id, transfer.id);

        let transfers = ledger
            .transactions(&TransactionFilter {
                kind: Some(crate::models::TransactionKind::Transfer),
                ..TransactionFilter::default()
            })
            .unwrap();
        assert_eq!(transfers, vec![transfer.clone()]);

        let from_june_second = ledger
            .transactions(&TransactionFilter {
                date_from: Some(date!(2024 - 06 - 02)),
                date_to: Some(date!(2024 - 06 - 02)),
                ..TransactionFilter::default()
            })
            .unwrap();
        assert_eq!(from_june_second.len(), 1);
        assert_eq!(from_june_second[0].amount, 20.0);
    }

    #[test]
    fn filters_combine_sqlite() {
        filters_combine(sqlite_ledger());
    }

    #[test]
    fn filters_combine_json() {
        let directory = TempDir::new().unwrap();
        filters_combine(json_ledger(&directory));
    }

    fn export_import_round_trips(mut ledger: Ledger<impl LedgerStore>) {
        let a = open_account(&mut ledger, "A", 1000.0);
        let b = open_account(&mut ledger, "B", 500.0);
        let june = "2024-06".parse().unwrap();

        ledger
            .add_transaction(TransactionDraft::expense(
                200.0,
                a.id,
                food(),
                date!(2024 - 06 - 01),
            ))
            .unwrap();
        ledger
            .add_transaction(
                TransactionDraft::transfer(300.0, a.id, b.id, date!(2024 - 06 - 02))
                    .note("rent share"),
            )
            .unwrap();
        ledger.upsert_budget(food(), june, 500.0).unwrap();

        let snapshot = ledger.export().unwrap();

        let mut restored = sqlite_ledger();
        restored.import(snapshot.clone()).unwrap();

        assert_eq!(restored.accounts().unwrap(), snapshot.accounts);
        assert_eq!(
            restored.transactions(&TransactionFilter::default()).unwrap(),
            ledger.transactions(&TransactionFilter::default()).unwrap()
        );
        assert_eq!(restored.budgets(None).unwrap(), snapshot.budgets);
        assert_eq!(restored.total_balance().unwrap(), 1500.0);
    }

    #[test]
    fn export_import_round_trips_from_sqlite() {
        export_import_round_trips(sqlite_ledger());
    }

    #[test]
    fn export_import_round_trips_from_json() {
        let directory = TempDir::new().unwrap();
        export_import_round_trips(json_ledger(&directory));
    }

    #[test]
    fn snapshot_serializes_to_json_and_back() {
        let mut ledger = sqlite_ledger();
        let account = open_account(&mut ledger, "Checking", 750.0);
        ledger
            .add_transaction(TransactionDraft::income(
                50.0,
                account.id,
                CategoryId::from("salary"),
                date!(2024 - 06 - 01),
            ))
            .unwrap();

        let snapshot = ledger.export().unwrap();
        let serialized = serde_json::to_string(&snapshot).unwrap();
        let deserialized: super::LedgerSnapshot = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized, snapshot);
    }
}
