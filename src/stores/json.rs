//! The JSON-file-backed ledger store.
//!
//! Each collection lives in its own file under the store directory:
//! `accounts.json`, `transactions.json` and `budgets.json`. A missing file
//! reads as an empty collection. Writes go through a temporary file that is
//! renamed into place, so a single file is never left half-written.
//!
//! This backend has no cross-file transactions. A [LedgerChange] is applied
//! as separate whole-file rewrites, balances first and the transaction record
//! second, so a crash between the two leaves balances adjusted without the
//! matching record. Callers that need units of change to be atomic should
//! use the SQLite store.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Error,
    models::{
        Account, AccountId, AccountUpdate, Budget, BudgetId, CategoryId, Month, NewAccount,
        Transaction, TransactionId,
    },
    stores::{BalanceDelta, LedgerChange, LedgerStore, TransactionFilter},
};

const ACCOUNTS_FILE: &str = "accounts.json";
const TRANSACTIONS_FILE: &str = "transactions.json";
const BUDGETS_FILE: &str = "budgets.json";

/// Stores a ledger as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct JsonLedgerStore {
    directory: PathBuf,
}

impl JsonLedgerStore {
    /// Create a store over `directory`.
    ///
    /// The directory is created on first write, so pointing the store at a
    /// path that does not exist yet gives an empty ledger.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn load<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>, Error> {
        let path = self.directory.join(file_name);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|error| storage_failure("read", &path, &error))?;

        serde_json::from_str(&contents).map_err(|error| storage_failure("parse", &path, &error))
    }

    fn save<T: Serialize>(&self, file_name: &str, records: &[T]) -> Result<(), Error> {
        fs::create_dir_all(&self.directory)
            .map_err(|error| storage_failure("create", &self.directory, &error))?;

        let path = self.directory.join(file_name);
        let contents = serde_json::to_string_pretty(records)
            .map_err(|error| storage_failure("serialize", &path, &error))?;

        // Write to a sibling temporary file, then rename over the target.
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)
            .map_err(|error| storage_failure("create", &temp_path, &error))?;
        file.write_all(contents.as_bytes())
            .map_err(|error| storage_failure("write", &temp_path, &error))?;
        file.sync_all()
            .map_err(|error| storage_failure("sync", &temp_path, &error))?;

        fs::rename(&temp_path, &path).map_err(|error| storage_failure("rename", &path, &error))
    }

    fn apply_deltas(accounts: &mut [Account], deltas: &[BalanceDelta]) -> Result<(), Error> {
        // Resolve every delta before changing anything so a bad unit of
        // change leaves the in-memory state untouched.
        for delta in deltas {
            if !accounts.iter().any(|account| account.id == delta.account_id) {
                return Err(Error::AccountNotFound(delta.account_id));
            }
        }

        for delta in deltas {
            for account in accounts.iter_mut() {
                if account.id == delta.account_id {
                    account.balance += delta.change;
                }
            }
        }

        Ok(())
    }
}

fn storage_failure(action: &str, path: &Path, error: &dyn std::fmt::Display) -> Error {
    Error::StorageFailure(format!("could not {action} {}: {error}", path.display()))
}

impl LedgerStore for JsonLedgerStore {
    fn create_account(&mut self, new_account: NewAccount) -> Result<Account, Error> {
        let mut accounts: Vec<Account> = self.load(ACCOUNTS_FILE)?;

        let account = Account {
            id: AccountId::new(),
            name: new_account.name,
            kind: new_account.kind,
            balance: new_account.balance,
            created_at: time::OffsetDateTime::now_utc(),
        };
        accounts.push(account.clone());

        self.save(ACCOUNTS_FILE, &accounts)?;

        Ok(account)
    }

    fn get_account(&self, id: AccountId) -> Result<Account, Error> {
        self.load::<Account>(ACCOUNTS_FILE)?
            .into_iter()
            .find(|account| account.id == id)
            .ok_or(Error::AccountNotFound(id))
    }

    fn get_accounts(&self) -> Result<Vec<Account>, Error> {
        self.load(ACCOUNTS_FILE)
    }

    fn update_account(&mut self, id: AccountId, update: AccountUpdate) -> Result<Account, Error> {
        let mut accounts: Vec<Account> = self.load(ACCOUNTS_FILE)?;

        let account = accounts
            .iter_mut()
            .find(|account| account.id == id)
            .ok_or(Error::AccountNotFound(id))?;

        if let Some(name) = update.name {
            account.name = name;
        }
        if let Some(kind) = update.kind {
            account.kind = kind;
        }
        let account = account.clone();

        self.save(ACCOUNTS_FILE, &accounts)?;

        Ok(account)
    }

    fn delete_account(&mut self, id: AccountId) -> Result<(), Error> {
        let mut accounts: Vec<Account> = self.load(ACCOUNTS_FILE)?;

        let index = accounts
            .iter()
            .position(|account| account.id == id)
            .ok_or(Error::AccountNotFound(id))?;
        accounts.remove(index);

        self.save(ACCOUNTS_FILE, &accounts)
    }

    fn get_transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        self.load::<Transaction>(TRANSACTIONS_FILE)?
            .into_iter()
            .find(|transaction| transaction.id == id)
            .ok_or(Error::NotFound)
    }

    fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error> {
        let mut transactions: Vec<Transaction> = self.load(TRANSACTIONS_FILE)?;

        transactions.retain(|transaction| filter.matches(transaction));
        // The sort is stable, so ties on date keep insertion order.
        transactions.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(transactions)
    }

    fn apply_change(&mut self, change: LedgerChange) -> Result<Option<Transaction>, Error> {
        let mut accounts: Vec<Account> = self.load(ACCOUNTS_FILE)?;
        let mut transactions: Vec<Transaction> = self.load(TRANSACTIONS_FILE)?;

        match change {
            LedgerChange::Insert { draft, deltas } => {
                Self::apply_deltas(&mut accounts, &deltas)?;

                let transaction = Transaction {
                    id: TransactionId::new(),
                    kind: draft.kind,
                    amount: draft.amount,
                    account_id: draft.account_id,
                    to_account_id: draft.to_account_id,
                    category: draft.category,
                    date: draft.date,
                    note: draft.note,
                    created_at: time::OffsetDateTime::now_utc(),
                };
                transactions.push(transaction.clone());

                self.save(ACCOUNTS_FILE, &accounts)?;
                self.save(TRANSACTIONS_FILE, &transactions)?;

                Ok(Some(transaction))
            }
            LedgerChange::Remove { id, deltas } => {
                let index = transactions
                    .iter()
                    .position(|transaction| transaction.id == id)
                    .ok_or(Error::NotFound)?;

                Self::apply_deltas(&mut accounts, &deltas)?;
                transactions.remove(index);

                self.save(ACCOUNTS_FILE, &accounts)?;
                self.save(TRANSACTIONS_FILE, &transactions)?;

                Ok(None)
            }
        }
    }

    fn upsert_budget(
        &mut self,
        category: CategoryId,
        month: Month,
        amount: f64,
    ) -> Result<Budget, Error> {
        let mut budgets: Vec<Budget> = self.load(BUDGETS_FILE)?;

        let budget = match budgets
            .iter_mut()
            .find(|budget| budget.category == category && budget.month == month)
        {
            Some(existing) => {
                existing.amount = amount;
                existing.clone()
            }
            None => {
                let budget = Budget {
                    id: BudgetId::new(),
                    category,
                    month,
                    amount,
                };
                budgets.push(budget.clone());
                budget
            }
        };

        self.save(BUDGETS_FILE, &budgets)?;

        Ok(budget)
    }

    fn get_budgets(&self, month: Option<Month>) -> Result<Vec<Budget>, Error> {
        let mut budgets: Vec<Budget> = self.load(BUDGETS_FILE)?;

        if let Some(month) = month {
            budgets.retain(|budget| budget.month == month);
        }

        Ok(budgets)
    }

    fn delete_budget(&mut self, id: BudgetId) -> Result<(), Error> {
        let mut budgets: Vec<Budget> = self.load(BUDGETS_FILE)?;

        let index = budgets
            .iter()
            .position(|budget| budget.id == id)
            .ok_or(Error::NotFound)?;
        budgets.remove(index);

        self.save(BUDGETS_FILE, &budgets)
    }

    fn replace_all(
        &mut self,
        accounts: Vec<Account>,
        transactions: Vec<Transaction>,
        budgets: Vec<Budget>,
    ) -> Result<(), Error> {
        self.save(ACCOUNTS_FILE, &accounts)?;
        self.save(TRANSACTIONS_FILE, &transactions)?;
        self.save(BUDGETS_FILE, &budgets)
    }
}
