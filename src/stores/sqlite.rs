//! The SQLite-backed ledger store.
//!
//! This is the transactional backend: every [LedgerChange] is applied inside
//! a single immediate SQL transaction, so the transaction row and its balance
//! updates commit together or not at all. Balance updates are expressed as
//! `balance = balance + delta` so the stored value is re-read inside the
//! transaction rather than taken from an earlier snapshot. Units of change
//! that hit a busy database are retried a bounded number of times.
//!
//! One database can hold many owners' ledgers; every row carries an
//! `owner_id` and a store only sees its own owner's records. An ID that
//! resolves to another owner's row is reported as [Error::Unauthorized].

use std::sync::{Arc, Mutex};

use rusqlite::{
    Connection, OptionalExtension, Row, Transaction as SqlTransaction, TransactionBehavior,
    params_from_iter,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef},
};
use time::OffsetDateTime;

use crate::{
    Error,
    models::{
        Account, AccountId, AccountKind, AccountUpdate, Budget, BudgetId, CategoryId, Month,
        NewAccount, Transaction, TransactionDraft, TransactionId, TransactionKind,
    },
    stores::{BalanceDelta, LedgerChange, LedgerStore, TransactionFilter},
};

/// How many times a unit of change is retried when the database is busy.
const MAX_BUSY_RETRIES: usize = 3;

/// Stores one owner's ledger in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteLedgerStore {
    connection: Arc<Mutex<Connection>>,
    owner_id: String,
}

impl SqliteLedgerStore {
    /// Create a store over `connection`, scoped to `owner_id`.
    ///
    /// The connection must have been prepared with [initialize].
    pub fn new(connection: Arc<Mutex<Connection>>, owner_id: impl Into<String>) -> Self {
        Self {
            connection,
            owner_id: owner_id.into(),
        }
    }

    /// Look up who owns the account `id`, or `None` if there is no such row.
    fn account_owner(
        connection: &Connection,
        id: AccountId,
    ) -> Result<Option<String>, rusqlite::Error> {
        connection
            .prepare("SELECT owner_id FROM account WHERE id = :id")?
            .query_row(&[(":id", &id)], |row| row.get(0))
            .optional()
    }

    /// Apply one balance delta inside `tx`.
    ///
    /// The `balance + change` expression reads the balance as currently
    /// stored within the transaction, which is what makes concurrent units of
    /// change safe under SQLite's locking.
    fn adjust_balance(
        tx: &SqlTransaction,
        owner_id: &str,
        delta: &BalanceDelta,
    ) -> Result<(), Error> {
        match Self::account_owner(tx, delta.account_id)? {
            None => Err(Error::AccountNotFound(delta.account_id)),
            Some(owner) if owner != owner_id => Err(Error::Unauthorized),
            Some(_) => {
                tx.execute(
                    "UPDATE account SET balance = balance + ?1 WHERE id = ?2",
                    (delta.change, delta.account_id),
                )?;

                Ok(())
            }
        }
    }

    fn try_apply_change(&self, change: &LedgerChange) -> Result<Option<Transaction>, Error> {
        let connection = self.connection.lock().unwrap();
        let tx = SqlTransaction::new_unchecked(&connection, TransactionBehavior::Immediate)?;

        let result = match change {
            LedgerChange::Insert { draft, deltas } => {
                for delta in deltas {
                    Self::adjust_balance(&tx, &self.owner_id, delta)?;
                }

                Some(Self::insert_transaction(&tx, &self.owner_id, draft)?)
            }
            LedgerChange::Remove { id, deltas } => {
                let owner: Option<String> = tx
                    .prepare("SELECT owner_id FROM \"transaction\" WHERE id = :id")?
                    .query_row(&[(":id", id)], |row| row.get(0))
                    .optional()?;

                match owner {
                    None => return Err(Error::NotFound),
                    Some(owner) if owner != self.owner_id => return Err(Error::Unauthorized),
                    Some(_) => {}
                }

                for delta in deltas {
                    Self::adjust_balance(&tx, &self.owner_id, delta)?;
                }

                tx.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

                None
            }
        };

        tx.commit()?;

        Ok(result)
    }

    fn insert_transaction(
        tx: &SqlTransaction,
        owner_id: &str,
        draft: &TransactionDraft,
    ) -> Result<Transaction, Error> {
        let transaction = tx
            .prepare(
                "INSERT INTO \"transaction\"
                 (id, owner_id, kind, amount, account_id, to_account_id, category, date, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 RETURNING id, kind, amount, account_id, to_account_id, category, date, note, created_at",
            )?
            .query_row(
                (
                    TransactionId::new(),
                    owner_id,
                    draft.kind,
                    draft.amount,
                    draft.account_id,
                    draft.to_account_id,
                    &draft.category,
                    draft.date,
                    &draft.note,
                    OffsetDateTime::now_utc(),
                ),
                map_transaction_row,
            )?;

        Ok(transaction)
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn create_account(&mut self, new_account: NewAccount) -> Result<Account, Error> {
        let connection = self.connection.lock().unwrap();

        let account = connection
            .prepare(
                "INSERT INTO account (id, owner_id, name, kind, balance, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id, name, kind, balance, created_at",
            )?
            .query_row(
                (
                    AccountId::new(),
                    &self.owner_id,
                    &new_account.name,
                    new_account.kind,
                    new_account.balance,
                    OffsetDateTime::now_utc(),
                ),
                map_account_row,
            )?;

        Ok(account)
    }

    fn get_account(&self, id: AccountId) -> Result<Account, Error> {
        let connection = self.connection.lock().unwrap();

        let row = connection
            .prepare(
                "SELECT id, name, kind, balance, created_at, owner_id FROM account WHERE id = :id",
            )?
            .query_row(&[(":id", &id)], |row| {
                Ok((map_account_row(row)?, row.get::<_, String>(5)?))
            })
            .optional()?;

        match row {
            None => Err(Error::AccountNotFound(id)),
            Some((_, owner)) if owner != self.owner_id => Err(Error::Unauthorized),
            Some((account, _)) => Ok(account),
        }
    }

    fn get_accounts(&self) -> Result<Vec<Account>, Error> {
        self.connection
            .lock()
            .unwrap()
            .prepare(
                "SELECT id, name, kind, balance, created_at FROM account
                 WHERE owner_id = :owner_id ORDER BY rowid",
            )?
            .query_map(&[(":owner_id", &self.owner_id)], map_account_row)?
            .map(|maybe_account| maybe_account.map_err(Error::from))
            .collect()
    }

    fn update_account(&mut self, id: AccountId, update: AccountUpdate) -> Result<Account, Error> {
        let connection = self.connection.lock().unwrap();

        match Self::account_owner(&connection, id)? {
            None => Err(Error::AccountNotFound(id)),
            Some(owner) if owner != self.owner_id => Err(Error::Unauthorized),
            Some(_) => {
                let account = connection
                    .prepare(
                        "UPDATE account
                         SET name = COALESCE(?2, name), kind = COALESCE(?3, kind)
                         WHERE id = ?1
                         RETURNING id, name, kind, balance, created_at",
                    )?
                    .query_row((id, update.name, update.kind), map_account_row)?;

                Ok(account)
            }
        }
    }

    fn delete_account(&mut self, id: AccountId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();

        match Self::account_owner(&connection, id)? {
            None => Err(Error::AccountNotFound(id)),
            Some(owner) if owner != self.owner_id => Err(Error::Unauthorized),
            Some(_) => {
                connection.execute("DELETE FROM account WHERE id = ?1", (id,))?;

                Ok(())
            }
        }
    }

    fn get_transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        let connection = self.connection.lock().unwrap();

        let row = connection
            .prepare(
                "SELECT id, kind, amount, account_id, to_account_id, category, date, note, created_at, owner_id
                 FROM \"transaction\" WHERE id = :id",
            )?
            .query_row(&[(":id", &id)], |row| {
                Ok((map_transaction_row(row)?, row.get::<_, String>(9)?))
            })
            .optional()?;

        match row {
            None => Err(Error::NotFound),
            Some((_, owner)) if owner != self.owner_id => Err(Error::Unauthorized),
            Some((transaction, _)) => Ok(transaction),
        }
    }

    fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, Error> {
        let mut query_parts = vec![
            "SELECT id, kind, amount, account_id, to_account_id, category, date, note, created_at
             FROM \"transaction\""
                .to_string(),
        ];
        let mut where_parts = vec!["owner_id = ?1".to_string()];
        let mut query_parameters = vec![Value::Text(self.owner_id.clone())];

        if let Some(account_id) = filter.account_id {
            where_parts.push(format!(
                "(account_id = ?{n} OR to_account_id = ?{n})",
                n = query_parameters.len() + 1
            ));
            query_parameters.push(Value::Text(account_id.to_string()));
        }

        if let Some(kind) = filter.kind {
            where_parts.push(format!("kind = ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Text(kind.as_str().to_string()));
        }

        let (date_from, date_to) = filter.date_bounds();

        if let Some(from) = date_from {
            where_parts.push(format!("date >= ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Text(from.to_string()));
        }

        if let Some(to) = date_to {
            where_parts.push(format!("date <= ?{}", query_parameters.len() + 1));
            query_parameters.push(Value::Text(to.to_string()));
        }

        query_parts.push(String::from("WHERE ") + &where_parts.join(" AND "));
        // Ties on date keep insertion order so that results are stable.
        query_parts.push("ORDER BY date DESC, rowid".to_string());

        self.connection
            .lock()
            .unwrap()
            .prepare(&query_parts.join(" "))?
            .query_map(params_from_iter(query_parameters), map_transaction_row)?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }

    fn apply_change(&mut self, change: LedgerChange) -> Result<Option<Transaction>, Error> {
        let mut attempt = 0;

        loop {
            match self.try_apply_change(&change) {
                Err(ref error) if is_busy(error) && attempt < MAX_BUSY_RETRIES => {
                    attempt += 1;
                    tracing::debug!("database busy, retrying unit of change (attempt {attempt})");
                }
                other => return other,
            }
        }
    }

    fn upsert_budget(
        &mut self,
        category: CategoryId,
        month: Month,
        amount: f64,
    ) -> Result<Budget, Error> {
        let budget = self
            .connection
            .lock()
            .unwrap()
            .prepare(
                "INSERT INTO budget (id, owner_id, category, month, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (owner_id, category, month) DO UPDATE SET amount = excluded.amount
                 RETURNING id, category, month, amount",
            )?
            .query_row(
                (BudgetId::new(), &self.owner_id, &category, month, amount),
                map_budget_row,
            )?;

        Ok(budget)
    }

    fn get_budgets(&self, month: Option<Month>) -> Result<Vec<Budget>, Error> {
        let mut query = "SELECT id, category, month, amount FROM budget
             WHERE owner_id = ?1"
            .to_string();
        let mut query_parameters = vec![Value::Text(self.owner_id.clone())];

        if let Some(month) = month {
            query.push_str(" AND month = ?2");
            query_parameters.push(Value::Text(month.to_string()));
        }

        query.push_str(" ORDER BY month, category");

        self.connection
            .lock()
            .unwrap()
            .prepare(&query)?
            .query_map(params_from_iter(query_parameters), map_budget_row)?
            .map(|maybe_budget| maybe_budget.map_err(Error::from))
            .collect()
    }

    fn delete_budget(&mut self, id: BudgetId) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();

        let owner: Option<String> = connection
            .prepare("SELECT owner_id FROM budget WHERE id = :id")?
            .query_row(&[(":id", &id)], |row| row.get(0))
            .optional()?;

        match owner {
            None => Err(Error::NotFound),
            Some(owner) if owner != self.owner_id => Err(Error::Unauthorized),
            Some(_) => {
                connection.execute("DELETE FROM budget WHERE id = ?1", (id,))?;

                Ok(())
            }
        }
    }

    fn replace_all(
        &mut self,
        accounts: Vec<Account>,
        transactions: Vec<Transaction>,
        budgets: Vec<Budget>,
    ) -> Result<(), Error> {
        let connection = self.connection.lock().unwrap();
        let tx = SqlTransaction::new_unchecked(&connection, TransactionBehavior::Immediate)?;

        for table in ["\"transaction\"", "budget", "account"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE owner_id = ?1"),
                (&self.owner_id,),
            )?;
        }

        for account in &accounts {
            tx.execute(
                "INSERT INTO account (id, owner_id, name, kind, balance, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    account.id,
                    &self.owner_id,
                    &account.name,
                    account.kind,
                    account.balance,
                    account.created_at,
                ),
            )?;
        }

        for transaction in &transactions {
            tx.execute(
                "INSERT INTO \"transaction\"
                 (id, owner_id, kind, amount, account_id, to_account_id, category, date, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                (
                    transaction.id,
                    &self.owner_id,
                    transaction.kind,
                    transaction.amount,
                    transaction.account_id,
                    transaction.to_account_id,
                    &transaction.category,
                    transaction.date,
                    &transaction.note,
                    transaction.created_at,
                ),
            )?;
        }

        for budget in &budgets {
            tx.execute(
                "INSERT INTO budget (id, owner_id, category, month, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    budget.id,
                    &self.owner_id,
                    &budget.category,
                    budget.month,
                    budget.amount,
                ),
            )?;
        }

        tx.commit()?;

        Ok(())
    }
}

fn is_busy(error: &Error) -> bool {
    matches!(
        error,
        Error::SqlError(rusqlite::Error::SqliteFailure(inner, _))
            if inner.code == rusqlite::ErrorCode::DatabaseBusy
                || inner.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

/// Create the ledger tables if they do not exist.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let tx = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_account_table(&tx)?;
    create_transaction_table(&tx)?;
    create_budget_table(&tx)?;

    tx.commit()?;

    Ok(())
}

fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            balance REAL NOT NULL,
            created_at TEXT NOT NULL
            )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_owner ON account(owner_id)",
        (),
    )?;

    Ok(())
}

fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            amount REAL NOT NULL,
            account_id TEXT NOT NULL,
            to_account_id TEXT,
            category TEXT,
            date TEXT NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL
            )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_owner_date ON \"transaction\"(owner_id, date)",
        (),
    )?;

    Ok(())
}

fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            category TEXT NOT NULL,
            month TEXT NOT NULL,
            amount REAL NOT NULL,
            UNIQUE (owner_id, category, month)
            )",
        (),
    )?;

    Ok(())
}

fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        balance: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        kind: row.get(1)?,
        amount: row.get(2)?,
        account_id: row.get(3)?,
        to_account_id: row.get(4)?,
        category: row.get(5)?,
        date: row.get(6)?,
        note: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        category: row.get(1)?,
        month: row.get(2)?,
        amount: row.get(3)?,
    })
}

macro_rules! impl_id_sql {
    ($name:ident) => {
        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.to_string()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|error: uuid::Error| FromSqlError::Other(Box::new(error)))
            }
        }
    };
}

impl_id_sql!(AccountId);
impl_id_sql!(TransactionId);
impl_id_sql!(BudgetId);

impl ToSql for CategoryId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(CategoryId::from(value.as_str()?))
    }
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

impl ToSql for AccountKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccountKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}
