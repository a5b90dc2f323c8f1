//! The plain data records owned by the ledger: accounts, transactions, and
//! budgets, plus the identifier and month-key types they share.
//!
//! Models carry no behavior beyond construction and formatting; all mutation
//! goes through [Ledger](crate::Ledger).

mod account;
mod budget;
mod category;
mod ids;
mod month;
mod transaction;

pub use account::{Account, AccountKind, AccountUpdate, NewAccount};
pub use budget::Budget;
pub use category::{CategoryId, CategoryInfo, category_info, expense_categories, income_categories};
pub use ids::{AccountId, BudgetId, TransactionId};
pub use month::Month;
pub use transaction::{Transaction, TransactionDraft, TransactionKind};
