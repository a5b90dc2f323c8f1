//! The budget model.

use serde::{Deserialize, Serialize};

use super::{BudgetId, CategoryId, Month};

/// A monthly spending target for one category.
///
/// Budgets are keyed by `(category, month)`: writing a budget for a pair that
/// already has one replaces the amount instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget record.
    pub id: BudgetId,
    /// The category the target applies to.
    pub category: CategoryId,
    /// The month the target applies to.
    pub month: Month,
    /// The target amount. Always positive.
    pub amount: f64,
}
