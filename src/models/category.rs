//! Category identifiers and the fixed display catalog.
//!
//! The ledger treats categories as opaque tags; the catalog here only maps a
//! tag to a display name, icon, and color for presentation. Transactions may
//! carry tags outside this catalog without the ledger caring.

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// An opaque category tag, e.g. `food` or `salary`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    /// The tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for CategoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for CategoryId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

/// Display metadata for one catalog category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInfo {
    /// The tag transactions and budgets reference.
    pub id: CategoryId,
    /// The human-readable name.
    pub name: &'static str,
    /// A Bootstrap icon name.
    pub icon: &'static str,
    /// A hex display color.
    pub color: &'static str,
}

const EXPENSE_CATALOG: &[(&str, &str, &str, &str)] = &[
    ("food", "Food & Dining", "bi-basket", "#ff6b6b"),
    ("transport", "Transportation", "bi-car-front", "#4ecdc4"),
    ("utilities", "Utilities", "bi-lightning", "#45b7d1"),
    ("shopping", "Shopping", "bi-bag", "#96ceb4"),
    ("entertainment", "Entertainment", "bi-film", "#dda0dd"),
    ("health", "Health & Medical", "bi-heart-pulse", "#ff9ff3"),
    ("education", "Education", "bi-book", "#54a0ff"),
    ("bills", "Bills & Fees", "bi-receipt", "#5f27cd"),
    ("groceries", "Groceries", "bi-cart", "#00d2d3"),
    ("rent", "Rent & Housing", "bi-house", "#ff9f43"),
    ("insurance", "Insurance", "bi-shield-check", "#1dd1a1"),
    ("personal", "Personal Care", "bi-person", "#f368e0"),
    ("gifts", "Gifts & Donations", "bi-gift", "#ee5a24"),
    ("travel", "Travel", "bi-airplane", "#0abde3"),
    ("other_expense", "Other Expense", "bi-three-dots", "#8395a7"),
];

const INCOME_CATALOG: &[(&str, &str, &str, &str)] = &[
    ("salary", "Salary", "bi-briefcase", "#2ecc71"),
    ("freelance", "Freelance", "bi-laptop", "#3498db"),
    ("business", "Business", "bi-building", "#9b59b6"),
    ("investment", "Investment", "bi-graph-up", "#1abc9c"),
    ("interest", "Interest", "bi-percent", "#e74c3c"),
    ("rental", "Rental Income", "bi-house-door", "#f39c12"),
    ("bonus", "Bonus", "bi-star", "#e67e22"),
    ("refund", "Refund", "bi-arrow-return-left", "#16a085"),
    ("other_income", "Other Income", "bi-three-dots", "#7f8c8d"),
];

fn build(catalog: &[(&'static str, &'static str, &'static str, &'static str)]) -> Vec<CategoryInfo> {
    catalog
        .iter()
        .map(|&(id, name, icon, color)| CategoryInfo {
            id: CategoryId::from(id),
            name,
            icon,
            color,
        })
        .collect()
}

/// The fixed catalog of expense categories.
pub fn expense_categories() -> Vec<CategoryInfo> {
    build(EXPENSE_CATALOG)
}

/// The fixed catalog of income categories.
pub fn income_categories() -> Vec<CategoryInfo> {
    build(INCOME_CATALOG)
}

/// Look up display metadata for a category tag across both catalogs.
pub fn category_info(id: &CategoryId) -> Option<CategoryInfo> {
    EXPENSE_CATALOG
        .iter()
        .chain(INCOME_CATALOG)
        .find(|(tag, _, _, _)| *tag == id.as_str())
        .map(|&(tag, name, icon, color)| CategoryInfo {
            id: CategoryId::from(tag),
            name,
            icon,
            color,
        })
}

#[cfg(test)]
mod tests {
    use super::{CategoryId, category_info};

    #[test]
    fn known_tags_resolve() {
        let info = category_info(&CategoryId::from("food")).unwrap();

        assert_eq!(info.name, "Food & Dining");
    }

    #[test]
    fn income_tags_resolve_too() {
        let info = category_info(&CategoryId::from("salary")).unwrap();

        assert_eq!(info.name, "Salary");
    }

    #[test]
    fn unknown_tags_return_none() {
        assert_eq!(category_info(&CategoryId::from("sock_drawer")), None);
    }
}
