use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Amount, CategoryId, TransactionDetails, UserId};

/// Spending per category: total of absolute amounts and number of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category_id: CategoryId,
    pub category_name: String,
    pub total_amount: Amount,
    pub count: i64,
}

/// Net signed total of one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub user_id: UserId,
    pub year: i32,
    pub month: u32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub total: Amount,
}

/// One page of a filtered transaction query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub items: Vec<TransactionDetails>,
    /// Matches across all pages
    pub total_count: i64,
    pub limit: u32,
    pub offset: u32,
}

/// An account whose stored balance disagrees with its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub stored: Amount,
    pub expected: Amount,
}

impl BalanceDrift {
    pub fn difference(&self) -> Amount {
        self.stored - self.expected
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub user_count: i64,
    pub account_count: i64,
    pub transaction_count: i64,
    pub ownership_violations: i64,
    pub drifts: Vec<BalanceDrift>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.drifts.is_empty() && self.ownership_violations == 0
    }
}
