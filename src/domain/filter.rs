use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, CategoryId, UserId, to_minor_units};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Conjunctive filter over one user's transactions.
///
/// Date and amount bounds are inclusive. Results are ordered newest first
/// (date descending, then creation order descending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub user_id: UserId,
    pub account_id: Option<AccountId>,
    pub category_id: Option<CategoryId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<Amount>,
    pub max_amount: Option<Amount>,
    pub limit: u32,
    pub offset: u32,
}

impl TransactionFilter {
    /// Match every transaction of `user_id`, first page.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            account_id: None,
            category_id: None,
            start_date: None,
            end_date: None,
            min_amount: None,
            max_amount: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_amounts(mut self, min: Option<Amount>, max: Option<Amount>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.is_nil() {
            return Err("user ID is required".into());
        }
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err("start date must not be after end date".into());
            }
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err("minimum amount must not exceed maximum amount".into());
            }
        }
        for bound in [self.min_amount, self.max_amount].into_iter().flatten() {
            to_minor_units(bound).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
