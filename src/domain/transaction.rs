use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, AccountId, Amount, Category, CategoryId, UserId, to_minor_units};

pub type TransactionId = Uuid;

/// A signed movement of money on one account: positive is income, negative is expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub category_id: CategoryId,
    /// Never zero
    pub amount: Amount,
    pub description: String,
    /// Effective date of the transaction
    pub date: NaiveDate,
    /// Creation order assigned by the repository, breaks ties between equal dates
    pub sequence: i64,
    /// Bumped on every update; writes are conditional on it
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a transaction from a request that already passed [`NewTransaction::validate`].
    /// Sequence number must be assigned by the repository.
    pub fn from_request(request: &NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            account_id: request.account_id,
            category_id: request.category_id,
            amount: request.amount,
            description: request.description.trim().to_string(),
            date: request.date,
            sequence: 0,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_income(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_expense(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn abs_amount(&self) -> Amount {
        self.amount.abs()
    }
}

/// A transaction together with the account and category it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub account: Account,
    pub category: Category,
}

/// Input for recording a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub account_id: AccountId,
    pub category_id: CategoryId,
    pub amount: Amount,
    pub description: String,
    pub date: NaiveDate,
}

/// Partial update of a transaction; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub account_id: Option<AccountId>,
    pub category_id: Option<CategoryId>,
    pub amount: Option<Amount>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none()
            && self.category_id.is_none()
            && self.amount.is_none()
            && self.description.is_none()
            && self.date.is_none()
    }

    /// Apply the provided fields to `transaction`. Validate first.
    pub fn apply_to(&self, transaction: &mut Transaction) {
        if let Some(account_id) = self.account_id {
            transaction.account_id = account_id;
        }
        if let Some(category_id) = self.category_id {
            transaction.category_id = category_id;
        }
        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }
        if let Some(description) = &self.description {
            transaction.description = description.trim().to_string();
        }
        if let Some(date) = self.date {
            transaction.date = date;
        }
        transaction.updated_at = Utc::now();
    }
}

// Field checks run in the listed order; the first failure wins.

type Check<T> = fn(&T) -> Result<(), String>;

const NEW_TRANSACTION_CHECKS: &[Check<NewTransaction>] = &[
    |r| require_id("user", r.user_id),
    |r| require_id("account", r.account_id),
    |r| require_id("category", r.category_id),
    |r| check_amount(r.amount),
    |r| check_description(&r.description),
];

const PATCH_CHECKS: &[Check<TransactionPatch>] = &[
    |p| p.account_id.map_or(Ok(()), |id| require_id("account", id)),
    |p| p.category_id.map_or(Ok(()), |id| require_id("category", id)),
    |p| p.amount.map_or(Ok(()), check_amount),
    |p| p.description.as_deref().map_or(Ok(()), check_description),
];

fn run_checks<T>(value: &T, checks: &[Check<T>]) -> Result<(), String> {
    checks.iter().try_for_each(|check| check(value))
}

impl NewTransaction {
    pub fn validate(&self) -> Result<(), String> {
        run_checks(self, NEW_TRANSACTION_CHECKS)
    }
}

impl TransactionPatch {
    pub fn validate(&self) -> Result<(), String> {
        run_checks(self, PATCH_CHECKS)
    }
}

fn require_id(what: &str, id: Uuid) -> Result<(), String> {
    if id.is_nil() {
        return Err(format!("{} ID is required", what));
    }
    Ok(())
}

fn check_amount(amount: Amount) -> Result<(), String> {
    if amount.is_zero() {
        return Err("transaction amount cannot be zero".into());
    }
    to_minor_units(amount).map(|_| ()).map_err(|e| e.to_string())
}

fn check_description(description: &str) -> Result<(), String> {
    if description.trim().is_empty() {
        return Err("transaction description cannot be empty".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn request(amount: Amount, description: &str) -> NewTransaction {
        NewTransaction {
            user_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            amount,
            description: description.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request(dec!(-20), "Lunch").validate().is_ok());
        assert!(request(dec!(1500.50), "Salary").validate().is_ok());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let err = request(Decimal::ZERO, "Nothing").validate().unwrap_err();
        assert!(err.contains("zero"));
    }

    #[test]
    fn test_blank_description_rejected() {
        let err = request(dec!(5), "   ").validate().unwrap_err();
        assert!(err.contains("description"));
    }

    #[test]
    fn test_first_failure_wins() {
        let mut r = request(Decimal::ZERO, "");
        r.account_id = Uuid::nil();
        assert_eq!(r.validate().unwrap_err(), "account ID is required");
    }

    #[test]
    fn test_sub_cent_amount_rejected() {
        assert!(request(dec!(0.001), "Dust").validate().is_err());
    }

    #[test]
    fn test_from_request_trims_description() {
        let t = Transaction::from_request(&request(dec!(-3.5), "  Coffee "));
        assert_eq!(t.description, "Coffee");
        assert!(t.is_expense());
        assert!(!t.is_income());
        assert_eq!(t.abs_amount(), dec!(3.5));
    }

    #[test]
    fn test_patch_validation_only_checks_present_fields() {
        assert!(TransactionPatch::default().validate().is_ok());

        let patch = TransactionPatch {
            amount: Some(Decimal::ZERO),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        let patch = TransactionPatch {
            description: Some(" ".into()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_patch_apply() {
        let mut t = Transaction::from_request(&request(dec!(-20), "Lunch"));
        let new_account = Uuid::new_v4();
        let patch = TransactionPatch {
            account_id: Some(new_account),
            amount: Some(dec!(-50)),
            description: Some(" Dinner ".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut t);

        assert_eq!(t.account_id, new_account);
        assert_eq!(t.amount, dec!(-50));
        assert_eq!(t.description, "Dinner");
    }
}
