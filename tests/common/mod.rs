// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use spendbook::application::LedgerService;
use spendbook::config::Config;
use spendbook::domain::{
    Account, AccountType, Category, CategoryType, NewTransaction, TransactionDetails, User,
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = Config::new(db_path(&temp_dir).to_string_lossy());
    let service = LedgerService::init(&config).await?;
    Ok((service, temp_dir))
}

pub fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("test.db")
}

/// A second connection that bypasses foreign keys, for corrupting state on purpose.
pub async fn raw_pool(temp_dir: &TempDir) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path(temp_dir))
        .foreign_keys(false);
    Ok(SqlitePool::connect_with(options).await?)
}

/// Helper to parse a date string
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Helper to parse a decimal amount
pub fn amount(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Test fixture: one user with two accounts and one category of each type
pub struct Household {
    pub user: User,
    pub checking: Account,
    pub wallet: Account,
    pub salary: Category,
    pub groceries: Category,
}

impl Household {
    pub async fn create(service: &LedgerService) -> Result<Self> {
        Self::create_for(service, "ada@example.com", "Ada").await
    }

    pub async fn create_for(service: &LedgerService, email: &str, name: &str) -> Result<Self> {
        let user = service.create_user(email, name, "EUR").await?;
        let checking = service
            .create_account(user.id, "Checking", AccountType::Bank)
            .await?;
        let wallet = service
            .create_account(user.id, "Wallet", AccountType::Cash)
            .await?;
        let salary = service
            .create_category(&format!("Salary {}", name), CategoryType::Income, None)
            .await?;
        let groceries = service
            .create_category(&format!("Groceries {}", name), CategoryType::Expense, None)
            .await?;

        Ok(Self {
            user,
            checking,
            wallet,
            salary,
            groceries,
        })
    }

    pub fn request(&self, account: &Account, amount_str: &str, date: &str) -> NewTransaction {
        let category = if amount_str.starts_with('-') {
            &self.groceries
        } else {
            &self.salary
        };
        NewTransaction {
            user_id: self.user.id,
            account_id: account.id,
            category_id: category.id,
            amount: amount(amount_str),
            description: format!("{} on {}", amount_str, date),
            date: parse_date(date),
        }
    }

    /// Record a transaction on `account`; negative amounts go to groceries.
    pub async fn record(
        &self,
        service: &LedgerService,
        account: &Account,
        amount_str: &str,
        date: &str,
    ) -> Result<TransactionDetails> {
        Ok(service
            .create_transaction(self.request(account, amount_str, date))
            .await?)
    }
}
