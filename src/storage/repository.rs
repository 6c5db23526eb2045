use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    Account, AccountId, AccountType, Category, CategoryId, CategoryType, User, UserId,
    from_minor_units,
};

use super::{MIGRATION_001_INITIAL, UnitOfWork, parse_timestamp, timestamp};

/// Repository for persisting and querying users, accounts, categories and transactions.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the SQLite database described by `config`.
    /// Foreign keys are enforced on every pooled connection.
    pub async fn connect(config: &Config, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database {}", config.database_path))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(config: &Config) -> Result<Self> {
        let repo = Self::connect(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Open a write unit: everything written through it commits or rolls back together.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin write unit")?;
        Ok(UnitOfWork::new(tx))
    }

    // ========================
    // User operations
    // ========================

    /// Save a new user to the database.
    ///
    /// Returns false when another user already holds the email.
    pub async fn save_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, currency, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.currency)
        .bind(timestamp(user.created_at))
        .bind(timestamp(user.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e).context("Failed to save user"),
        }
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, name, currency, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// Get a user by (normalised) email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, name, currency, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn user_exists(&self, id: UserId) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?) AS found")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to check user")?;
        Ok(row.get::<i64, _>("found") != 0)
    }

    /// Persist the mutable fields of a user.
    pub async fn update_user(&self, user: &User) -> Result<()> {
        sqlx::query("UPDATE users SET name = ?, currency = ?, updated_at = ? WHERE id = ?")
            .bind(&user.name)
            .bind(&user.currency)
            .bind(timestamp(user.updated_at))
            .bind(user.id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update user")?;
        Ok(())
    }

    /// Delete a user. Returns false when no row matched.
    pub async fn delete_user(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_accounts_for_user(&self, user_id: UserId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM accounts WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count accounts")?;
        Ok(row.get("count"))
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            email: row.get("email"),
            name: row.get("name"),
            currency: row.get("currency"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at")?,
        })
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account to the database.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, name, account_type, balance_minor, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.user_id.to_string())
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.is_active)
        .bind(timestamp(account.created_at))
        .bind(timestamp(account.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, account_type, balance_minor, is_active, created_at, updated_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.map(|row| Self::row_to_account(&row, "")).transpose()
    }

    /// List a user's accounts, newest first.
    pub async fn list_accounts(&self, user_id: UserId, active_only: bool) -> Result<Vec<Account>> {
        let query = if active_only {
            "SELECT id, user_id, name, account_type, balance_minor, is_active, created_at, updated_at FROM accounts WHERE user_id = ? AND is_active = 1 ORDER BY created_at DESC, name"
        } else {
            "SELECT id, user_id, name, account_type, balance_minor, is_active, created_at, updated_at FROM accounts WHERE user_id = ? ORDER BY created_at DESC, name"
        };

        let rows = sqlx::query(query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(|row| Self::row_to_account(row, "")).collect()
    }

    /// Persist name, type and active flag. The balance is never written here.
    pub async fn update_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET name = ?, account_type = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.is_active)
        .bind(timestamp(account.updated_at))
        .bind(account.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update account")?;
        Ok(())
    }

    /// Delete an account. Returns false when no row matched.
    pub async fn delete_account(&self, id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete account")?;
        Ok(result.rows_affected() > 0)
    }

    pub(super) fn row_to_account(row: &SqliteRow, prefix: &str) -> Result<Account> {
        let id_str: String = row.get(col(prefix, "id").as_str());
        let user_id_str: String = row.get(col(prefix, "user_id").as_str());
        let type_str: String = row.get(col(prefix, "account_type").as_str());
        let created_at_str: String = row.get(col(prefix, "created_at").as_str());
        let updated_at_str: String = row.get(col(prefix, "updated_at").as_str());

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid account user ID")?,
            name: row.get(col(prefix, "name").as_str()),
            account_type: AccountType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", type_str))?,
            balance: from_minor_units(
                row.try_get(col(prefix, "balance_minor").as_str())
                    .context("Stored balance is not an integer")?,
            ),
            is_active: row.get::<i64, _>(col(prefix, "is_active").as_str()) != 0,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at")?,
        })
    }

    // ========================
    // Category operations
    // ========================

    /// Save a new category to the database.
    pub async fn save_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, category_type, color, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(category.category_type.as_str())
        .bind(&category.color)
        .bind(timestamp(category.created_at))
        .bind(timestamp(category.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to save category")?;
        Ok(())
    }

    /// Get a category by ID.
    pub async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, category_type, color, created_at, updated_at FROM categories WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch category")?;

        row.map(|row| Self::row_to_category(&row, "")).transpose()
    }

    /// List categories by name, optionally only one type.
    pub async fn list_categories(
        &self,
        category_type: Option<CategoryType>,
    ) -> Result<Vec<Category>> {
        let rows = match category_type {
            Some(category_type) => {
                sqlx::query(
                    "SELECT id, name, category_type, color, created_at, updated_at FROM categories WHERE category_type = ? ORDER BY name",
                )
                .bind(category_type.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, name, category_type, color, created_at, updated_at FROM categories ORDER BY name",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list categories")?;

        rows.iter().map(|row| Self::row_to_category(row, "")).collect()
    }

    pub async fn update_category(&self, category: &Category) -> Result<()> {
        sqlx::query("UPDATE categories SET name = ?, color = ?, updated_at = ? WHERE id = ?")
            .bind(&category.name)
            .bind(&category.color)
            .bind(timestamp(category.updated_at))
            .bind(category.id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update category")?;
        Ok(())
    }

    /// Delete a category. Returns false when no row matched.
    pub async fn delete_category(&self, id: CategoryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete category")?;
        Ok(result.rows_affected() > 0)
    }

    pub(super) fn row_to_category(row: &SqliteRow, prefix: &str) -> Result<Category> {
        let id_str: String = row.get(col(prefix, "id").as_str());
        let type_str: String = row.get(col(prefix, "category_type").as_str());
        let created_at_str: String = row.get(col(prefix, "created_at").as_str());
        let updated_at_str: String = row.get(col(prefix, "updated_at").as_str());

        Ok(Category {
            id: Uuid::parse_str(&id_str).context("Invalid category ID")?,
            name: row.get(col(prefix, "name").as_str()),
            category_type: CategoryType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid category type: {}", type_str))?,
            color: row.get(col(prefix, "color").as_str()),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at")?,
        })
    }
}

/// Column name with an optional join alias prefix (`a_id`, `c_name`, ...).
pub(super) fn col(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}
