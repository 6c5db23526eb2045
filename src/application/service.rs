use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::Config;
use crate::domain::{
    Account, AccountId, AccountType, Amount, Category, CategoryId, CategoryType, User, UserId,
    is_valid_color, normalize_currency, normalize_email, validate_currency, validate_email,
    validate_name,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Cloning is cheap and every clone shares the same connection pool.
#[derive(Clone)]
pub struct LedgerService {
    pub(super) repo: Repository,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the configured path.
    pub async fn init(config: &Config) -> Result<Self, AppError> {
        let repo = Repository::init(config).await?;
        info!(path = %config.database_path, "Initialized ledger database");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let repo = Repository::connect(config, false).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // User operations
    // ========================

    /// Register a user. Email is stored lower-cased and must be unique.
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        currency: &str,
    ) -> Result<User, AppError> {
        validate_email(email).map_err(AppError::Validation)?;
        validate_name("user", name).map_err(AppError::Validation)?;
        validate_currency(currency).map_err(AppError::Validation)?;

        let email = normalize_email(email);
        if self.repo.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::UserAlreadyExists(email));
        }

        let user = User::new(&email, name, currency);
        if !self.repo.save_user(&user).await? {
            return Err(AppError::UserAlreadyExists(user.email));
        }
        info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, AppError> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        self.repo
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.clone()))
    }

    /// Change a user's name and/or currency. Email is immutable.
    pub async fn update_user(
        &self,
        id: UserId,
        name: Option<&str>,
        currency: Option<&str>,
    ) -> Result<User, AppError> {
        let mut user = self.get_user(id).await?;

        if let Some(name) = name {
            validate_name("user", name).map_err(AppError::Validation)?;
            user.name = name.trim().to_string();
        }
        if let Some(currency) = currency {
            validate_currency(currency).map_err(AppError::Validation)?;
            user.currency = normalize_currency(currency);
        }
        user.updated_at = Utc::now();

        self.repo.update_user(&user).await?;
        info!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    /// Delete a user that no longer owns any account.
    pub async fn delete_user(&self, id: UserId) -> Result<(), AppError> {
        let user = self.get_user(id).await?;

        let accounts = self.repo.count_accounts_for_user(id).await?;
        if accounts > 0 {
            return Err(AppError::InUse(format!(
                "user {} still owns {} account(s)",
                user.email, accounts
            )));
        }

        if !self.repo.delete_user(id).await? {
            return Err(AppError::UserNotFound(id.to_string()));
        }
        info!(user_id = %id, "Deleted user");
        Ok(())
    }

    pub(super) async fn ensure_user_exists(&self, id: UserId) -> Result<(), AppError> {
        if !self.repo.user_exists(id).await? {
            return Err(AppError::UserNotFound(id.to_string()));
        }
        Ok(())
    }

    // ========================
    // Account operations
    // ========================

    /// Open an account for a user. New accounts start at a zero balance.
    pub async fn create_account(
        &self,
        user_id: UserId,
        name: &str,
        account_type: AccountType,
    ) -> Result<Account, AppError> {
        validate_name("account", name).map_err(AppError::Validation)?;
        self.ensure_user_exists(user_id).await?;

        let account = Account::new(user_id, name, account_type);
        self.repo.save_account(&account).await?;
        info!(account_id = %account.id, user_id = %user_id, "Created account");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    /// List a user's accounts, newest first.
    pub async fn list_accounts(
        &self,
        user_id: UserId,
        active_only: bool,
    ) -> Result<Vec<Account>, AppError> {
        self.ensure_user_exists(user_id).await?;
        Ok(self.repo.list_accounts(user_id, active_only).await?)
    }

    /// Rename, retype or (de)activate an account. The balance is never touched here.
    pub async fn update_account(
        &self,
        id: AccountId,
        name: Option<&str>,
        account_type: Option<AccountType>,
        is_active: Option<bool>,
    ) -> Result<Account, AppError> {
        let mut account = self.get_account(id).await?;

        if let Some(name) = name {
            validate_name("account", name).map_err(AppError::Validation)?;
            account.name = name.trim().to_string();
        }
        if let Some(account_type) = account_type {
            account.account_type = account_type;
        }
        if let Some(is_active) = is_active {
            account.is_active = is_active;
        }
        account.updated_at = Utc::now();

        self.repo.update_account(&account).await?;
        info!(account_id = %account.id, "Updated account");
        Ok(account)
    }

    /// Delete an empty account: zero balance and no transactions.
    pub async fn delete_account(&self, id: AccountId) -> Result<(), AppError> {
        let account = self.get_account(id).await?;

        if account.balance != Decimal::ZERO {
            return Err(AppError::InUse(format!(
                "account '{}' has a non-zero balance",
                account.name
            )));
        }
        let transactions = self.repo.count_transactions_for_account(id).await?;
        if transactions > 0 {
            return Err(AppError::InUse(format!(
                "account '{}' is referenced by {} transaction(s)",
                account.name, transactions
            )));
        }

        if !self.repo.delete_account(id).await? {
            return Err(AppError::AccountNotFound(id.to_string()));
        }
        info!(account_id = %id, "Deleted account");
        Ok(())
    }

    /// The stored balance of an account.
    pub async fn get_balance(&self, id: AccountId) -> Result<Amount, AppError> {
        Ok(self.get_account(id).await?.balance)
    }

    // ========================
    // Category operations
    // ========================

    pub async fn create_category(
        &self,
        name: &str,
        category_type: CategoryType,
        color: Option<&str>,
    ) -> Result<Category, AppError> {
        validate_name("category", name).map_err(AppError::Validation)?;

        let mut category = Category::new(name, category_type);
        if let Some(color) = color {
            validate_color(color)?;
            category = category.with_color(color);
        }

        self.repo.save_category(&category).await?;
        info!(category_id = %category.id, "Created category");
        Ok(category)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category, AppError> {
        self.repo
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(id.to_string()))
    }

    /// All categories by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.list_categories(None).await?)
    }

    pub async fn list_categories_by_type(
        &self,
        category_type: CategoryType,
    ) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.list_categories(Some(category_type)).await?)
    }

    /// Rename or recolor a category. Its type is fixed at creation.
    pub async fn update_category(
        &self,
        id: CategoryId,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<Category, AppError> {
        let mut category = self.get_category(id).await?;

        if let Some(name) = name {
            validate_name("category", name).map_err(AppError::Validation)?;
            category.name = name.trim().to_string();
        }
        if let Some(color) = color {
            validate_color(color)?;
            category.color = color.to_string();
        }
        category.updated_at = Utc::now();

        self.repo.update_category(&category).await?;
        info!(category_id = %category.id, "Updated category");
        Ok(category)
    }

    /// Delete a category no transaction refers to.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), AppError> {
        let category = self.get_category(id).await?;

        let transactions = self.repo.count_transactions_for_category(id).await?;
        if transactions > 0 {
            return Err(AppError::InUse(format!(
                "category '{}' is used by {} transaction(s)",
                category.name, transactions
            )));
        }

        if !self.repo.delete_category(id).await? {
            return Err(AppError::CategoryNotFound(id.to_string()));
        }
        info!(category_id = %id, "Deleted category");
        Ok(())
    }
}

fn validate_color(color: &str) -> Result<(), AppError> {
    if !is_valid_color(color) {
        return Err(AppError::Validation(format!(
            "invalid color '{}', expected #RRGGBB",
            color
        )));
    }
    Ok(())
}
