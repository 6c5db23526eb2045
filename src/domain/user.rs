use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// An owner of accounts and transactions. All amounts of a user share `currency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    /// ISO 4217 style 3-letter code, upper-cased
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a user from raw input. Call [`validate_email`], [`validate_name`] and
    /// [`validate_currency`] first; this only normalises.
    pub fn new(email: &str, name: &str, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            name: name.trim().to_string(),
            currency: normalize_currency(currency),
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn normalize_currency(currency: &str) -> String {
    currency.trim().to_uppercase()
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("email is required".into());
    }
    if !(email.contains('@') && email.contains('.')) {
        return Err("invalid email format".into());
    }
    Ok(())
}

/// Names of users, accounts and categories share the same rule.
pub fn validate_name(what: &str, name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("{} name is required", what));
    }
    if name.chars().count() < 2 {
        return Err(format!("{} name must be at least 2 characters long", what));
    }
    Ok(())
}

pub fn validate_currency(currency: &str) -> Result<(), String> {
    let currency = currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("currency must be a 3-letter code (e.g., USD, EUR)".into());
    }
    Ok(())
}
