use thiserror::Error;

use crate::domain::{AccountId, TransactionId, UserId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Account {account_id} does not belong to user {user_id}")]
    Forbidden {
        account_id: AccountId,
        user_id: UserId,
    },

    #[error("Cannot delete: {0}")]
    InUse(String),

    #[error("Transaction {0} keeps changing concurrently, giving up")]
    Conflict(TransactionId),

    #[error(
        "Balance of account {account_id} could not be adjusted for transaction {transaction_id}: {reason}"
    )]
    BalanceReconciliation {
        account_id: AccountId,
        transaction_id: TransactionId,
        reason: String,
    },

    #[error("Database error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Coarse classification of [`AppError`] used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    StoreUnavailable,
    BalanceReconciliation,
}

impl ErrorKind {
    /// Status an HTTP front end would answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Forbidden => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::StoreUnavailable | ErrorKind::BalanceReconciliation => 500,
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::UserAlreadyExists(_) | AppError::InUse(_) => {
                ErrorKind::Validation
            }
            AppError::UserNotFound(_)
            | AppError::AccountNotFound(_)
            | AppError::CategoryNotFound(_)
            | AppError::TransactionNotFound(_) => ErrorKind::NotFound,
            AppError::Forbidden { .. } => ErrorKind::Forbidden,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::BalanceReconciliation { .. } => ErrorKind::BalanceReconciliation,
            AppError::Store(_) => ErrorKind::StoreUnavailable,
        }
    }
}
