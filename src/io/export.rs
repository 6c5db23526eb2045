use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Account, TransactionDetails, User, UserId, format_amount};

/// Everything recorded for one user, as written by [`Exporter::export_user_json`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user: User,
    pub accounts: Vec<Account>,
    pub transactions: Vec<TransactionDetails>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export a user's transactions to CSV, newest first.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        user_id: UserId,
        writer: W,
    ) -> Result<usize> {
        let transactions = self.service.list_all_transactions(user_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "sequence",
            "date",
            "account",
            "category",
            "category_type",
            "amount",
            "description",
        ])?;

        let mut count = 0;
        for details in &transactions {
            let transaction = &details.transaction;
            csv_writer.write_record([
                transaction.id.to_string(),
                transaction.sequence.to_string(),
                transaction.date.format("%Y-%m-%d").to_string(),
                details.account.name.clone(),
                details.category.name.clone(),
                details.category.category_type.to_string(),
                format_amount(transaction.amount),
                transaction.description.clone(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a user's accounts with their stored balances to CSV.
    pub async fn export_accounts_csv<W: Write>(&self, user_id: UserId, writer: W) -> Result<usize> {
        let user = self.service.get_user(user_id).await?;
        let accounts = self.service.list_accounts(user_id, false).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["account", "type", "active", "balance", "currency"])?;

        for account in &accounts {
            let balance = format_amount(account.balance);
            csv_writer.write_record([
                account.name.as_str(),
                account.account_type.as_str(),
                if account.is_active { "yes" } else { "no" },
                balance.as_str(),
                user.currency.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export a user, their accounts and transactions as one JSON document.
    pub async fn export_user_json<W: Write>(
        &self,
        user_id: UserId,
        mut writer: W,
    ) -> Result<UserSnapshot> {
        let user = self.service.get_user(user_id).await?;
        let accounts = self.service.list_accounts(user_id, false).await?;
        let transactions = self.service.list_all_transactions(user_id).await?;

        let snapshot = UserSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user,
            accounts,
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
