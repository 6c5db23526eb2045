use anyhow::{Context, Result, bail};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::domain::{AccountId, Amount, delta_to_minor_units, from_minor_units};

use super::{UnitOfWork, timestamp};

// The only writers of `accounts.balance_minor`.
impl UnitOfWork {
    /// Atomically add `delta` to an account's stored balance.
    ///
    /// Runs as one `balance = balance + delta` statement, never a read followed by
    /// a write, so concurrent adjustments of the same account cannot lose updates.
    /// Returns the new balance, or `None` when the account row does not exist.
    /// Fails without writing when the new balance would not fit an `i64`.
    pub async fn adjust_balance(
        &mut self,
        account_id: AccountId,
        delta: Amount,
    ) -> Result<Option<Amount>> {
        let delta_minor = delta_to_minor_units(delta)?;

        // SQLite turns an overflowing integer sum into REAL instead of failing.
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_minor = balance_minor + ?, updated_at = ?
            WHERE id = ? AND typeof(balance_minor + ?) = 'integer'
            RETURNING balance_minor
            "#,
        )
        .bind(delta_minor)
        .bind(timestamp(chrono::Utc::now()))
        .bind(account_id.to_string())
        .bind(delta_minor)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to adjust account balance")?;

        match row {
            Some(row) => balance_from_row(&row).map(Some),
            None if self.account_exists(account_id).await? => {
                bail!("balance would overflow when adding {}", delta)
            }
            None => Ok(None),
        }
    }

    /// Reset an account's balance to the sum of its transactions.
    /// Used only to repair drift found by an integrity check.
    pub async fn recompute_balance(&mut self, account_id: AccountId) -> Result<Option<Amount>> {
        let account_id = account_id.to_string();
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_minor = (
                SELECT COALESCE(SUM(amount_minor), 0) FROM transactions WHERE account_id = ?
            ),
            updated_at = ?
            WHERE id = ?
            RETURNING balance_minor
            "#,
        )
        .bind(&account_id)
        .bind(timestamp(chrono::Utc::now()))
        .bind(&account_id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to recompute account balance")?;

        row.as_ref().map(balance_from_row).transpose()
    }

    /// Take the write lock on an account and read its stored balance.
    ///
    /// The no-op assignment leaves the row untouched. Returns `None` when the
    /// account row does not exist.
    pub async fn lock_balance(&mut self, account_id: AccountId) -> Result<Option<Amount>> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_minor = balance_minor
            WHERE id = ?
            RETURNING balance_minor
            "#,
        )
        .bind(account_id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to lock account balance")?;

        row.as_ref().map(balance_from_row).transpose()
    }

    async fn account_exists(&mut self, account_id: AccountId) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?) AS found")
            .bind(account_id.to_string())
            .fetch_one(&mut *self.tx)
            .await
            .context("Failed to check account")?;
        Ok(row.try_get::<i64, _>("found")? != 0)
    }
}

fn balance_from_row(row: &SqliteRow) -> Result<Amount> {
    let minor: i64 = row
        .try_get("balance_minor")
        .context("Stored balance is not an integer")?;
    Ok(from_minor_units(minor))
}
