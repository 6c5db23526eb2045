use anyhow::{Context, Result};
use sqlx::{Row, Sqlite};

use crate::domain::{Transaction, TransactionId, to_minor_units};

use super::{date, timestamp};

/// A storage transaction pairing a ledger row write with its balance adjustments.
///
/// Every unit starts with a write so SQLite takes the write lock up front and
/// concurrent writers queue on the busy timeout. Dropping the unit without
/// calling [`UnitOfWork::commit`] rolls everything back.
pub struct UnitOfWork {
    pub(super) tx: sqlx::Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(super) fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    /// Insert a new transaction row, assigning the next sequence number.
    pub async fn insert_transaction(&mut self, transaction: &mut Transaction) -> Result<()> {
        transaction.sequence = self.next_sequence().await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, user_id, account_id, category_id, amount_minor, description, date, revision, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.sequence)
        .bind(transaction.user_id.to_string())
        .bind(transaction.account_id.to_string())
        .bind(transaction.category_id.to_string())
        .bind(to_minor_units(transaction.amount)?)
        .bind(&transaction.description)
        .bind(date(transaction.date))
        .bind(transaction.revision)
        .bind(timestamp(transaction.created_at))
        .bind(timestamp(transaction.updated_at))
        .execute(&mut *self.tx)
        .await
        .context("Failed to save transaction")?;

        Ok(())
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(&mut self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// Overwrite a transaction row if it is still at `expected_revision`.
    ///
    /// The stored revision becomes `transaction.revision`. Returns false when the
    /// row is gone or was changed since the snapshot was taken.
    pub async fn update_transaction(
        &mut self,
        transaction: &Transaction,
        expected_revision: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET account_id = ?, category_id = ?, amount_minor = ?, description = ?, date = ?, revision = ?, updated_at = ?
            WHERE id = ? AND revision = ?
            "#,
        )
        .bind(transaction.account_id.to_string())
        .bind(transaction.category_id.to_string())
        .bind(to_minor_units(transaction.amount)?)
        .bind(&transaction.description)
        .bind(date(transaction.date))
        .bind(transaction.revision)
        .bind(timestamp(transaction.updated_at))
        .bind(transaction.id.to_string())
        .bind(expected_revision)
        .execute(&mut *self.tx)
        .await
        .context("Failed to update transaction")?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a transaction row if it is still at `expected_revision`.
    pub async fn delete_transaction(
        &mut self,
        id: TransactionId,
        expected_revision: i64,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ? AND revision = ?")
            .bind(id.to_string())
            .bind(expected_revision)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete transaction")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit write unit")
    }
}
