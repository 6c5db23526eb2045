use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::application::{BalanceDrift, CategorySummary};
use crate::domain::{
    AccountId, Amount, CategoryId, Transaction, TransactionDetails, TransactionFilter,
    TransactionId, UserId, from_minor_units, to_minor_units,
};

use super::repository::col;
use super::{Repository, date, parse_date, parse_timestamp};

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub user_count: i64,
    pub account_count: i64,
    pub transaction_count: i64,
    /// Transactions whose account belongs to a different user
    pub ownership_violations: i64,
}

const TRANSACTION_COLUMNS: &str = "id, sequence, user_id, account_id, category_id, amount_minor, description, date, revision, created_at, updated_at";

const DETAILS_SELECT: &str = r#"
    SELECT
        t.id AS t_id, t.sequence AS t_sequence, t.user_id AS t_user_id,
        t.account_id AS t_account_id, t.category_id AS t_category_id,
        t.amount_minor AS t_amount_minor, t.description AS t_description, t.date AS t_date,
        t.revision AS t_revision, t.created_at AS t_created_at, t.updated_at AS t_updated_at,
        a.id AS a_id, a.user_id AS a_user_id, a.name AS a_name, a.account_type AS a_account_type,
        a.balance_minor AS a_balance_minor, a.is_active AS a_is_active,
        a.created_at AS a_created_at, a.updated_at AS a_updated_at,
        c.id AS c_id, c.name AS c_name, c.category_type AS c_category_type, c.color AS c_color,
        c.created_at AS c_created_at, c.updated_at AS c_updated_at
    FROM transactions t
    JOIN accounts a ON a.id = t.account_id
    JOIN categories c ON c.id = t.category_id
"#;

impl Repository {
    // ========================
    // Transaction lookups
    // ========================

    /// Get a bare transaction row by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.map(|row| Self::row_to_transaction(&row, "")).transpose()
    }

    /// Get a transaction with its account and category attached.
    pub async fn get_transaction_details(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionDetails>> {
        let row = sqlx::query(&format!("{} WHERE t.id = ?", DETAILS_SELECT))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch transaction details")?;

        row.as_ref().map(Self::row_to_details).transpose()
    }

    // ========================
    // Filtered queries
    // ========================

    /// One page of transactions matching `filter`, plus the count of all matches.
    /// The count applies every predicate but ignores `limit`/`offset`.
    pub async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<(Vec<TransactionDetails>, i64)> {
        let mut page = QueryBuilder::<Sqlite>::new(DETAILS_SELECT);
        push_predicates(&mut page, filter)?;
        page.push(" ORDER BY t.date DESC, t.sequence DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));

        let rows = page
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to query transactions")?;
        let items = rows
            .iter()
            .map(Self::row_to_details)
            .collect::<Result<Vec<_>>>()?;

        let total = self.count_transactions(filter).await?;
        Ok((items, total))
    }

    /// Count transactions matching every predicate of `filter`.
    pub async fn count_transactions(&self, filter: &TransactionFilter) -> Result<i64> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS count FROM transactions t");
        push_predicates(&mut count, filter)?;

        let row = count
            .build()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;
        Ok(row.get("count"))
    }

    /// Every transaction of a user in display order (no pagination).
    pub async fn list_transactions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TransactionDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE t.user_id = ? ORDER BY t.date DESC, t.sequence DESC",
            DETAILS_SELECT
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_details).collect()
    }

    pub async fn count_transactions_for_account(&self, account_id: AccountId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM transactions WHERE account_id = ?")
            .bind(account_id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions for account")?;
        Ok(row.get("count"))
    }

    pub async fn count_transactions_for_category(&self, category_id: CategoryId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM transactions WHERE category_id = ?")
            .bind(category_id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions for category")?;
        Ok(row.get("count"))
    }

    // ========================
    // Aggregates
    // ========================

    /// Totals of absolute amounts per category, largest first.
    pub async fn summarize_by_category(
        &self,
        user_id: UserId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<CategorySummary>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT t.category_id AS category_id, c.name AS category_name,
                   SUM(ABS(t.amount_minor)) AS total_minor, COUNT(*) AS count
            FROM transactions t
            JOIN categories c ON c.id = t.category_id
            WHERE t.user_id = "#,
        );
        query.push_bind(user_id.to_string());
        if let Some(start) = start_date {
            query.push(" AND t.date >= ").push_bind(date(start));
        }
        if let Some(end) = end_date {
            query.push(" AND t.date <= ").push_bind(date(end));
        }
        query.push(" GROUP BY t.category_id, c.name ORDER BY total_minor DESC, c.name ASC");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to summarize transactions by category")?;

        rows.iter()
            .map(|row| {
                let category_id: String = row.get("category_id");
                Ok(CategorySummary {
                    category_id: Uuid::parse_str(&category_id).context("Invalid category ID")?,
                    category_name: row.get("category_name"),
                    total_amount: from_minor_units(
                        row.try_get("total_minor").context("Invalid category total")?,
                    ),
                    count: row.get("count"),
                })
            })
            .collect()
    }

    /// Sum of signed amounts for a user within an inclusive date range.
    pub async fn sum_amount(
        &self,
        user_id: UserId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Amount> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_minor), 0) AS total
            FROM transactions
            WHERE user_id = ? AND date >= ? AND date <= ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(date(start_date))
        .bind(date(end_date))
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum transactions")?;

        let total: i64 = row.try_get("total").context("Invalid transaction sum")?;
        Ok(from_minor_units(total))
    }

    // ========================
    // Integrity
    // ========================

    /// Accounts whose stored balance differs from the sum of their transactions.
    pub async fn balance_drifts(&self) -> Result<Vec<BalanceDrift>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id AS account_id, a.balance_minor AS stored,
                   COALESCE(SUM(t.amount_minor), 0) AS expected
            FROM accounts a
            LEFT JOIN transactions t ON t.account_id = a.id
            GROUP BY a.id, a.balance_minor
            HAVING a.balance_minor <> COALESCE(SUM(t.amount_minor), 0)
            ORDER BY a.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compare balances")?;

        rows.iter()
            .map(|row| {
                let account_id: String = row.get("account_id");
                Ok(BalanceDrift {
                    account_id: Uuid::parse_str(&account_id).context("Invalid account ID")?,
                    stored: from_minor_units(
                        row.try_get("stored").context("Stored balance is not an integer")?,
                    ),
                    expected: from_minor_units(
                        row.try_get("expected").context("Invalid transaction sum")?,
                    ),
                })
            })
            .collect()
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS user_count,
                (SELECT COUNT(*) FROM accounts) AS account_count,
                (SELECT COUNT(*) FROM transactions) AS transaction_count,
                (SELECT COUNT(*)
                   FROM transactions t
                   JOIN accounts a ON a.id = t.account_id
                  WHERE a.user_id <> t.user_id) AS ownership_violations
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to collect integrity statistics")?;

        Ok(IntegrityStats {
            user_count: row.get("user_count"),
            account_count: row.get("account_count"),
            transaction_count: row.get("transaction_count"),
            ownership_violations: row.get("ownership_violations"),
        })
    }

    fn row_to_details(row: &SqliteRow) -> Result<TransactionDetails> {
        Ok(TransactionDetails {
            transaction: Self::row_to_transaction(row, "t_")?,
            account: Self::row_to_account(row, "a_")?,
            category: Self::row_to_category(row, "c_")?,
        })
    }

    fn row_to_transaction(row: &SqliteRow, prefix: &str) -> Result<Transaction> {
        let id_str: String = row.get(col(prefix, "id").as_str());
        let user_id_str: String = row.get(col(prefix, "user_id").as_str());
        let account_id_str: String = row.get(col(prefix, "account_id").as_str());
        let category_id_str: String = row.get(col(prefix, "category_id").as_str());
        let date_str: String = row.get(col(prefix, "date").as_str());
        let created_at_str: String = row.get(col(prefix, "created_at").as_str());
        let updated_at_str: String = row.get(col(prefix, "updated_at").as_str());

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            category_id: Uuid::parse_str(&category_id_str).context("Invalid category ID")?,
            amount: from_minor_units(row.get(col(prefix, "amount_minor").as_str())),
            description: row.get(col(prefix, "description").as_str()),
            date: parse_date(&date_str).context("Invalid transaction date")?,
            sequence: row.get(col(prefix, "sequence").as_str()),
            revision: row.get(col(prefix, "revision").as_str()),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at")?,
        })
    }
}

/// WHERE clause shared by the page query and the count query.
fn push_predicates(query: &mut QueryBuilder<'_, Sqlite>, filter: &TransactionFilter) -> Result<()> {
    query
        .push(" WHERE t.user_id = ")
        .push_bind(filter.user_id.to_string());

    if let Some(account_id) = filter.account_id {
        query
            .push(" AND t.account_id = ")
            .push_bind(account_id.to_string());
    }
    if let Some(category_id) = filter.category_id {
        query
            .push(" AND t.category_id = ")
            .push_bind(category_id.to_string());
    }
    if let Some(start) = filter.start_date {
        query.push(" AND t.date >= ").push_bind(date(start));
    }
    if let Some(end) = filter.end_date {
        query.push(" AND t.date <= ").push_bind(date(end));
    }
    if let Some(min) = filter.min_amount {
        query
            .push(" AND t.amount_minor >= ")
            .push_bind(to_minor_units(min)?);
    }
    if let Some(max) = filter.max_amount {
        query
            .push(" AND t.amount_minor <= ")
            .push_bind(to_minor_units(max)?);
    }
    Ok(())
}
