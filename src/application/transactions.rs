use chrono::{Months, NaiveDate};
use tracing::{debug, error, info};

use crate::domain::{
    Account, AccountId, Amount, BalanceAdjustment, LedgerEffect, NewTransaction, Transaction,
    TransactionDetails, TransactionFilter, TransactionId, TransactionPatch, UserId,
    creation_adjustments, deletion_adjustments, net_delta, update_adjustments,
};
use crate::storage::UnitOfWork;

use super::{AppError, CategorySummary, LedgerService, MonthlyTotal, TransactionPage};

/// Attempts at a revision-conditional write before giving up with `Conflict`.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

impl LedgerService {
    // ========================
    // Transaction writes
    // ========================

    /// Record a transaction and add its amount to the account balance.
    ///
    /// Field checks run first, then user, account ownership and category are
    /// resolved in that order. Row insert and balance adjustment commit together.
    pub async fn create_transaction(
        &self,
        request: NewTransaction,
    ) -> Result<TransactionDetails, AppError> {
        request.validate().map_err(AppError::Validation)?;
        self.ensure_user_exists(request.user_id).await?;
        let mut account = self
            .owned_account(request.account_id, request.user_id)
            .await?;
        let category = self.get_category(request.category_id).await?;

        let mut transaction = Transaction::from_request(&request);
        let adjustments = creation_adjustments(LedgerEffect::from(&transaction));

        let mut unit = self.repo.begin().await?;
        unit.insert_transaction(&mut transaction).await?;
        let balances = apply_adjustments(&mut unit, transaction.id, &adjustments).await?;
        unit.commit().await?;

        if let Some((_, balance)) = balances.iter().find(|(id, _)| *id == account.id) {
            account.balance = *balance;
        }
        info!(
            transaction_id = %transaction.id,
            account_id = %account.id,
            amount = %transaction.amount,
            balance = %account.balance,
            "Recorded transaction"
        );

        Ok(TransactionDetails {
            transaction,
            account,
            category,
        })
    }

    /// Apply a partial edit and reconcile the affected balances.
    ///
    /// The old amount is reverted from the old account and the new amount applied
    /// to the new one. A concurrent edit between snapshot and write restarts the
    /// operation from a fresh snapshot.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<TransactionDetails, AppError> {
        patch.validate().map_err(AppError::Validation)?;

        let mut current = self.load_transaction(id).await?;
        if let Some(account_id) = patch.account_id {
            self.owned_account(account_id, current.user_id).await?;
        }
        if let Some(category_id) = patch.category_id {
            self.get_category(category_id).await?;
        }

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let before = LedgerEffect::from(&current);
            let expected_revision = current.revision;

            let mut updated = current.clone();
            patch.apply_to(&mut updated);
            updated.revision = expected_revision + 1;
            let after = LedgerEffect::from(&updated);
            let adjustments = update_adjustments(before, after);

            let mut unit = self.repo.begin().await?;
            if !unit.update_transaction(&updated, expected_revision).await? {
                drop(unit);
                debug!(transaction_id = %id, attempt, "Transaction changed concurrently, retrying");
                current = self.load_transaction(id).await?;
                continue;
            }
            apply_adjustments(&mut unit, id, &adjustments).await?;
            unit.commit().await?;

            info!(
                transaction_id = %id,
                old_account_id = %before.account_id,
                new_account_id = %after.account_id,
                old_account_delta = %net_delta(before.account_id, &adjustments),
                new_account_delta = %net_delta(after.account_id, &adjustments),
                "Updated transaction"
            );
            return self.get_transaction(id).await;
        }

        Err(AppError::Conflict(id))
    }

    /// Delete a transaction and take its amount back out of the account.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.load_transaction(id).await?;
            let adjustments = deletion_adjustments(LedgerEffect::from(&current));

            let mut unit = self.repo.begin().await?;
            if !unit.delete_transaction(id, current.revision).await? {
                drop(unit);
                debug!(transaction_id = %id, attempt, "Transaction changed concurrently, retrying");
                continue;
            }
            apply_adjustments(&mut unit, id, &adjustments).await?;
            unit.commit().await?;

            info!(
                transaction_id = %id,
                account_id = %current.account_id,
                amount = %current.amount,
                "Deleted transaction"
            );
            return Ok(current);
        }

        Err(AppError::Conflict(id))
    }

    // ========================
    // Transaction reads
    // ========================

    /// Get a transaction with its account and category.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<TransactionDetails, AppError> {
        self.repo
            .get_transaction_details(id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    /// One page of a user's transactions, newest first, with the total match count.
    pub async fn get_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<TransactionPage, AppError> {
        filter.validate().map_err(AppError::Validation)?;
        self.ensure_user_exists(filter.user_id).await?;

        let (items, total_count) = self.repo.query_transactions(&filter).await?;
        Ok(TransactionPage {
            items,
            total_count,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    /// Every transaction of a user, newest first.
    pub async fn list_all_transactions(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TransactionDetails>, AppError> {
        self.ensure_user_exists(user_id).await?;
        Ok(self.repo.list_transactions_for_user(user_id).await?)
    }

    /// Per-category totals of absolute amounts, largest first.
    pub async fn get_transaction_summary(
        &self,
        user_id: UserId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<CategorySummary>, AppError> {
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(AppError::Validation(
                    "start date must not be after end date".into(),
                ));
            }
        }
        self.ensure_user_exists(user_id).await?;

        Ok(self
            .repo
            .summarize_by_category(user_id, start_date, end_date)
            .await?)
    }

    /// Net signed total of a calendar month.
    pub async fn get_monthly_total(
        &self,
        user_id: UserId,
        year: i32,
        month: u32,
    ) -> Result<MonthlyTotal, AppError> {
        let (first_day, last_day) = month_bounds(year, month)?;
        self.ensure_user_exists(user_id).await?;

        let total = self.repo.sum_amount(user_id, first_day, last_day).await?;
        Ok(MonthlyTotal {
            user_id,
            year,
            month,
            first_day,
            last_day,
            total,
        })
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    /// Resolve an account and check it belongs to `user_id`.
    async fn owned_account(
        &self,
        account_id: AccountId,
        user_id: UserId,
    ) -> Result<Account, AppError> {
        let account = self.get_account(account_id).await?;
        if !account.is_owned_by(user_id) {
            return Err(AppError::Forbidden {
                account_id,
                user_id,
            });
        }
        Ok(account)
    }
}

/// Apply balance adjustments inside `unit`, returning each account's new balance.
///
/// Any failure leaves the unit uncommitted, so the paired row write is rolled back
/// when the caller drops it.
async fn apply_adjustments(
    unit: &mut UnitOfWork,
    transaction_id: TransactionId,
    adjustments: &[BalanceAdjustment],
) -> Result<Vec<(AccountId, Amount)>, AppError> {
    let mut balances = Vec::with_capacity(adjustments.len());

    for adjustment in adjustments {
        let reason = match unit
            .adjust_balance(adjustment.account_id, adjustment.delta)
            .await
        {
            Ok(Some(balance)) => {
                debug!(
                    account_id = %adjustment.account_id,
                    delta = %adjustment.delta,
                    balance = %balance,
                    "Adjusted balance"
                );
                balances.push((adjustment.account_id, balance));
                continue;
            }
            Ok(None) => "account row is missing".to_string(),
            Err(e) => format!("{:#}", e),
        };

        error!(
            transaction_id = %transaction_id,
            account_id = %adjustment.account_id,
            delta = %adjustment.delta,
            reason = %reason,
            "Balance adjustment failed, rolling back"
        );
        return Err(AppError::BalanceReconciliation {
            account_id: adjustment.account_id,
            transaction_id,
            reason,
        });
    }

    Ok(balances)
}

/// First and last day of a calendar month.
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!(
            "month must be between 1 and 12, got {}",
            month
        )));
    }
    let invalid = || AppError::Validation(format!("invalid month {}-{:02}", year, month));

    let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let last_day = first_day
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;
    Ok((first_day, last_day))
}
