use chrono::Utc;
use tracing::{info, warn};

use crate::domain::AccountId;

use super::{AppError, BalanceDrift, IntegrityReport, LedgerService};

impl LedgerService {
    // ========================
    // Integrity operations
    // ========================

    /// Compare every stored balance with the sum of its account's transactions.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let drifts = self.repo.balance_drifts().await?;

        for drift in &drifts {
            warn!(
                account_id = %drift.account_id,
                stored = %drift.stored,
                expected = %drift.expected,
                "Balance drift detected"
            );
        }
        if stats.ownership_violations > 0 {
            warn!(
                violations = stats.ownership_violations,
                "Transactions reference accounts of another user"
            );
        }

        Ok(IntegrityReport {
            checked_at: Utc::now(),
            user_count: stats.user_count,
            account_count: stats.account_count,
            transaction_count: stats.transaction_count,
            ownership_violations: stats.ownership_violations,
            drifts,
        })
    }

    /// Reset an account's stored balance to the sum of its transactions.
    ///
    /// Returns the balance before and after the repair; both are equal when
    /// the account was already consistent.
    pub async fn reconcile_account(&self, account_id: AccountId) -> Result<BalanceDrift, AppError> {
        let not_found = || AppError::AccountNotFound(account_id.to_string());

        let mut unit = self.repo.begin().await?;
        let stored = unit
            .lock_balance(account_id)
            .await?
            .ok_or_else(not_found)?;
        let expected = unit
            .recompute_balance(account_id)
            .await?
            .ok_or_else(not_found)?;
        unit.commit().await?;

        let drift = BalanceDrift {
            account_id,
            stored,
            expected,
        };
        if drift.stored != drift.expected {
            info!(
                account_id = %account_id,
                previous = %drift.stored,
                repaired = %drift.expected,
                "Reconciled account balance"
            );
        }
        Ok(drift)
    }
}
