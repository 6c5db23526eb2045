use rust_decimal::Decimal;

use super::{AccountId, Amount, Transaction};

/// A signed delta to apply to one account's stored balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceAdjustment {
    pub account_id: AccountId,
    pub delta: Amount,
}

/// The part of a transaction that affects balances, captured before a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEffect {
    pub account_id: AccountId,
    pub amount: Amount,
}

impl From<&Transaction> for LedgerEffect {
    fn from(transaction: &Transaction) -> Self {
        Self {
            account_id: transaction.account_id,
            amount: transaction.amount,
        }
    }
}

/// Recording a transaction adds its amount to its account.
pub fn creation_adjustments(effect: LedgerEffect) -> Vec<BalanceAdjustment> {
    vec![BalanceAdjustment {
        account_id: effect.account_id,
        delta: effect.amount,
    }]
}

/// Removing a transaction takes its amount back out of its account.
pub fn deletion_adjustments(effect: LedgerEffect) -> Vec<BalanceAdjustment> {
    vec![BalanceAdjustment {
        account_id: effect.account_id,
        delta: -effect.amount,
    }]
}

/// Reconcile an edit: revert `before` from its account, apply `after` to its account.
///
/// When the account did not change the two steps collapse into one delta, and
/// nothing is returned when neither account nor amount changed.
pub fn update_adjustments(before: LedgerEffect, after: LedgerEffect) -> Vec<BalanceAdjustment> {
    if before.account_id == after.account_id {
        let delta = after.amount - before.amount;
        if delta == Decimal::ZERO {
            return Vec::new();
        }
        return vec![BalanceAdjustment {
            account_id: after.account_id,
            delta,
        }];
    }

    vec![
        BalanceAdjustment {
            account_id: before.account_id,
            delta: -before.amount,
        },
        BalanceAdjustment {
            account_id: after.account_id,
            delta: after.amount,
        },
    ]
}

/// Net effect of a batch of adjustments on one account.
pub fn net_delta(account_id: AccountId, adjustments: &[BalanceAdjustment]) -> Amount {
    adjustments
        .iter()
        .filter(|a| a.account_id == account_id)
        .map(|a| a.delta)
        .sum()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;

    fn effect(account_id: AccountId, amount: Amount) -> LedgerEffect {
        LedgerEffect { account_id, amount }
    }

    #[test]
    fn test_creation_adds_amount() {
        let a = Uuid::new_v4();
        let adjustments = creation_adjustments(effect(a, dec!(-20)));
        assert_eq!(net_delta(a, &adjustments), dec!(-20));
    }

    #[test]
    fn test_deletion_reverses_amount() {
        // Account at 85 after a -15 expense goes back to 100
        let a = Uuid::new_v4();
        let adjustments = deletion_adjustments(effect(a, dec!(-15)));
        assert_eq!(dec!(85) + net_delta(a, &adjustments), dec!(100));
    }

    #[test]
    fn test_update_amount_on_same_account() {
        // 100 with a -20 expense edited to -50 ends at 70
        let a = Uuid::new_v4();
        let adjustments = update_adjustments(effect(a, dec!(-20)), effect(a, dec!(-50)));
        assert_eq!(adjustments.len(), 1);
        assert_eq!(dec!(100) + net_delta(a, &adjustments), dec!(70));
    }

    #[test]
    fn test_update_without_balance_change() {
        let a = Uuid::new_v4();
        let adjustments = update_adjustments(effect(a, dec!(12.5)), effect(a, dec!(12.50)));
        assert!(adjustments.is_empty());
    }

    #[test]
    fn test_cross_account_move_preserves_total() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let adjustments = update_adjustments(effect(a, dec!(30)), effect(b, dec!(30)));

        assert_eq!(net_delta(a, &adjustments), dec!(-30));
        assert_eq!(net_delta(b, &adjustments), dec!(30));
        let total: Amount = adjustments.iter().map(|adj| adj.delta).sum();
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn test_move_and_change_amount() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let adjustments = update_adjustments(effect(a, dec!(-10)), effect(b, dec!(-25)));

        assert_eq!(net_delta(a, &adjustments), dec!(10));
        assert_eq!(net_delta(b, &adjustments), dec!(-25));
    }
}
