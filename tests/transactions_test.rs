mod common;

use anyhow::Result;
use common::{Household, amount, parse_date, test_service};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use spendbook::application::{AppError, ErrorKind, LedgerService};
use spendbook::domain::{AccountType, NewTransaction, TransactionPatch};
use uuid::Uuid;

async fn balance_of(service: &LedgerService, account_id: Uuid) -> Result<Decimal> {
    Ok(service.get_balance(account_id).await?)
}

#[tokio::test]
async fn test_create_applies_amount_to_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let details = home
        .record(&service, &home.checking, "100.00", "2024-01-10")
        .await?;

    assert_eq!(details.transaction.amount, dec!(100.00));
    assert_eq!(details.account.id, home.checking.id);
    assert_eq!(details.account.balance, dec!(100.00));
    assert_eq!(details.category.id, home.salary.id);
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(100.00));

    home.record(&service, &home.checking, "-20.00", "2024-01-11")
        .await?;
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(80.00));
    assert_eq!(balance_of(&service, home.wallet.id).await?, Decimal::ZERO);

    Ok(())
}

#[tokio::test]
async fn test_update_reconciles_amount_change() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    home.record(&service, &home.checking, "100", "2024-01-01")
        .await?;
    let expense = home
        .record(&service, &home.checking, "-20", "2024-01-02")
        .await?;
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(80));

    let updated = service
        .update_transaction(
            expense.transaction.id,
            TransactionPatch {
                amount: Some(dec!(-50)),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.transaction.amount, dec!(-50));
    assert_eq!(updated.transaction.revision, 1);
    assert_eq!(updated.account.balance, dec!(50));
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(50));

    Ok(())
}

#[tokio::test]
async fn test_update_scenario_from_hundred_to_seventy() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    // Balance 100 with a -20 transaction already applied.
    home.record(&service, &home.checking, "120", "2024-01-01")
        .await?;
    let expense = home
        .record(&service, &home.checking, "-20", "2024-01-02")
        .await?;
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(100));

    service
        .update_transaction(
            expense.transaction.id,
            TransactionPatch {
                amount: Some(dec!(-50)),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(70));
    Ok(())
}

#[tokio::test]
async fn test_update_moves_amount_between_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let income = home
        .record(&service, &home.checking, "30", "2024-02-01")
        .await?;
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(30));

    let moved = service
        .update_transaction(
            income.transaction.id,
            TransactionPatch {
                account_id: Some(home.wallet.id),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(moved.account.id, home.wallet.id);
    assert_eq!(balance_of(&service, home.checking.id).await?, Decimal::ZERO);
    assert_eq!(balance_of(&service, home.wallet.id).await?, dec!(30));

    Ok(())
}

#[tokio::test]
async fn test_update_moves_and_changes_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    home.record(&service, &home.checking, "200", "2024-02-01")
        .await?;
    let expense = home
        .record(&service, &home.checking, "-40", "2024-02-02")
        .await?;

    service
        .update_transaction(
            expense.transaction.id,
            TransactionPatch {
                account_id: Some(home.wallet.id),
                amount: Some(dec!(-15.25)),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(200));
    assert_eq!(balance_of(&service, home.wallet.id).await?, dec!(-15.25));
    Ok(())
}

#[tokio::test]
async fn test_update_without_balance_fields_keeps_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let tx = home
        .record(&service, &home.checking, "-12.50", "2024-03-01")
        .await?;

    let updated = service
        .update_transaction(
            tx.transaction.id,
            TransactionPatch {
                description: Some("  Farmers market  ".into()),
                date: Some(parse_date("2024-03-02")),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.transaction.description, "Farmers market");
    assert_eq!(updated.transaction.date, parse_date("2024-03-02"));
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(-12.50));
    Ok(())
}

#[tokio::test]
async fn test_delete_reverts_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    home.record(&service, &home.checking, "100", "2024-01-01")
        .await?;
    let expense = home
        .record(&service, &home.checking, "-15", "2024-01-02")
        .await?;
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(85));

    let removed = service.delete_transaction(expense.transaction.id).await?;
    assert_eq!(removed.amount, dec!(-15));
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(100));

    let err = service
        .get_transaction(expense.transaction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TransactionNotFound(_)));

    let err = service
        .delete_transaction(expense.transaction.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_zero_amount_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let err = service
        .create_transaction(home.request(&home.checking, "0", "2024-01-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("cannot be zero")));

    let tx = home
        .record(&service, &home.checking, "10", "2024-01-01")
        .await?;
    let err = service
        .update_transaction(
            tx.transaction.id,
            TransactionPatch {
                amount: Some(Decimal::ZERO),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(10));

    Ok(())
}

#[tokio::test]
async fn test_field_checks_run_in_order() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let mut request = home.request(&home.checking, "0", "2024-01-01");
    request.description = "   ".into();
    request.account_id = Uuid::nil();

    // The account ID is checked before the amount and the description.
    let err = service.create_transaction(request).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref msg) if msg == "account ID is required"));

    let mut request = home.request(&home.checking, "5", "2024-01-01");
    request.description = "   ".into();
    let err = service.create_transaction(request).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("description")));

    let err = service
        .create_transaction(home.request(&home.checking, "1.005", "2024-01-01"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    Ok(())
}

#[tokio::test]
async fn test_reference_checks() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let mut request = home.request(&home.checking, "5", "2024-01-01");
    request.user_id = Uuid::new_v4();
    let err = service.create_transaction(request).await.unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(_)));

    let mut request = home.request(&home.checking, "5", "2024-01-01");
    request.account_id = Uuid::new_v4();
    let err = service.create_transaction(request).await.unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));

    let mut request = home.request(&home.checking, "5", "2024-01-01");
    request.category_id = Uuid::new_v4();
    let err = service.create_transaction(request).await.unwrap_err();
    assert!(matches!(err, AppError::CategoryNotFound(_)));

    let tx = home
        .record(&service, &home.checking, "5", "2024-01-01")
        .await?;
    let err = service
        .update_transaction(
            tx.transaction.id,
            TransactionPatch {
                category_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CategoryNotFound(_)));

    let err = service
        .update_transaction(Uuid::new_v4(), TransactionPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TransactionNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_foreign_account_is_forbidden() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ada = Household::create(&service).await?;
    let bob = Household::create_for(&service, "bob@example.com", "Bob").await?;

    // Ada tries to book onto Bob's account.
    let request = NewTransaction {
        account_id: bob.checking.id,
        ..ada.request(&ada.checking, "10", "2024-01-01")
    };
    let err = service.create_transaction(request).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Forbidden { account_id, user_id }
            if account_id == bob.checking.id && user_id == ada.user.id
    ));
    assert_eq!(err.kind().http_status(), 400);

    // Nothing was written.
    assert_eq!(balance_of(&service, bob.checking.id).await?, Decimal::ZERO);
    let report = service.check_integrity().await?;
    assert_eq!(report.transaction_count, 0);

    // Moving an existing transaction to a foreign account is refused too.
    let tx = ada
        .record(&service, &ada.checking, "10", "2024-01-01")
        .await?;
    let err = service
        .update_transaction(
            tx.transaction.id,
            TransactionPatch {
                account_id: Some(bob.wallet.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(balance_of(&service, ada.checking.id).await?, dec!(10));
    assert_eq!(balance_of(&service, bob.wallet.id).await?, Decimal::ZERO);

    Ok(())
}

#[tokio::test]
async fn test_get_transaction_is_side_effect_free() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let tx = home
        .record(&service, &home.checking, "42.42", "2024-04-01")
        .await?;

    let first = service.get_transaction(tx.transaction.id).await?;
    let second = service.get_transaction(tx.transaction.id).await?;

    assert_eq!(first, second);
    assert_eq!(first.transaction.amount, dec!(42.42));
    assert_eq!(first.account.balance, dec!(42.42));
    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(42.42));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_creates_lose_no_update() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = service.clone();
        let request = home.request(&home.checking, "1.50", "2024-05-01");
        handles.push(tokio::spawn(async move {
            let request = NewTransaction {
                description: format!("deposit {}", i),
                ..request
            };
            service.create_transaction(request).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(balance_of(&service, home.checking.id).await?, dec!(30.00));
    assert!(service.check_integrity().await?.is_healthy());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_updates_keep_balance_consistent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let tx = home
        .record(&service, &home.checking, "-1", "2024-05-01")
        .await?;
    let id = tx.transaction.id;

    let mut handles = Vec::new();
    for i in 1..=8 {
        let service = service.clone();
        let target = if i % 2 == 0 { home.checking.id } else { home.wallet.id };
        handles.push(tokio::spawn(async move {
            service
                .update_transaction(
                    id,
                    TransactionPatch {
                        account_id: Some(target),
                        amount: Some(Decimal::from(-i)),
                        ..Default::default()
                    },
                )
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => applied += 1,
            Err(AppError::Conflict(conflicted)) => assert_eq!(conflicted, id),
            Err(other) => return Err(other.into()),
        }
    }
    assert!(applied >= 1);

    // Whatever edit won, the balances reflect exactly the stored transaction.
    let final_tx = service.get_transaction(id).await?.transaction;
    let (on, off) = if final_tx.account_id == home.checking.id {
        (home.checking.id, home.wallet.id)
    } else {
        (home.wallet.id, home.checking.id)
    };
    assert_eq!(balance_of(&service, on).await?, final_tx.amount);
    assert_eq!(balance_of(&service, off).await?, Decimal::ZERO);
    assert_eq!(final_tx.revision, applied);
    assert!(service.check_integrity().await?.is_healthy());

    Ok(())
}

#[tokio::test]
async fn test_inactive_account_still_accepts_transactions() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    service
        .update_account(home.wallet.id, None, Some(AccountType::Cash), Some(false))
        .await?;
    home.record(&service, &home.wallet, "-3.20", "2024-06-01")
        .await?;

    assert_eq!(balance_of(&service, home.wallet.id).await?, amount("-3.20"));
    Ok(())
}

#[tokio::test]
async fn test_update_flips_largest_amount_on_same_account() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::create(&service).await?;

    let largest = home
        .record(&service, &home.checking, "9999999999999.99", "2024-07-01")
        .await?;
    assert_eq!(largest.account.balance, dec!(9999999999999.99));

    // The net delta is twice the largest single amount.
    let flipped = service
        .update_transaction(
            largest.transaction.id,
            TransactionPatch {
                amount: Some(dec!(-9999999999999.99)),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(flipped.transaction.amount, dec!(-9999999999999.99));
    assert_eq!(
        balance_of(&service, home.checking.id).await?,
        dec!(-9999999999999.99)
    );
    assert!(service.check_integrity().await?.is_healthy());

    Ok(())
}
