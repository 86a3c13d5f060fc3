mod common;

use anyhow::Result;
use common::{parse_date, spend, test_service};
use tempfile::TempDir;
use yuan::application::{AppError, LedgerService};
use yuan::domain::TransactionRecord;

#[tokio::test]
async fn test_empty_ledger_has_no_balances() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert!(service.get_balances().await?.is_empty());
    assert!(service.get_balance_entries().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_balance_includes_fee_and_discount() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let purchase = TransactionRecord::new(parse_date("2024-03-01"))
        .with_account("Card")
        .with_amount(-10000);
    service.record_transaction(purchase, -150, 2000).await?;
    spend(&service, "Card", 50000, "2024-03-02").await?;

    let balances = service.get_balances().await?;
    assert_eq!(balances.get("Card"), Some(&(-10000 - 150 + 2000 + 50000)));

    Ok(())
}

#[tokio::test]
async fn test_adjustment_overwrites_earlier_records() -> Result<()> {
    let (service, _temp) = test_service().await?;

    spend(&service, "X", 10000, "2024-01-01").await?;
    service
        .record_adjustment("X", 50000, parse_date("2024-01-02"))
        .await?;

    let balances = service.get_balances().await?;
    assert_eq!(balances.get("X"), Some(&50000));

    Ok(())
}

#[tokio::test]
async fn test_adjustment_before_records_is_added_to() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // Inserted out of order; aggregation follows record time
    spend(&service, "X", 10000, "2024-01-02").await?;
    service
        .record_adjustment("X", 50000, parse_date("2024-01-01"))
        .await?;

    let balances = service.get_balances().await?;
    assert_eq!(balances.get("X"), Some(&60000));

    Ok(())
}

#[tokio::test]
async fn test_reset_then_accumulate() -> Result<()> {
    let (service, _temp) = test_service().await?;

    spend(&service, "Cash", -999, "2024-02-01").await?;
    service
        .record_adjustment("Cash", 20000, parse_date("2024-02-10"))
        .await?;
    spend(&service, "Cash", -1500, "2024-02-11").await?;
    spend(&service, "Cash", -500, "2024-02-12").await?;
    spend(&service, "Bank", 70000, "2024-02-12").await?;

    let balances = service.get_balances().await?;
    assert_eq!(balances.get("Cash"), Some(&18000));
    assert_eq!(balances.get("Bank"), Some(&70000));

    Ok(())
}

#[tokio::test]
async fn test_balances_follow_edits_and_deletes() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let first = spend(&service, "X", -1000, "2024-01-01").await?;
    let second = spend(&service, "X", -2000, "2024-01-02").await?;

    service.delete_record(first.id).await?;
    assert_eq!(service.get_balances().await?.get("X"), Some(&-2000));

    let update = yuan::application::RecordUpdate {
        account: Some("Y".to_string()),
        ..Default::default()
    };
    service.update_record(second.id, update).await?;

    let balances = service.get_balances().await?;
    assert!(balances.get("X").is_none());
    assert_eq!(balances.get("Y"), Some(&-2000));

    Ok(())
}

#[tokio::test]
async fn test_balance_entries_report_latest_currency() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let mut transaction = TransactionRecord::new(parse_date("2024-01-01"))
        .with_account("HK")
        .with_amount(100);
    transaction.currency = "HKD".to_string();
    service.record_transaction(transaction, 0, 0).await?;

    let entries = service.get_balance_entries().await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].account, "HK");
    assert_eq!(entries[0].currency, "HKD");
    assert_eq!(entries[0].balance, 100);

    Ok(())
}

#[tokio::test]
async fn test_corrupt_amount_is_a_fatal_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_path = db_path.to_str().unwrap();

    let service = LedgerService::init(db_path).await?;
    spend(&service, "X", 100, "2024-01-01").await?;

    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", db_path)).await?;
    sqlx::query("UPDATE records SET fee_cents = 'n/a'")
        .execute(&pool)
        .await?;

    let result = service.get_balances().await;
    assert!(matches!(
        result,
        Err(AppError::DataInvariantViolation { field: "fee", .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_overflowing_balance_is_a_fatal_error() -> Result<()> {
    let (service, _temp) = test_service().await?;

    spend(&service, "X", i64::MAX, "2024-01-01").await?;
    spend(&service, "X", 1, "2024-01-02").await?;

    let result = service.get_balances().await;
    assert!(matches!(result, Err(AppError::Aggregation(_))));

    Ok(())
}
