// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;
use yuan::application::LedgerService;
use yuan::domain::{Cents, LedgerRecord, TransactionRecord};

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Record a plain transaction on `account` dated `date`
pub async fn spend(
    service: &LedgerService,
    account: &str,
    amount: Cents,
    date: &str,
) -> Result<LedgerRecord> {
    let transaction = TransactionRecord::new(parse_date(date))
        .with_account(account)
        .with_amount(amount);
    Ok(service.record_transaction(transaction, 0, 0).await?)
}

/// A short statement with two transactions and one malformed amount
pub const SAMPLE_STATEMENT: &str = "\
招商银行 信用卡交易提醒
交易时间: 3月15日
交易金额 人民币1,000.00
商户名称: 超市
交易时间: 3月16日
交易金额 人民币abc
交易时间: 3月17日
交 易 金 额 人民币 25.50
";
