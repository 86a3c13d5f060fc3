use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::domain::{Cents, LedgerRecord, RecordId};

use super::MIGRATION_001_INITIAL;

const RECORD_COLUMNS: &str = "id, category, sub_category, account, amount_cents, fee_cents, \
    discount_cents, currency, time, title, project, store";

/// A stored money column that does not hold an integer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Record {id} has a non-numeric {field}")]
pub struct InvalidRecordField {
    pub id: RecordId,
    pub field: &'static str,
}

/// Filter for querying records
#[derive(Debug, Clone, Default)]
pub struct RecordQuery<'a> {
    pub account: Option<&'a str>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
}

/// Repository for persisting and querying ledger records.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Append a batch of records in one transaction.
    /// Ids on the input are ignored; the returned records carry the assigned ids.
    pub async fn append(&self, records: &[LedgerRecord]) -> Result<Vec<LedgerRecord>> {
        let mut tx = self.pool.begin().await.context("Failed to begin append")?;
        let mut saved = Vec::with_capacity(records.len());

        for record in records {
            let row = sqlx::query(
                r#"
                INSERT INTO records (category, sub_category, account, amount_cents, fee_cents,
                    discount_cents, currency, time, title, project, store)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(&record.category)
            .bind(&record.sub_category)
            .bind(&record.account)
            .bind(record.amount)
            .bind(record.fee)
            .bind(record.discount)
            .bind(&record.currency)
            .bind(format_time(record.time))
            .bind(&record.title)
            .bind(&record.project)
            .bind(&record.store)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to append record")?;

            saved.push(LedgerRecord {
                id: row.get("id"),
                time: record.time.trunc_subsecs(6),
                ..record.clone()
            });
        }

        tx.commit().await.context("Failed to commit append")?;
        Ok(saved)
    }

    /// Load every record in chronological order.
    pub async fn load_all(&self) -> Result<Vec<LedgerRecord>> {
        self.list_records(RecordQuery::default()).await
    }

    /// List records matching a query, in chronological order.
    pub async fn list_records(&self, filter: RecordQuery<'_>) -> Result<Vec<LedgerRecord>> {
        let mut query = format!("SELECT {} FROM records WHERE 1=1", RECORD_COLUMNS);

        let from_str = filter.from_time.map(format_time);
        let to_str = filter.to_time.map(format_time);

        if filter.account.is_some() {
            query.push_str(" AND account = ?");
        }
        if from_str.is_some() {
            query.push_str(" AND time >= ?");
        }
        if to_str.is_some() {
            query.push_str(" AND time <= ?");
        }

        query.push_str(" ORDER BY time, id");

        let mut sql_query = sqlx::query(&query);

        if let Some(account) = filter.account {
            sql_query = sql_query.bind(account);
        }
        if let Some(ref from) = from_str {
            sql_query = sql_query.bind(from);
        }
        if let Some(ref to) = to_str {
            sql_query = sql_query.bind(to);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list records")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Get a record by id.
    pub async fn get_record(&self, id: RecordId) -> Result<Option<LedgerRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM records WHERE id = ?", RECORD_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch record")?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    /// Overwrite every field of an existing record. Returns false if no such id.
    pub async fn update_record(&self, record: &LedgerRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE records
            SET category = ?, sub_category = ?, account = ?, amount_cents = ?, fee_cents = ?,
                discount_cents = ?, currency = ?, time = ?, title = ?, project = ?, store = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.category)
        .bind(&record.sub_category)
        .bind(&record.account)
        .bind(record.amount)
        .bind(record.fee)
        .bind(record.discount)
        .bind(&record.currency)
        .bind(format_time(record.time))
        .bind(&record.title)
        .bind(&record.project)
        .bind(&record.store)
        .bind(record.id)
        .execute(&self.pool)
        .await
        .context("Failed to update record")?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a record. Returns false if no such id.
    pub async fn delete_record(&self, id: RecordId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete record")?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete every record. Returns how many were removed.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM records")
            .execute(&self.pool)
            .await
            .context("Failed to clear records")?;

        Ok(result.rows_affected())
    }

    /// Count stored records.
    pub async fn count_records(&self) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM records")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count records")?
            .get("count");
        Ok(count)
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerRecord> {
        let id: RecordId = row.try_get("id").context("Invalid record ID")?;
        let time_str: String = row.try_get("time").context("Invalid record time")?;

        let cents = |column: &str, field: &'static str| -> Result<Cents> {
            row.try_get::<Cents, _>(column)
                .map_err(|_| InvalidRecordField { id, field }.into())
        };

        Ok(LedgerRecord {
            id,
            category: row.get("category"),
            sub_category: row.get("sub_category"),
            account: row.get("account"),
            amount: cents("amount_cents", "amount")?,
            fee: cents("fee_cents", "fee")?,
            discount: cents("discount_cents", "discount")?,
            currency: row.get("currency"),
            time: DateTime::parse_from_rfc3339(&time_str)
                .with_context(|| format!("Invalid timestamp on record {}", id))?
                .with_timezone(&Utc),
            title: row.get("title"),
            project: row.get("project"),
            store: row.get("store"),
        })
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}
