use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    compute_balances, AccountBalances, Cents, DraftDefaults, LedgerRecord, ParseFailure,
    ParsedStatement, RecordId, StatementParser, TransactionRecord,
};
use crate::storage::{RecordQuery, Repository};

use super::AppError;

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, importers, exporters).
pub struct LedgerService {
    repo: Repository,
}

/// Result of importing a statement
pub struct StatementImport {
    pub inserted: Vec<LedgerRecord>,
    pub failures: Vec<ParseFailure>,
    pub warnings: Vec<ParseFailure>,
}

/// Balance entry for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub account: String,
    pub balance: Cents,
    /// Currency of the latest record in the account
    pub currency: String,
}

/// Filter for listing records
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Only records within this many days of now, in either direction
    pub window_days: Option<i64>,
    pub account: Option<String>,
}

/// Partial edit of a stored record; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub account: Option<String>,
    pub amount: Option<Cents>,
    pub fee: Option<Cents>,
    pub discount: Option<Cents>,
    pub currency: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub project: Option<String>,
    pub store: Option<String>,
}

impl RecordUpdate {
    fn apply(self, record: &mut LedgerRecord) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }

        set(&mut record.category, self.category);
        set(&mut record.sub_category, self.sub_category);
        set(&mut record.account, self.account);
        set(&mut record.amount, self.amount);
        set(&mut record.fee, self.fee);
        set(&mut record.discount, self.discount);
        set(&mut record.currency, self.currency);
        set(&mut record.time, self.time);
        set(&mut record.title, self.title);
        set(&mut record.project, self.project);
        set(&mut record.store, self.store);
    }
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Statement import
    // ========================

    /// Parse statement text without touching the store.
    pub fn parse_statement(&self, text: &str, defaults: DraftDefaults) -> ParsedStatement {
        StatementParser::new(defaults).parse(text.lines())
    }

    /// Parse statement text and append every emitted record as one batch.
    pub async fn import_statement(
        &self,
        text: &str,
        defaults: DraftDefaults,
    ) -> Result<StatementImport, AppError> {
        let parsed = self.parse_statement(text, defaults);

        let records: Vec<LedgerRecord> = parsed
            .records
            .into_iter()
            .map(|record| record.into_ledger_record(0, 0))
            .collect();

        let inserted = self.append_records(&records).await?;
        log::info!(
            "imported statement: {} records, {} failures, {} warnings",
            inserted.len(),
            parsed.failures.len(),
            parsed.warnings.len()
        );

        Ok(StatementImport {
            inserted,
            failures: parsed.failures,
            warnings: parsed.warnings,
        })
    }

    // ========================
    // Record operations
    // ========================

    /// Append records as one batch. Ids are assigned by the store.
    pub async fn append_records(
        &self,
        records: &[LedgerRecord],
    ) -> Result<Vec<LedgerRecord>, AppError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        for record in records {
            if record.account.trim().is_empty() {
                return Err(AppError::EmptyAccount);
            }
        }
        Ok(self.repo.append(records).await?)
    }

    /// Record a single transaction.
    pub async fn record_transaction(
        &self,
        transaction: TransactionRecord,
        fee: Cents,
        discount: Cents,
    ) -> Result<LedgerRecord, AppError> {
        let record = transaction.into_ledger_record(fee, discount);
        let mut saved = self.append_records(std::slice::from_ref(&record)).await?;
        saved.pop().ok_or_else(|| AppError::Database(anyhow::anyhow!("append returned no record")))
    }

    /// Record a balance adjustment: from `time` on, the account balance restarts at `amount`.
    pub async fn record_adjustment(
        &self,
        account: &str,
        amount: Cents,
        time: DateTime<Utc>,
    ) -> Result<LedgerRecord, AppError> {
        let record = LedgerRecord::adjustment(account, amount, time);
        let mut saved = self.append_records(std::slice::from_ref(&record)).await?;
        saved.pop().ok_or_else(|| AppError::Database(anyhow::anyhow!("append returned no record")))
    }

    /// Get a record by id.
    pub async fn get_record(&self, id: RecordId) -> Result<LedgerRecord, AppError> {
        self.repo
            .get_record(id)
            .await
            .map_err(AppError::from_storage)?
            .ok_or(AppError::RecordNotFound(id))
    }

    /// Edit a stored record.
    pub async fn update_record(
        &self,
        id: RecordId,
        update: RecordUpdate,
    ) -> Result<LedgerRecord, AppError> {
        let mut record = self.get_record(id).await?;
        update.apply(&mut record);

        if record.account.trim().is_empty() {
            return Err(AppError::EmptyAccount);
        }
        if !self.repo.update_record(&record).await? {
            return Err(AppError::RecordNotFound(id));
        }
        Ok(record)
    }

    /// Delete a stored record, returning it.
    pub async fn delete_record(&self, id: RecordId) -> Result<LedgerRecord, AppError> {
        let record = self.get_record(id).await?;
        if !self.repo.delete_record(id).await? {
            return Err(AppError::RecordNotFound(id));
        }
        Ok(record)
    }

    /// List every record in chronological order.
    pub async fn list_all_records(&self) -> Result<Vec<LedgerRecord>, AppError> {
        self.repo.load_all().await.map_err(AppError::from_storage)
    }

    /// List records in chronological order, optionally windowed around now.
    pub async fn list_records(&self, filter: RecordFilter) -> Result<Vec<LedgerRecord>, AppError> {
        let now = Utc::now();
        let (from_time, to_time) = match filter.window_days {
            Some(days) => {
                let window = Duration::try_days(days)
                    .filter(|w| *w >= Duration::zero())
                    .ok_or(AppError::InvalidWindow(days))?;
                // Out of range bounds mean the window is unbounded on that side
                (now.checked_sub_signed(window), now.checked_add_signed(window))
            }
            None => (None, None),
        };

        let query = RecordQuery {
            account: filter.account.as_deref(),
            from_time,
            to_time,
        };

        self.repo.list_records(query).await.map_err(AppError::from_storage)
    }

    /// Count stored records.
    pub async fn count_records(&self) -> Result<i64, AppError> {
        Ok(self.repo.count_records().await?)
    }

    /// Remove every record.
    pub async fn reset_all(&self) -> Result<u64, AppError> {
        let removed = self.repo.clear().await?;
        log::info!("cleared {} records", removed);
        Ok(removed)
    }

    // ========================
    // Balances
    // ========================

    /// Compute balances for all accounts from the full ledger.
    /// Runs a single chronological pass over every record on each call.
    pub async fn get_balances(&self) -> Result<AccountBalances, AppError> {
        let records = self.list_all_records().await?;
        Ok(compute_balances(&records)?)
    }

    /// Balances with the currency each account is kept in.
    pub async fn get_balance_entries(&self) -> Result<Vec<BalanceEntry>, AppError> {
        let records = self.list_all_records().await?;
        let balances = compute_balances(&records)?;

        Ok(balances
            .into_iter()
            .map(|(account, balance)| {
                let currency = records
                    .iter()
                    .rev()
                    .find(|r| r.account == account)
                    .map(|r| r.currency.clone())
                    .unwrap_or_default();
                BalanceEntry {
                    account,
                    balance,
                    currency,
                }
            })
            .collect())
    }
}
