use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type RecordId = i64;

/// Reserved title marking a balance reset record.
pub const ADJUSTMENT_TITLE: &str = "CATEGORY_ADJUSTMENT";

pub const DEFAULT_CATEGORY: &str = "other";
pub const DEFAULT_ACCOUNT: &str = "default";
pub const DEFAULT_CURRENCY: &str = "CNY";
pub const DEFAULT_TITLE: &str = "auto-imported";

/// A classified money movement that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub category: String,
    pub sub_category: String,
    pub account: String,
    /// Signed delta against the account; outflows are negative
    #[serde(with = "super::money::decimal_amount")]
    pub amount: Cents,
    pub currency: String,
    pub time: DateTime<Utc>,
    pub title: String,
    pub project: String,
    pub store: String,
}

impl TransactionRecord {
    /// A record carrying the default labels, dated `time`.
    pub fn new(time: DateTime<Utc>) -> Self {
        DraftDefaults::default().draft(time)
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    pub fn with_amount(mut self, amount: Cents) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_category(
        mut self,
        category: impl Into<String>,
        sub_category: impl Into<String>,
    ) -> Self {
        self.category = category.into();
        self.sub_category = sub_category.into();
        self
    }

    /// Attach store-side fields, producing a record ready to be appended.
    /// The id is assigned by the repository.
    pub fn into_ledger_record(self, fee: Cents, discount: Cents) -> LedgerRecord {
        LedgerRecord {
            id: 0,
            category: self.category,
            sub_category: self.sub_category,
            account: self.account,
            amount: self.amount,
            fee,
            discount,
            currency: self.currency,
            time: self.time,
            title: self.title,
            project: self.project,
            store: self.store,
        }
    }
}

/// Field values a fresh draft starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftDefaults {
    pub category: String,
    pub sub_category: String,
    pub account: String,
    pub currency: String,
    pub title: String,
}

impl Default for DraftDefaults {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            sub_category: DEFAULT_CATEGORY.to_string(),
            account: DEFAULT_ACCOUNT.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl DraftDefaults {
    pub fn draft(&self, time: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            category: self.category.clone(),
            sub_category: self.sub_category.clone(),
            account: self.account.clone(),
            amount: 0,
            currency: self.currency.clone(),
            time,
            title: self.title.clone(),
            project: String::new(),
            store: String::new(),
        }
    }
}

/// A persisted ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    /// Assigned by the store; ignored on import
    #[serde(default)]
    pub id: RecordId,
    pub category: String,
    pub sub_category: String,
    pub account: String,
    #[serde(with = "super::money::decimal_amount")]
    pub amount: Cents,
    #[serde(default, with = "super::money::decimal_amount")]
    pub fee: Cents,
    #[serde(default, with = "super::money::decimal_amount")]
    pub discount: Cents,
    pub currency: String,
    pub time: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub store: String,
}

/// How a record takes part in balance aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntry<'a> {
    /// Overwrites the account balance with `amount`
    Adjustment { account: &'a str, amount: Cents },
    /// Adds `amount + fee + discount` to the account balance
    Transaction {
        account: &'a str,
        amount: Cents,
        fee: Cents,
        discount: Cents,
    },
}

impl LedgerRecord {
    /// Build a balance reset for `account`.
    pub fn adjustment(account: impl Into<String>, amount: Cents, time: DateTime<Utc>) -> Self {
        TransactionRecord::new(time)
            .with_account(account)
            .with_amount(amount)
            .with_title(ADJUSTMENT_TITLE)
            .into_ledger_record(0, 0)
    }

    pub fn is_adjustment(&self) -> bool {
        self.title == ADJUSTMENT_TITLE
    }

    pub fn entry(&self) -> LedgerEntry<'_> {
        if self.is_adjustment() {
            LedgerEntry::Adjustment {
                account: &self.account,
                amount: self.amount,
            }
        } else {
            LedgerEntry::Transaction {
                account: &self.account,
                amount: self.amount,
                fee: self.fee,
                discount: self.discount,
            }
        }
    }
}
