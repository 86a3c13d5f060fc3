use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_cents, LedgerRecord};

/// Full ledger snapshot, newest record first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub records: Vec<LedgerRecord>,
}

/// Exporter for converting ledger data to portable formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export every record as a pretty-printed JSON snapshot
    pub async fn export_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let mut records = self.service.list_all_records().await?;
        // Stored order is chronological; exports list the newest first
        records.reverse();

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            records,
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        log::info!("exported {} records", snapshot.records.len());
        Ok(snapshot)
    }

    /// Export account balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.service.get_balance_entries().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["account", "currency", "balance"])?;

        for entry in &entries {
            csv_writer.write_record([
                entry.account.as_str(),
                entry.currency.as_str(),
                format_cents(entry.balance).as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }
}
