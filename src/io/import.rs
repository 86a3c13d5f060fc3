use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;

use crate::application::LedgerService;
use crate::domain::LedgerRecord;

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: usize,
    pub errors: Vec<ImportError>,
}

/// A record that was rejected during import
#[derive(Debug, Clone)]
pub struct ImportError {
    /// 0-based position of the record in the file
    pub index: usize,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
}

/// Accepted file layouts: an exported snapshot or a bare list of records
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Snapshot { records: Vec<Value> },
    Records(Vec<Value>),
}

/// Importer for loading exported records into the ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Import records from JSON.
    ///
    /// Every record is validated on its own; invalid ones are reported and
    /// skipped, valid ones are appended as one batch with fresh ids.
    pub async fn import_json<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let (values, newest_first) = match serde_json::from_reader::<_, ImportDocument>(reader)? {
            ImportDocument::Snapshot { records } => (records, true),
            ImportDocument::Records(records) => (records, false),
        };

        let mut records = Vec::with_capacity(values.len());
        let mut errors = Vec::new();

        for (index, value) in values.into_iter().enumerate() {
            match validate_record(value) {
                Ok(record) => records.push(record),
                Err(error) => {
                    log::warn!("import: record {} rejected: {}", index, error);
                    errors.push(ImportError { index, error });
                }
            }
        }

        // Restore chronological order; ties keep their stored order
        if newest_first {
            records.reverse();
        }
        records.sort_by_key(|r| r.time);

        if options.dry_run {
            return Ok(ImportResult {
                imported: records.len(),
                errors,
            });
        }

        let inserted = self.service.append_records(&records).await?;
        log::info!("imported {} records, rejected {}", inserted.len(), errors.len());

        Ok(ImportResult {
            imported: inserted.len(),
            errors,
        })
    }
}

fn validate_record(value: Value) -> Result<LedgerRecord, String> {
    let record: LedgerRecord = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if record.account.trim().is_empty() {
        return Err("account cannot be empty".to_string());
    }
    Ok(record)
}
