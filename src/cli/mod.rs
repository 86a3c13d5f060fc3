use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc, Weekday};
use clap::{Parser, Subcommand};

use crate::application::{LedgerService, RecordFilter, RecordUpdate};
use crate::domain::{
    format_cents, format_cents_grouped, parse_cents, Cents, DraftDefaults, LedgerRecord,
    ParseFailure, RecordId, TransactionRecord, DEFAULT_ACCOUNT, DEFAULT_CATEGORY,
    DEFAULT_CURRENCY,
};
use crate::io::{Exporter, ImportOptions, Importer};

/// Yuan - bookkeeping ledger with bank statement import
#[derive(Parser)]
#[command(name = "yuan")]
#[command(about = "A local-first bookkeeping ledger that imports bank statement text")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "YUAN_DATABASE", default_value = "yuan.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Import transactions from exported statement text
    ImportStatement {
        /// Statement file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Account the transactions are booked on
        #[arg(long, default_value = DEFAULT_ACCOUNT)]
        account: String,

        /// Currency code of the statement
        #[arg(long, default_value = DEFAULT_CURRENCY)]
        currency: String,

        /// Show what would be imported without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Record a transaction (negative amounts are spending)
    Add {
        /// Signed amount (e.g., "-35.50" or "1200")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        #[command(flatten)]
        fields: RecordArgs,
    },

    /// Reset an account balance to the given amount from a date on
    Adjust {
        /// Account name
        account: String,

        /// New balance (e.g., "5000.00")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Date of the adjustment (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Edit fields of an existing record
    Edit {
        /// Record ID
        id: RecordId,

        /// New signed amount
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<String>,

        #[command(flatten)]
        fields: EditArgs,
    },

    /// Delete a record
    Delete {
        /// Record ID
        id: RecordId,
    },

    /// Show detailed record information
    Show {
        /// Record ID
        id: RecordId,
    },

    /// Show the balance of every account
    Balance,

    /// List records grouped by day
    Records {
        /// Only records within this many days of today
        #[arg(long, default_value = "60")]
        days: i64,

        /// List every record regardless of date
        #[arg(long)]
        all: bool,

        /// Filter by account
        #[arg(long)]
        account: Option<String>,
    },

    /// Export the ledger (json) or account balances (csv)
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: json, csv
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Import records from a JSON export
    Import {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Validate and report without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete every record
    Reset {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Optional fields of a new record
#[derive(clap::Args)]
pub struct RecordArgs {
    /// Account name
    #[arg(short, long, default_value = DEFAULT_ACCOUNT)]
    pub account: String,

    /// Category
    #[arg(short, long, default_value = DEFAULT_CATEGORY)]
    pub category: String,

    /// Sub-category
    #[arg(long, default_value = DEFAULT_CATEGORY)]
    pub sub_category: String,

    /// Title of the record
    #[arg(short, long)]
    pub title: Option<String>,

    /// Currency code
    #[arg(long, default_value = DEFAULT_CURRENCY)]
    pub currency: String,

    /// Project tag
    #[arg(long, default_value = "")]
    pub project: String,

    /// Store tag
    #[arg(long, default_value = "")]
    pub store: String,

    /// Fee charged on top of the amount
    #[arg(long, allow_hyphen_values = true)]
    pub fee: Option<String>,

    /// Discount applied to the amount
    #[arg(long, allow_hyphen_values = true)]
    pub discount: Option<String>,

    /// Date of the record (YYYY-MM-DD, defaults to now)
    #[arg(long)]
    pub date: Option<String>,
}

/// Fields that can be changed on an existing record
#[derive(clap::Args)]
pub struct EditArgs {
    #[arg(long)]
    pub account: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub sub_category: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub currency: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub store: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub fee: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub discount: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::ImportStatement {
                input,
                account,
                currency,
                dry_run,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let text = read_input(input.as_deref())?;
                let defaults = DraftDefaults {
                    account,
                    currency,
                    ..DraftDefaults::default()
                };
                run_import_statement_command(&service, &text, defaults, dry_run).await?;
            }

            Commands::Add { amount, fields } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount = parse_amount(&amount)?;
                let fee = fields.fee.as_deref().map(parse_amount).transpose()?.unwrap_or(0);
                let discount = fields
                    .discount
                    .as_deref()
                    .map(parse_amount)
                    .transpose()?
                    .unwrap_or(0);
                let time = parse_optional_date(fields.date.as_deref())?.unwrap_or_else(Utc::now);

                let mut transaction = TransactionRecord::new(time)
                    .with_account(fields.account)
                    .with_amount(amount)
                    .with_category(fields.category, fields.sub_category);
                if let Some(title) = fields.title {
                    transaction = transaction.with_title(title);
                }
                transaction.currency = fields.currency;
                transaction.project = fields.project;
                transaction.store = fields.store;

                let record = service.record_transaction(transaction, fee, discount).await?;
                println!(
                    "Recorded: {} {} on {} ({})",
                    format_cents(record.amount),
                    record.currency,
                    record.account,
                    record.id
                );
            }

            Commands::Adjust {
                account,
                amount,
                date,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount = parse_amount(&amount)?;
                let time = parse_optional_date(date.as_deref())?.unwrap_or_else(Utc::now);

                let record = service.record_adjustment(&account, amount, time).await?;
                println!(
                    "Adjusted {} to {} as of {} ({})",
                    record.account,
                    format_cents(record.amount),
                    record.time.with_timezone(&Local).format("%Y-%m-%d"),
                    record.id
                );
            }

            Commands::Edit { id, amount, fields } => {
                let service = LedgerService::connect(&self.database).await?;
                let update = RecordUpdate {
                    category: fields.category,
                    sub_category: fields.sub_category,
                    account: fields.account,
                    amount: amount.as_deref().map(parse_amount).transpose()?,
                    fee: fields.fee.as_deref().map(parse_amount).transpose()?,
                    discount: fields.discount.as_deref().map(parse_amount).transpose()?,
                    currency: fields.currency,
                    time: parse_optional_date(fields.date.as_deref())?,
                    title: fields.title,
                    project: fields.project,
                    store: fields.store,
                };

                let record = service.update_record(id, update).await?;
                println!("Updated record {}", record.id);
                print_record_details(&record);
            }

            Commands::Delete { id } => {
                let service = LedgerService::connect(&self.database).await?;
                let record = service.delete_record(id).await?;
                println!(
                    "Deleted record {}: {} {} on {}",
                    record.id,
                    format_cents(record.amount),
                    record.currency,
                    record.account
                );
            }

            Commands::Show { id } => {
                let service = LedgerService::connect(&self.database).await?;
                let record = service.get_record(id).await?;
                print_record_details(&record);
            }

            Commands::Balance => {
                let service = LedgerService::connect(&self.database).await?;
                run_balance_command(&service).await?;
            }

            Commands::Records { days, all, account } => {
                let service = LedgerService::connect(&self.database).await?;
                let filter = RecordFilter {
                    window_days: if all { None } else { Some(days) },
                    account,
                };
                run_records_command(&service, filter).await?;
            }

            Commands::Export { output, format } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(&service, output.as_deref(), &format).await?;
            }

            Commands::Import { input, dry_run } => {
                let service = LedgerService::connect(&self.database).await?;
                run_import_command(&service, input.as_deref(), dry_run).await?;
            }

            Commands::Reset { yes } => {
                if !yes {
                    anyhow::bail!("Refusing to delete every record without --yes");
                }
                let service = LedgerService::connect(&self.database).await?;
                let removed = service.reset_all().await?;
                println!("Deleted {} records", removed);
            }
        }

        Ok(())
    }
}

async fn run_import_statement_command(
    service: &LedgerService,
    text: &str,
    defaults: DraftDefaults,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        let parsed = service.parse_statement(text, defaults);
        print_parse_problems(&parsed.failures, &parsed.warnings);

        println!("{:<12} {:>12} {:<8} ACCOUNT", "DATE", "AMOUNT", "CURRENCY");
        println!("{}", "-".repeat(50));
        for record in &parsed.records {
            println!(
                "{:<12} {:>12} {:<8} {}",
                record.time.with_timezone(&Local).format("%Y-%m-%d"),
                format_cents(record.amount),
                record.currency,
                record.account
            );
        }
        println!();
        println!(
            "Dry run: {} records parsed, {} failed",
            parsed.records.len(),
            parsed.failures.len()
        );
        return Ok(());
    }

    let result = service.import_statement(text, defaults).await?;
    print_parse_problems(&result.failures, &result.warnings);

    if result.inserted.is_empty() && result.failures.is_empty() {
        println!("No transactions found in statement.");
    } else {
        println!(
            "Imported {} records, {} failed",
            result.inserted.len(),
            result.failures.len()
        );
    }
    Ok(())
}

fn print_parse_problems(failures: &[ParseFailure], warnings: &[ParseFailure]) {
    for failure in failures {
        eprintln!("Error: {}", failure);
    }
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }
}

async fn run_balance_command(service: &LedgerService) -> Result<()> {
    let entries = service.get_balance_entries().await?;
    if entries.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }

    println!("{:<20} {:>16} {:<8}", "ACCOUNT", "BALANCE", "CURRENCY");
    println!("{}", "-".repeat(46));
    for entry in entries {
        println!(
            "{:<20} {:>16} {:<8}",
            truncate(&entry.account, 20),
            format_cents_grouped(entry.balance),
            entry.currency
        );
    }
    Ok(())
}

async fn run_records_command(service: &LedgerService, filter: RecordFilter) -> Result<()> {
    let records = service.list_records(filter).await?;
    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    for (date, day_records) in group_by_day(&records, &Local) {
        println!(
            "{} 星期{}",
            date.format("%Y-%m-%d"),
            chinese_weekday(date.weekday())
        );
        for record in day_records {
            println!(
                "  {:>6}  {:>14} {:<4} {:<16} {:<12} {}",
                record.id,
                format_cents_grouped(
                    record.amount.saturating_add(record.fee).saturating_add(record.discount)
                ),
                record.currency,
                truncate(&record.account, 16),
                truncate(&record.category, 12),
                truncate(&record.title, 30)
            );
        }
    }
    Ok(())
}

fn print_record_details(record: &LedgerRecord) {
    println!("Record {}", record.id);
    println!(
        "  Time:         {}",
        record.time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Account:      {}", record.account);
    println!("  Amount:       {} {}", format_cents(record.amount), record.currency);
    if record.fee != 0 {
        println!("  Fee:          {}", format_cents(record.fee));
    }
    if record.discount != 0 {
        println!("  Discount:     {}", format_cents(record.discount));
    }
    println!("  Category:     {} / {}", record.category, record.sub_category);
    println!("  Title:        {}", record.title);
    if !record.project.is_empty() {
        println!("  Project:      {}", record.project);
    }
    if !record.store.is_empty() {
        println!("  Store:        {}", record.store);
    }
    if record.is_adjustment() {
        println!("  (balance adjustment)");
    }
}

async fn run_export_command(
    service: &LedgerService,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match format {
        "json" => {
            let snapshot = exporter.export_json(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} records", snapshot.records.len());
            }
        }
        "csv" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        other => anyhow::bail!("Unknown export format: {}. Use json or csv", other),
    }
    Ok(())
}

async fn run_import_command(
    service: &LedgerService,
    input: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    use std::fs::File;
    use std::io::{stdin, Read};

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let importer = Importer::new(service);
    let result = importer.import_json(reader, ImportOptions { dry_run }).await?;

    for error in &result.errors {
        eprintln!("Error: record {}: {}", error.index, error.error);
    }

    if dry_run {
        println!("Validation complete");
        println!("  Valid:    {}", result.imported);
    } else {
        println!("Import complete");
        println!("  Imported: {}", result.imported);
    }
    println!("  Rejected: {}", result.errors.len());
    Ok(())
}

fn read_input(input: Option<&str>) -> Result<String> {
    use std::io::Read;

    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path)),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read statement from stdin")?;
            Ok(text)
        }
    }
}

fn parse_amount(amount: &str) -> Result<Cents> {
    parse_cents(amount)
        .with_context(|| format!("Invalid amount '{}'. Use '-35.50' or '100'", amount))
}

fn parse_optional_date(date: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    date.map(|d| {
        parse_date(d).with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", d))
    })
    .transpose()
}

/// Local midnight of a YYYY-MM-DD date.
fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Local
        .from_local_datetime(&naive_datetime)
        .earliest()
        .map(|time| time.with_timezone(&Utc))
        .ok_or_else(|| anyhow::anyhow!("Date {} does not exist in the local time zone", date_str))
}

/// Split chronologically ordered records into runs sharing a calendar day in `tz`.
fn group_by_day<'a, Tz: TimeZone>(
    records: &'a [LedgerRecord],
    tz: &Tz,
) -> Vec<(NaiveDate, &'a [LedgerRecord])> {
    let day = |record: &LedgerRecord| record.time.with_timezone(tz).date_naive();
    records
        .chunk_by(|a, b| day(a) == day(b))
        .map(|chunk| (day(&chunk[0]), chunk))
        .collect()
}

fn chinese_weekday(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "一",
        Weekday::Tue => "二",
        Weekday::Wed => "三",
        Weekday::Thu => "四",
        Weekday::Fri => "五",
        Weekday::Sat => "六",
        Weekday::Sun => "日",
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
