//! Line-oriented parser for exported bank statement text.
//!
//! A statement is a sequence of loosely formatted lines. Two of them matter:
//!
//! ```text
//! 交易时间: 3月15日
//! 交易金额 人民币1,000.00
//! ```
//!
//! Fields are accumulated into a draft record; every amount line finalizes the
//! draft, which then starts over from the defaults.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, TimeZone, Utc};
use thiserror::Error;

use super::{parse_cents, Cents, DraftDefaults, ParseCentsError, TransactionRecord};

/// Marks a line carrying the transaction date.
pub const TIME_MARKER: &str = "交易时间";

/// Marks a line carrying the transaction amount.
pub const AMOUNT_MARKER: &str = "交易金额";

/// Last glyph of the currency name, the amount follows it (人民币1,000.00).
const CURRENCY_DELIMITER: char = '币';
const MONTH_GLYPH: char = '月';
const DAY_GLYPH: char = '日';
const FIELD_SEPARATORS: [char; 2] = [':', '：'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Time,
    Amount,
    /// Both markers on one line: the date applies before the amount finalizes
    TimeAndAmount,
    Unrecognized,
}

/// Classify a line by its markers, ignoring any whitespace inside the line.
pub fn classify_line(line: &str) -> LineKind {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    match (compact.contains(TIME_MARKER), compact.contains(AMOUNT_MARKER)) {
        (true, true) => LineKind::TimeAndAmount,
        (true, false) => LineKind::Time,
        (false, true) => LineKind::Amount,
        (false, false) => LineKind::Unrecognized,
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("no '币' before the amount")]
    MissingCurrencyDelimiter,

    #[error("amount is not a number: {0}")]
    InvalidAmount(#[from] ParseCentsError),

    #[error("no ':' before the date")]
    MissingDateSeparator,

    #[error("month is not a number")]
    InvalidMonth,

    #[error("day is not a number")]
    InvalidDay,

    #[error("no such date: month {month}, day {day}")]
    ImpossibleDate { month: u32, day: u32 },
}

/// A statement line that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// 1-based position of the line in the statement
    pub line_number: usize,
    pub line: String,
    pub reason: LineError,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {} ({})", self.line_number, self.reason, self.line.trim())
    }
}

/// Everything a statement produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStatement {
    pub records: Vec<TransactionRecord>,
    /// Amount lines that did not yield a record
    pub failures: Vec<ParseFailure>,
    /// Date lines that were skipped; the draft kept its previous time
    pub warnings: Vec<ParseFailure>,
}

impl ParsedStatement {
    /// Number of finalized amount lines, emitted or failed.
    pub fn outcomes(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Extract the date from a time line, keeping the year and time of day of `now`.
///
/// Year and time of day are read in the time zone of `now`, so a statement
/// imported just after local midnight on 1 January gets the new year.
pub fn parse_transaction_date<Tz: TimeZone>(
    line: &str,
    now: &DateTime<Tz>,
) -> Result<DateTime<Utc>, LineError> {
    let field = line
        .split(FIELD_SEPARATORS)
        .nth(1)
        .ok_or(LineError::MissingDateSeparator)?;

    let (month_str, rest) = field.split_once(MONTH_GLYPH).ok_or(LineError::InvalidMonth)?;
    let day_str = rest.split(DAY_GLYPH).next().unwrap_or_default();

    let month: u32 = month_str.trim().parse().map_err(|_| LineError::InvalidMonth)?;
    let day: u32 = day_str.trim().parse().map_err(|_| LineError::InvalidDay)?;

    let local = NaiveDate::from_ymd_opt(now.year(), month, day)
        .ok_or(LineError::ImpossibleDate { month, day })?
        .and_time(now.time());

    now.timezone()
        .from_local_datetime(&local)
        .earliest()
        .map(|time| time.with_timezone(&Utc))
        .ok_or(LineError::ImpossibleDate { month, day })
}

/// Extract the amount from an amount line as a negative delta.
pub fn parse_transaction_amount(line: &str) -> Result<Cents, LineError> {
    let payload = line
        .split(CURRENCY_DELIMITER)
        .nth(1)
        .ok_or(LineError::MissingCurrencyDelimiter)?;

    let cents = parse_cents(&payload.replace(',', ""))?;
    Ok(-cents)
}

/// Stateful statement parser. One instance handles one statement.
pub struct StatementParser {
    defaults: DraftDefaults,
    now: DateTime<FixedOffset>,
    draft: TransactionRecord,
    line_number: usize,
    parsed: ParsedStatement,
}

impl StatementParser {
    /// Create a parser on the local clock.
    pub fn new(defaults: DraftDefaults) -> Self {
        Self::with_clock(defaults, Local::now())
    }

    /// Create a parser whose "now" is fixed, used as the default record time
    /// and, in its own time zone, as the year of extracted dates.
    pub fn with_clock<Tz: TimeZone>(defaults: DraftDefaults, now: DateTime<Tz>) -> Self {
        let now = now.fixed_offset();
        let draft = defaults.draft(now.with_timezone(&Utc));
        Self {
            defaults,
            now,
            draft,
            line_number: 0,
            parsed: ParsedStatement::default(),
        }
    }

    /// The record currently being accumulated.
    pub fn draft(&self) -> &TransactionRecord {
        &self.draft
    }

    /// Feed the next line of the statement.
    pub fn feed(&mut self, line: &str) {
        self.line_number += 1;

        match classify_line(line) {
            LineKind::Time => self.apply_date(line),
            LineKind::Amount => self.finalize(line),
            LineKind::TimeAndAmount => {
                self.apply_date(line);
                self.finalize(line);
            }
            LineKind::Unrecognized => {}
        }
    }

    /// Consume the parser and return what it produced.
    pub fn finish(self) -> ParsedStatement {
        self.parsed
    }

    /// Parse a whole statement.
    pub fn parse<I, S>(mut self, lines: I) -> ParsedStatement
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.feed(line.as_ref());
        }
        self.finish()
    }

    fn apply_date(&mut self, line: &str) {
        match parse_transaction_date(line, &self.now) {
            Ok(time) => self.draft.time = time,
            Err(reason) => {
                let warning = self.failure(line, reason);
                log::warn!("statement: skipped date, {}", warning);
                self.parsed.warnings.push(warning);
            }
        }
    }

    fn finalize(&mut self, line: &str) {
        match parse_transaction_amount(line) {
            Ok(amount) => {
                self.draft.amount = amount;
                let fresh = self.defaults.draft(self.now_utc());
                let record = std::mem::replace(&mut self.draft, fresh);
                log::debug!(
                    "statement: line {} emitted {} on {}",
                    self.line_number,
                    record.amount,
                    record.time.date_naive()
                );
                self.parsed.records.push(record);
            }
            Err(reason) => {
                let failure = self.failure(line, reason);
                log::warn!("statement: rejected amount, {}", failure);
                self.parsed.failures.push(failure);
                self.reset_draft();
            }
        }
    }

    fn reset_draft(&mut self) {
        self.draft = self.defaults.draft(self.now_utc());
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.now.with_timezone(&Utc)
    }

    fn failure(&self, line: &str, reason: LineError) -> ParseFailure {
        ParseFailure {
            line_number: self.line_number,
            line: line.to_string(),
            reason,
        }
    }
}

/// Parse statement text with a fresh parser.
pub fn parse_statement(text: &str, defaults: DraftDefaults) -> ParsedStatement {
    StatementParser::new(defaults).parse(text.lines())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap()
    }

    fn parser() -> StatementParser {
        StatementParser::with_clock(DraftDefaults::default(), fixed_now())
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("交易时间: 3月15日"), LineKind::Time);
        assert_eq!(classify_line("交 易 时 间 :3月15日"), LineKind::Time);
        assert_eq!(classify_line("交易金额 人民币1,000.00"), LineKind::Amount);
        assert_eq!(classify_line("交\t易金额"), LineKind::Amount);
        assert_eq!(
            classify_line("交易时间: 3月15日 交易金额 人民币5.00"),
            LineKind::TimeAndAmount
        );
        assert_eq!(classify_line("交易卡号: 6222****1234"), LineKind::Unrecognized);
        assert_eq!(classify_line(""), LineKind::Unrecognized);
    }

    #[test]
    fn test_amount_is_negated() {
        assert_eq!(parse_transaction_amount("交易金额...币1,234.56"), Ok(-123456));
        assert_eq!(parse_transaction_amount("交易金额 人民币 88 "), Ok(-8800));
    }

    #[test]
    fn test_amount_errors() {
        assert_eq!(
            parse_transaction_amount("交易金额 1,000.00"),
            Err(LineError::MissingCurrencyDelimiter)
        );
        assert_eq!(
            parse_transaction_amount("交易金额 人民币abc"),
            Err(LineError::InvalidAmount(ParseCentsError::InvalidFormat))
        );
        assert_eq!(
            parse_transaction_amount("交易金额 人民币"),
            Err(LineError::InvalidAmount(ParseCentsError::Empty))
        );
        assert_eq!(
            parse_transaction_amount("交易金额 人民币1,234.567"),
            Err(LineError::InvalidAmount(ParseCentsError::TooPrecise))
        );
    }

    #[test]
    fn test_sub_cent_amount_fails_the_line() {
        let parsed = parser().parse(["交易时间: 3月15日", "交易金额 人民币1,234.567"]);

        assert!(parsed.records.is_empty());
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].line_number, 2);
    }

    #[test]
    fn test_date_uses_current_year() {
        let time = parse_transaction_date("交易时间: 3月15日", &fixed_now()).unwrap();

        assert_eq!(time.year(), 2024);
        assert_eq!(time.month0(), 2);
        assert_eq!(time.day(), 15);
        assert_eq!(time.hour(), 9);
        assert_eq!(time.minute(), 30);
    }

    #[test]
    fn test_date_year_follows_clock_time_zone() {
        // 00:30 on New Year's Day in UTC+8 is still 31 December in UTC
        let beijing = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = beijing.with_ymd_and_hms(2025, 1, 1, 0, 30, 0).unwrap();

        let time = parse_transaction_date("交易时间: 1月1日", &now).unwrap();

        assert_eq!(time, now.with_timezone(&Utc));
        assert_eq!(time.with_timezone(&beijing).year(), 2025);

        let parsed = StatementParser::with_clock(DraftDefaults::default(), now)
            .parse(["交易时间: 1月1日", "交易金额 人民币8.00"]);
        assert_eq!(parsed.records[0].time, now.with_timezone(&Utc));
    }

    #[test]
    fn test_date_with_fullwidth_colon_and_clock_time() {
        let time = parse_transaction_date("交易时间：12月 1日 23:59", &fixed_now()).unwrap();
        assert_eq!(time.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
    }

    #[test]
    fn test_date_errors() {
        let now = fixed_now();
        assert_eq!(
            parse_transaction_date("交易时间 3月15日", &now),
            Err(LineError::MissingDateSeparator)
        );
        assert_eq!(
            parse_transaction_date("交易时间: 三月15日", &now),
            Err(LineError::InvalidMonth)
        );
        assert_eq!(
            parse_transaction_date("交易时间: 3月", &now),
            Err(LineError::InvalidDay)
        );
        assert_eq!(
            parse_transaction_date("交易时间: 2月30日", &now),
            Err(LineError::ImpossibleDate { month: 2, day: 30 })
        );
        assert_eq!(
            parse_transaction_date("交易时间: 13月1日", &now),
            Err(LineError::ImpossibleDate { month: 13, day: 1 })
        );
    }

    #[test]
    fn test_single_transaction() {
        let parsed = parser().parse(["交易时间: 3月15日", "交易金额 人民币1,000.00"]);

        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.failures.is_empty());

        let record = &parsed.records[0];
        assert_eq!(record.amount, -100000);
        assert_eq!(record.time.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(record.category, "other");
        assert_eq!(record.sub_category, "other");
        assert_eq!(record.account, "default");
        assert_eq!(record.title, "auto-imported");
    }

    #[test]
    fn test_amount_without_date_keeps_parse_time() {
        let parsed = parser().parse(["交易金额 人民币12.00"]);

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].time, fixed_now());
    }

    #[test]
    fn test_date_does_not_leak_into_next_transaction() {
        let parsed = parser().parse([
            "交易时间: 3月15日",
            "交易金额 人民币10.00",
            "交易金额 人民币20.00",
        ]);

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].time.month(), 3);
        assert_eq!(parsed.records[1].time, fixed_now());
    }

    #[test]
    fn test_outcome_count_matches_amount_lines() {
        let lines = [
            "招商银行 交易提醒",
            "交易时间: 1月2日",
            "交易时间: 1月3日",
            "交易金额 人民币5.00",
            "交易金额 人民币oops",
            "商户名称: 咖啡店",
            "交易金额 人民币7.50",
            "交易时间: 1月9日",
        ];

        let parsed = parser().parse(lines);

        assert_eq!(parsed.outcomes(), 3);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.failures.len(), 1);
        // The later date line overwrites the earlier one in the same draft
        assert_eq!(parsed.records[0].time.day(), 3);
    }

    #[test]
    fn test_failure_resets_draft() {
        let mut parser = parser();
        parser.feed("交易时间: 5月20日");
        parser.feed("交易金额 人民币N/A");

        assert_eq!(parser.draft(), &DraftDefaults::default().draft(fixed_now()));

        parser.feed("交易金额 人民币1.00");
        let parsed = parser.finish();

        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].line_number, 2);
        assert_eq!(parsed.failures[0].line, "交易金额 人民币N/A");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].time, fixed_now());
    }

    #[test]
    fn test_bad_date_is_a_warning_not_a_failure() {
        let parsed = parser().parse(["交易时间: 2月30日", "交易金额 人民币3.00"]);

        assert_eq!(parsed.outcomes(), 1);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line_number, 1);
        assert_eq!(parsed.records[0].time, fixed_now());
    }

    #[test]
    fn test_combined_line() {
        let parsed = parser().parse(["交易时间: 6月1日 交易金额 人民币2.00"]);

        // The field after the first ':' still reads as a date
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].time.month(), 6);
        assert_eq!(parsed.records[0].amount, -200);
    }

    #[test]
    fn test_custom_defaults() {
        let defaults = DraftDefaults {
            account: "中国银行".to_string(),
            currency: "HKD".to_string(),
            ..DraftDefaults::default()
        };

        let parsed =
            StatementParser::with_clock(defaults, fixed_now()).parse(["交易金额 港币9.90"]);

        assert_eq!(parsed.records[0].account, "中国银行");
        assert_eq!(parsed.records[0].currency, "HKD");
        assert_eq!(parsed.records[0].amount, -990);
    }

    #[test]
    fn test_parse_statement_text() {
        let text = "交易时间: 3月15日\n交易金额 人民币1,000.00\n\n";
        let parsed = parse_statement(text, DraftDefaults::default());

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].amount, -100000);
    }
}
