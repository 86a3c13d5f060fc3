use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// Money is represented as integer cents to avoid floating-point precision issues.
/// For CNY, 1 yuan = 100 fen, so ¥1,000.00 = 100000 cents.
pub type Cents = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    #[error("empty amount")]
    Empty,

    #[error("invalid money format")]
    InvalidFormat,

    #[error("amount out of range")]
    OutOfRange,

    #[error("more than two decimal places")]
    TooPrecise,
}

/// Format cents as a plain decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Format cents with thousands separators for display.
/// Example: 123456789 -> "1,234,567.89"
pub fn format_cents_grouped(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    let units = (abs_cents / 100).to_string();

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{:02}", sign, grouped, abs_cents % 100)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000, "-3" -> -300
///
/// Trailing zeros past the second decimal place are accepted, any other
/// digit there is rejected.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (negative, digits) = match input.as_bytes()[0] {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    let (units_str, decimal_str) = match digits.split_once('.') {
        Some((units, decimal)) => (units, decimal),
        None => (digits, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (units_str.is_empty() && decimal_str.is_empty())
        || !all_digits(units_str)
        || !all_digits(decimal_str)
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| ParseCentsError::OutOfRange)?
    };

    if decimal_str.bytes().skip(2).any(|b| b != b'0') {
        return Err(ParseCentsError::TooPrecise);
    }

    // Pad or cut the fractional part to exactly two digits
    let decimal_cents: i64 = match decimal_str.len() {
        0 => 0,
        1 => decimal_str[..1].parse::<i64>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => decimal_str[..2].parse().map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::OutOfRange)?;

    Ok(if negative { -cents } else { cents })
}

/// Convert a decimal yuan amount into cents.
pub fn cents_from_decimal(amount: Decimal) -> Result<Cents, ParseCentsError> {
    let cents = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(ParseCentsError::OutOfRange)?;
    if !cents.fract().is_zero() {
        return Err(ParseCentsError::TooPrecise);
    }
    cents.to_i64().ok_or(ParseCentsError::OutOfRange)
}

/// Serde adapter writing cents as a decimal yuan number (`-12.5`, `1000`).
/// Reading accepts integers, floats and numeric strings.
pub mod decimal_amount {
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{cents_from_decimal, Cents};

    /// One division keeps amounts below 10^15 cents exact in the decimal output.
    pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*cents as f64 / 100.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        cents_from_decimal(amount)
            .map_err(|e| D::Error::custom(format!("amount {}: {}", amount, e)))
    }
}
