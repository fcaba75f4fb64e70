//! Numeric cleaning for upstream table cells and API values.
//!
//! The upstream site renders numbers with thousands separators, percent
//! suffixes, and `-` placeholders for missing values. Everything that reaches
//! the long/tidy records goes through these helpers first.

use serde_json::Value;
use time::{Date, Month};

/// Parse a raw cell into a float, or `None` when the cell is empty/missing.
///
/// When `percent_to_fraction` is set, a trailing `%` divides the value by 100
/// ("9.43%" becomes 0.0943).
pub fn parse_numeric_value(raw: &Value, percent_to_fraction: bool) -> Option<f64> {
    let text = match raw {
        Value::Null => return None,
        Value::Number(n) => return n.as_f64(),
        Value::String(s) => s.trim(),
        _ => return None,
    };

    if text.is_empty() || text == "-" || text.eq_ignore_ascii_case("nan") {
        return None;
    }

    let cleaned = text.replace(',', "");
    let digits: String = cleaned
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect();
    let value: f64 = digits.parse().ok()?;

    if percent_to_fraction && text.contains('%') {
        Some(value / 100.0)
    } else {
        Some(value)
    }
}

/// Convert a string-ish cell to a number when it looks numeric, keeping the
/// original text otherwise. Blanks and `-` become null.
pub fn maybe_number(raw: &Value) -> Value {
    match raw {
        Value::String(s) => maybe_number_text(s),
        other => other.clone(),
    }
}

/// [`maybe_number`] over a bare text cell.
pub fn maybe_number_text(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() || text == "-" {
        return Value::Null;
    }

    let cleaned = text.replace(',', "").replace('%', "");
    match cleaned.parse::<f64>() {
        Ok(value) => serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Err(_) => Value::String(text.to_owned()),
    }
}

/// Map a period label like "Mar 2014" to the first day of that month.
/// Full month names are accepted ("March 2014"). Unparseable labels yield `None`.
pub fn period_to_date(label: &str) -> Option<Date> {
    let mut parts = label.split_whitespace();
    let month_part = parts.next()?;
    let year_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let month = month_from_prefix(month_part)?;
    let year: i32 = year_part.parse().ok()?;
    Date::from_calendar_date(year, month, 1).ok()
}

fn month_from_prefix(name: &str) -> Option<Month> {
    let prefix = name.get(..3)?;
    match prefix {
        "Jan" => Some(Month::January),
        "Feb" => Some(Month::February),
        "Mar" => Some(Month::March),
        "Apr" => Some(Month::April),
        "May" => Some(Month::May),
        "Jun" => Some(Month::June),
        "Jul" => Some(Month::July),
        "Aug" => Some(Month::August),
        "Sep" => Some(Month::September),
        "Oct" => Some(Month::October),
        "Nov" => Some(Month::November),
        "Dec" => Some(Month::December),
        _ => None,
    }
}
