use std::path::Path;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month};
use tracing::{info, warn};

use tally_core::Warehouse;

use crate::error::CliError;

const ISO_DATE: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Sentinels exchange dumps use for a missing listing date.
const MISSING_MARKERS: &[&str] = &["", "-", "na", "nan", "not available"];

struct Columns {
    symbol: usize,
    company_name: Option<usize>,
    date_of_listing: Option<usize>,
    isin: Option<usize>,
    market_cap: Option<usize>,
}

/// Load instruments from an exchange listing CSV. Symbols are upserted, so
/// re-loading a newer dump refreshes existing rows.
pub fn run(warehouse: &Warehouse, input: &Path) -> Result<(), CliError> {
    let mut reader = csv::Reader::from_path(input).map_err(tally_core::CoreError::from)?;
    let columns = resolve_columns(reader.headers().map_err(tally_core::CoreError::from)?)
        .ok_or_else(|| {
            CliError::Input(format!("{} has no 'symbol' column", input.display()))
        })?;

    let mut loaded = 0usize;
    for record in reader.records() {
        let record = record.map_err(tally_core::CoreError::from)?;
        let Some(symbol) = record.get(columns.symbol).map(str::trim) else {
            continue;
        };
        if symbol.is_empty() {
            continue;
        }

        let company_name = optional_text(&record, columns.company_name);
        let isin = optional_text(&record, columns.isin);
        let date_of_listing = optional_text(&record, columns.date_of_listing)
            .and_then(|text| parse_listing_date(text));
        let market_cap =
            optional_text(&record, columns.market_cap).and_then(parse_market_cap);

        warehouse.add_instrument(symbol, company_name, date_of_listing, isin, market_cap)?;
        loaded += 1;
    }

    if loaded == 0 {
        warn!(input = %input.display(), "no instruments loaded");
    }
    info!(loaded, "instruments loaded");
    Ok(())
}

fn resolve_columns(headers: &csv::StringRecord) -> Option<Columns> {
    let position = |names: &[&str]| {
        headers.iter().position(|header| {
            let header = header.trim().to_ascii_lowercase();
            names.contains(&header.as_str())
        })
    };

    Some(Columns {
        symbol: position(&["symbol"])?,
        company_name: position(&["name of company", "company_name"]),
        date_of_listing: position(&["date of listing", "date_of_listing"]),
        isin: position(&["isin number", "isin"]),
        market_cap: position(&["market cap", "market_cap"]),
    })
}

fn optional_text(record: &csv::StringRecord, column: Option<usize>) -> Option<&str> {
    let text = record.get(column?)?.trim();
    (!text.is_empty()).then_some(text)
}

/// Accepts ISO dates plus the `DD-MM-YYYY` and `DD-MON-YYYY` shapes exchange
/// dumps use. Unparseable or sentinel values load as NULL.
fn parse_listing_date(text: &str) -> Option<Date> {
    if MISSING_MARKERS.contains(&text.to_ascii_lowercase().as_str()) {
        return None;
    }
    if let Ok(date) = Date::parse(text, ISO_DATE) {
        return Some(date);
    }

    let mut parts = text.split('-');
    let day: u8 = parts.next()?.trim().parse().ok()?;
    let month_text = parts.next()?.trim();
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month = month_text
        .parse::<u8>()
        .ok()
        .and_then(|n| Month::try_from(n).ok())
        .or_else(|| month_from_abbrev(month_text))?;
    Date::from_calendar_date(year, month, day).ok()
}

fn month_from_abbrev(text: &str) -> Option<Month> {
    const NAMES: [(&str, Month); 12] = [
        ("jan", Month::January),
        ("feb", Month::February),
        ("mar", Month::March),
        ("apr", Month::April),
        ("may", Month::May),
        ("jun", Month::June),
        ("jul", Month::July),
        ("aug", Month::August),
        ("sep", Month::September),
        ("oct", Month::October),
        ("nov", Month::November),
        ("dec", Month::December),
    ];
    let text = text.to_ascii_lowercase();
    NAMES
        .iter()
        .find(|(name, _)| *name == text.as_str())
        .map(|(_, month)| *month)
}

/// Market caps arrive with thousands separators and the occasional unit
/// suffix; keep the leading numeric run.
fn parse_market_cap(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let numeric: String = cleaned
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().ok()
}
