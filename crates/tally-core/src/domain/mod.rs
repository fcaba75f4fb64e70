//! Canonical domain records shared by the scraper, aggregator, and store.

mod keys;
mod numeric;
mod timestamp;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

pub use keys::{ChartKey, ScheduleKey, StatementSection};
pub use numeric::{maybe_number, maybe_number_text, parse_numeric_value, period_to_date};
pub use timestamp::UtcDateTime;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Bar frequency for the OHLCV store. The one-letter codes appear in the
/// failure log and on the wire to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
}

impl Frequency {
    pub const ALL: [Self; 2] = [Self::Daily, Self::Weekly];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::Weekly => "W",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "D" | "d" | "daily" => Ok(Self::Daily),
            "W" | "w" | "weekly" => Ok(Self::Weekly),
            other => Err(format!("unsupported frequency '{other}', expected daily or weekly")),
        }
    }
}

/// Identifier pair extracted from a company page, plus the canonical source
/// URL. Immutable once parsed; the join key for every downstream record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub company_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub company_name: Option<String>,
    pub source_url: String,
}

impl CompanyRef {
    pub fn unknown(url: impl Into<String>) -> Self {
        Self {
            company_id: None,
            warehouse_id: None,
            company_name: None,
            source_url: url.into(),
        }
    }
}

/// One row of a long/tidy series: a period label, its derived calendar date
/// when the label is parseable, and one value per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub period_label: String,
    #[serde(with = "iso_date::option")]
    pub period_date: Option<Date>,
    pub values: BTreeMap<String, Value>,
}

impl PeriodRecord {
    pub fn new(period_label: impl Into<String>) -> Self {
        let period_label = period_label.into();
        let period_date = period_to_date(&period_label);
        Self {
            period_label,
            period_date,
            values: BTreeMap::new(),
        }
    }
}

/// Peer comparison table: one row per peer company plus the optional
/// aggregate "Median" row the upstream appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerTable {
    pub rows: Vec<BTreeMap<String, Value>>,
    pub median: Option<BTreeMap<String, Value>>,
}

/// Pros/cons bullet lists and profile text from the analysis section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub about: String,
}

/// Everything fetched for one company in one attempt: page-level extraction
/// plus the API bundle. Serialized as-is into the raw payload store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyPayload {
    pub meta: CompanyRef,
    pub scraped_at: UtcDateTime,
    pub summary: BTreeMap<String, String>,
    /// Named wide tables from the page (Quarterly Results, Profit & Loss, ...).
    pub tables: BTreeMap<String, Vec<BTreeMap<String, Value>>>,
    pub analysis: Analysis,
    pub charts: BTreeMap<ChartKey, Vec<PeriodRecord>>,
    pub schedules: BTreeMap<ScheduleKey, Vec<PeriodRecord>>,
    pub peers: Option<PeerTable>,
    pub quick_ratios: BTreeMap<String, Value>,
}

impl CompanyPayload {
    /// Schedule keys whose series came back empty. A complete payload returns
    /// an empty vec; the orchestrator retries the whole company otherwise.
    pub fn missing_schedules(&self) -> Vec<ScheduleKey> {
        ScheduleKey::ALL
            .iter()
            .copied()
            .filter(|key| self.schedules.get(key).map_or(true, Vec::is_empty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_record_derives_date_from_label() {
        let record = PeriodRecord::new("Mar 2014");
        assert_eq!(record.period_date.map(|d| d.to_string()), Some(String::from("2014-03-01")));

        let ttm = PeriodRecord::new("TTM");
        assert_eq!(ttm.period_date, None);
    }

    #[test]
    fn payload_serializes_schedule_keys_as_snake_strings() {
        let mut schedules = BTreeMap::new();
        schedules.insert(ScheduleKey::SalesQuarterly, vec![PeriodRecord::new("Jun 2025")]);

        let payload = CompanyPayload {
            meta: CompanyRef::unknown("https://upstream.test/company/TCS/"),
            scraped_at: UtcDateTime::parse("2026-01-01T00:00:00Z").expect("valid"),
            summary: BTreeMap::new(),
            tables: BTreeMap::new(),
            analysis: Analysis::default(),
            charts: BTreeMap::new(),
            schedules,
            peers: None,
            quick_ratios: BTreeMap::new(),
        };

        let json = serde_json::to_value(&payload).expect("serializable");
        assert!(json["schedules"]["sales_quarterly"].is_array());
    }
}
