use std::collections::BTreeMap;

use serde_json::Value;
use time::macros::format_description;
use time::Date;

use crate::api::ParseError;
use crate::domain::{maybe_number, PeriodRecord};

/// Normalize a chart payload into date-keyed long rows.
///
/// The payload is a list of datasets, one per metric, each holding
/// `[date, value, extra-dict...]` pairs. Rows are merged across metrics by
/// date and returned in ascending date order; extra dict fields become
/// `{metric}_{field}` columns.
pub fn parse_chart(body: &str) -> Result<Vec<PeriodRecord>, ParseError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|e| ParseError(format!("chart json: {e}")))?;

    let datasets = match payload.get("datasets") {
        Some(Value::Array(datasets)) => datasets.as_slice(),
        Some(Value::Null) | None => &[],
        Some(other) => {
            return Err(ParseError(format!(
                "chart datasets must be an array, got {other}"
            )))
        }
    };

    let mut by_date: BTreeMap<String, PeriodRecord> = BTreeMap::new();

    for dataset in datasets {
        let metric = dataset
            .get("metric")
            .or_else(|| dataset.get("label"))
            .and_then(Value::as_str)
            .unwrap_or("value");
        let values = match dataset.get("values") {
            Some(Value::Array(values)) => values.as_slice(),
            _ => continue,
        };

        for pair in values {
            let Some(items) = pair.as_array() else {
                continue;
            };
            if items.len() < 2 {
                continue;
            }
            let Some(date) = items[0].as_str().filter(|d| !d.is_empty()) else {
                continue;
            };

            let record = by_date
                .entry(date.to_owned())
                .or_insert_with(|| chart_record(date));
            record
                .values
                .insert(metric.to_owned(), maybe_number(&items[1]));

            for extra in &items[2..] {
                let Some(fields) = extra.as_object() else {
                    continue;
                };
                for (field, raw) in fields {
                    record
                        .values
                        .insert(format!("{metric}_{field}"), maybe_number(raw));
                }
            }
        }
    }

    // BTreeMap iteration gives ascending ISO-date order.
    Ok(by_date.into_values().collect())
}

fn chart_record(date: &str) -> PeriodRecord {
    let iso = format_description!("[year]-[month]-[day]");
    PeriodRecord {
        period_label: date.to_owned(),
        period_date: Date::parse(date, iso).ok(),
        values: BTreeMap::new(),
    }
}
