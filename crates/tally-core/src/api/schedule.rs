use serde_json::Value;

use crate::api::ParseError;
use crate::domain::{parse_numeric_value, PeriodRecord};

/// Normalize a schedule payload into period rows.
///
/// The payload maps metric names to `{period label: value}` series. The first
/// metric's series defines the row order; every metric contributes a column to
/// each row, with `null` kept for periods a metric is missing so the column
/// stays present.
pub fn parse_schedule(body: &str, percent_to_fraction: bool) -> Result<Vec<PeriodRecord>, ParseError> {
    let payload: Value =
        serde_json::from_str(body).map_err(|e| ParseError(format!("schedule json: {e}")))?;

    let metrics = match &payload {
        Value::Object(metrics) => metrics,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ParseError(format!(
                "schedule payload must be an object, got {other}"
            )))
        }
    };

    let Some((_, first_series)) = metrics.iter().next() else {
        return Ok(Vec::new());
    };
    let Some(first_series) = first_series.as_object() else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::with_capacity(first_series.len());
    for period in first_series.keys() {
        let mut record = PeriodRecord::new(period.clone());
        for (metric, series) in metrics {
            let Some(series) = series.as_object() else {
                continue;
            };
            let value = series
                .get(period)
                .and_then(|raw| parse_numeric_value(raw, percent_to_fraction))
                .map_or(Value::Null, |n| {
                    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
                });
            record.values.insert(metric.clone(), value);
        }
        rows.push(record);
    }

    Ok(rows)
}
