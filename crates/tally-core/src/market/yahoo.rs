//! Yahoo v8 chart API provider.
//!
//! Yahoo caps how far back a single chart request may reach, so long ranges
//! are fetched in lookback-sized chunks. Each chunk gets its own linear-backoff
//! retry budget; a chunk that keeps failing is skipped rather than failing the
//! whole range, and a short pause between chunks keeps the request rate down.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::{error, warn};

use crate::domain::Frequency;
use crate::http::HttpClient;
use crate::market::provider::{OhlcvProvider, ProviderError};
use crate::market::OhlcvBar;

#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    /// Exchange suffix appended to every symbol (".NS" for NSE listings).
    pub symbol_suffix: String,
    /// Widest range one chart request may cover, in days.
    pub max_lookback_days: i64,
    pub retry_attempts: u32,
    /// Linear backoff base: the n-th retry sleeps `base_sleep * n`.
    pub base_sleep: Duration,
    pub chunk_pause: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://query1.finance.yahoo.com/v8/finance/chart"),
            symbol_suffix: String::from(".NS"),
            max_lookback_days: 1825,
            retry_attempts: 5,
            base_sleep: Duration::from_secs(2),
            chunk_pause: Duration::from_millis(200),
        }
    }
}

pub struct YahooProvider {
    client: Arc<dyn HttpClient>,
    config: YahooConfig,
}

impl YahooProvider {
    pub fn new(client: Arc<dyn HttpClient>, config: YahooConfig) -> Self {
        Self { client, config }
    }

    fn chunk_url(&self, symbol: &str, start: Date, end: Date, freq: Frequency) -> String {
        let interval = match freq {
            Frequency::Daily => "1d",
            Frequency::Weekly => "1wk",
        };
        // The chart API treats period2 as exclusive.
        let period1 = unix_midnight(start);
        let period2 = unix_midnight(end.next_day().unwrap_or(end));
        format!(
            "{base}/{symbol}{suffix}?period1={period1}&period2={period2}&interval={interval}",
            base = self.config.base_url,
            suffix = self.config.symbol_suffix,
        )
    }

    async fn fetch_chunk(
        &self,
        symbol: &str,
        start: Date,
        end: Date,
        freq: Frequency,
    ) -> Result<Vec<OhlcvBar>, ProviderError> {
        let url = self.chunk_url(symbol, start, end, freq);
        let request = crate::http::HttpRequest::get(&url);
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(ProviderError::Status {
                status: response.status,
            });
        }
        parse_chart_response(&response.body)
    }
}

impl OhlcvProvider for YahooProvider {
    fn fetch_range<'a>(
        &'a self,
        symbol: &'a str,
        start: Date,
        end: Date,
        freq: Frequency,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<OhlcvBar>, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            if start > end {
                return Ok(Vec::new());
            }

            let mut bars: BTreeMap<Date, OhlcvBar> = BTreeMap::new();
            let mut current_start = start;

            while current_start <= end {
                let current_end = (current_start
                    + time::Duration::days(self.config.max_lookback_days - 1))
                .min(end);

                let mut fetched = None;
                for attempt in 1..=self.config.retry_attempts.max(1) {
                    match self.fetch_chunk(symbol, current_start, current_end, freq).await {
                        Ok(chunk) => {
                            fetched = Some(chunk);
                            break;
                        }
                        Err(err) => {
                            error!(
                                symbol,
                                freq = %freq,
                                %current_start,
                                %current_end,
                                attempt,
                                attempts = self.config.retry_attempts,
                                %err,
                                "chunk fetch failed"
                            );
                            tokio::time::sleep(self.config.base_sleep * attempt).await;
                        }
                    }
                }

                match fetched {
                    None => error!(
                        symbol,
                        freq = %freq,
                        %current_start,
                        %current_end,
                        "giving up on chunk"
                    ),
                    Some(chunk) if chunk.is_empty() => {
                        warn!(symbol, freq = %freq, %current_start, %current_end, "empty chunk")
                    }
                    Some(chunk) => {
                        for bar in chunk {
                            bars.insert(bar.date, bar);
                        }
                    }
                }

                current_start = match current_end.next_day() {
                    Some(next) => next,
                    None => break,
                };
                tokio::time::sleep(self.config.chunk_pause).await;
            }

            Ok(bars.into_values().collect())
        })
    }
}

fn unix_midnight(date: Date) -> i64 {
    PrimitiveDateTime::new(date, Time::MIDNIGHT)
        .assume_utc()
        .unix_timestamp()
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartNode,
}

#[derive(Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Deserialize)]
struct ChartApiError {
    code: String,
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct QuoteBlock {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Decode one chart response into bars. Rows with a missing close (halts,
/// padding at range edges) are skipped; a missing volume becomes zero.
fn parse_chart_response(body: &str) -> Result<Vec<OhlcvBar>, ProviderError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("chart response: {e}")))?;

    if let Some(error) = envelope.chart.error {
        return Err(ProviderError::Upstream(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let Some(result) = envelope
        .chart
        .result
        .and_then(|mut results| (!results.is_empty()).then(|| results.remove(0)))
    else {
        return Ok(Vec::new());
    };
    let Some(timestamps) = result.timestamp else {
        return Ok(Vec::new());
    };
    let Some(quote) = result.indicators.quote.first() else {
        return Ok(Vec::new());
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (index, ts) in timestamps.iter().enumerate() {
        let date = OffsetDateTime::from_unix_timestamp(*ts)
            .map_err(|_| ProviderError::Malformed(format!("timestamp out of range: {ts}")))?
            .date();

        let at = |series: &[Option<f64>]| series.get(index).copied().flatten();
        let Some(close) = at(&quote.close) else {
            continue;
        };
        bars.push(OhlcvBar {
            date,
            open: at(&quote.open).unwrap_or(close),
            high: at(&quote.high).unwrap_or(close),
            low: at(&quote.low).unwrap_or(close),
            close,
            volume: at(&quote.volume).unwrap_or(0.0),
        });
    }
    Ok(bars)
}
