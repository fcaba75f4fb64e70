//! Incremental OHLCV updater.
//!
//! Ranges are decided against the store: the first load reaches back the full
//! provider lookback, later runs fetch only from the day after the last
//! stored bar. Per-symbol failures land in the failure log and never stop a
//! batch run.

use std::sync::Arc;

use time::{Date, Duration, OffsetDateTime};
use tracing::{error, info};

use crate::domain::Frequency;
use crate::error::CoreError;
use crate::market::provider::OhlcvProvider;
use crate::market::{FailureLog, MarketError, OhlcvBar};

/// Store seam for the updater. Implemented by the warehouse, mocked in tests.
pub trait BarStore: Send + Sync {
    fn max_bar_date(&self, symbol: &str, freq: Frequency) -> Result<Option<Date>, CoreError>;
    fn upsert_bars(
        &self,
        symbol: &str,
        freq: Frequency,
        bars: &[OhlcvBar],
    ) -> Result<(), CoreError>;
    /// Symbols to update, in ascending symbol order.
    fn instruments(&self) -> Result<Vec<String>, CoreError>;
}

impl BarStore for tally_warehouse::Warehouse {
    fn max_bar_date(&self, symbol: &str, freq: Frequency) -> Result<Option<Date>, CoreError> {
        Ok(tally_warehouse::Warehouse::max_bar_date(
            self,
            symbol,
            freq.as_str(),
        )?)
    }

    fn upsert_bars(
        &self,
        symbol: &str,
        freq: Frequency,
        bars: &[OhlcvBar],
    ) -> Result<(), CoreError> {
        let rows: Vec<tally_warehouse::OhlcvRow> = bars
            .iter()
            .map(|bar| tally_warehouse::OhlcvRow {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
            .collect();
        tally_warehouse::Warehouse::upsert_bars(self, symbol, freq.as_str(), &rows)?;
        Ok(())
    }

    fn instruments(&self) -> Result<Vec<String>, CoreError> {
        Ok(tally_warehouse::Warehouse::instrument_symbols(self)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpdaterConfig {
    /// How far back the initial load reaches, in days.
    pub lookback_days: i64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            lookback_days: 1825,
        }
    }
}

/// Decide the inclusive fetch range for one symbol, or `None` when the store
/// is already up to date.
pub fn decide_date_range(
    max_existing: Option<Date>,
    today: Date,
    lookback_days: i64,
) -> Option<(Date, Date)> {
    let start = match max_existing {
        None => today - Duration::days(lookback_days),
        Some(last) => last.next_day()?,
    };
    (start <= today).then_some((start, today))
}

pub struct MarketUpdater {
    provider: Arc<dyn OhlcvProvider>,
    config: UpdaterConfig,
}

impl MarketUpdater {
    pub fn new(provider: Arc<dyn OhlcvProvider>, config: UpdaterConfig) -> Self {
        Self { provider, config }
    }

    /// Update one symbol up to today.
    pub async fn update_symbol(
        &self,
        store: &dyn BarStore,
        failure_log: &FailureLog,
        symbol: &str,
        freq: Frequency,
    ) -> Result<(), MarketError> {
        self.update_symbol_as_of(store, failure_log, symbol, freq, today_utc())
            .await
    }

    /// Update one symbol up to a fixed date. An empty initial load is a
    /// logged failure (likely a delisted or misspelled symbol); an empty
    /// incremental fetch just means no new bars.
    pub async fn update_symbol_as_of(
        &self,
        store: &dyn BarStore,
        failure_log: &FailureLog,
        symbol: &str,
        freq: Frequency,
        today: Date,
    ) -> Result<(), MarketError> {
        let max_existing = store.max_bar_date(symbol, freq)?;
        let Some((start, end)) = decide_date_range(max_existing, today, self.config.lookback_days)
        else {
            info!(symbol, freq = %freq, "already up to date");
            return Ok(());
        };

        info!(symbol, freq = %freq, %start, %end, "fetching range");
        let bars = self.provider.fetch_range(symbol, start, end, freq).await?;

        if bars.is_empty() {
            if max_existing.is_some() {
                info!(symbol, freq = %freq, %start, %end, "no new bars");
                return Ok(());
            }
            error!(symbol, freq = %freq, "empty initial load, logging failure");
            failure_log.append_empty_initial(symbol, freq, start, end)?;
            return Ok(());
        }

        store.upsert_bars(symbol, freq, &bars)?;
        info!(symbol, freq = %freq, rows = bars.len(), "stored bars");
        Ok(())
    }

    /// Update every instrument in the store for one frequency. Per-symbol
    /// errors become `ERROR` lines in the failure log and the loop continues.
    pub async fn update_all(
        &self,
        store: &dyn BarStore,
        failure_log: &FailureLog,
        freq: Frequency,
    ) -> Result<(), MarketError> {
        for symbol in store.instruments()? {
            if let Err(err) = self.update_symbol(store, failure_log, &symbol, freq).await {
                error!(symbol, freq = %freq, %err, "symbol update failed");
                failure_log.append_error(&symbol, freq, &err.to_string())?;
            }
        }
        Ok(())
    }

    /// Re-run every `(symbol, freq)` pair in the failure log.
    ///
    /// The log is truncated before the pass starts so failures during the
    /// pass re-append cleanly.
    pub async fn reprocess_failed(
        &self,
        store: &dyn BarStore,
        failure_log: &FailureLog,
    ) -> Result<(), MarketError> {
        let pairs = failure_log.load_pairs()?;
        if pairs.is_empty() {
            info!("no failed symbols to reprocess");
            return Ok(());
        }

        info!(pairs = pairs.len(), "reprocessing failed symbol pairs");
        failure_log.truncate()?;

        for (symbol, freq) in pairs {
            info!(symbol, freq = %freq, "reprocessing");
            if let Err(err) = self.update_symbol(store, failure_log, &symbol, freq).await {
                error!(symbol, freq = %freq, %err, "reprocess failed");
                failure_log.append_error(&symbol, freq, &err.to_string())?;
            }
        }
        Ok(())
    }
}

fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}
