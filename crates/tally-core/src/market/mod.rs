//! OHLCV market-data pipeline: provider seam, incremental updater, and the
//! append-only failure log with its reprocessing pass.
//!
//! This side of the crate is independent of the company scraper; the two
//! share only the warehouse and the HTTP client seam.

mod failure_log;
mod provider;
mod updater;
mod yahoo;

use thiserror::Error;
use time::Date;

use crate::error::CoreError;

pub use failure_log::FailureLog;
pub use provider::{OhlcvProvider, ProviderError};
pub use updater::{decide_date_range, BarStore, MarketUpdater, UpdaterConfig};
pub use yahoo::{YahooConfig, YahooProvider};

/// One OHLCV bar. For weekly bars `date` is the bar's start date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OhlcvBar {
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Failure of one market-data operation. Per-symbol errors are caught by the
/// batch loop and turned into failure-log lines.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] CoreError),

    #[error("failure log error: {0}")]
    FailureLog(#[from] std::io::Error),
}
