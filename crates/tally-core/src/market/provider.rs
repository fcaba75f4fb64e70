use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use time::Date;

use crate::domain::Frequency;
use crate::http::HttpError;
use crate::market::OhlcvBar;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("provider status {status}")]
    Status { status: u16 },

    #[error("malformed provider payload: {0}")]
    Malformed(String),

    #[error("provider rejected request: {0}")]
    Upstream(String),
}

/// Source of historical OHLCV bars.
///
/// `fetch_range` is inclusive on both ends and returns bars sorted by date
/// with no duplicates. Implementations own their chunking and per-chunk retry
/// behavior; callers see one flat series.
pub trait OhlcvProvider: Send + Sync {
    fn fetch_range<'a>(
        &'a self,
        symbol: &'a str,
        start: Date,
        end: Date,
        freq: Frequency,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<OhlcvBar>, ProviderError>> + Send + 'a>>;
}
