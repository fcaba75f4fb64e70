//! Failure classification and backoff policy for upstream responses.
//!
//! Classification is a pure function over the status code, not exception
//! introspection: the transient set is retried with exponential backoff (or a
//! server-supplied `Retry-After` override), the unrecoverable set is never
//! retried, and everything else fails the attempt outright.

use std::time::Duration;

/// What a status code means for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Rate limiting or upstream hiccup; retry with backoff.
    Transient,
    /// Bad, forbidden, or missing resource; retrying cannot help.
    Unrecoverable,
    /// Anything else; fail the attempt without retrying.
    Other,
}

pub const fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 | 500 | 502 | 503 | 504 => StatusClass::Transient,
        400 | 403 | 404 => StatusClass::Unrecoverable,
        _ => StatusClass::Other,
    }
}

/// Retry budget and backoff curve for one logical sub-resource fetch.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt. `retries_used` is 0-based, so the
    /// default policy yields 2s, 4s, 8s, 16s. A numeric `Retry-After` from
    /// the server overrides the curve.
    pub fn delay(&self, retries_used: u32, retry_after: Option<f64>) -> Duration {
        if let Some(seconds) = retry_after {
            if seconds.is_finite() && seconds >= 0.0 {
                return Duration::from_secs_f64(seconds);
            }
        }

        let scale = 2_f64.powi(retries_used as i32);
        Duration::from_secs_f64(self.base_backoff.as_secs_f64() * scale)
    }
}
