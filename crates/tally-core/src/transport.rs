//! Rate-limited transport: the single point of concurrency control against
//! the upstream site.
//!
//! Every outbound request, from every company and every sub-resource,
//! acquires one permit from a shared counting semaphore before it is issued
//! and releases it unconditionally afterward. An optional request-per-window
//! quota sits behind the semaphore as a second politeness control.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;

use crate::http::{HttpClient, HttpError, HttpRequest, HttpResponse};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Transport tuning. Defaults are deliberately conservative; the upstream
/// throttles aggressively.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum outbound requests in flight at once, shared across all
    /// companies and sub-resources.
    pub max_in_flight: usize,
    /// Optional request quota: at most `limit` requests per `window`.
    pub quota: Option<RequestQuota>,
    pub request_timeout: Duration,
    /// Default headers attached to every request.
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestQuota {
    pub window: Duration,
    pub limit: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            String::from("user-agent"),
            String::from("Mozilla/5.0 (compatible; tally/0.1)"),
        );
        headers.insert(
            String::from("accept"),
            String::from("text/html,application/json"),
        );
        Self {
            max_in_flight: 2,
            quota: None,
            request_timeout: Duration::from_secs(15),
            headers,
        }
    }
}

/// Shared transport handle. Cheap to clone; all clones share the same permit
/// pool and quota.
#[derive(Clone)]
pub struct Transport {
    client: Arc<dyn HttpClient>,
    permits: Arc<Semaphore>,
    limiter: Option<Arc<DirectRateLimiter>>,
    config: Arc<TransportConfig>,
}

impl Transport {
    pub fn new(client: Arc<dyn HttpClient>, config: TransportConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        let limiter = config.quota.map(|quota| Arc::new(quota_limiter(quota)));
        Self {
            client,
            permits,
            limiter,
            config: Arc::new(config),
        }
    }

    /// Issue one GET under the shared permit. The permit is held for the full
    /// request (including body read) and released on success, error, and
    /// timeout alike; the wait suspends only this task.
    pub async fn fetch(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| HttpError::new("transport permit pool closed"))?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let mut request =
            HttpRequest::get(url).with_timeout_ms(self.config.request_timeout.as_millis() as u64);
        for (name, value) in &self.config.headers {
            request = request.with_header(name.clone(), value.clone());
        }

        self.client.execute(request).await
    }

    pub fn max_in_flight(&self) -> usize {
        self.config.max_in_flight.max(1)
    }
}

fn quota_limiter(quota: RequestQuota) -> DirectRateLimiter {
    let limit = NonZeroU32::new(quota.limit.max(1)).expect("limit is clamped to >= 1");
    let seconds_per_cell = (quota.window.as_secs_f64() / f64::from(limit.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);
    RateLimiter::direct(
        Quota::with_period(period)
            .expect("period is always greater than zero")
            .allow_burst(limit),
    )
}
