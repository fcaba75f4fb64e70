//! Company-level orchestration: one page fetch plus the full API bundle,
//! retried as a unit until the payload is complete.
//!
//! Sub-resource retries (429s on a single series) live in `fetch`; this layer
//! retries the whole company when the assembled payload is still missing
//! must-have schedules, which usually means the rate limiter ate a batch of
//! requests.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::aggregate::{fetch_api_bundle, ApiBundle};
use crate::domain::{CompanyPayload, ScheduleKey, UtcDateTime};
use crate::error::FetchError;
use crate::page::{HtmlPageExtractor, PageExtractor};
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Whole-company retry budget, separate from the per-request budget.
#[derive(Debug, Clone, Copy)]
pub struct ScrapePolicy {
    pub max_attempts: u32,
    pub delay_between_attempts: Duration,
    /// Per-request policy handed down to every sub-resource fetch.
    pub request_retry: RetryPolicy,
}

impl Default for ScrapePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_between_attempts: Duration::from_secs(30),
            request_retry: RetryPolicy::default(),
        }
    }
}

/// Terminal result of scraping one company. Every call to
/// [`Scraper::scrape_company`] resolves to exactly one of these.
///
/// `Degraded` carries the best payload assembled before the attempt budget ran
/// out; the caller stores it rather than throwing away the data, and the
/// missing keys say exactly what is absent. When the final attempt errors
/// outright, that payload is the one from the last attempt that produced one,
/// not from the failed attempt.
#[derive(Debug)]
pub enum ScrapeOutcome {
    Complete(Box<CompanyPayload>),
    Degraded {
        payload: Box<CompanyPayload>,
        missing: Vec<ScheduleKey>,
    },
    /// The page itself came back 400/403/404; no retry was attempted.
    Unrecoverable { reason: String },
    /// Every attempt failed before a payload could be assembled.
    ExhaustedRetries { reason: String },
}

/// One company scraper over a shared transport.
#[derive(Clone)]
pub struct Scraper {
    transport: Transport,
    extractor: Arc<dyn PageExtractor>,
    policy: ScrapePolicy,
}

impl Scraper {
    pub fn new(transport: Transport, policy: ScrapePolicy) -> Self {
        let extractor = Arc::new(HtmlPageExtractor::new(transport.clone()));
        Self {
            transport,
            extractor,
            policy,
        }
    }

    /// Substitute the page-extraction seam, keeping the transport for the API
    /// side.
    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Scrape one company URL to a terminal outcome.
    ///
    /// An unrecoverable page status fails immediately without using the
    /// attempt budget. Transient page failures and incomplete payloads both
    /// wait `delay_between_attempts` and retry the whole company from scratch;
    /// each attempt's bundle fully replaces the previous one.
    pub async fn scrape_company(&self, url: &str) -> ScrapeOutcome {
        let mut last_error: Option<FetchError> = None;
        let mut last_payload: Option<CompanyPayload> = None;

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            info!(url, attempt, max_attempts, "scraping company");

            let payload = match self.attempt(url).await {
                Ok(payload) => payload,
                Err(error) => {
                    if error.is_unrecoverable() {
                        warn!(url, %error, "unrecoverable page status, not retrying");
                        return ScrapeOutcome::Unrecoverable {
                            reason: format!("unrecoverable: {error}"),
                        };
                    }
                    warn!(url, %error, attempt, "company attempt failed");
                    last_error = Some(error);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.delay_between_attempts).await;
                    }
                    continue;
                }
            };

            let missing = payload.missing_schedules();
            if missing.is_empty() {
                info!(url, "scraped with all important schedules");
                return ScrapeOutcome::Complete(Box::new(payload));
            }

            warn!(
                url,
                attempt,
                missing = missing.len(),
                "important schedules missing, retrying company"
            );
            last_payload = Some(payload);
            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay_between_attempts).await;
            }
        }

        match (last_payload, last_error) {
            (Some(payload), _) => {
                let missing = payload.missing_schedules();
                warn!(
                    url,
                    missing = missing.len(),
                    "attempt budget exhausted, keeping degraded payload"
                );
                ScrapeOutcome::Degraded {
                    payload: Box::new(payload),
                    missing,
                }
            }
            (None, Some(error)) => ScrapeOutcome::ExhaustedRetries {
                reason: format!("fetch failed after all attempts: {error}"),
            },
            (None, None) => ScrapeOutcome::ExhaustedRetries {
                reason: String::from("unknown failure after all attempts"),
            },
        }
    }

    /// One full attempt: page extraction, API fan-out, assembly.
    async fn attempt(&self, url: &str) -> Result<CompanyPayload, FetchError> {
        let page = self.extractor.extract(url).await?;

        let bundle = match page.meta.company_id.as_deref() {
            Some(company_id) => {
                fetch_api_bundle(
                    &self.transport,
                    company_id,
                    page.meta.warehouse_id.as_deref(),
                    self.policy.request_retry,
                )
                .await
            }
            // No identifier pair on the page: keep the page data, leave the
            // API side empty so the missing-schedule check drives the retry.
            None => {
                warn!(url, "page carries no company id, skipping api bundle");
                ApiBundle::empty_shaped()
            }
        };

        Ok(CompanyPayload {
            meta: page.meta,
            scraped_at: UtcDateTime::now(),
            summary: page.summary,
            tables: page.tables,
            analysis: page.analysis,
            charts: bundle.charts,
            schedules: bundle.schedules,
            peers: bundle.peers,
            quick_ratios: page.quick_ratios,
        })
    }
}
