//! Batch driver: fan a URL list through the scraper under an entity-level
//! concurrency cap and persist each outcome.
//!
//! The entity semaphore is independent of the transport permit pool: this one
//! bounds how many companies are in flight, the transport bounds how many
//! HTTP requests are. Persistence failures are logged and never abort the
//! batch; the only error that propagates is an unreadable input list.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::domain::CompanyPayload;
use crate::error::CoreError;
use crate::orchestrator::{ScrapeOutcome, Scraper};

/// Persistence seam for scrape outcomes. Implemented by the warehouse,
/// mocked in tests.
pub trait CompanyStore: Send + Sync {
    fn upsert_company(&self, payload: &CompanyPayload) -> Result<(), CoreError>;
    fn store_raw_payload(&self, payload: &CompanyPayload) -> Result<(), CoreError>;
    fn mark_failed(
        &self,
        company_id: Option<&str>,
        url: &str,
        reason: &str,
    ) -> Result<(), CoreError>;
}

impl CompanyStore for tally_warehouse::Warehouse {
    fn upsert_company(&self, payload: &CompanyPayload) -> Result<(), CoreError> {
        // A payload without a company id still gets its raw JSON stored, but
        // there is no row to upsert.
        let Some(company_id) = payload.meta.company_id.as_deref() else {
            return Ok(());
        };
        tally_warehouse::Warehouse::upsert_company(
            self,
            company_id,
            payload.meta.warehouse_id.as_deref(),
            payload.meta.company_name.as_deref(),
            &payload.meta.source_url,
        )?;
        Ok(())
    }

    fn store_raw_payload(&self, payload: &CompanyPayload) -> Result<(), CoreError> {
        let json = serde_json::to_string(payload)?;
        tally_warehouse::Warehouse::store_raw_payload(
            self,
            payload.meta.company_id.as_deref(),
            &payload.meta.source_url,
            &payload.scraped_at.format_rfc3339(),
            &json,
        )?;
        Ok(())
    }

    fn mark_failed(
        &self,
        company_id: Option<&str>,
        url: &str,
        reason: &str,
    ) -> Result<(), CoreError> {
        tally_warehouse::Warehouse::mark_failed(self, company_id, url, reason)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Companies in flight at once.
    pub concurrency: usize,
    /// Pause after each company while still holding its permit, to space out
    /// bursts against the upstream.
    pub politeness_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            politeness_delay: Duration::from_secs(2),
        }
    }
}

/// Per-run tally of terminal outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub complete: usize,
    pub degraded: usize,
    pub failed: usize,
}

/// Read the input list: a CSV with a `source_url` column. Blank cells are
/// skipped.
pub fn read_url_list(path: &Path) -> Result<Vec<String>, CoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|header| header == "source_url")
        .ok_or(CoreError::MissingColumn {
            column: "source_url",
        })?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(column) {
            let url = url.trim();
            if !url.is_empty() {
                urls.push(url.to_owned());
            }
        }
    }
    Ok(urls)
}

/// Scrape every URL, at most `config.concurrency` companies at a time.
///
/// Each company resolves to exactly one persisted effect: a stored payload
/// (complete or degraded) or one failure record. No cross-company ordering is
/// guaranteed.
pub async fn run_batch(
    scraper: Scraper,
    store: Arc<dyn CompanyStore>,
    urls: Vec<String>,
    config: BatchConfig,
) -> BatchSummary {
    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks: JoinSet<BatchSummary> = JoinSet::new();

    for url in urls {
        let permits = Arc::clone(&permits);
        let scraper = scraper.clone();
        let store = Arc::clone(&store);
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return BatchSummary::default();
            };
            let summary = scrape_and_store(&scraper, store.as_ref(), &url).await;
            tokio::time::sleep(config.politeness_delay).await;
            summary
        });
    }

    let mut total = BatchSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(summary) => {
                total.complete += summary.complete;
                total.degraded += summary.degraded;
                total.failed += summary.failed;
            }
            Err(error) => warn!(%error, "batch task aborted"),
        }
    }

    info!(
        complete = total.complete,
        degraded = total.degraded,
        failed = total.failed,
        "batch finished"
    );
    total
}

async fn scrape_and_store(scraper: &Scraper, store: &dyn CompanyStore, url: &str) -> BatchSummary {
    let mut summary = BatchSummary::default();
    match scraper.scrape_company(url).await {
        ScrapeOutcome::Complete(payload) => {
            persist_payload(store, url, &payload);
            summary.complete = 1;
        }
        ScrapeOutcome::Degraded { payload, missing } => {
            warn!(url, missing = missing.len(), "storing degraded payload");
            persist_payload(store, url, &payload);
            summary.degraded = 1;
        }
        ScrapeOutcome::Unrecoverable { reason }
        | ScrapeOutcome::ExhaustedRetries { reason } => {
            if let Err(error) = store.mark_failed(None, url, &reason) {
                warn!(url, %error, "failed to record company failure");
            }
            summary.failed = 1;
        }
    }
    summary
}

fn persist_payload(store: &dyn CompanyStore, url: &str, payload: &CompanyPayload) {
    if let Err(error) = store.upsert_company(payload) {
        warn!(url, %error, "failed to upsert company");
    }
    if let Err(error) = store.store_raw_payload(payload) {
        warn!(url, %error, "failed to store raw payload");
    }
}
