//! Behavior tests for company-level orchestration and the batch driver.
//!
//! These cover the whole-company retry loop (unrecoverable pages short-circuit,
//! incomplete payloads burn the attempt budget, the best payload survives) and
//! the batch guarantee that every URL resolves to exactly one persisted effect.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tally_core::{
    read_url_list, run_batch, Analysis, BatchConfig, CompanyPage, CompanyPayload, CompanyRef,
    CompanyStore, CoreError, FetchError, HttpClient, HttpError, HttpRequest, HttpResponse,
    NoopHttpClient, PageExtractor, ScrapeOutcome, ScrapePolicy, Scraper, Transport,
    TransportConfig,
};

const PAGE_BODY: &str = r#"
<html><body>
  <div id="company-info" data-company-id="12345" data-warehouse-id="987">
    <h1>Acme Industries Ltd</h1>
  </div>
</body></html>
"#;

const CHART_BODY: &str =
    r#"{"datasets":[{"metric":"Price","values":[["2024-01-01",100.0]]}]}"#;
const SCHEDULE_BODY: &str = r#"{"Sales":{"Mar 2024":"1,000"}}"#;
const PEERS_BODY: &str = "Name\tP/E\nAcme Ltd\t10.5\n";

/// Serves a full healthy company: page, charts, schedules, peers.
struct HealthyUpstream {
    page_status: u16,
    requests: AtomicUsize,
}

impl HealthyUpstream {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            page_status: 200,
            requests: AtomicUsize::new(0),
        })
    }

    fn with_page_status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            page_status: status,
            requests: AtomicUsize::new(0),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl HttpClient for HealthyUpstream {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let response = if request.url.contains("/chart/") {
                HttpResponse::ok(CHART_BODY)
            } else if request.url.contains("/schedules/") {
                HttpResponse::ok(SCHEDULE_BODY)
            } else if request.url.contains("/peers/") {
                HttpResponse::ok(PEERS_BODY)
            } else if self.page_status == 200 {
                HttpResponse::ok(PAGE_BODY)
            } else {
                HttpResponse::status_only(self.page_status)
            };
            Ok(response)
        })
    }
}

/// Extractor seam double: hands back a fixed page or a fixed error, counting
/// calls.
struct ScriptedExtractor {
    result: Result<CompanyPage, u16>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    fn page_without_ids() -> Arc<Self> {
        Arc::new(Self {
            result: Ok(CompanyPage {
                meta: CompanyRef::unknown("https://upstream.test/company/UNKNOWN/"),
                summary: BTreeMap::new(),
                quick_ratios: BTreeMap::new(),
                tables: BTreeMap::new(),
                analysis: Analysis::default(),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing_with_status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            result: Err(status),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageExtractor for ScriptedExtractor {
    fn extract<'a>(
        &'a self,
        _url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CompanyPage, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(page) => Ok(page.clone()),
                Err(status) => Err(FetchError::Status { status: *status }),
            }
        })
    }
}

fn quick_policy(max_attempts: u32) -> ScrapePolicy {
    ScrapePolicy {
        max_attempts,
        delay_between_attempts: Duration::from_millis(10),
        ..ScrapePolicy::default()
    }
}

fn noop_transport() -> Transport {
    Transport::new(Arc::new(NoopHttpClient), TransportConfig::default())
}

// =============================================================================
// Company retry loop
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_the_page_and_api_are_healthy_the_outcome_is_complete() {
    // Given: a fully healthy upstream
    let client = HealthyUpstream::new();
    let transport = Transport::new(
        Arc::clone(&client) as Arc<dyn HttpClient>,
        TransportConfig::default(),
    );
    let scraper = Scraper::new(transport, quick_policy(5));

    // When: one company is scraped
    let started = tokio::time::Instant::now();
    let outcome = scraper
        .scrape_company("https://upstream.test/company/ACME/")
        .await;

    // Then: the payload is complete on the first attempt, with no retry sleep
    assert_eq!(started.elapsed(), Duration::ZERO);
    let ScrapeOutcome::Complete(payload) = outcome else {
        panic!("expected a complete payload");
    };
    assert_eq!(payload.meta.company_id.as_deref(), Some("12345"));
    assert_eq!(payload.meta.warehouse_id.as_deref(), Some("987"));
    assert!(payload.missing_schedules().is_empty());
    assert!(payload.peers.is_some());
    // page + 6 charts + 16 schedules + peers, no retries
    assert_eq!(client.request_count(), 24);
}

#[tokio::test(start_paused = true)]
async fn when_the_page_is_gone_no_attempt_budget_is_spent() {
    // Given: a company page that 404s
    let client = HealthyUpstream::with_page_status(404);
    let transport = Transport::new(
        Arc::clone(&client) as Arc<dyn HttpClient>,
        TransportConfig::default(),
    );
    let scraper = Scraper::new(transport, quick_policy(5));

    // When: the company is scraped
    let outcome = scraper
        .scrape_company("https://upstream.test/company/GONE/")
        .await;

    // Then: one request, immediately unrecoverable
    assert!(matches!(outcome, ScrapeOutcome::Unrecoverable { .. }));
    assert_eq!(client.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_schedules_stay_missing_the_best_payload_survives_as_degraded() {
    // Given: pages that never expose the identifier pair, so the API side
    // stays empty on every attempt
    let extractor = ScriptedExtractor::page_without_ids();
    let scraper = Scraper::new(noop_transport(), quick_policy(3))
        .with_extractor(Arc::clone(&extractor) as Arc<dyn PageExtractor>);

    // When: the attempt budget is spent
    let outcome = scraper
        .scrape_company("https://upstream.test/company/UNKNOWN/")
        .await;

    // Then: three attempts ran and the degraded payload names what is missing
    assert_eq!(extractor.call_count(), 3);
    let ScrapeOutcome::Degraded { payload, missing } = outcome else {
        panic!("expected a degraded payload");
    };
    assert_eq!(missing.len(), 16);
    assert!(payload.meta.company_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn when_every_attempt_fails_transiently_the_outcome_is_exhausted() {
    // Given: a page that 503s forever
    let extractor = ScriptedExtractor::failing_with_status(503);
    let scraper = Scraper::new(noop_transport(), quick_policy(4))
        .with_extractor(Arc::clone(&extractor) as Arc<dyn PageExtractor>);

    // When: the company is scraped
    let outcome = scraper
        .scrape_company("https://upstream.test/company/FLAKY/")
        .await;

    // Then: the full budget was used and no payload was invented
    assert_eq!(extractor.call_count(), 4);
    let ScrapeOutcome::ExhaustedRetries { reason } = outcome else {
        panic!("expected exhausted retries");
    };
    assert!(reason.contains("503"), "reason was: {reason}");
}

// =============================================================================
// Batch driver: one persisted effect per URL
// =============================================================================

/// Records which persistence calls happened, in order.
#[derive(Default)]
struct RecordingStore {
    effects: Mutex<Vec<String>>,
}

impl RecordingStore {
    fn effects(&self) -> Vec<String> {
        self.effects.lock().expect("lock").clone()
    }

    fn push(&self, effect: String) {
        self.effects.lock().expect("lock").push(effect);
    }
}

impl CompanyStore for RecordingStore {
    fn upsert_company(&self, payload: &CompanyPayload) -> Result<(), CoreError> {
        self.push(format!("upsert:{}", payload.meta.source_url));
        Ok(())
    }

    fn store_raw_payload(&self, payload: &CompanyPayload) -> Result<(), CoreError> {
        self.push(format!("raw:{}", payload.meta.source_url));
        Ok(())
    }

    fn mark_failed(&self, _id: Option<&str>, url: &str, _reason: &str) -> Result<(), CoreError> {
        self.push(format!("failed:{url}"));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn when_a_batch_of_healthy_companies_runs_every_payload_is_stored() {
    // Given: two healthy companies and a recording store
    let client = HealthyUpstream::new();
    let transport = Transport::new(
        Arc::clone(&client) as Arc<dyn HttpClient>,
        TransportConfig::default(),
    );
    let scraper = Scraper::new(transport, quick_policy(2));
    let store = Arc::new(RecordingStore::default());

    // When: the batch runs
    let summary = run_batch(
        scraper,
        Arc::clone(&store) as Arc<dyn CompanyStore>,
        vec![
            String::from("https://upstream.test/company/ONE/"),
            String::from("https://upstream.test/company/TWO/"),
        ],
        BatchConfig {
            concurrency: 2,
            politeness_delay: Duration::from_millis(10),
        },
    )
    .await;

    // Then: both companies stored a payload and nothing was marked failed
    assert_eq!(summary.complete, 2);
    assert_eq!(summary.failed, 0);
    let effects = store.effects();
    assert_eq!(effects.iter().filter(|e| e.starts_with("raw:")).count(), 2);
    assert!(effects.iter().all(|e| !e.starts_with("failed:")));
}

#[tokio::test(start_paused = true)]
async fn when_companies_fail_terminally_each_gets_one_failure_record() {
    // Given: every page 404s
    let client = HealthyUpstream::with_page_status(404);
    let transport = Transport::new(
        Arc::clone(&client) as Arc<dyn HttpClient>,
        TransportConfig::default(),
    );
    let scraper = Scraper::new(transport, quick_policy(2));
    let store = Arc::new(RecordingStore::default());

    // When: the batch runs
    let summary = run_batch(
        scraper,
        Arc::clone(&store) as Arc<dyn CompanyStore>,
        vec![
            String::from("https://upstream.test/company/GONE/"),
            String::from("https://upstream.test/company/ALSO-GONE/"),
        ],
        BatchConfig {
            concurrency: 2,
            politeness_delay: Duration::from_millis(10),
        },
    )
    .await;

    // Then: exactly one failure record per company, no payloads
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.complete, 0);
    let effects = store.effects();
    assert_eq!(effects.len(), 2);
    assert!(effects.iter().all(|e| e.starts_with("failed:")));
}

// =============================================================================
// Input list
// =============================================================================

#[test]
fn when_the_input_list_has_urls_blank_cells_are_skipped() {
    // Given: a CSV with a source_url column and one blank row
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("companies.csv");
    std::fs::write(
        &path,
        "name,source_url\nAcme,https://upstream.test/company/ACME/\nBlank,\nBeta, https://upstream.test/company/BETA/ \n",
    )
    .expect("write csv");

    // When: the list is read
    let urls = read_url_list(&path).expect("readable list");

    // Then: blanks vanish and whitespace is trimmed
    assert_eq!(
        urls,
        vec![
            String::from("https://upstream.test/company/ACME/"),
            String::from("https://upstream.test/company/BETA/"),
        ]
    );
}

#[test]
fn when_the_input_list_lacks_the_url_column_reading_fails() {
    // Given: a CSV without a source_url column
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("companies.csv");
    std::fs::write(&path, "name,homepage\nAcme,https://acme.test/\n").expect("write csv");

    // When / Then: reading names the missing column
    let error = read_url_list(&path).expect_err("missing column should fail");
    assert!(matches!(
        error,
        CoreError::MissingColumn {
            column: "source_url"
        }
    ));
}
