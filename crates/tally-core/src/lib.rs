//! Core contracts for tally.
//!
//! This crate contains:
//! - Canonical domain records and numeric cleaning
//! - The rate-limited transport and HTTP client seam
//! - Retrying sub-resource fetch, API parsing, and page extraction
//! - Company-level orchestration and the batch driver
//! - The OHLCV market-data updater

pub mod aggregate;
pub mod api;
pub mod batch;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod http;
pub mod market;
pub mod orchestrator;
pub mod page;
pub mod retry;
pub mod transport;

pub use aggregate::{fetch_api_bundle, ApiBundle};
pub use api::{
    chart_url, parse_chart, parse_peers, parse_schedule, peers_url, schedule_url, ParseError,
};
pub use batch::{read_url_list, run_batch, BatchConfig, BatchSummary, CompanyStore};
pub use domain::{
    maybe_number, maybe_number_text, parse_numeric_value, period_to_date, Analysis, ChartKey,
    CompanyPayload, CompanyRef, Frequency, PeerTable, PeriodRecord, ScheduleKey, StatementSection,
    UtcDateTime,
};
pub use error::{CoreError, FetchError};
pub use fetch::fetch_with_retries;
pub use http::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};
pub use market::{
    decide_date_range, BarStore, FailureLog, MarketError, MarketUpdater, OhlcvBar, OhlcvProvider,
    ProviderError, UpdaterConfig, YahooConfig, YahooProvider,
};
pub use orchestrator::{ScrapeOutcome, ScrapePolicy, Scraper};
pub use page::{parse_company_page, CompanyPage, HtmlPageExtractor, PageExtractor};
pub use retry::{classify_status, RetryPolicy, StatusClass};
pub use tally_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
pub use transport::{RequestQuota, Transport, TransportConfig};
