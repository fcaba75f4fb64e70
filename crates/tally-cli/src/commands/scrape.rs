use std::path::Path;
use std::sync::Arc;

use tracing::info;

use tally_core::{
    read_url_list, run_batch, BatchConfig, HttpClient, ReqwestHttpClient, RequestQuota,
    ScrapePolicy, Scraper, Transport, TransportConfig, Warehouse,
};

use crate::error::CliError;

pub async fn run(
    warehouse: Warehouse,
    input: &Path,
    concurrency: usize,
    max_in_flight: usize,
    requests_per_minute: Option<u32>,
) -> Result<(), CliError> {
    let urls = read_url_list(input)?;
    if urls.is_empty() {
        return Err(CliError::Input(format!(
            "no source urls found in {}",
            input.display()
        )));
    }
    info!(companies = urls.len(), "starting scrape batch");

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let quota = requests_per_minute.map(|limit| RequestQuota {
        window: std::time::Duration::from_secs(60),
        limit,
    });
    let transport = Transport::new(
        client,
        TransportConfig {
            max_in_flight,
            quota,
            ..TransportConfig::default()
        },
    );
    let scraper = Scraper::new(transport, ScrapePolicy::default());
    let config = BatchConfig {
        concurrency,
        ..BatchConfig::default()
    };

    let summary = run_batch(scraper, Arc::new(warehouse), urls, config).await;
    info!(
        complete = summary.complete,
        degraded = summary.degraded,
        failed = summary.failed,
        "scrape batch done"
    );
    Ok(())
}
