use std::path::Path;
use std::sync::Arc;

use tracing::info;

use tally_core::{
    FailureLog, Frequency, HttpClient, MarketUpdater, ReqwestHttpClient, UpdaterConfig, Warehouse,
    YahooConfig, YahooProvider,
};

use crate::error::CliError;

pub async fn run(warehouse: &Warehouse, freq: Frequency, failure_log: &Path) -> Result<(), CliError> {
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let provider = Arc::new(YahooProvider::new(client, YahooConfig::default()));
    let updater = MarketUpdater::new(provider, UpdaterConfig::default());
    let log = FailureLog::new(failure_log);

    info!(freq = %freq, "updating all instruments");
    updater.update_all(warehouse, &log, freq).await?;
    Ok(())
}
