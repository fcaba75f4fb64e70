use std::path::Path;
use std::sync::Arc;

use tally_core::{
    FailureLog, HttpClient, MarketUpdater, ReqwestHttpClient, UpdaterConfig, Warehouse,
    YahooConfig, YahooProvider,
};

use crate::error::CliError;

pub async fn run(warehouse: &Warehouse, failure_log: &Path) -> Result<(), CliError> {
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let provider = Arc::new(YahooProvider::new(client, YahooConfig::default()));
    let updater = MarketUpdater::new(provider, UpdaterConfig::default());
    let log = FailureLog::new(failure_log);

    updater.reprocess_failed(warehouse, &log).await?;
    Ok(())
}
