use tracing::info;

use tally_core::Warehouse;

use crate::error::CliError;

/// Opening the warehouse already applies migrations; this just reports where
/// the file ended up.
pub fn run(warehouse: &Warehouse) -> Result<(), CliError> {
    info!(path = %warehouse.db_path().display(), "warehouse ready");
    Ok(())
}
