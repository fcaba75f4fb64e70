use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Core(#[from] tally_core::CoreError),

    #[error(transparent)]
    Warehouse(#[from] tally_core::WarehouseError),

    #[error(transparent)]
    Market(#[from] tally_core::MarketError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Input(_) => 2,
            Self::Core(_) | Self::Warehouse(_) | Self::Market(_) | Self::Io(_) => 10,
        }
    }
}
