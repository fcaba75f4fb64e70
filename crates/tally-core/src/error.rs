use thiserror::Error;

use crate::http::HttpError;
use crate::retry::{classify_status, StatusClass};

/// Failure of one fetch step, carrying the HTTP status when there is one so
/// the orchestrator's unrecoverable predicate can classify it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http status {status}")]
    Status { status: u16 },

    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("malformed payload: {0}")]
    Parse(String),
}

impl FetchError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// 400/403/404 mean a bad or missing resource; retrying cannot help.
    /// Everything else (including transport errors) is treated as transient
    /// at the company level.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self.status().map(classify_status),
            Some(StatusClass::Unrecoverable)
        )
    }
}

/// Top-level error for core operations that are allowed to fail loudly
/// (batch setup, persistence). Per-fetch failures never surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("input list error: {0}")]
    InputList(#[from] csv::Error),

    #[error("input list has no '{column}' column")]
    MissingColumn { column: &'static str },

    #[error(transparent)]
    Warehouse(#[from] tally_warehouse::WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
