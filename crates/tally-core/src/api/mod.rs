//! Upstream API surface: URL building and payload normalization for the
//! chart, schedule, and peer-table endpoint families.

mod chart;
mod peers;
mod schedule;
mod urls;

use thiserror::Error;

pub use chart::parse_chart;
pub use peers::parse_peers;
pub use schedule::parse_schedule;
pub use urls::{chart_url, peers_url, schedule_url};

/// A payload whose shape did not match the endpoint contract. Always handled
/// at the single sub-resource that produced it, never propagated further.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed payload: {0}")]
pub struct ParseError(pub String);
