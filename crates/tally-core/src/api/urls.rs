//! URL building for the three upstream endpoint families. Pure functions;
//! the rest of the core treats these as a lookup table.

use crate::domain::{ChartKey, ScheduleKey};

const BASE: &str = "https://www.screener.in/api/company";

/// Chart series URL: several metrics joined with `-` into one `q=` query.
pub fn chart_url(company_id: &str, key: ChartKey, days: u32, consolidated: bool) -> String {
    let metrics = key.metrics().join("-");
    format!(
        "{BASE}/{company_id}/chart/?q={q}&days={days}&consolidated={consolidated}",
        q = urlencoding::encode(&metrics),
    )
}

/// Schedule series URL for one parent row of a statement section.
pub fn schedule_url(company_id: &str, key: ScheduleKey, consolidated: bool) -> String {
    format!(
        "{BASE}/{company_id}/schedules/?parent={parent}&section={section}&consolidated={consolidated}",
        parent = urlencoding::encode(key.parent()),
        section = key.section().api_segment(),
    )
}

/// Peer table URL; addressed by the warehouse id, not the company id.
pub fn peers_url(warehouse_id: &str) -> String {
    format!("{BASE}/{warehouse_id}/peers/")
}
