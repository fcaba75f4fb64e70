//! Concurrent API aggregation for one company.
//!
//! Fans out every chart and schedule series (plus the peer table when a
//! warehouse id is known) through the shared transport, then folds the results
//! into one bundle with a stable shape.

use std::collections::BTreeMap;

use tokio::task::JoinSet;
use tracing::warn;

use crate::api::{chart_url, parse_chart, parse_peers, parse_schedule, peers_url, schedule_url};
use crate::domain::{ChartKey, PeerTable, PeriodRecord, ScheduleKey};
use crate::fetch::fetch_with_retries;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Ten years of daily chart history.
const CHART_DAYS: u32 = 3652;

/// The aggregated API surface for one company.
///
/// `schedules` always contains every [`ScheduleKey`]; series that failed or
/// came back empty are present with an empty vec, so the bundle's shape is
/// identical for every company.
#[derive(Debug, Clone, Default)]
pub struct ApiBundle {
    pub charts: BTreeMap<ChartKey, Vec<PeriodRecord>>,
    pub schedules: BTreeMap<ScheduleKey, Vec<PeriodRecord>>,
    pub peers: Option<PeerTable>,
}

impl ApiBundle {
    /// A bundle with the stable shape and no data: every schedule key mapped
    /// to an empty series.
    pub fn empty_shaped() -> Self {
        let mut bundle = Self::default();
        for key in ScheduleKey::ALL {
            bundle.schedules.insert(key, Vec::new());
        }
        bundle
    }
}

enum Fetched {
    Chart(ChartKey, Vec<PeriodRecord>),
    Schedule(ScheduleKey, Vec<PeriodRecord>),
    Peers(PeerTable),
}

/// Fetch every API sub-resource for one company concurrently.
///
/// Concurrency is bounded by the transport, not here: all sub-resources are
/// spawned at once and queue on the shared permit pool. Individual failures
/// resolve to empty series inside [`fetch_with_retries`], so this always
/// returns a complete-shaped bundle.
pub async fn fetch_api_bundle(
    transport: &Transport,
    company_id: &str,
    warehouse_id: Option<&str>,
    policy: RetryPolicy,
) -> ApiBundle {
    let mut bundle = ApiBundle::empty_shaped();

    let mut tasks: JoinSet<Fetched> = JoinSet::new();

    for key in ChartKey::ALL {
        let transport = transport.clone();
        let url = chart_url(company_id, key, CHART_DAYS, true);
        tasks.spawn(async move {
            let records =
                fetch_with_retries(&transport, key.as_str(), &url, policy, parse_chart).await;
            Fetched::Chart(key, records)
        });
    }

    for key in ScheduleKey::ALL {
        let transport = transport.clone();
        let url = schedule_url(company_id, key, true);
        let percent_to_fraction = key.section().percent_to_fraction();
        tasks.spawn(async move {
            let records = fetch_with_retries(&transport, key.as_str(), &url, policy, |body| {
                parse_schedule(body, percent_to_fraction)
            })
            .await;
            Fetched::Schedule(key, records)
        });
    }

    if let Some(warehouse_id) = warehouse_id {
        let transport = transport.clone();
        let url = peers_url(warehouse_id);
        tasks.spawn(async move {
            let peers = fetch_with_retries(&transport, "peers", &url, policy, parse_peers).await;
            Fetched::Peers(peers)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Fetched::Chart(key, records)) => {
                bundle.charts.insert(key, records);
            }
            Ok(Fetched::Schedule(key, records)) => {
                bundle.schedules.insert(key, records);
            }
            Ok(Fetched::Peers(peers)) => {
                bundle.peers = Some(peers);
            }
            Err(error) => warn!(company_id, %error, "sub-resource task aborted"),
        }
    }

    bundle
}
