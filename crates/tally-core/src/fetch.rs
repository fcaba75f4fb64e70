//! Retrying sub-resource fetcher.
//!
//! Chart, schedule, and peer fetches all run through [`fetch_with_retries`]:
//! transient statuses are retried on the policy's backoff curve, everything
//! else fails the sub-resource immediately, and a failed sub-resource resolves
//! to its empty default so one bad series never sinks the whole company.

use tracing::warn;

use crate::api::ParseError;
use crate::retry::{classify_status, RetryPolicy, StatusClass};
use crate::transport::Transport;

/// Fetch `url` and parse its body, retrying transient failures.
///
/// Retries happen only for the transient status set, up to the policy's
/// budget, waiting `policy.delay` between attempts (a numeric `Retry-After`
/// header overrides the curve). Transport errors, parse errors, unrecoverable
/// statuses, and an exhausted budget all resolve to `T::default()` after a
/// warning; this function never fails its caller.
pub async fn fetch_with_retries<T, F>(
    transport: &Transport,
    label: &str,
    url: &str,
    policy: RetryPolicy,
    parse: F,
) -> T
where
    T: Default,
    F: Fn(&str) -> Result<T, ParseError>,
{
    let mut retries_used = 0;
    loop {
        let response = match transport.fetch(url).await {
            Ok(response) => response,
            Err(error) => {
                warn!(label, url, %error, "sub-resource fetch failed");
                return T::default();
            }
        };

        match classify_status(response.status) {
            StatusClass::Success => match parse(&response.body) {
                Ok(parsed) => return parsed,
                Err(error) => {
                    warn!(label, url, %error, "sub-resource payload rejected");
                    return T::default();
                }
            },
            StatusClass::Transient if retries_used < policy.max_retries => {
                let delay = policy.delay(retries_used, response.retry_after);
                retries_used += 1;
                warn!(
                    label,
                    status = response.status,
                    delay_secs = delay.as_secs_f64(),
                    attempt = retries_used,
                    "transient upstream status, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            _ => {
                warn!(
                    label,
                    url,
                    status = response.status,
                    "sub-resource fetch gave up"
                );
                return T::default();
            }
        }
    }
}
