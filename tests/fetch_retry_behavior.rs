//! Behavior tests for the retrying sub-resource fetcher.
//!
//! These verify HOW one sub-resource fetch behaves against a scripted
//! upstream: which statuses are retried, how the backoff is chosen, and the
//! guarantee that a sub-resource failure resolves to an empty default instead
//! of an error.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tally_core::{
    fetch_with_retries, HttpClient, HttpError, HttpRequest, HttpResponse, ParseError, RetryPolicy,
    Transport, TransportConfig,
};

/// Replays a scripted sequence of responses and records every request URL.
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }
}

impl HttpClient for ScriptedClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests.lock().expect("lock").push(request.url);
            self.responses
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::status_only(404)))
        })
    }
}

fn transport_over(client: Arc<ScriptedClient>) -> Transport {
    Transport::new(client, TransportConfig::default())
}

fn parse_body(body: &str) -> Result<String, ParseError> {
    Ok(body.to_owned())
}

// =============================================================================
// Transient statuses: retried on the backoff curve
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_transient_statuses_clear_up_the_parsed_value_comes_back() {
    // Given: an upstream that rate-limits twice before answering
    let client = ScriptedClient::new(vec![
        Ok(HttpResponse::status_only(429)),
        Ok(HttpResponse::status_only(503)),
        Ok(HttpResponse::ok("pong")),
    ]);
    let transport = transport_over(Arc::clone(&client));

    // When: one sub-resource is fetched
    let result: String = fetch_with_retries(
        &transport,
        "series",
        "https://upstream.test/series",
        RetryPolicy::default(),
        parse_body,
    )
    .await;

    // Then: the eventual body is parsed and all three attempts were made
    assert_eq!(result, "pong");
    assert_eq!(client.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn when_the_retry_budget_runs_out_the_default_is_returned() {
    // Given: an upstream that never stops rate limiting
    let client = ScriptedClient::new(vec![
        Ok(HttpResponse::status_only(429)),
        Ok(HttpResponse::status_only(429)),
        Ok(HttpResponse::status_only(429)),
        Ok(HttpResponse::status_only(429)),
        Ok(HttpResponse::status_only(429)),
    ]);
    let transport = transport_over(Arc::clone(&client));

    // When: the default policy (4 retries) is spent
    let result: String = fetch_with_retries(
        &transport,
        "series",
        "https://upstream.test/series",
        RetryPolicy::default(),
        parse_body,
    )
    .await;

    // Then: the value is the empty default after exactly 5 attempts
    assert_eq!(result, String::default());
    assert_eq!(client.request_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn when_retry_after_is_present_it_overrides_the_backoff_curve() {
    // Given: a 429 carrying Retry-After: 5 where the curve would wait 2s
    let client = ScriptedClient::new(vec![
        Ok(HttpResponse::status_only(429).with_retry_after(5.0)),
        Ok(HttpResponse::ok("pong")),
    ]);
    let transport = transport_over(Arc::clone(&client));

    // When: the fetch runs under a paused clock
    let started = tokio::time::Instant::now();
    let result: String = fetch_with_retries(
        &transport,
        "series",
        "https://upstream.test/series",
        RetryPolicy::default(),
        parse_body,
    )
    .await;

    // Then: the wait was the server's 5 seconds, not the curve's 2
    assert_eq!(result, "pong");
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(5), "waited {waited:?}");
    assert!(waited < Duration::from_secs(6), "waited {waited:?}");
}

// =============================================================================
// Everything else: one attempt, then the empty default
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_the_resource_is_gone_no_retry_is_attempted() {
    // Given: an upstream that 404s
    let client = ScriptedClient::new(vec![Ok(HttpResponse::status_only(404))]);
    let transport = transport_over(Arc::clone(&client));

    // When: the sub-resource is fetched
    let result: String = fetch_with_retries(
        &transport,
        "series",
        "https://upstream.test/series",
        RetryPolicy::default(),
        parse_body,
    )
    .await;

    // Then: one attempt, empty default
    assert_eq!(result, String::default());
    assert_eq!(client.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_the_status_is_unclassified_the_attempt_fails_outright() {
    // Given: a redirect status outside both retry sets
    let client = ScriptedClient::new(vec![Ok(HttpResponse::status_only(301))]);
    let transport = transport_over(Arc::clone(&client));

    let result: String = fetch_with_retries(
        &transport,
        "series",
        "https://upstream.test/series",
        RetryPolicy::default(),
        parse_body,
    )
    .await;

    assert_eq!(result, String::default());
    assert_eq!(client.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_the_transport_itself_fails_the_sub_resource_resolves_empty() {
    // Given: a connection that times out
    let client = ScriptedClient::new(vec![Err(HttpError::new("request timeout"))]);
    let transport = transport_over(Arc::clone(&client));

    let result: String = fetch_with_retries(
        &transport,
        "series",
        "https://upstream.test/series",
        RetryPolicy::default(),
        parse_body,
    )
    .await;

    // Then: no retry for transport errors; the caller sees the default
    assert_eq!(result, String::default());
    assert_eq!(client.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_the_body_is_rejected_by_the_parser_the_default_is_returned() {
    // Given: a 200 whose payload does not match the endpoint contract
    let client = ScriptedClient::new(vec![Ok(HttpResponse::ok("garbage"))]);
    let transport = transport_over(Arc::clone(&client));

    let result: String = fetch_with_retries(
        &transport,
        "series",
        "https://upstream.test/series",
        RetryPolicy::default(),
        |_| Err(ParseError(String::from("unexpected shape"))),
    )
    .await;

    // Then: parse failures are terminal for the sub-resource
    assert_eq!(result, String::default());
    assert_eq!(client.request_count(), 1);
}
