//! End-to-end pipeline scenarios against an in-memory store and a mock
//! webhook receiver.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sentinel_core::config::{RunPolicy, TargetSpec};
use sentinel_core::{Fetcher, FetchMetrics, SentinelError, Snapshot, SnapshotMode, Validators};
use sentinel_guard::{DomainPolicy, UrlSafetyGuard};
use sentinel_pipeline::{run_target, PipelineContext, PipelineOutcome};
use sentinel_store::MemoryStore;
use sha2::Sha256;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type HmacSha256 = Hmac<Sha256>;

/// Replays a fixed queue of fetch results, one per call, in order.
struct FakeFetcher {
    results: Mutex<Vec<Result<Snapshot, SentinelError>>>,
}

impl FakeFetcher {
    fn new(mut results: Vec<Result<Snapshot, SentinelError>>) -> Self {
        results.reverse();
        FakeFetcher { results: Mutex::new(results) }
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, _target: &TargetSpec, _previous: Option<&Snapshot>) -> Result<Snapshot, SentinelError> {
        self.results
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("FakeFetcher ran out of queued results"))
    }
}

fn snapshot(text: &str, mode: SnapshotMode) -> Snapshot {
    Snapshot {
        monitored_url: "https://example.com/".to_string(),
        final_url: "https://example.com/".to_string(),
        fetched_at: Utc::now(),
        status: 200,
        mode,
        text: text.to_string(),
        html: None,
        content_hash: content_hash(text),
        validators: Validators::default(),
        metrics: FetchMetrics::default(),
    }
}

fn content_hash(text: &str) -> String {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn target(url: &str) -> TargetSpec {
    TargetSpec {
        target_url: url.to_string(),
        selector: None,
        fields: Vec::new(),
        ignore_json_paths: Vec::new(),
        headers: Default::default(),
        method: None,
        body: None,
        cookies: Vec::new(),
        wait_for_selector: None,
        wait_ms: None,
        robots_mode_enabled: false,
    }
}

fn ctx(policy: RunPolicy, fetcher: FakeFetcher) -> PipelineContext {
    PipelineContext {
        policy: Arc::new(policy),
        fetcher: Arc::new(fetcher),
        state_store: Arc::new(MemoryStore::new()),
        webhook_guard: Arc::new(UrlSafetyGuard::new()),
        webhook_domain_policy: Arc::new(DomainPolicy::new(Vec::new(), Vec::new())),
        http_client: reqwest::Client::new(),
        run_id: Arc::from("run-1"),
    }
}

/// Scenario 1: baseline -> no-change -> change. Exactly one webhook POST
/// fires, on the third run when the change is delivered.
#[tokio::test]
async fn baseline_then_no_change_then_change_delivers_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut policy = RunPolicy::default();
    policy.webhook_urls = vec![format!("{}/hook", server.uri())];
    policy.allow_localhost = true;

    let fetcher = FakeFetcher::new(vec![
        Ok(snapshot("version one", SnapshotMode::Text)),
        Ok(snapshot("version one", SnapshotMode::Text)),
        Ok(snapshot("version two", SnapshotMode::Text)),
    ]);
    let ctx = ctx(policy, fetcher);
    let t = target("https://example.com/");

    let r1 = run_target(&ctx, &t).await.unwrap();
    assert_eq!(r1.outcome, PipelineOutcome::BaselineStored);

    let r2 = run_target(&ctx, &t).await.unwrap();
    assert_eq!(r2.outcome, PipelineOutcome::NoChange);

    let r3 = run_target(&ctx, &t).await.unwrap();
    assert_eq!(r3.outcome, PipelineOutcome::ChangeDelivered);

    server.verify().await;
}

/// Scenario 2: a fetcher-level SSRF rejection becomes a FETCH_FAILED event
/// carrying the safety error's name, and never advances the baseline.
#[tokio::test]
async fn ssrf_rejection_surfaces_as_fetch_failed() {
    let policy = RunPolicy::default();
    let fetcher = FakeFetcher::new(vec![Err(SentinelError::UrlSafety(
        "redirect to non-public address rejected".to_string(),
    ))]);
    let ctx = ctx(policy, fetcher);
    let t = target("https://example.com/");

    let result = run_target(&ctx, &t).await.unwrap();
    assert_eq!(result.outcome, PipelineOutcome::FetchFailed);
    assert_eq!(result.events.len(), 1);
    let error = result.events[0].error.as_ref().unwrap();
    assert_eq!(error.name, "UrlSafetyError");
}

/// Scenario 3: when a webhook secret is configured, the delivered request
/// carries a signature verifiable against the documented HMAC scheme.
#[tokio::test]
async fn webhook_delivery_is_signed_when_secret_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header_exists("x-sentinel-signature"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut policy = RunPolicy::default();
    policy.webhook_urls = vec![format!("{}/hook", server.uri())];
    policy.webhook_secret = Some("top-secret".to_string());
    policy.allow_localhost = true;
    policy.baseline_mode = sentinel_core::config::BaselineMode::Notify;

    let fetcher = FakeFetcher::new(vec![Ok(snapshot("hello", SnapshotMode::Text))]);
    let ctx = ctx(policy, fetcher);
    let t = target("https://example.com/");

    let result = run_target(&ctx, &t).await.unwrap();
    assert_eq!(result.outcome, PipelineOutcome::BaselineStored);
    assert!(result.webhook_result.unwrap().ok);
    server.verify().await;
}

/// Scenario 4: a field-mode change computes the expected numeric delta.
#[tokio::test]
async fn fields_mode_reports_numeric_delta() {
    let policy = RunPolicy::default();
    let fetcher = FakeFetcher::new(vec![
        Ok(snapshot(r#"{"price":"49.99"}"#, SnapshotMode::Fields)),
        Ok(snapshot(r#"{"price":"45.00"}"#, SnapshotMode::Fields)),
    ]);
    let ctx = ctx(policy, fetcher);
    let t = target("https://example.com/");

    let _ = run_target(&ctx, &t).await.unwrap();
    let second = run_target(&ctx, &t).await.unwrap();
    // No webhook_urls configured: delivery is vacuously successful (there
    // is nothing to fail), so the change is delivered and the baseline
    // advances.
    assert_eq!(second.outcome, PipelineOutcome::ChangeDelivered);

    let change_event = second.events.iter().find(|e| e.changes.is_some()).unwrap();
    let fields = change_event.changes.as_ref().unwrap().fields.as_ref().unwrap();
    assert_eq!(fields["price"].delta, Some(-4.99));
}

/// Scenario 5: a JSON-mode change under an ignored pointer produces no
/// diff entries for that subtree.
#[tokio::test]
async fn json_mode_respects_ignore_paths() {
    let mut policy = RunPolicy::default();
    policy.min_change_ratio = 0.0;

    let mut t = target("https://example.com/");
    t.ignore_json_paths = vec!["/meta/timestamp".to_string()];

    let fetcher = FakeFetcher::new(vec![
        Ok(snapshot(r#"{"meta":{"timestamp":"T1"},"data":1}"#, SnapshotMode::Json)),
        Ok(snapshot(r#"{"meta":{"timestamp":"T2"},"data":2}"#, SnapshotMode::Json)),
    ]);
    let ctx = ctx(policy, fetcher);

    let _ = run_target(&ctx, &t).await.unwrap();
    let second = run_target(&ctx, &t).await.unwrap();

    let change_event = second.events.iter().find(|e| e.changes.is_some()).unwrap();
    let json_entries = change_event.changes.as_ref().unwrap().json.as_ref().unwrap();
    assert_eq!(json_entries.len(), 1);
    assert_eq!(json_entries[0].path, "/data");
}

/// Scenario 6: a tight `max_payload_bytes` truncates the event and flags
/// `payload_truncated`.
#[tokio::test]
async fn oversized_change_is_truncated_to_payload_limit() {
    let mut policy = RunPolicy::default();
    policy.max_payload_bytes = 800;

    let old = "a".repeat(2_000);
    let new = "b".repeat(2_000);
    let fetcher = FakeFetcher::new(vec![
        Ok(snapshot(&old, SnapshotMode::Text)),
        Ok(snapshot(&new, SnapshotMode::Text)),
    ]);
    let ctx = ctx(policy, fetcher);
    let t = target("https://example.com/");

    let _ = run_target(&ctx, &t).await.unwrap();
    let second = run_target(&ctx, &t).await.unwrap();

    let change_event = second.events.iter().find(|e| e.changes.is_some()).unwrap();
    assert!(change_event.payload_truncated);
    let size = serde_json::to_vec(change_event).unwrap().len();
    assert!(size <= 800);
}

#[test]
fn hmac_reference_matches_documented_scheme() {
    let mut mac = HmacSha256::new_from_slice(b"top-secret").unwrap();
    mac.update(b"1000.{}");
    let sig = hex::encode(mac.finalize().into_bytes());
    assert_eq!(sig.len(), 64);
}
