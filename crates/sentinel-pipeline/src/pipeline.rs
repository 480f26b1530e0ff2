use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use sentinel_core::config::{BaselineMode, EmptySnapshotPolicy, RunPolicy, TargetSpec};
use sentinel_core::{
    Changes, DeadLetterRecord, DebounceMarker, ErrorDetail, Event, EventKind, Fetcher, FetchMetrics,
    Fingerprint, SentinelError, Snapshot, SnapshotMode, StateKeyInputs, StateStore, TargetMeta,
    EVENT_SCHEMA_V1, EVENT_SCHEMA_V2,
};
use sentinel_deliver::{deliver, DeliveryResult, RetryPolicy, WebhookOptions};
use sentinel_diff::{
    approx_change_ratio, compute_fields_change, compute_text_change, diff_json, idempotent_event_id,
    limit_payload, per_run_event_id,
};
use sentinel_guard::{DomainPolicy, UrlSafetyGuard};
use sentinel_normalize::{check_block_page, check_empty, EmptyOutcome};
use sentinel_store::{get_snapshot, put_snapshot, STORE_DEAD_LETTER, STORE_STATE};
use similar::TextDiff;
use tracing::{info, warn};

use crate::circuit;

/// Terminal outcome of one target's pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    BaselineStored,
    NoChange,
    ChangeSuppressed,
    ChangeDelivered,
    ChangeDeadLettered,
    FetchFailed,
    EmptySnapshot,
    CircuitOpen,
}

/// Everything a completed run produced for one target: the outcome used by
/// the orchestrator's summary, the events to persist, and the fetch/webhook
/// metrics to aggregate.
pub struct TargetRunResult {
    pub outcome: PipelineOutcome,
    pub events: Vec<Event>,
    pub fetch_metrics: Option<FetchMetrics>,
    pub webhook_result: Option<DeliveryResult>,
}

/// Shared collaborators a single pipeline invocation needs.
/// Built once per run and cloned (cheaply, via `Arc`) into every target's
/// [`run_target`] task so the orchestrator can run them concurrently under
/// `tokio::spawn`.
#[derive(Clone)]
pub struct PipelineContext {
    pub policy: Arc<RunPolicy>,
    pub fetcher: Arc<dyn Fetcher>,
    pub state_store: Arc<dyn StateStore>,
    pub webhook_guard: Arc<UrlSafetyGuard>,
    pub webhook_domain_policy: Arc<DomainPolicy>,
    pub http_client: reqwest::Client,
    pub run_id: Arc<str>,
}

fn snapshot_key(content_hash: &str) -> String {
    format!("snapshot-{content_hash}")
}

fn meta_key(state_key: &str) -> String {
    format!("meta-{state_key}")
}

async fn load_meta(store: &dyn StateStore, key: &str) -> Result<Option<TargetMeta>, SentinelError> {
    match store.get(STORE_STATE, key).await? {
        Some(bytes) => {
            let meta: TargetMeta = serde_json::from_slice(&bytes)
                .map_err(|e| SentinelError::Store(format!("corrupt meta record: {e}")))?;
            Ok(Some(meta))
        }
        None => Ok(None),
    }
}

async fn save_meta(store: &dyn StateStore, key: &str, meta: &TargetMeta) -> Result<(), SentinelError> {
    let bytes = serde_json::to_vec(meta)
        .map_err(|e| SentinelError::Store(format!("meta not serializable: {e}")))?;
    store.put(STORE_STATE, key, &bytes, Some("application/json")).await
}

fn compile_block_page_regexes(patterns: &[String]) -> Result<Vec<Regex>, SentinelError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| SentinelError::Config(format!("invalid block_page_regex {p}: {e}")))
        })
        .collect()
}

/// Runs the full per-target pipeline. Never returns
/// `Err` for target-scoped problems — those become `PipelineOutcome`
/// variants and events; `Err` is reserved for store-level failures the
/// orchestrator should treat as fatal for this target's run.
pub async fn run_target(
    ctx: &PipelineContext,
    target: &TargetSpec,
) -> Result<TargetRunResult, SentinelError> {
    let policy = ctx.policy.as_ref();
    let now = Utc::now();

    let keys = StateKeyInputs::from_target(target, policy);
    let current_key = keys.current_key();
    let legacy_key = keys.legacy_key();

    // Step 1 & 2: load meta + baseline, current key first then legacy.
    let mut events = Vec::new();
    let (mut meta, used_legacy) = match load_meta(ctx.state_store.as_ref(), &meta_key(&current_key)).await? {
        Some(m) => (m, false),
        None => match load_meta(ctx.state_store.as_ref(), &meta_key(&legacy_key)).await? {
            Some(m) => (m, true),
            None => (TargetMeta::default(), false),
        },
    };

    if policy.reset_baseline {
        meta.last_success_fingerprint = None;
    }

    let baseline_snapshot = match &meta.last_success_fingerprint {
        Some(fp) => get_snapshot(ctx.state_store.as_ref(), &snapshot_key(&fp.hash)).await?,
        None => None,
    };

    if used_legacy && baseline_snapshot.is_some() {
        events.push(migration_event(target, &current_key));
    }

    // Step 3: circuit breaker. A target with an open webhook circuit is
    // skipped entirely this run — there is nothing useful to fetch for if
    // any resulting change can't be delivered.
    if circuit::is_open(&meta, now) {
        meta.last_run_at = Some(now);
        meta.last_outcome = Some("CIRCUIT_OPEN".to_string());
        save_meta(ctx.state_store.as_ref(), &meta_key(&current_key), &meta).await?;
        events.push(build_event(
            EventKind::WebhookCircuitOpen,
            &ctx.run_id,
            target,
            None,
            None,
            None,
            Some(format!("webhook circuit open until {:?}", meta.circuit_open_until)),
            None,
        ));
        return Ok(TargetRunResult {
            outcome: PipelineOutcome::CircuitOpen,
            events,
            fetch_metrics: None,
            webhook_result: None,
        });
    }

    // Step 4: fetch + normalize (normalization happens inside the fetcher).
    let fetch_result = ctx.fetcher.fetch(target, baseline_snapshot.as_ref()).await;

    let snapshot = match fetch_result {
        Err(err) => {
            return Ok(handle_fetch_failure(
                ctx,
                target,
                &mut meta,
                &current_key,
                now,
                EventKind::FetchFailed,
                &err,
            )
            .await?);
        }
        Ok(snapshot) => snapshot,
    };

    let empty_outcome = check_empty(&snapshot.text, policy.min_text_length, policy.on_empty_snapshot);
    let snapshot = match empty_outcome {
        Err(err) => {
            return Ok(handle_fetch_failure(
                ctx,
                target,
                &mut meta,
                &current_key,
                now,
                EventKind::EmptySnapshotError,
                &err,
            )
            .await?);
        }
        Ok(EmptyOutcome::Ignored) => {
            meta.last_run_at = Some(now);
            meta.last_outcome = Some("EMPTY_SNAPSHOT_IGNORED".to_string());
            save_meta(ctx.state_store.as_ref(), &meta_key(&current_key), &meta).await?;
            events.push(build_event(
                EventKind::EmptySnapshotIgnored,
                &ctx.run_id,
                target,
                None,
                Some(&snapshot.content_hash),
                None,
                None,
                None,
            ));
            return Ok(TargetRunResult {
                outcome: PipelineOutcome::EmptySnapshot,
                events,
                fetch_metrics: Some(snapshot.metrics),
                webhook_result: None,
            });
        }
        Ok(EmptyOutcome::NotEmpty) | Ok(EmptyOutcome::TreatedAsChange) => snapshot,
    };

    let block_page_regexes = compile_block_page_regexes(&policy.block_page_regexes)?;
    if let Err(err) = check_block_page(&snapshot.text, snapshot.html.as_deref(), &block_page_regexes) {
        return Ok(handle_fetch_failure(
            ctx,
            target,
            &mut meta,
            &current_key,
            now,
            EventKind::FetchFailed,
            &err,
        )
        .await?);
    }

    let fetch_metrics = snapshot.metrics;

    // Step 5: no previous baseline.
    let Some(baseline) = baseline_snapshot else {
        put_snapshot(ctx.state_store.as_ref(), &snapshot_key(&snapshot.content_hash), &snapshot).await?;
        meta.last_run_at = Some(now);
        meta.last_outcome = Some("BASELINE_STORED".to_string());
        meta.last_success_fingerprint = Some(Fingerprint::from(&snapshot));
        save_meta(ctx.state_store.as_ref(), &meta_key(&current_key), &meta).await?;

        let mut event = build_event(
            EventKind::BaselineStored,
            &ctx.run_id,
            target,
            None,
            Some(&snapshot.content_hash),
            None,
            Some("baseline established".to_string()),
            None,
        );
        event.event_id =
            idempotent_event_id("BASELINE_STORED", &target.target_url, target.selector.as_deref(), None, Some(&snapshot.content_hash));
        events.push(event.clone());

        let webhook_result = if policy.baseline_mode == BaselineMode::Notify {
            Some(deliver_event(ctx, &event).await?)
        } else {
            None
        };

        return Ok(TargetRunResult {
            outcome: PipelineOutcome::BaselineStored,
            events,
            fetch_metrics: Some(fetch_metrics),
            webhook_result,
        });
    };

    // Step 6: compare against baseline.
    let text_change = compute_text_change(
        &baseline.content_hash,
        &baseline.text,
        &snapshot.content_hash,
        &snapshot.text,
    );

    let Some(text_change) = text_change else {
        put_snapshot(ctx.state_store.as_ref(), &snapshot_key(&snapshot.content_hash), &snapshot).await?;
        meta.last_run_at = Some(now);
        meta.last_outcome = Some("NO_CHANGE".to_string());
        meta.last_success_fingerprint = Some(Fingerprint::from(&snapshot));

        let event = build_event(
            EventKind::NoChange,
            &ctx.run_id,
            target,
            Some(&baseline.content_hash),
            Some(&snapshot.content_hash),
            None,
            None,
            None,
        );
        events.push(event.clone());

        let webhook_result = if policy.notify_on_no_change {
            let signature = "no_change".to_string();
            if debounce_elapsed(&meta.no_change_debounce, &signature, now, policy.fetch_failure_debounce_secs) {
                meta.no_change_debounce = Some(DebounceMarker { signature, last_notified_at: now });
                Some(deliver_event(ctx, &event).await?)
            } else {
                None
            }
        } else {
            None
        };

        save_meta(ctx.state_store.as_ref(), &meta_key(&current_key), &meta).await?;

        return Ok(TargetRunResult {
            outcome: PipelineOutcome::NoChange,
            events,
            fetch_metrics: Some(fetch_metrics),
            webhook_result,
        });
    };

    let ratio = approx_change_ratio(&baseline.text, &snapshot.text);

    // Step 7: change present but below the configured ratio threshold.
    if ratio < policy.min_change_ratio {
        put_snapshot(ctx.state_store.as_ref(), &snapshot_key(&snapshot.content_hash), &snapshot).await?;
        meta.last_run_at = Some(now);
        meta.last_outcome = Some("CHANGE_SUPPRESSED".to_string());
        meta.last_success_fingerprint = Some(Fingerprint::from(&snapshot));
        save_meta(ctx.state_store.as_ref(), &meta_key(&current_key), &meta).await?;

        let event = build_event(
            EventKind::ChangeSuppressed,
            &ctx.run_id,
            target,
            Some(&baseline.content_hash),
            Some(&snapshot.content_hash),
            Some(Changes {
                text: text_change,
                fields: None,
                json: None,
                patch: None,
            }),
            Some(format!("change ratio {ratio:.4} below threshold {:.4}", policy.min_change_ratio)),
            None,
        );
        events.push(event);

        return Ok(TargetRunResult {
            outcome: PipelineOutcome::ChangeSuppressed,
            events,
            fetch_metrics: Some(fetch_metrics),
            webhook_result: None,
        });
    }

    // Step 8: compose CHANGE_DETECTED.
    let fields_change = if snapshot.mode == SnapshotMode::Fields {
        Some(compute_fields_change(&baseline.text, &snapshot.text)?)
    } else {
        None
    };
    let json_change = if snapshot.mode == SnapshotMode::Json {
        let prev_value: serde_json::Value = serde_json::from_str(&baseline.text)
            .map_err(|e| SentinelError::Parse(format!("baseline json not parseable: {e}")))?;
        let curr_value: serde_json::Value = serde_json::from_str(&snapshot.text)
            .map_err(|e| SentinelError::Parse(format!("current json not parseable: {e}")))?;
        Some(diff_json(&prev_value, &curr_value, &target.ignore_json_paths))
    } else {
        None
    };

    let patch = unified_patch(&baseline.text, &snapshot.text);
    let summary = build_summary(&fields_change, &json_change, &text_change);

    let mut event = build_event(
        EventKind::ChangeDetected,
        &ctx.run_id,
        target,
        Some(&baseline.content_hash),
        Some(&snapshot.content_hash),
        Some(Changes {
            text: text_change,
            fields: fields_change,
            json: json_change,
            patch,
        }),
        Some(summary),
        None,
    );
    event.event_id = idempotent_event_id(
        "CHANGE_DETECTED",
        &target.target_url,
        target.selector.as_deref(),
        Some(&baseline.content_hash),
        Some(&snapshot.content_hash),
    );
    limit_payload(&mut event, policy.max_payload_bytes)?;

    // Step 9: deliver.
    let webhook_result = deliver_event(ctx, &event).await?;

    if webhook_result.ok {
        put_snapshot(ctx.state_store.as_ref(), &snapshot_key(&snapshot.content_hash), &snapshot).await?;
        meta.last_run_at = Some(now);
        meta.last_outcome = Some("CHANGE_DETECTED".to_string());
        meta.last_success_fingerprint = Some(Fingerprint::from(&snapshot));
        circuit::record_success(&mut meta);
        save_meta(ctx.state_store.as_ref(), &meta_key(&current_key), &meta).await?;
        events.push(event);

        Ok(TargetRunResult {
            outcome: PipelineOutcome::ChangeDelivered,
            events,
            fetch_metrics: Some(fetch_metrics),
            webhook_result: Some(webhook_result),
        })
    } else {
        meta.last_run_at = Some(now);
        meta.last_outcome = Some("WEBHOOK_FAILED".to_string());
        circuit::record_failure(&mut meta, policy, now);
        save_meta(ctx.state_store.as_ref(), &meta_key(&current_key), &meta).await?;

        let diagnostic = webhook_result
            .attempts
            .iter()
            .find_map(|a| a.diagnostic.clone())
            .unwrap_or_default();
        push_dead_letter(ctx, target, &current_key, &diagnostic, &event).await?;

        let mut failure_event = event.clone();
        failure_event.event = EventKind::WebhookFailed;
        failure_event.event_id = per_run_event_id(
            "WEBHOOK_FAILED",
            &ctx.run_id,
            &target.target_url,
            target.selector.as_deref(),
            Some(&snapshot.content_hash),
            Some(&diagnostic),
        );
        failure_event.schema_version = EVENT_SCHEMA_V2;
        failure_event.error = Some(ErrorDetail {
            name: "WebhookDeliveryError".to_string(),
            message: diagnostic,
            status_code: webhook_result.attempts.iter().find_map(|a| a.terminal_status),
            attempts: webhook_result.attempts.iter().map(|a| a.attempts).max(),
            duration_ms: webhook_result.attempts.iter().map(|a| a.duration_ms).max(),
        });
        events.push(failure_event);

        Ok(TargetRunResult {
            outcome: PipelineOutcome::ChangeDeadLettered,
            events,
            fetch_metrics: Some(fetch_metrics),
            webhook_result: Some(webhook_result),
        })
    }
}

async fn handle_fetch_failure(
    ctx: &PipelineContext,
    target: &TargetSpec,
    meta: &mut TargetMeta,
    current_key: &str,
    now: chrono::DateTime<Utc>,
    kind: EventKind,
    err: &SentinelError,
) -> Result<TargetRunResult, SentinelError> {
    meta.last_run_at = Some(now);
    meta.last_outcome = Some(err.name().to_string());
    save_meta(ctx.state_store.as_ref(), &meta_key(current_key), meta).await?;

    let error_detail = ErrorDetail {
        name: err.name().to_string(),
        message: err.to_string(),
        status_code: err.status_code(),
        attempts: None,
        duration_ms: None,
    };

    let mut event = build_event(kind, &ctx.run_id, target, None, None, None, None, Some(error_detail));
    event.event_id = per_run_event_id(
        event_kind_wire_name(kind),
        &ctx.run_id,
        &target.target_url,
        target.selector.as_deref(),
        None,
        Some(err.name()),
    );

    let mut webhook_result = None;
    if ctx.policy.notify_on_fetch_failure {
        let signature = err.name().to_string();
        if debounce_elapsed(
            &meta.fetch_failure_debounce,
            &signature,
            now,
            ctx.policy.fetch_failure_debounce_secs,
        ) {
            meta.fetch_failure_debounce = Some(DebounceMarker { signature, last_notified_at: now });
            save_meta(ctx.state_store.as_ref(), &meta_key(current_key), meta).await?;
            webhook_result = Some(deliver_event(ctx, &event).await?);
        }
    }

    warn!(url = %target.target_url, error = %err, "target fetch failed");

    Ok(TargetRunResult {
        outcome: PipelineOutcome::FetchFailed,
        events: vec![event],
        fetch_metrics: None,
        webhook_result,
    })
}

fn event_kind_wire_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::FetchFailed => "FETCH_FAILED",
        EventKind::EmptySnapshotError => "EMPTY_SNAPSHOT_ERROR",
        EventKind::EmptySnapshotIgnored => "EMPTY_SNAPSHOT_IGNORED",
        EventKind::NoChange => "NO_CHANGE",
        EventKind::ChangeSuppressed => "CHANGE_SUPPRESSED",
        EventKind::ChangeDetected => "CHANGE_DETECTED",
        EventKind::BaselineStored => "BASELINE_STORED",
        EventKind::BaselineMigrated => "BASELINE_MIGRATED",
        EventKind::WebhookFailed => "WEBHOOK_FAILED",
        EventKind::WebhookCircuitOpen => "WEBHOOK_CIRCUIT_OPEN",
    }
}

fn debounce_elapsed(
    marker: &Option<DebounceMarker>,
    signature: &str,
    now: chrono::DateTime<Utc>,
    debounce_secs: u64,
) -> bool {
    match marker {
        Some(m) if m.signature == signature => {
            (now - m.last_notified_at).num_seconds() >= debounce_secs as i64
        }
        _ => true,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_event(
    kind: EventKind,
    run_id: &str,
    target: &TargetSpec,
    previous_hash: Option<&str>,
    current_hash: Option<&str>,
    changes: Option<Changes>,
    summary: Option<String>,
    error: Option<ErrorDetail>,
) -> Event {
    let now = Utc::now();
    let previous = previous_hash.map(|h| Fingerprint { hash: h.to_string(), fetched_at: now });
    let current = current_hash.map(|h| Fingerprint { hash: h.to_string(), fetched_at: now });

    let event_id = if kind.is_idempotent() {
        idempotent_event_id(
            event_kind_wire_name(kind),
            &target.target_url,
            target.selector.as_deref(),
            previous_hash,
            current_hash,
        )
    } else {
        per_run_event_id(
            event_kind_wire_name(kind),
            run_id,
            &target.target_url,
            target.selector.as_deref(),
            current_hash,
            None,
        )
    };

    Event {
        schema_version: if kind.is_idempotent() { EVENT_SCHEMA_V1 } else { EVENT_SCHEMA_V2 },
        event_id,
        event: kind,
        url: target.target_url.clone(),
        selector: target.selector.clone(),
        timestamp: now,
        previous,
        current,
        changes,
        summary,
        artifacts: None,
        error,
        payload_truncated: false,
    }
}

fn migration_event(target: &TargetSpec, current_key: &str) -> Event {
    let now = Utc::now();
    Event {
        schema_version: EVENT_SCHEMA_V1,
        event_id: idempotent_event_id(
            "BASELINE_MIGRATED",
            &target.target_url,
            target.selector.as_deref(),
            None,
            None,
        ),
        event: EventKind::BaselineMigrated,
        url: target.target_url.clone(),
        selector: target.selector.clone(),
        timestamp: now,
        previous: None,
        current: None,
        changes: None,
        summary: Some(format!("baseline migrated to state key {current_key}")),
        artifacts: None,
        error: None,
        payload_truncated: false,
    }
}

fn build_summary(
    fields_change: &Option<HashMap<String, sentinel_core::FieldChange>>,
    json_change: &Option<Vec<sentinel_core::JsonDiffEntry>>,
    text_change: &sentinel_core::TextChange,
) -> String {
    if let Some(fields) = fields_change {
        if !fields.is_empty() {
            let mut names: Vec<&String> = fields.keys().collect();
            names.sort();
            return format!("{} field(s) changed: {}", names.len(), names.into_iter().cloned().collect::<Vec<_>>().join(", "));
        }
    }
    if let Some(entries) = json_change {
        if !entries.is_empty() {
            return format!("{} json field(s) changed", entries.len());
        }
    }
    match text_change.delta {
        Some(delta) => format!("value changed by {delta:+.2}"),
        None => "content changed".to_string(),
    }
}

/// Unified diff patch between two snapshots' text.
/// Returns `None` for identical inputs; the caller drops it anyway if it
/// would overrun the payload limit.
fn unified_patch(old: &str, new: &str) -> Option<String> {
    if old == new {
        return None;
    }
    let diff = TextDiff::from_lines(old, new);
    Some(
        diff.unified_diff()
            .context_radius(3)
            .header("previous", "current")
            .to_string(),
    )
}

async fn deliver_event(ctx: &PipelineContext, event: &Event) -> Result<DeliveryResult, SentinelError> {
    let body = serde_json::to_string(event)
        .map_err(|e| SentinelError::Parse(format!("event not serializable: {e}")))?;
    let policy = ctx.policy.as_ref();

    let options = WebhookOptions {
        urls: &policy.webhook_urls,
        delivery_mode: policy.webhook_delivery_mode,
        method: &policy.webhook_method,
        content_type: &policy.webhook_content_type,
        headers: &policy.webhook_headers,
        secret: policy.webhook_secret.as_deref(),
        event_id: &event.event_id,
        timeout: Duration::from_secs(policy.fetch_timeout_secs),
        retry_policy: RetryPolicy {
            max_retries: policy.webhook_retry_max_retries,
            base_backoff_ms: policy.webhook_retry_backoff_ms,
            max_total_time_ms: policy.webhook_retry_max_total_time_ms,
        },
        retry_status_codes: policy.webhook_retry_status_codes.as_deref(),
        allow_localhost: policy.allow_localhost,
    };

    deliver(&ctx.http_client, ctx.webhook_guard.as_ref(), ctx.webhook_domain_policy.as_ref(), &body, &options).await
}

async fn push_dead_letter(
    ctx: &PipelineContext,
    target: &TargetSpec,
    state_key: &str,
    error_detail: &str,
    event: &Event,
) -> Result<(), SentinelError> {
    let record = DeadLetterRecord {
        webhook_url: ctx.policy.webhook_urls.first().cloned().unwrap_or_default(),
        target_url: target.target_url.clone(),
        state_key: state_key.to_string(),
        error_detail: error_detail.to_string(),
        payload_preview: truncated_preview(event, ctx.policy.max_payload_bytes),
        timestamp: Utc::now(),
    };
    let bytes = serde_json::to_vec(&record)
        .map_err(|e| SentinelError::Store(format!("dead letter record not serializable: {e}")))?;
    let key = format!("dl-{state_key}-{}", record.timestamp.timestamp_nanos_opt().unwrap_or_default());
    ctx.state_store.as_ref().put(STORE_DEAD_LETTER, &key, &bytes, Some("application/json")).await?;
    info!(url = %target.target_url, "pushed dead-letter record after webhook failure");
    Ok(())
}

/// Caps the stored dead-letter preview at `max_bytes`: tries the payload
/// limiter's text-shrinking first (it understands the event shape), then
/// falls back to a plain char-boundary-safe byte-prefix cut if the event
/// still doesn't fit.
fn truncated_preview(event: &Event, max_bytes: usize) -> String {
    let mut shrunk = event.clone();
    if limit_payload(&mut shrunk, max_bytes).is_ok() {
        if let Ok(s) = serde_json::to_string(&shrunk) {
            if s.len() <= max_bytes {
                return s;
            }
        }
    }
    let full = serde_json::to_string(event).unwrap_or_default();
    if full.len() <= max_bytes {
        return full;
    }
    full.char_indices()
        .take_while(|(i, _)| *i < max_bytes)
        .map(|(_, c)| c)
        .collect()
}
