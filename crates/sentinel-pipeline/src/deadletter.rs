use std::time::Duration;

use sentinel_core::config::ReplayOptions;
use sentinel_core::{DeadLetterRecord, Event, SentinelError};
use sentinel_deliver::{deliver, DeliveryResult, RetryPolicy, WebhookOptions};
use sentinel_store::STORE_DEAD_LETTER;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::pipeline::PipelineContext;

/// Outcome of replaying one dead-letter record.
#[derive(Debug, Clone)]
pub enum ReplayOutcome {
    /// Re-delivered successfully.
    Delivered(DeliveryResult),
    /// Re-delivery was attempted and failed; the record stays dead-lettered.
    Failed(DeliveryResult),
    /// `dry_run` was set; no delivery was attempted.
    DryRun,
    /// The stored record did not contain a well-formed event payload.
    InvalidPayload(String),
}

#[derive(Debug, Clone)]
pub struct ReplayItem {
    pub key: String,
    pub record: DeadLetterRecord,
    pub outcome: ReplayOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub total: usize,
    pub delivered: u32,
    pub failed: u32,
    pub dry_run: u32,
    pub invalid: u32,
}

pub struct ReplayResult {
    pub summary: ReplaySummary,
    pub items: Vec<ReplayItem>,
}

/// Reads the last `options.limit` dead-letter records (paged, newest
/// first), validates each holds a well-formed `Event` payload, and
/// re-delivers it under the current webhook policy — through the same
/// `max_concurrency`-bounded worker pool the main orchestrator uses.
pub async fn replay(ctx: &PipelineContext, options: &ReplayOptions) -> Result<ReplayResult, SentinelError> {
    let mut page = Vec::new();
    let mut offset = 0usize;
    const PAGE_SIZE: usize = 100;
    while page.len() < options.limit {
        let remaining = options.limit - page.len();
        let batch = ctx
            .state_store
            .list(STORE_DEAD_LETTER, remaining.min(PAGE_SIZE), offset, true)
            .await?;
        if batch.is_empty() {
            break;
        }
        offset += batch.len();
        let exhausted = batch.len() < remaining.min(PAGE_SIZE);
        page.extend(batch);
        if exhausted {
            break;
        }
    }

    let semaphore = std::sync::Arc::new(Semaphore::new(ctx.policy.max_concurrency.max(1)));
    let mut handles = Vec::with_capacity(page.len());

    for (key, bytes) in page {
        let semaphore = semaphore.clone();
        let ctx = ctx.clone();
        let dry_run = options.dry_run;
        let use_stored_webhook_url = options.use_stored_webhook_url;

        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed during a replay");
            let outcome = replay_one(&ctx, &bytes, dry_run, use_stored_webhook_url).await;
            (key, bytes, outcome)
        });
        handles.push(handle);
    }

    let mut summary = ReplaySummary::default();
    let mut items = Vec::new();

    for handle in handles {
        match handle.await {
            Ok((key, bytes, outcome)) => {
                summary.total += 1;
                match &outcome {
                    ReplayOutcome::Delivered(_) => summary.delivered += 1,
                    ReplayOutcome::Failed(_) => summary.failed += 1,
                    ReplayOutcome::DryRun => summary.dry_run += 1,
                    ReplayOutcome::InvalidPayload(_) => summary.invalid += 1,
                }
                let record: Option<DeadLetterRecord> = serde_json::from_slice(&bytes).ok();
                if let Some(record) = record {
                    items.push(ReplayItem { key, record, outcome });
                } else {
                    warn!(key, "dead-letter record itself is corrupt, skipping from report");
                }
            }
            Err(join_err) => {
                error!(error = %join_err, "dead-letter replay task panicked or was cancelled");
            }
        }
    }

    Ok(ReplayResult { summary, items })
}

async fn replay_one(
    ctx: &PipelineContext,
    bytes: &[u8],
    dry_run: bool,
    use_stored_webhook_url: bool,
) -> ReplayOutcome {
    let record: DeadLetterRecord = match serde_json::from_slice(bytes) {
        Ok(r) => r,
        Err(e) => return ReplayOutcome::InvalidPayload(format!("corrupt dead-letter record: {e}")),
    };
    let event: Event = match serde_json::from_str(&record.payload_preview) {
        Ok(e) => e,
        Err(e) => return ReplayOutcome::InvalidPayload(format!("corrupt event payload: {e}")),
    };

    if dry_run {
        return ReplayOutcome::DryRun;
    }

    let body = match serde_json::to_string(&event) {
        Ok(b) => b,
        Err(e) => return ReplayOutcome::InvalidPayload(format!("event not serializable: {e}")),
    };

    let policy = ctx.policy.as_ref();
    let override_urls;
    let urls: &[String] = if use_stored_webhook_url {
        override_urls = vec![record.webhook_url.clone()];
        &override_urls
    } else {
        &policy.webhook_urls
    };

    let options = WebhookOptions {
        urls,
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

    match deliver(
        &ctx.http_client,
        ctx.webhook_guard.as_ref(),
        ctx.webhook_domain_policy.as_ref(),
        &body,
        &options,
    )
    .await
    {
        Ok(result) if result.ok => ReplayOutcome::Delivered(result),
        Ok(result) => ReplayOutcome::Failed(result),
        Err(err) => ReplayOutcome::Failed(DeliveryResult {
            ok: false,
            attempts: vec![sentinel_deliver::DeliveryAttempt {
                url: urls.first().cloned().unwrap_or_default(),
                attempts: 0,
                duration_ms: 0,
                terminal_status: err.status_code(),
                ok: false,
                diagnostic: Some(err.to_string()),
            }],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{EventKind, EVENT_SCHEMA_V1};
    use chrono::Utc;

    fn sample_event() -> Event {
        Event {
            schema_version: EVENT_SCHEMA_V1,
            event_id: "evt-1".to_string(),
            event: EventKind::ChangeDetected,
            url: "https://example.com".to_string(),
            selector: None,
            timestamp: Utc::now(),
            previous: None,
            current: None,
            changes: None,
            summary: None,
            artifacts: None,
            error: None,
            payload_truncated: false,
        }
    }

    #[test]
    fn invalid_payload_is_reported_not_panicked() {
        let record = DeadLetterRecord {
            webhook_url: "https://hook.example/x".to_string(),
            target_url: "https://example.com".to_string(),
            state_key: "v2-abc".to_string(),
            error_detail: "boom".to_string(),
            payload_preview: "not json".to_string(),
            timestamp: Utc::now(),
        };
        let parsed: Result<Event, _> = serde_json::from_str(&record.payload_preview);
        assert!(parsed.is_err());
    }

    #[test]
    fn sample_event_round_trips() {
        let event = sample_event();
        let body = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&body).unwrap();
        assert_eq!(back.event_id, event.event_id);
    }
}
