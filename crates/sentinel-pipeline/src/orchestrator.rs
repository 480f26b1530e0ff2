use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sentinel_core::config::TargetSpec;
use sentinel_core::{Event, FetchMetrics, SentinelError};
use sentinel_deliver::DeliveryResult;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::pipeline::{run_target, PipelineContext, PipelineOutcome};

/// Aggregate fetch metrics across every target run this pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateFetchMetrics {
    pub total_bytes: usize,
    pub total_duration_ms: u64,
    pub total_attempts: u32,
    pub not_modified_count: u32,
    pub runs: u32,
}

impl AggregateFetchMetrics {
    fn record(&mut self, m: &FetchMetrics) {
        self.total_bytes += m.bytes;
        self.total_duration_ms += m.duration_ms;
        self.total_attempts += m.attempts;
        if m.not_modified {
            self.not_modified_count += 1;
        }
        self.runs += 1;
    }
}

/// Aggregate webhook delivery metrics across every target run this pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateWebhookMetrics {
    pub deliveries_attempted: u32,
    pub deliveries_ok: u32,
    pub deliveries_failed: u32,
}

impl AggregateWebhookMetrics {
    fn record(&mut self, r: &DeliveryResult) {
        self.deliveries_attempted += 1;
        if r.ok {
            self.deliveries_ok += 1;
        } else {
            self.deliveries_failed += 1;
        }
    }
}

/// Per-outcome counts plus aggregate metrics for one orchestrator pass
///. Not an `Event` itself — its shape is a
/// run-level aggregate rather than a per-target record.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_targets: usize,
    pub baseline_stored: u32,
    pub no_change: u32,
    pub change_suppressed: u32,
    pub change_delivered: u32,
    pub change_dead_lettered: u32,
    pub fetch_failed: u32,
    pub empty_snapshot: u32,
    pub circuit_open: u32,
    pub fetch_metrics: AggregateFetchMetrics,
    pub webhook_metrics: AggregateWebhookMetrics,
    /// URLs (redacted if `redact_logs` is set) of every target whose
    /// outcome was not a clean success.
    pub failing_targets: Vec<String>,
}

impl RunSummary {
    fn record(&mut self, target: &TargetSpec, outcome: &TargetRunOutcome, redact_logs: bool) {
        self.total_targets += 1;
        match outcome.outcome {
            PipelineOutcome::BaselineStored => self.baseline_stored += 1,
            PipelineOutcome::NoChange => self.no_change += 1,
            PipelineOutcome::ChangeSuppressed => self.change_suppressed += 1,
            PipelineOutcome::ChangeDelivered => self.change_delivered += 1,
            PipelineOutcome::ChangeDeadLettered => self.change_dead_lettered += 1,
            PipelineOutcome::FetchFailed => self.fetch_failed += 1,
            PipelineOutcome::EmptySnapshot => self.empty_snapshot += 1,
            PipelineOutcome::CircuitOpen => self.circuit_open += 1,
        }
        if let Some(m) = &outcome.fetch_metrics {
            self.fetch_metrics.record(m);
        }
        if let Some(r) = &outcome.webhook_result {
            self.webhook_metrics.record(r);
        }
        let failed = !matches!(
            outcome.outcome,
            PipelineOutcome::BaselineStored
                | PipelineOutcome::NoChange
                | PipelineOutcome::ChangeSuppressed
                | PipelineOutcome::ChangeDelivered
        );
        if failed {
            self.failing_targets.push(redact_url(&target.target_url, redact_logs));
        }
    }
}

fn redact_url(url: &str, redact_logs: bool) -> String {
    if !redact_logs {
        return url.to_string();
    }
    match url::Url::parse(url) {
        Ok(parsed) => format!("{}://{}/<redacted>", parsed.scheme(), parsed.host_str().unwrap_or("?")),
        Err(_) => "<redacted>".to_string(),
    }
}

struct TargetRunOutcome {
    outcome: PipelineOutcome,
    fetch_metrics: Option<FetchMetrics>,
    webhook_result: Option<DeliveryResult>,
}

/// What one orchestrator pass produced: the run-level summary plus every
/// event emitted by every target (for the caller to persist/log/print).
pub struct OrchestratorResult {
    pub summary: RunSummary,
    pub events: Vec<Event>,
}

/// Fans `targets` through a worker pool bounded by `policy.max_concurrency`
///, grounded on the pack's `Arc<Semaphore>` + `tokio::spawn` +
/// joined-handles worker-pool idiom. An optional pre-run jitter spreads
/// target starts out over `schedule_jitter_ms` to avoid a thundering herd
/// against the same set of hosts every run.
pub async fn run_pass(
    ctx: &PipelineContext,
    targets: &[TargetSpec],
) -> Result<OrchestratorResult, SentinelError> {
    let semaphore = Arc::new(Semaphore::new(ctx.policy.max_concurrency.max(1)));
    let mut handles = Vec::with_capacity(targets.len());

    for target in targets {
        let semaphore = semaphore.clone();
        let ctx = ctx.clone();
        let target = target.clone();
        let jitter_ms = ctx.policy.schedule_jitter_ms;

        let handle = tokio::spawn(async move {
            if jitter_ms > 0 {
                let wait = rand::thread_rng().gen_range(0..=jitter_ms);
                tokio::time::sleep(Duration::from_millis(wait)).await;
            }
            let _permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed during a run");
            let result = run_target(&ctx, &target).await;
            (target, result)
        });
        handles.push(handle);
    }

    let mut summary = RunSummary::default();
    let mut events = Vec::new();

    for handle in handles {
        match handle.await {
            Ok((target, Ok(run_result))) => {
                let outcome = TargetRunOutcome {
                    outcome: run_result.outcome,
                    fetch_metrics: run_result.fetch_metrics,
                    webhook_result: run_result.webhook_result,
                };
                summary.record(&target, &outcome, ctx.policy.redact_logs);
                events.extend(run_result.events);
            }
            Ok((target, Err(err))) => {
                error!(url = %target.target_url, error = %err, "target pipeline failed fatally");
                let outcome = TargetRunOutcome {
                    outcome: PipelineOutcome::FetchFailed,
                    fetch_metrics: None,
                    webhook_result: None,
                };
                summary.record(&target, &outcome, ctx.policy.redact_logs);
            }
            Err(join_err) => {
                error!(error = %join_err, "target task panicked or was cancelled");
            }
        }
    }

    info!(
        total = summary.total_targets,
        delivered = summary.change_delivered,
        dead_lettered = summary.change_dead_lettered,
        failed = summary.fetch_failed,
        "run pass complete"
    );

    Ok(OrchestratorResult { summary, events })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_url_keeps_scheme_and_host_only() {
        let redacted = redact_url("https://example.com/secret/path?token=abc", true);
        assert_eq!(redacted, "https://example.com/<redacted>");
    }

    #[test]
    fn redact_url_passthrough_when_disabled() {
        let url = "https://example.com/secret/path";
        assert_eq!(redact_url(url, false), url);
    }

    #[test]
    fn run_summary_tracks_failing_targets() {
        let mut summary = RunSummary::default();
        let target = TargetSpec {
            target_url: "https://example.com".to_string(),
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
        };
        let outcome = TargetRunOutcome {
            outcome: PipelineOutcome::FetchFailed,
            fetch_metrics: None,
            webhook_result: None,
        };
        summary.record(&target, &outcome, false);
        assert_eq!(summary.fetch_failed, 1);
        assert_eq!(summary.failing_targets, vec!["https://example.com".to_string()]);
    }
}
