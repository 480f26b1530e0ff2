use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version stamped on idempotent events.
pub const EVENT_SCHEMA_V1: u32 = 1;
/// Schema version stamped on per-run events (`NO_CHANGE` / `FETCH_FAILED`).
pub const EVENT_SCHEMA_V2: u32 = 2;

/// Which normalization path produced a Snapshot's `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    Text,
    Fields,
    Json,
}

/// A name → CSS/XPath-ish selector + attribute pair for fields mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub selector: String,
    /// When set, take this attribute's value; otherwise concatenated text.
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// Fetch-side metrics recorded for every attempt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FetchMetrics {
    pub bytes: usize,
    pub duration_ms: u64,
    pub attempts: u32,
    pub redirect_count: u32,
    pub not_modified: bool,
}

/// Validator headers carried forward for conditional requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// The normalized artifact used for comparison.
///
/// Invariant: `content_hash == sha256(text)`, and `text` is a pure function
/// of (raw body, mode, normalization rules) — see `sentinel_normalize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub monitored_url: String,
    pub final_url: String,
    pub fetched_at: DateTime<Utc>,
    pub status: u16,
    pub mode: SnapshotMode,
    pub text: String,
    pub html: Option<String>,
    pub content_hash: String,
    pub validators: Validators,
    pub metrics: FetchMetrics,
}

/// Hash + timestamp pair identifying a point-in-time content state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: String,
    pub fetched_at: DateTime<Utc>,
}

impl From<&Snapshot> for Fingerprint {
    fn from(s: &Snapshot) -> Self {
        Fingerprint {
            hash: s.content_hash.clone(),
            fetched_at: s.fetched_at,
        }
    }
}

/// A single textual change, with an optional numeric delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChange {
    pub old: String,
    pub new: String,
    pub delta: Option<f64>,
}

/// A single field's before/after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: String,
    pub new: String,
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonOp {
    Add,
    Remove,
    Replace,
}

/// One entry in a structural JSON diff, ordered by `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDiffEntry {
    pub path: String,
    pub op: JsonOp,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// The `changes` block of a `CHANGE_DETECTED` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changes {
    pub text: TextChange,
    pub fields: Option<HashMap<String, FieldChange>>,
    pub json: Option<Vec<JsonDiffEntry>>,
    /// Unified diff patch, dropped if it would overrun the payload limit.
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub name: String,
    pub message: String,
    pub status_code: Option<u16>,
    pub attempts: Option<u32>,
    pub duration_ms: Option<u64>,
}

/// Event kinds. `RUN_SUMMARY` is modeled separately
/// (`sentinel_pipeline::orchestrator::RunSummary`) since its shape is a
/// run-level aggregate, not a per-target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    BaselineStored,
    BaselineMigrated,
    ChangeDetected,
    ChangeSuppressed,
    NoChange,
    FetchFailed,
    EmptySnapshotIgnored,
    EmptySnapshotError,
    WebhookFailed,
    WebhookCircuitOpen,
}

impl EventKind {
    /// Whether this event kind uses the idempotent (v1) or per-run (v2)
    /// event-id encoding.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            EventKind::ChangeDetected | EventKind::BaselineStored | EventKind::BaselineMigrated
        )
    }
}

/// A fully composed pipeline event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub schema_version: u32,
    pub event_id: String,
    pub event: EventKind,
    pub url: String,
    pub selector: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub previous: Option<Fingerprint>,
    pub current: Option<Fingerprint>,
    pub changes: Option<Changes>,
    pub summary: Option<String>,
    pub artifacts: Option<Vec<String>>,
    pub error: Option<ErrorDetail>,
    pub payload_truncated: bool,
}

/// A failed delivery persisted for later replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub webhook_url: String,
    pub target_url: String,
    pub state_key: String,
    pub error_detail: String,
    pub payload_preview: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-state-key bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetMeta {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<String>,
    pub last_success_fingerprint: Option<Fingerprint>,
    pub webhook_consecutive_failures: u32,
    pub circuit_open_until: Option<DateTime<Utc>>,
    pub fetch_failure_debounce: Option<DebounceMarker>,
    pub no_change_debounce: Option<DebounceMarker>,
}

/// Tracks the last time a debounced notification fired for a given
/// failure/heartbeat signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceMarker {
    pub signature: String,
    pub last_notified_at: DateTime<Utc>,
}
