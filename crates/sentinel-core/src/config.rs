use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CookieSpec, FieldSpec};

fn default_max_content_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_redirects() -> u32 {
    5
}

fn default_max_payload_bytes() -> usize {
    256 * 1024
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_fetch_connect_timeout_secs() -> u64 {
    10
}

fn default_fetch_max_retries() -> u32 {
    2
}

fn default_fetch_retry_backoff_ms() -> u64 {
    500
}

fn default_webhook_retry_max_retries() -> u32 {
    4
}

fn default_webhook_retry_backoff_ms() -> u64 {
    1000
}

fn default_circuit_failure_threshold() -> u32 {
    5
}

fn default_circuit_cooldown_secs() -> u64 {
    900
}

fn default_max_concurrency() -> usize {
    4
}

fn default_min_text_length() -> usize {
    0
}

fn default_fetch_failure_debounce_secs() -> u64 {
    3600
}

/// Top-level run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Monitor,
    ReplayDeadLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingMode {
    Static,
    Playwright,
}

impl Default for RenderingMode {
    fn default() -> Self {
        RenderingMode::Static
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    All,
    First,
}

impl Default for AggregationMode {
    fn default() -> Self {
        AggregationMode::First
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitespaceMode {
    Collapse,
    PreserveLines,
}

impl Default for WhitespaceMode {
    fn default() -> Self {
        WhitespaceMode::Collapse
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    Silent,
    Notify,
}

impl Default for BaselineMode {
    fn default() -> Self {
        BaselineMode::Silent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySnapshotPolicy {
    Error,
    Ignore,
    TreatAsChange,
}

impl Default for EmptySnapshotPolicy {
    fn default() -> Self {
        EmptySnapshotPolicy::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    All,
    Any,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::All
    }
}

/// One monitored target. `url` plus everything here affects the current
/// state key: any change to snapshot semantics must change the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    pub target_url: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub ignore_json_paths: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub cookies: Vec<CookieSpec>,
    #[serde(default)]
    pub wait_for_selector: Option<String>,
    #[serde(default)]
    pub wait_ms: Option<u64>,
    #[serde(default)]
    pub robots_mode_enabled: bool,
}

/// Run-wide policy shared by every target this invocation processes
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunPolicy {
    pub rendering_mode: RenderingMode,
    pub ignore_selectors: Vec<String>,
    pub ignore_attributes: Vec<String>,
    pub ignore_regexes: Vec<String>,
    pub ignore_regex_presets: Vec<String>,
    pub block_page_regexes: Vec<String>,
    pub selector_aggregation_mode: AggregationMode,
    pub whitespace_mode: WhitespaceMode,
    pub unicode_normalization: bool,

    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_connect_timeout_secs")]
    pub fetch_connect_timeout_secs: u64,
    #[serde(default = "default_fetch_max_retries")]
    pub fetch_max_retries: u32,
    #[serde(default = "default_fetch_retry_backoff_ms")]
    pub fetch_retry_backoff_ms: u64,
    pub fetch_proxy: Option<String>,

    pub webhook_urls: Vec<String>,
    pub webhook_delivery_mode: DeliveryMode,
    #[serde(default = "default_post")]
    pub webhook_method: String,
    #[serde(default = "default_content_type")]
    pub webhook_content_type: String,
    pub webhook_headers: HashMap<String, String>,
    pub webhook_secret: Option<String>,

    #[serde(default = "default_webhook_retry_max_retries")]
    pub webhook_retry_max_retries: u32,
    #[serde(default = "default_webhook_retry_backoff_ms")]
    pub webhook_retry_backoff_ms: u64,
    pub webhook_retry_max_total_time_ms: Option<u64>,
    pub webhook_retry_status_codes: Option<Vec<u16>>,

    pub webhook_circuit_breaker_enabled: bool,
    #[serde(default = "default_circuit_failure_threshold")]
    pub webhook_circuit_failure_threshold: u32,
    #[serde(default = "default_circuit_cooldown_secs")]
    pub webhook_circuit_cooldown_secs: u64,

    pub politeness_delay_ms: u64,
    pub politeness_jitter_ms: u64,
    pub schedule_jitter_ms: u64,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    pub baseline_mode: BaselineMode,
    pub reset_baseline: bool,
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    pub on_empty_snapshot: EmptySnapshotPolicy,
    pub min_change_ratio: f64,

    pub target_domain_allowlist: Vec<String>,
    pub target_domain_denylist: Vec<String>,
    pub webhook_domain_allowlist: Vec<String>,
    pub webhook_domain_denylist: Vec<String>,
    pub allow_localhost: bool,

    pub redact_logs: bool,
    pub structured_logs: bool,
    pub debug: bool,

    pub notify_on_no_change: bool,
    pub notify_on_fetch_failure: bool,
    #[serde(default = "default_fetch_failure_debounce_secs")]
    pub fetch_failure_debounce_secs: u64,
}

fn default_post() -> String {
    "POST".to_string()
}

fn default_content_type() -> String {
    "application/json".to_string()
}

impl Default for RunPolicy {
    fn default() -> Self {
        RunPolicy {
            rendering_mode: RenderingMode::default(),
            ignore_selectors: Vec::new(),
            ignore_attributes: Vec::new(),
            ignore_regexes: Vec::new(),
            ignore_regex_presets: Vec::new(),
            block_page_regexes: Vec::new(),
            selector_aggregation_mode: AggregationMode::default(),
            whitespace_mode: WhitespaceMode::default(),
            unicode_normalization: false,
            max_content_bytes: default_max_content_bytes(),
            max_redirects: default_max_redirects(),
            max_payload_bytes: default_max_payload_bytes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_connect_timeout_secs: default_fetch_connect_timeout_secs(),
            fetch_max_retries: default_fetch_max_retries(),
            fetch_retry_backoff_ms: default_fetch_retry_backoff_ms(),
            fetch_proxy: None,
            webhook_urls: Vec::new(),
            webhook_delivery_mode: DeliveryMode::default(),
            webhook_method: default_post(),
            webhook_content_type: default_content_type(),
            webhook_headers: HashMap::new(),
            webhook_secret: None,
            webhook_retry_max_retries: default_webhook_retry_max_retries(),
            webhook_retry_backoff_ms: default_webhook_retry_backoff_ms(),
            webhook_retry_max_total_time_ms: None,
            webhook_retry_status_codes: None,
            webhook_circuit_breaker_enabled: false,
            webhook_circuit_failure_threshold: default_circuit_failure_threshold(),
            webhook_circuit_cooldown_secs: default_circuit_cooldown_secs(),
            politeness_delay_ms: 0,
            politeness_jitter_ms: 0,
            schedule_jitter_ms: 0,
            max_concurrency: default_max_concurrency(),
            baseline_mode: BaselineMode::default(),
            reset_baseline: false,
            min_text_length: default_min_text_length(),
            on_empty_snapshot: EmptySnapshotPolicy::default(),
            min_change_ratio: 0.0,
            target_domain_allowlist: Vec::new(),
            target_domain_denylist: Vec::new(),
            webhook_domain_allowlist: Vec::new(),
            webhook_domain_denylist: Vec::new(),
            allow_localhost: false,
            redact_logs: false,
            structured_logs: false,
            debug: false,
            notify_on_no_change: false,
            notify_on_fetch_failure: false,
            fetch_failure_debounce_secs: default_fetch_failure_debounce_secs(),
        }
    }
}

/// Top-level configuration document. Unknown keys are rejected by the
/// flattened `RunPolicy`, which carries its own `deny_unknown_fields`;
/// `serde` does not support that attribute on a struct that itself uses
/// `#[serde(flatten)]`, so it is not repeated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    pub mode: RunMode,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    /// Extraction options for the single-target (`target_url`) form.
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub ignore_json_paths: Vec<String>,
    #[serde(flatten)]
    pub policy: RunPolicy,
    #[serde(default)]
    pub replay: ReplayOptions,
}

/// Options specific to `mode: replay_dead_letter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReplayOptions {
    pub limit: usize,
    pub dry_run: bool,
    pub use_stored_webhook_url: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        ReplayOptions {
            limit: 50,
            dry_run: false,
            use_stored_webhook_url: true,
        }
    }
}

impl SentinelConfig {
    /// Resolve the effective target list: `targets[]` if present, otherwise
    /// a single target built from `target_url`.
    pub fn resolved_targets(&self) -> Vec<TargetSpec> {
        if !self.targets.is_empty() {
            return self.targets.clone();
        }
        match &self.target_url {
            Some(url) => vec![TargetSpec {
                target_url: url.clone(),
                selector: self.selector.clone(),
                fields: self.fields.clone(),
                ignore_json_paths: self.ignore_json_paths.clone(),
                headers: HashMap::new(),
                method: None,
                body: None,
                cookies: Vec::new(),
                wait_for_selector: None,
                wait_ms: None,
                robots_mode_enabled: false,
            }],
            None => Vec::new(),
        }
    }
}
