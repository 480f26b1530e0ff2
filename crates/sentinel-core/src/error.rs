use thiserror::Error;

/// Error taxonomy for the monitoring pipeline.
///
/// Every variant maps to exactly one event-producing branch in the target
/// pipeline; `is_retryable` drives the Retry Core's `shouldRetry` predicate.
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("url safety: {0}")]
    UrlSafety(String),

    #[error("domain policy: {0}")]
    DomainPolicy(String),

    #[error("http error: status {status_code}")]
    Http { status_code: u16 },

    #[error("response too large: {size} bytes (max {max})")]
    ResponseTooLarge { size: usize, max: usize },

    #[error("empty snapshot: {text_length} chars (min {min_text_length})")]
    EmptySnapshot {
        ignored: bool,
        text_length: usize,
        min_text_length: usize,
    },

    #[error("field extraction failed: {field_name}")]
    FieldExtraction { field_name: String },

    #[error("webhook delivery failed: {status_code:?} after {attempts:?} attempts")]
    WebhookDelivery {
        status_code: Option<u16>,
        attempts: Option<u32>,
        duration_ms: Option<u64>,
    },

    #[error("robots disallowed: {0}")]
    RobotsDisallowed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("retry budget exceeded")]
    RetryBudgetExceeded,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SentinelError {
    /// Whether the Retry Core should attempt this error again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SentinelError::Http { status_code } => {
                *status_code == 429 || (500..600).contains(status_code)
            }
            SentinelError::Network(_) | SentinelError::Timeout(_) => true,
            SentinelError::WebhookDelivery { status_code, .. } => match status_code {
                Some(code) => *code == 429 || (500..600).contains(code),
                None => true,
            },
            _ => false,
        }
    }

    /// Short, stable name used in `Event.error.name`.
    pub fn name(&self) -> &'static str {
        match self {
            SentinelError::UrlSafety(_) => "UrlSafetyError",
            SentinelError::DomainPolicy(_) => "DomainPolicyError",
            SentinelError::Http { .. } => "HttpError",
            SentinelError::ResponseTooLarge { .. } => "ResponseTooLargeError",
            SentinelError::EmptySnapshot { .. } => "EmptySnapshotError",
            SentinelError::FieldExtraction { .. } => "FieldExtractionError",
            SentinelError::WebhookDelivery { .. } => "WebhookDeliveryError",
            SentinelError::RobotsDisallowed(_) => "RobotsDisallowedError",
            SentinelError::Network(_) => "NetworkError",
            SentinelError::Timeout(_) => "TimeoutError",
            SentinelError::Parse(_) => "ParseError",
            SentinelError::Store(_) => "StoreError",
            SentinelError::Config(_) => "ConfigError",
            SentinelError::RetryBudgetExceeded => "RetryBudgetExceededError",
            SentinelError::Other(_) => "Error",
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            SentinelError::Http { status_code } => Some(*status_code),
            SentinelError::WebhookDelivery { status_code, .. } => *status_code,
            _ => None,
        }
    }
}
