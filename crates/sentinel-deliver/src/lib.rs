pub mod politeness;
pub mod retry;
pub mod webhook;

pub use politeness::PolitenessGate;
pub use retry::{with_retries, RetryPolicy};
pub use webhook::{deliver, DeliveryAttempt, DeliveryResult, WebhookOptions};
