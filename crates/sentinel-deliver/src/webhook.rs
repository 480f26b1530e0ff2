use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sentinel_core::config::DeliveryMode;
use sentinel_core::SentinelError;
use sentinel_guard::{DomainPolicy, UrlSafetyGuard};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::retry::{with_retries, RetryPolicy};

type HmacSha256 = Hmac<Sha256>;

/// Per-request delivery options.
pub struct WebhookOptions<'a> {
    pub urls: &'a [String],
    pub delivery_mode: DeliveryMode,
    pub method: &'a str,
    pub content_type: &'a str,
    pub headers: &'a std::collections::HashMap<String, String>,
    pub secret: Option<&'a str>,
    pub event_id: &'a str,
    pub timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub retry_status_codes: Option<&'a [u16]>,
    pub allow_localhost: bool,
}

/// Outcome of delivering to one URL.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub url: String,
    pub attempts: u32,
    pub duration_ms: u64,
    pub terminal_status: Option<u16>,
    pub ok: bool,
    pub diagnostic: Option<String>,
}

/// Overall delivery result across all configured webhook URLs.
pub struct DeliveryResult {
    pub ok: bool,
    pub attempts: Vec<DeliveryAttempt>,
}

/// Delivers `body` (already-serialized JSON) to every URL in
/// `options.urls`, honoring `all`/`any` delivery-mode semantics (spec
/// §4.8). Grounded on the pack's webhook deliverer: HMAC-SHA256 signing,
/// `redirect: manual`, truncated diagnostic body on non-2xx.
pub async fn deliver(
    client: &reqwest::Client,
    guard: &UrlSafetyGuard,
    domain_policy: &DomainPolicy,
    body: &str,
    options: &WebhookOptions<'_>,
) -> Result<DeliveryResult, SentinelError> {
    let timestamp = Utc::now().timestamp();
    let signature = options.secret.map(|secret| sign(secret, timestamp, body));

    let mut attempts = Vec::with_capacity(options.urls.len());
    for url in options.urls {
        guard.verify(url, options.allow_localhost).await?;
        domain_policy.check(url)?;

        let attempt = deliver_one(
            client,
            url,
            body,
            timestamp,
            signature.as_deref(),
            options,
        )
        .await;
        attempts.push(attempt);
    }

    let ok = match options.delivery_mode {
        DeliveryMode::All => attempts.iter().all(|a| a.ok),
        DeliveryMode::Any => attempts.iter().any(|a| a.ok),
    };

    Ok(DeliveryResult { ok, attempts })
}

fn sign(secret: &str, timestamp: i64, body: &str) -> String {
    let signed = format!("{timestamp}.{body}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts keys of any length");
    mac.update(signed.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

async fn deliver_one(
    client: &reqwest::Client,
    url: &str,
    body: &str,
    timestamp: i64,
    signature: Option<&str>,
    options: &WebhookOptions<'_>,
) -> DeliveryAttempt {
    let start = std::time::Instant::now();
    let mut attempt_count = 0u32;
    let retry_status_codes = options.retry_status_codes;

    let should_retry = |err: &SentinelError| match err {
        SentinelError::WebhookDelivery { status_code, .. } => match status_code {
            Some(code) => match retry_status_codes {
                Some(codes) => codes.contains(code),
                None => *code == 429 || (500..600).contains(code),
            },
            None => true,
        },
        _ => false,
    };

    let result: Result<(u16, String), SentinelError> = with_retries(
        &options.retry_policy,
        should_retry,
        || {
            attempt_count += 1;
            send_once(client, url, body, timestamp, signature, options)
        },
    )
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok((status, _)) => DeliveryAttempt {
            url: url.to_string(),
            attempts: attempt_count,
            duration_ms,
            terminal_status: Some(status),
            ok: true,
            diagnostic: None,
        },
        Err(err) => {
            warn!(url, attempts = attempt_count, error = %err, "webhook delivery failed");
            DeliveryAttempt {
                url: url.to_string(),
                attempts: attempt_count,
                duration_ms,
                terminal_status: err.status_code(),
                ok: false,
                diagnostic: Some(err.to_string()),
            }
        }
    }
}

async fn send_once(
    client: &reqwest::Client,
    url: &str,
    body: &str,
    timestamp: i64,
    signature: Option<&str>,
    options: &WebhookOptions<'_>,
) -> Result<(u16, String), SentinelError> {
    let method = reqwest::Method::from_bytes(options.method.as_bytes())
        .map_err(|e| SentinelError::Config(format!("invalid webhook method: {e}")))?;

    let mut request = client
        .request(method, url)
        .timeout(options.timeout)
        .header("Content-Type", options.content_type)
        .header("x-sentinel-event-id", options.event_id)
        .header("Idempotency-Key", options.event_id)
        .header("x-sentinel-timestamp", timestamp.to_string());

    if let Some(sig) = signature {
        request = request.header("x-sentinel-signature", format!("sha256={sig}"));
    }
    for (key, value) in options.headers {
        request = request.header(key, value);
    }

    let response = request
        .body(body.to_string())
        .send()
        .await
        .map_err(|e| SentinelError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    debug!(url, status, "webhook response");

    if (200..300).contains(&status) {
        Ok((status, String::new()))
    } else {
        let text = response.text().await.unwrap_or_default();
        let diagnostic = truncate_diagnostic(&text);
        Err(SentinelError::WebhookDelivery {
            status_code: Some(status),
            attempts: None,
            duration_ms: None,
        })
        .map_err(|e| {
            warn!(url, status, diagnostic = %diagnostic, "webhook non-2xx response");
            e
        })
    }
}

/// At most 4 KiB, redacting control characters and cutting at a char
/// boundary.
fn truncate_diagnostic(body: &str) -> String {
    let cleaned: String = body
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    if cleaned.len() <= 4096 {
        return cleaned;
    }
    let mut cut = 4096;
    while cut > 0 && !cleaned.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...[truncated]", &cleaned[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_reference_hmac() {
        let sig = sign("secret", 1000, "body");
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"1000.body");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(sig, expected);
    }

    #[test]
    fn truncate_diagnostic_respects_char_boundary() {
        let body = "é".repeat(3000);
        let out = truncate_diagnostic(&body);
        assert!(out.ends_with("...[truncated]"));
    }

    #[test]
    fn truncate_diagnostic_strips_control_chars() {
        let body = "hello\x00world\nline";
        let out = truncate_diagnostic(body);
        assert_eq!(out, "helloworld\nline");
    }
}
