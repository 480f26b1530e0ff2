use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sentinel_core::config::{RunPolicy, TargetSpec};
use sentinel_core::{FetchMetrics, Fetcher, SentinelError, Snapshot, Validators};
use sentinel_deliver::PolitenessGate;
use sentinel_guard::{DomainPolicy, UrlSafetyGuard};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

const USER_AGENT: &str = "sentinel-watch/1";

/// Static HTTP backend. Follows redirects manually rather than handing the
/// chain to the client's own redirect policy, so every hop gets its own
/// domain-policy and URL-safety check.
pub struct StaticFetcher {
    client: reqwest::Client,
    guard: Arc<UrlSafetyGuard>,
    target_domain_policy: Arc<DomainPolicy>,
    politeness: Arc<PolitenessGate>,
    max_redirects: u32,
    max_content_bytes: usize,
    politeness_delay: Duration,
    politeness_jitter: Duration,
    allow_localhost: bool,
    robots_enabled_globally: bool,
    ignore_selectors: Vec<String>,
    ignore_attributes: Vec<String>,
    ignore_regexes: Vec<String>,
    ignore_regex_presets: Vec<String>,
    aggregation_mode: sentinel_core::config::AggregationMode,
    whitespace_mode: sentinel_core::config::WhitespaceMode,
    unicode_normalization: bool,
}

impl StaticFetcher {
    pub fn new(
        policy: &RunPolicy,
        guard: Arc<UrlSafetyGuard>,
        target_domain_policy: Arc<DomainPolicy>,
        politeness: Arc<PolitenessGate>,
    ) -> Result<Self, SentinelError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(policy.fetch_connect_timeout_secs))
            .timeout(Duration::from_secs(policy.fetch_timeout_secs))
            .user_agent(USER_AGENT);

        if let Some(proxy) = &policy.fetch_proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| SentinelError::Config(format!("invalid fetch_proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SentinelError::Config(format!("failed to build http client: {e}")))?;

        Ok(StaticFetcher {
            client,
            guard,
            target_domain_policy,
            politeness,
            max_redirects: policy.max_redirects,
            max_content_bytes: policy.max_content_bytes,
            politeness_delay: Duration::from_millis(policy.politeness_delay_ms),
            politeness_jitter: Duration::from_millis(policy.politeness_jitter_ms),
            allow_localhost: policy.allow_localhost,
            robots_enabled_globally: true,
            ignore_selectors: policy.ignore_selectors.clone(),
            ignore_attributes: policy.ignore_attributes.clone(),
            ignore_regexes: policy.ignore_regexes.clone(),
            ignore_regex_presets: policy.ignore_regex_presets.clone(),
            aggregation_mode: policy.selector_aggregation_mode,
            whitespace_mode: policy.whitespace_mode,
            unicode_normalization: policy.unicode_normalization,
        })
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(
        &self,
        target: &TargetSpec,
        previous: Option<&Snapshot>,
    ) -> Result<Snapshot, SentinelError> {
        let start = Instant::now();
        let mut url = Url::parse(&target.target_url)
            .map_err(|e| SentinelError::UrlSafety(format!("invalid target url: {e}")))?;
        let mut method = target
            .method
            .clone()
            .unwrap_or_else(|| "GET".to_string())
            .to_uppercase();
        let mut body = target.body.clone();
        let mut redirect_count = 0u32;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            self.target_domain_policy.check(url.as_str())?;
            self.guard.verify(url.as_str(), self.allow_localhost).await?;

            let host = url.host_str().unwrap_or("").to_string();
            self.politeness
                .wait(&host, self.politeness_delay, self.politeness_jitter)
                .await;

            if target.robots_mode_enabled && self.robots_enabled_globally {
                crate::robots::check_allowed(&self.client, &url, USER_AGENT).await?;
            }

            let mut request = self.client.request(
                reqwest::Method::from_bytes(method.as_bytes())
                    .map_err(|e| SentinelError::Config(format!("invalid method: {e}")))?,
                url.as_str(),
            );

            for (key, value) in &target.headers {
                request = request.header(key, value);
            }

            let is_conditional_eligible = (method == "GET" || method == "HEAD")
                && body.is_none()
                && previous.map(|p| p.final_url == url.as_str()).unwrap_or(false);
            if is_conditional_eligible {
                if let Some(prev) = previous {
                    if let Some(etag) = &prev.validators.etag {
                        request = request.header("If-None-Match", etag);
                    }
                    if let Some(last_modified) = &prev.validators.last_modified {
                        request = request.header("If-Modified-Since", last_modified);
                    }
                }
            }

            if !target.cookies.is_empty() {
                let cookie_header = target
                    .cookies
                    .iter()
                    .map(|c| format!("{}={}", c.name, c.value))
                    .collect::<Vec<_>>()
                    .join("; ");
                request = request.header("Cookie", cookie_header);
            }

            if let Some(b) = &body {
                request = request.body(b.clone());
            }

            debug!(url = %url, method = %method, attempt = attempts, "static fetch");

            let response = request
                .send()
                .await
                .map_err(|e| SentinelError::Network(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response.headers().clone();

            if status == 304 {
                let Some(prev) = previous else {
                    return Err(SentinelError::Http { status_code: 304 });
                };
                let elapsed = start.elapsed();
                return Ok(Snapshot {
                    monitored_url: target.target_url.clone(),
                    final_url: prev.final_url.clone(),
                    fetched_at: chrono::Utc::now(),
                    status,
                    mode: prev.mode,
                    text: prev.text.clone(),
                    html: prev.html.clone(),
                    content_hash: prev.content_hash.clone(),
                    validators: prev.validators.clone(),
                    metrics: FetchMetrics {
                        bytes: 0,
                        duration_ms: elapsed.as_millis() as u64,
                        attempts,
                        redirect_count,
                        not_modified: true,
                    },
                });
            }

            if (300..400).contains(&status) {
                let location = headers
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| SentinelError::Network("redirect with no Location".into()))?;
                let next_url = url
                    .join(location)
                    .map_err(|e| SentinelError::Network(format!("invalid redirect location: {e}")))?;

                redirect_count += 1;
                if redirect_count > self.max_redirects {
                    return Err(SentinelError::Network(format!(
                        "exceeded max_redirects ({})",
                        self.max_redirects
                    )));
                }

                if status == 303 || ((status == 301 || status == 302) && method != "GET" && method != "HEAD") {
                    method = "GET".to_string();
                    body = None;
                }

                url = next_url;
                continue;
            }

            if status == 429 || (500..600).contains(&status) {
                return Err(SentinelError::Http { status_code: status });
            }

            let content_length = headers
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            if let Some(len) = content_length {
                if len > self.max_content_bytes {
                    return Err(SentinelError::ResponseTooLarge {
                        size: len,
                        max: self.max_content_bytes,
                    });
                }
            }

            let final_url = response.url().to_string();
            let etag = headers
                .get("etag")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let last_modified = headers
                .get("last-modified")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let content_type = headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let raw_body = read_body_capped(response, self.max_content_bytes).await?;
            let raw_text = String::from_utf8_lossy(&raw_body).to_string();

            let normalize_input = sentinel_normalize::NormalizeInput {
                raw_body: &raw_text,
                content_type: content_type.as_deref(),
                fields: &target.fields,
                ignore_json_paths: &target.ignore_json_paths,
                selector: target.selector.as_deref(),
                ignore_selectors: &self.ignore_selectors,
                ignore_attributes: &self.ignore_attributes,
                ignore_regexes: &self.ignore_regexes,
                ignore_regex_presets: &self.ignore_regex_presets,
                aggregation_mode: self.aggregation_mode,
                whitespace_mode: self.whitespace_mode,
                unicode_normalization: self.unicode_normalization,
            };
            let normalized = sentinel_normalize::normalize(&normalize_input)?;
            let content_hash = hex::encode(Sha256::digest(normalized.text.as_bytes()));

            let elapsed = start.elapsed();
            return Ok(Snapshot {
                monitored_url: target.target_url.clone(),
                final_url,
                fetched_at: chrono::Utc::now(),
                status,
                mode: normalized.mode,
                text: normalized.text,
                html: normalized.html,
                content_hash,
                validators: Validators {
                    etag,
                    last_modified,
                },
                metrics: FetchMetrics {
                    bytes: raw_body.len(),
                    duration_ms: elapsed.as_millis() as u64,
                    attempts,
                    redirect_count,
                    not_modified: false,
                },
            });
        }
    }
}

async fn read_body_capped(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, SentinelError> {
    use futures_util::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SentinelError::Network(e.to_string()))?;
        buf.extend_from_slice(&chunk);
        if buf.len() > max_bytes {
            return Err(SentinelError::ResponseTooLarge {
                size: buf.len(),
                max: max_bytes,
            });
        }
    }
    Ok(buf)
}
