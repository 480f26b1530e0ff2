use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Network::ResourceType;
use headless_chrome::{Browser, LaunchOptionsBuilder};
use sentinel_core::config::{RunPolicy, TargetSpec};
use sentinel_core::{FetchMetrics, Fetcher, SentinelError, Snapshot, Validators};
use sentinel_deliver::PolitenessGate;
use sentinel_guard::{DomainPolicy, UrlSafetyGuard};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Headless-browser backend. `headless_chrome`'s API
/// is synchronous, so each fetch runs on a blocking thread; the guard/
/// politeness/robots checks that apply per-hop in the static backend apply
/// once here, since the browser follows its own redirect chain internally.
pub struct RenderedFetcher {
    guard: Arc<UrlSafetyGuard>,
    target_domain_policy: Arc<DomainPolicy>,
    politeness: Arc<PolitenessGate>,
    max_content_bytes: usize,
    allow_localhost: bool,
    politeness_delay: Duration,
    politeness_jitter: Duration,
    block_images_media_fonts: bool,
    ignore_selectors: Vec<String>,
    ignore_attributes: Vec<String>,
    ignore_regexes: Vec<String>,
    ignore_regex_presets: Vec<String>,
    aggregation_mode: sentinel_core::config::AggregationMode,
    whitespace_mode: sentinel_core::config::WhitespaceMode,
    unicode_normalization: bool,
}

impl RenderedFetcher {
    pub fn new(
        policy: &RunPolicy,
        guard: Arc<UrlSafetyGuard>,
        target_domain_policy: Arc<DomainPolicy>,
        politeness: Arc<PolitenessGate>,
    ) -> Self {
        RenderedFetcher {
            guard,
            target_domain_policy,
            politeness,
            max_content_bytes: policy.max_content_bytes,
            allow_localhost: policy.allow_localhost,
            politeness_delay: Duration::from_millis(policy.politeness_delay_ms),
            politeness_jitter: Duration::from_millis(policy.politeness_jitter_ms),
            block_images_media_fonts: false,
            ignore_selectors: policy.ignore_selectors.clone(),
            ignore_attributes: policy.ignore_attributes.clone(),
            ignore_regexes: policy.ignore_regexes.clone(),
            ignore_regex_presets: policy.ignore_regex_presets.clone(),
            aggregation_mode: policy.selector_aggregation_mode,
            whitespace_mode: policy.whitespace_mode,
            unicode_normalization: policy.unicode_normalization,
        }
    }
}

#[async_trait]
impl Fetcher for RenderedFetcher {
    async fn fetch(
        &self,
        target: &TargetSpec,
        _previous: Option<&Snapshot>,
    ) -> Result<Snapshot, SentinelError> {
        self.target_domain_policy.check(&target.target_url)?;
        self.guard
            .verify(&target.target_url, self.allow_localhost)
            .await?;
        let host = url::Url::parse(&target.target_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();
        self.politeness
            .wait(&host, self.politeness_delay, self.politeness_jitter)
            .await;

        let start = Instant::now();
        let target = target.clone();
        let block_images_media_fonts = self.block_images_media_fonts;
        let max_content_bytes = self.max_content_bytes;

        let allow_localhost = self.allow_localhost;
        let (html, final_url, status) = tokio::task::spawn_blocking(move || {
            render(&target, block_images_media_fonts, max_content_bytes, allow_localhost)
        })
        .await
        .map_err(|e| SentinelError::Other(anyhow::anyhow!("render task panicked: {e}")))??;

        let content_type = if html.trim_start().starts_with('{') || html.trim_start().starts_with('[')
        {
            Some("application/json".to_string())
        } else if html.trim_start().starts_with("<?xml") {
            Some("application/xml".to_string())
        } else {
            Some("text/html".to_string())
        };

        let normalize_input = sentinel_normalize::NormalizeInput {
            raw_body: &html,
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

        if normalized.text.len() > max_content_bytes {
            return Err(SentinelError::ResponseTooLarge {
                size: normalized.text.len(),
                max: max_content_bytes,
            });
        }

        let content_hash = hex::encode(Sha256::digest(normalized.text.as_bytes()));
        let elapsed = start.elapsed();

        Ok(Snapshot {
            monitored_url: target.target_url.clone(),
            final_url,
            fetched_at: chrono::Utc::now(),
            status,
            mode: normalized.mode,
            text: normalized.text,
            html: normalized.html,
            content_hash,
            validators: Validators::default(),
            metrics: FetchMetrics {
                bytes: html.len(),
                duration_ms: elapsed.as_millis() as u64,
                attempts: 1,
                redirect_count: 0,
                not_modified: false,
            },
        })
    }
}

fn render(
    target: &TargetSpec,
    block_images_media_fonts: bool,
    max_content_bytes: usize,
    allow_localhost: bool,
) -> Result<(String, String, u16), SentinelError> {
    let mut builder = LaunchOptionsBuilder::default();
    builder
        .headless(true)
        .args(vec![
            std::ffi::OsStr::new("--no-sandbox"),
            std::ffi::OsStr::new("--disable-dev-shm-usage"),
            std::ffi::OsStr::new("--disable-gpu"),
        ]);
    if let Ok(chrome_path) = std::env::var("CHROME_PATH") {
        builder.path(Some(std::path::PathBuf::from(chrome_path)));
    }
    let launch_options = builder
        .build()
        .map_err(|e| SentinelError::Config(format!("invalid chrome launch options: {e}")))?;

    let browser =
        Browser::new(launch_options).map_err(|e| SentinelError::Network(e.to_string()))?;
    let tab = browser
        .new_tab()
        .map_err(|e| SentinelError::Network(e.to_string()))?;

    // Blocks non-HTTP(S) subrequests, and optionally images/media/fonts,
    // before each one is allowed onto the wire.
    let blocked_resource_types = if block_images_media_fonts {
        vec![ResourceType::Image, ResourceType::Media, ResourceType::Font]
    } else {
        Vec::new()
    };
    if let Err(e) = tab.enable_request_interception(Arc::new(
        move |_transport, _session_id, event: RequestPausedEvent| {
            let url = &event.params.request.url;
            let resource_blocked = blocked_resource_types.contains(&event.params.resource_type);
            if !subresource_url_is_safe(url, allow_localhost) || resource_blocked {
                RequestPausedDecision::Fail(headless_chrome::protocol::cdp::Network::ErrorReason::BlockedByClient)
            } else {
                RequestPausedDecision::Continue(None)
            }
        },
    )) {
        warn!(error = %e, "failed to enable resource interception");
    }

    if !target.cookies.is_empty() {
        let script = target
            .cookies
            .iter()
            .map(|c| format!("document.cookie = {:?};", format!("{}={}; path={}", c.name, c.value, c.path)))
            .collect::<Vec<_>>()
            .join("\n");
        if let Err(e) = tab.evaluate(&script, false) {
            warn!(error = %e, "failed to set cookies via document.cookie");
        }
    }

    tab.navigate_to(&target.target_url)
        .map_err(|e| SentinelError::Network(e.to_string()))?;
    tab.wait_until_navigated()
        .map_err(|e| SentinelError::Network(e.to_string()))?;

    if let Some(wait_ms) = target.wait_ms {
        std::thread::sleep(Duration::from_millis(wait_ms));
    }

    if let Some(selector) = &target.wait_for_selector {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            if tab.find_element(selector).is_ok() {
                break;
            }
            if Instant::now() > deadline {
                return Err(SentinelError::Timeout(30_000));
            }
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    let final_url = tab.get_url();
    let html = tab
        .get_content()
        .map_err(|e| SentinelError::Network(e.to_string()))?;

    debug!(url = %target.target_url, bytes = html.len(), "rendered fetch complete");

    if html.len() > max_content_bytes {
        return Err(SentinelError::ResponseTooLarge {
            size: html.len(),
            max: max_content_bytes,
        });
    }

    Ok((html, final_url, 200))
}

/// Best-effort per-subresource safety check: scheme
/// plus obvious private/loopback IP literals. The interception callback is
/// synchronous, so it cannot run the full `UrlSafetyGuard::verify` (which
/// does DNS resolution); hostnames are allowed through here and rely on the
/// top-level navigation check plus the domain policy already applied to the
/// target URL.
fn subresource_url_is_safe(url: &str, allow_localhost: bool) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        if ip.is_loopback() {
            return allow_localhost;
        }
        let is_private = match ip {
            std::net::IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
            std::net::IpAddr::V6(_) => false,
        };
        if is_private {
            return false;
        }
    }
    true
}
