use sha2::{Digest, Sha256};

use crate::config::{RunPolicy, TargetSpec};

/// Everything that affects snapshot semantics for one target: any change
/// here must change the derived key.
///
/// Built by the pipeline from a `TargetSpec` + the run's `RunPolicy` before
/// every fetch, then hashed by [`current_key`].
pub struct StateKeyInputs<'a> {
    pub url: &'a str,
    pub selector: Option<&'a str>,
    pub rendering_mode: &'a str,
    pub wait_for_selector: Option<&'a str>,
    pub wait_ms: Option<u64>,
    pub headers: Vec<(String, String)>,
    pub method: &'a str,
    pub body_hash: Option<String>,
    pub cookies: Vec<(String, String, String)>,
    pub robots_mode: bool,
    pub block_page_regexes: &'a [String],
    pub aggregation_mode: &'a str,
    pub whitespace_mode: &'a str,
    pub unicode_normalization: bool,
    pub fields: &'a [crate::types::FieldSpec],
    pub ignore_json_paths: &'a [String],
    pub ignore_selectors: &'a [String],
    pub ignore_attributes: &'a [String],
    pub ignore_regexes: &'a [String],
}

impl<'a> StateKeyInputs<'a> {
    pub fn from_target(target: &'a TargetSpec, policy: &'a RunPolicy) -> Self {
        let mut headers: Vec<(String, String)> = target
            .headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        headers.sort();

        let mut cookies: Vec<(String, String, String)> = target
            .cookies
            .iter()
            .map(|c| (c.name.clone(), c.domain.clone(), c.path.clone()))
            .collect();
        cookies.sort();

        let body_hash = target.body.as_ref().map(|b| {
            let mut hasher = Sha256::new();
            hasher.update(b.as_bytes());
            hex::encode(hasher.finalize())
        });

        StateKeyInputs {
            url: &target.target_url,
            selector: target.selector.as_deref(),
            rendering_mode: match policy.rendering_mode {
                crate::config::RenderingMode::Static => "static",
                crate::config::RenderingMode::Playwright => "playwright",
            },
            wait_for_selector: target.wait_for_selector.as_deref(),
            wait_ms: target.wait_ms,
            headers,
            method: target.method.as_deref().unwrap_or("GET"),
            body_hash,
            cookies,
            robots_mode: target.robots_mode_enabled,
            block_page_regexes: &policy.block_page_regexes,
            aggregation_mode: match policy.selector_aggregation_mode {
                crate::config::AggregationMode::All => "all",
                crate::config::AggregationMode::First => "first",
            },
            whitespace_mode: match policy.whitespace_mode {
                crate::config::WhitespaceMode::Collapse => "collapse",
                crate::config::WhitespaceMode::PreserveLines => "preserve_lines",
            },
            unicode_normalization: policy.unicode_normalization,
            fields: &target.fields,
            ignore_json_paths: &target.ignore_json_paths,
            ignore_selectors: &policy.ignore_selectors,
            ignore_attributes: &policy.ignore_attributes,
            ignore_regexes: &policy.ignore_regexes,
        }
    }

    fn canonical(&self) -> String {
        let mut fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{}:{}:{}", f.name, f.selector, f.attribute.as_deref().unwrap_or("")))
            .collect();
        fields.sort();

        let mut ignore_json = self.ignore_json_paths.to_vec();
        ignore_json.sort();
        let mut ignore_sel = self.ignore_selectors.to_vec();
        ignore_sel.sort();
        let mut ignore_attr = self.ignore_attributes.to_vec();
        ignore_attr.sort();
        let mut ignore_re = self.ignore_regexes.to_vec();
        ignore_re.sort();
        let mut block_re = self.block_page_regexes.to_vec();
        block_re.sort();

        let headers = self
            .headers
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let cookies = self
            .cookies
            .iter()
            .map(|(n, d, p)| format!("{n}@{d}{p}"))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "url={}|selector={}|mode={}|wait_sel={}|wait_ms={}|headers={}|method={}|body={}|cookies={}|robots={}|block={}|agg={}|ws={}|nfkc={}|fields={}|ijson={}|isel={}|iattr={}|ire={}",
            self.url,
            self.selector.unwrap_or(""),
            self.rendering_mode,
            self.wait_for_selector.unwrap_or(""),
            self.wait_ms.unwrap_or(0),
            headers,
            self.method,
            self.body_hash.as_deref().unwrap_or(""),
            cookies,
            self.robots_mode,
            block_re.join(","),
            self.aggregation_mode,
            self.whitespace_mode,
            self.unicode_normalization,
            fields.join(","),
            ignore_json.join(","),
            ignore_sel.join(","),
            ignore_attr.join(","),
            ignore_re.join(","),
        )
    }

    /// The current-generation state key: a hash over every input that
    /// affects snapshot semantics.
    pub fn current_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        format!("v2-{}", hex::encode(hasher.finalize()))
    }

    /// The legacy-generation key: (target URL, selector) only, kept for the
    /// one-time migration path.
    pub fn legacy_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url.as_bytes());
        hasher.update(b"|");
        hasher.update(self.selector.unwrap_or("").as_bytes());
        format!("v1-{}", hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunPolicy, TargetSpec};
    use std::collections::HashMap;

    fn target(url: &str) -> TargetSpec {
        TargetSpec {
            target_url: url.to_string(),
            selector: None,
            fields: Vec::new(),
            ignore_json_paths: Vec::new(),
            headers: HashMap::new(),
            method: None,
            body: None,
            cookies: Vec::new(),
            wait_for_selector: None,
            wait_ms: None,
            robots_mode_enabled: false,
        }
    }

    #[test]
    fn differing_selector_changes_current_key_not_legacy() {
        let policy = RunPolicy::default();
        let mut a = target("https://example.com");
        let mut b = a.clone();
        a.selector = Some("#x".to_string());
        b.selector = Some("#y".to_string());

        let ka = StateKeyInputs::from_target(&a, &policy);
        let kb = StateKeyInputs::from_target(&b, &policy);
        assert_ne!(ka.current_key(), kb.current_key());
        // Legacy key is (url, selector) too, so it *does* change here —
        // legacy only ignores everything else (headers, mode, ignore rules).
        assert_ne!(ka.legacy_key(), kb.legacy_key());
    }

    #[test]
    fn differing_ignore_rules_change_only_current_key() {
        let mut policy_a = RunPolicy::default();
        let policy_b = {
            let mut p = RunPolicy::default();
            p.ignore_regexes = vec!["[0-9]+".to_string()];
            p
        };
        let t = target("https://example.com");

        let ka = StateKeyInputs::from_target(&t, &policy_a);
        let kb = StateKeyInputs::from_target(&t, &policy_b);
        assert_ne!(ka.current_key(), kb.current_key());
        assert_eq!(ka.legacy_key(), kb.legacy_key());
        policy_a.ignore_regexes.clear();
    }

    #[test]
    fn identical_inputs_produce_identical_keys() {
        let policy = RunPolicy::default();
        let t = target("https://example.com");
        let k1 = StateKeyInputs::from_target(&t, &policy).current_key();
        let k2 = StateKeyInputs::from_target(&t, &policy).current_key();
        assert_eq!(k1, k2);
    }
}
