use sentinel_core::SentinelError;
use url::Url;

/// Host allow/deny matching. Denylist is evaluated before
/// allowlist; an empty allowlist means "any host not in the denylist".
pub struct DomainPolicy {
    allowlist: Vec<String>,
    denylist: Vec<String>,
}

impl DomainPolicy {
    pub fn new(allowlist: Vec<String>, denylist: Vec<String>) -> Self {
        DomainPolicy { allowlist, denylist }
    }

    pub fn check(&self, url_str: &str) -> Result<(), SentinelError> {
        let url = Url::parse(url_str)
            .map_err(|e| SentinelError::DomainPolicy(format!("invalid url: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| SentinelError::DomainPolicy("url has no host".into()))?
            .to_lowercase();

        if let Some(rule) = self.denylist.iter().find(|p| matches(p, &host)) {
            return Err(SentinelError::DomainPolicy(format!(
                "host {host} matches denylist rule {rule}"
            )));
        }

        if self.allowlist.is_empty() {
            return Ok(());
        }

        if self.allowlist.iter().any(|p| matches(p, &host)) {
            Ok(())
        } else {
            Err(SentinelError::DomainPolicy(format!(
                "host {host} does not match any allowlist rule"
            )))
        }
    }
}

/// Matches `host` against `pattern`: exact (`example.com`), suffix-wildcard
/// (`*.example.com`, strict subdomains only), or leading-dot
/// (`.example.com`, same semantics as the wildcard form).
fn matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_lowercase();
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return is_strict_subdomain(host, suffix);
    }
    if let Some(suffix) = pattern.strip_prefix('.') {
        return is_strict_subdomain(host, suffix);
    }
    host == pattern
}

fn is_strict_subdomain(host: &str, suffix: &str) -> bool {
    host.len() > suffix.len() + 1 && host.ends_with(suffix) && {
        let prefix_len = host.len() - suffix.len();
        host.as_bytes()[prefix_len - 1] == b'.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let p = DomainPolicy::new(vec!["example.com".into()], vec![]);
        assert!(p.check("https://example.com/x").is_ok());
        assert!(p.check("https://sub.example.com/x").is_err());
    }

    #[test]
    fn suffix_wildcard_matches_strict_subdomains_only() {
        let p = DomainPolicy::new(vec!["*.example.com".into()], vec![]);
        assert!(p.check("https://a.example.com/").is_ok());
        assert!(p.check("https://example.com/").is_err());
    }

    #[test]
    fn leading_dot_same_as_wildcard() {
        let p = DomainPolicy::new(vec![".example.com".into()], vec![]);
        assert!(p.check("https://a.example.com/").is_ok());
        assert!(p.check("https://example.com/").is_err());
    }

    #[test]
    fn denylist_evaluated_before_allowlist() {
        let p = DomainPolicy::new(vec!["*.example.com".into()], vec!["bad.example.com".into()]);
        assert!(p.check("https://bad.example.com/").is_err());
        assert!(p.check("https://good.example.com/").is_ok());
    }

    #[test]
    fn empty_allowlist_means_any_host_not_denied() {
        let p = DomainPolicy::new(vec![], vec!["blocked.com".into()]);
        assert!(p.check("https://anything.com/").is_ok());
        assert!(p.check("https://blocked.com/").is_err());
    }
}
