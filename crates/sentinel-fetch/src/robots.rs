use std::time::Duration;

use sentinel_core::SentinelError;
use tracing::debug;
use url::Url;

/// Minimal `robots.txt` check, run only when a target opts in.
/// Fetches `/robots.txt` on the target's origin, honoring the first
/// matching `User-agent: *` (or a more specific agent, if present) block's
/// `Disallow` rules against the path being fetched.
pub async fn check_allowed(
    client: &reqwest::Client,
    url: &Url,
    user_agent: &str,
) -> Result<(), SentinelError> {
    let mut robots_url = url.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);

    let response = match client
        .get(robots_url.as_str())
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(r) => r,
        Err(_) => return Ok(()), // unreachable robots.txt: treat as allow-all
    };

    if !response.status().is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    let disallowed = is_disallowed(&body, user_agent, url.path());
    if disallowed {
        debug!(url = %url, "robots.txt disallows path");
        return Err(SentinelError::RobotsDisallowed(url.path().to_string()));
    }
    Ok(())
}

fn is_disallowed(robots_txt: &str, user_agent: &str, path: &str) -> bool {
    let mut rules = parse_rules(robots_txt, user_agent);
    if rules.is_empty() {
        rules = parse_rules(robots_txt, "*");
    }
    rules
        .iter()
        .filter(|r| !r.is_empty())
        .any(|prefix| path.starts_with(prefix.as_str()))
}

/// Collects `Disallow` prefixes from the block whose `User-agent` matches
/// (case-insensitively) `agent`.
fn parse_rules(robots_txt: &str, agent: &str) -> Vec<String> {
    let mut rules = Vec::new();
    let mut in_matching_block = false;
    let agent_lower = agent.to_lowercase();

    for line in robots_txt.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                in_matching_block = value == "*" || value.to_lowercase() == agent_lower;
            }
            "disallow" if in_matching_block => {
                rules.push(value.to_string());
            }
            _ => {}
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallows_matching_prefix() {
        let robots = "User-agent: *\nDisallow: /private/\n";
        assert!(is_disallowed(robots, "sentinel-watch", "/private/page"));
        assert!(!is_disallowed(robots, "sentinel-watch", "/public/page"));
    }

    #[test]
    fn empty_disallow_allows_everything() {
        let robots = "User-agent: *\nDisallow:\n";
        assert!(!is_disallowed(robots, "sentinel-watch", "/anything"));
    }

    #[test]
    fn specific_agent_block_takes_precedence_when_matched() {
        let robots = "User-agent: sentinel-watch\nDisallow: /blocked\nUser-agent: *\nDisallow:\n";
        assert!(is_disallowed(robots, "sentinel-watch", "/blocked/x"));
    }
}
