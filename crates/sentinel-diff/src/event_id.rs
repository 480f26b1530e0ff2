use sha2::{Digest, Sha256};

use crate::stable_json::stringify;

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Idempotent (v1) event id: identical `(event, url, selector,
/// previousHash, currentHash)` always produce the same id, regardless of
/// when or how many times the run observing it executes. Used for
/// `CHANGE_DETECTED`, `BASELINE_STORED`, `BASELINE_MIGRATED`.
pub fn idempotent_event_id(
    event: &str,
    url: &str,
    selector: Option<&str>,
    previous_hash: Option<&str>,
    current_hash: Option<&str>,
) -> String {
    let payload = serde_json::json!({
        "v": 1,
        "event": event,
        "url": url,
        "selector": selector,
        "previousHash": previous_hash,
        "currentHash": current_hash,
    });
    sha256_hex(&stringify(&payload))
}

/// Per-run (v2) event id: scoped to a single run so repeated
/// per-run events (e.g. `NO_CHANGE` every run) don't collide across runs.
/// `signature` carries event-specific distinguishing data (e.g. an error
/// name or webhook url) so two distinct failures within the same run still
/// get distinct ids.
pub fn per_run_event_id(
    event: &str,
    run_id: &str,
    url: &str,
    selector: Option<&str>,
    current_hash: Option<&str>,
    signature: Option<&str>,
) -> String {
    let payload = serde_json::json!({
        "v": 2,
        "event": event,
        "runId": run_id,
        "url": url,
        "selector": selector,
        "currentHash": current_hash,
        "signature": signature,
    });
    sha256_hex(&stringify(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_id_stable_across_calls() {
        let a = idempotent_event_id("CHANGE_DETECTED", "https://x/", None, Some("h1"), Some("h2"));
        let b = idempotent_event_id("CHANGE_DETECTED", "https://x/", None, Some("h1"), Some("h2"));
        assert_eq!(a, b);
    }

    #[test]
    fn idempotent_id_changes_with_hashes() {
        let a = idempotent_event_id("CHANGE_DETECTED", "https://x/", None, Some("h1"), Some("h2"));
        let b = idempotent_event_id("CHANGE_DETECTED", "https://x/", None, Some("h1"), Some("h3"));
        assert_ne!(a, b);
    }

    #[test]
    fn per_run_id_changes_across_runs() {
        let a = per_run_event_id("NO_CHANGE", "run-1", "https://x/", None, Some("h1"), None);
        let b = per_run_event_id("NO_CHANGE", "run-2", "https://x/", None, Some("h1"), None);
        assert_ne!(a, b);
    }

    #[test]
    fn per_run_id_distinguishes_by_signature() {
        let a = per_run_event_id(
            "WEBHOOK_FAILED",
            "run-1",
            "https://x/",
            None,
            None,
            Some("Timeout"),
        );
        let b = per_run_event_id(
            "WEBHOOK_FAILED",
            "run-1",
            "https://x/",
            None,
            None,
            Some("Http500"),
        );
        assert_ne!(a, b);
    }
}
