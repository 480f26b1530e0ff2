use chrono::{DateTime, Utc};
use sentinel_core::config::RunPolicy;
use sentinel_core::TargetMeta;

/// Whether the webhook circuit is currently open for this target (spec
/// §4.12 step 3, testable invariant 9).
pub fn is_open(meta: &TargetMeta, now: DateTime<Utc>) -> bool {
    meta.circuit_open_until.map(|until| now < until).unwrap_or(false)
}

/// A successful delivery closes the circuit and resets the failure streak.
pub fn record_success(meta: &mut TargetMeta) {
    meta.webhook_consecutive_failures = 0;
    meta.circuit_open_until = None;
}

/// A failed delivery extends the streak; once it reaches the configured
/// threshold (and the breaker is enabled), the circuit opens for
/// `webhook_circuit_cooldown_secs`.
pub fn record_failure(meta: &mut TargetMeta, policy: &RunPolicy, now: DateTime<Utc>) {
    meta.webhook_consecutive_failures += 1;
    if policy.webhook_circuit_breaker_enabled
        && meta.webhook_consecutive_failures >= policy.webhook_circuit_failure_threshold
    {
        meta.circuit_open_until =
            Some(now + chrono::Duration::seconds(policy.webhook_circuit_cooldown_secs as i64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u32, cooldown_secs: u64) -> RunPolicy {
        let mut p = RunPolicy::default();
        p.webhook_circuit_breaker_enabled = true;
        p.webhook_circuit_failure_threshold = threshold;
        p.webhook_circuit_cooldown_secs = cooldown_secs;
        p
    }

    #[test]
    fn opens_after_threshold_failures() {
        let mut meta = TargetMeta::default();
        let policy = policy(2, 60);
        let now = Utc::now();
        record_failure(&mut meta, &policy, now);
        assert!(!is_open(&meta, now));
        record_failure(&mut meta, &policy, now);
        assert!(is_open(&meta, now));
    }

    #[test]
    fn closes_after_cooldown_elapses() {
        let mut meta = TargetMeta::default();
        let policy = policy(1, 60);
        let now = Utc::now();
        record_failure(&mut meta, &policy, now);
        assert!(is_open(&meta, now));
        assert!(!is_open(&meta, now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn success_resets_streak_and_closes_circuit() {
        let mut meta = TargetMeta::default();
        let policy = policy(1, 60);
        let now = Utc::now();
        record_failure(&mut meta, &policy, now);
        assert!(is_open(&meta, now));
        record_success(&mut meta);
        assert!(!is_open(&meta, now));
        assert_eq!(meta.webhook_consecutive_failures, 0);
    }

    #[test]
    fn disabled_breaker_never_opens() {
        let mut meta = TargetMeta::default();
        let mut policy = policy(1, 60);
        policy.webhook_circuit_breaker_enabled = false;
        let now = Utc::now();
        record_failure(&mut meta, &policy, now);
        assert!(!is_open(&meta, now));
    }
}
