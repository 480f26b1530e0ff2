use sentinel_core::config::EmptySnapshotPolicy;
use sentinel_core::SentinelError;

/// Outcome of the empty-snapshot policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyOutcome {
    NotEmpty,
    Ignored,
    TreatedAsChange,
}

/// `text.len() == 0 || text.len() < min_text_length` triggers the
/// configured policy: `error` fails the attempt, `ignore` continues
/// without touching the baseline, `treat_as_change` continues as if the
/// snapshot were ordinary content.
pub fn check_empty(
    text: &str,
    min_text_length: usize,
    policy: EmptySnapshotPolicy,
) -> Result<EmptyOutcome, SentinelError> {
    if !text.is_empty() && text.len() >= min_text_length {
        return Ok(EmptyOutcome::NotEmpty);
    }

    match policy {
        EmptySnapshotPolicy::Error => Err(SentinelError::EmptySnapshot {
            ignored: false,
            text_length: text.len(),
            min_text_length,
        }),
        EmptySnapshotPolicy::Ignore => Ok(EmptyOutcome::Ignored),
        EmptySnapshotPolicy::TreatAsChange => Ok(EmptyOutcome::TreatedAsChange),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_above_minimum_passes() {
        assert_eq!(
            check_empty("hello", 3, EmptySnapshotPolicy::Error).unwrap(),
            EmptyOutcome::NotEmpty
        );
    }

    #[test]
    fn empty_with_error_policy_fails() {
        assert!(check_empty("", 0, EmptySnapshotPolicy::Error).is_err());
    }

    #[test]
    fn below_minimum_with_ignore_policy_is_ignored() {
        assert_eq!(
            check_empty("ab", 5, EmptySnapshotPolicy::Ignore).unwrap(),
            EmptyOutcome::Ignored
        );
    }

    #[test]
    fn treat_as_change_policy_continues() {
        assert_eq!(
            check_empty("", 0, EmptySnapshotPolicy::TreatAsChange).unwrap(),
            EmptyOutcome::TreatedAsChange
        );
    }
}
