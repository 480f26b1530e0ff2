use sentinel_core::{Event, SentinelError};

/// Shrinks `event.changes.text.old`/`new` so the serialized event fits
/// within `max_bytes`. Uses a binary search over the
/// total character budget allotted to `old`+`new` combined, allocating it
/// proportionally between the two with carry-over so neither side is
/// starved when the other is short. Sets `payload_truncated = true` when
/// truncation occurred. Fails if the event cannot be made to fit even with
/// both sides emptied.
pub fn limit_payload(event: &mut Event, max_bytes: usize) -> Result<(), SentinelError> {
    let current_size = serialized_size(event)?;
    if current_size <= max_bytes {
        return Ok(());
    }

    let Some(changes) = event.changes.as_mut() else {
        return Err(SentinelError::ResponseTooLarge {
            size: current_size,
            max: max_bytes,
        });
    };

    let old_chars: Vec<char> = changes.text.old.chars().collect();
    let new_chars: Vec<char> = changes.text.new.chars().collect();
    let total_chars = old_chars.len() + new_chars.len();

    // Drop the optional patch first; it's the cheapest thing to shed.
    if changes.patch.is_some() {
        changes.patch = None;
        if serialized_size(event)? <= max_bytes {
            event.payload_truncated = true;
            return Ok(());
        }
    }

    if total_chars == 0 {
        return Err(SentinelError::ResponseTooLarge {
            size: current_size,
            max: max_bytes,
        });
    }

    let fits = |budget: usize, event: &mut Event| -> Result<bool, SentinelError> {
        apply_budget(event, &old_chars, &new_chars, budget);
        Ok(serialized_size(event)? <= max_bytes)
    };

    let mut low = 0usize;
    let mut high = total_chars;
    if !fits(0, event)? {
        return Err(SentinelError::ResponseTooLarge {
            size: current_size,
            max: max_bytes,
        });
    }
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if fits(mid, event)? {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    apply_budget(event, &old_chars, &new_chars, low);
    event.payload_truncated = low < total_chars;
    Ok(())
}

/// Truncates `old`/`new` to a combined `budget` characters out of the
/// original (pre-truncation) text, splitting proportionally to each side's
/// original length and carrying unused allocation from a short side over to
/// the other. Always slices from `old_full`/`new_full`, never from the
/// event's current (possibly already-shrunk) state, so repeated probes
/// during the caller's binary search are idempotent for a given budget.
fn apply_budget(event: &mut Event, old_full: &[char], new_full: &[char], budget: usize) {
    let Some(changes) = event.changes.as_mut() else {
        return;
    };
    let total = old_full.len() + new_full.len();
    if budget >= total {
        changes.text.old = old_full.iter().collect();
        changes.text.new = new_full.iter().collect();
        return;
    }
    if total == 0 {
        return;
    }

    let old_share = ((old_full.len() as u128 * budget as u128) / total as u128) as usize;
    let new_share = budget - old_share.min(budget);

    let (old_take, new_take) = if old_share <= old_full.len() && new_share <= new_full.len() {
        (old_share, new_share)
    } else if old_share > old_full.len() {
        let carry = old_share - old_full.len();
        (old_full.len(), (new_share + carry).min(new_full.len()))
    } else {
        let carry = new_share.saturating_sub(new_full.len());
        ((old_share + carry).min(old_full.len()), new_full.len().min(new_share))
    };

    changes.text.old = old_full[..old_take.min(old_full.len())].iter().collect();
    changes.text.new = new_full[..new_take.min(new_full.len())].iter().collect();
}

fn serialized_size(event: &Event) -> Result<usize, SentinelError> {
    serde_json::to_vec(event)
        .map(|v| v.len())
        .map_err(|e| SentinelError::Parse(format!("event not serializable: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentinel_core::{Changes, EventKind, TextChange};

    fn base_event(old: &str, new: &str) -> Event {
        Event {
            schema_version: 1,
            event_id: "id".to_string(),
            event: EventKind::ChangeDetected,
            url: "https://example.com/".to_string(),
            selector: None,
            timestamp: Utc::now(),
            previous: None,
            current: None,
            changes: Some(Changes {
                text: TextChange {
                    old: old.to_string(),
                    new: new.to_string(),
                    delta: None,
                },
                fields: None,
                json: None,
                patch: None,
            }),
            summary: None,
            artifacts: None,
            error: None,
            payload_truncated: false,
        }
    }

    #[test]
    fn no_truncation_when_already_fits() {
        let mut event = base_event("short old", "short new");
        limit_payload(&mut event, 10_000).unwrap();
        assert!(!event.payload_truncated);
        assert_eq!(event.changes.as_ref().unwrap().text.old, "short old");
    }

    #[test]
    fn truncates_and_flags_when_oversized() {
        let old = "a".repeat(5_000);
        let new = "b".repeat(5_000);
        let mut event = base_event(&old, &new);
        limit_payload(&mut event, 1_000).unwrap();
        assert!(event.payload_truncated);
        let size = serialized_size(&event).unwrap();
        assert!(size <= 1_000);
    }

    #[test]
    fn drops_patch_before_truncating_text() {
        let mut event = base_event("small old", "small new");
        event.changes.as_mut().unwrap().patch = Some("x".repeat(2_000));
        let budget = serialized_size(&event).unwrap() - 100;
        limit_payload(&mut event, budget).unwrap();
        assert!(event.changes.as_ref().unwrap().patch.is_none());
    }
}
