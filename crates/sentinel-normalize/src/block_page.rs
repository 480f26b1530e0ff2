use regex::Regex;
use sentinel_core::SentinelError;

/// Anti-baseline-poisoning check: if any configured regex
/// matches the normalized text or the selected HTML, the snapshot is
/// rejected outright rather than stored as a baseline or diffed against.
pub fn check_block_page(
    text: &str,
    html: Option<&str>,
    block_page_regexes: &[Regex],
) -> Result<(), SentinelError> {
    for pattern in block_page_regexes {
        if pattern.is_match(text) || html.map(|h| pattern.is_match(h)).unwrap_or(false) {
            return Err(SentinelError::Parse(format!(
                "block page detected: matched pattern {}",
                pattern.as_str()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_pattern_rejects_snapshot() {
        let re = Regex::new(r"(?i)checking your browser").unwrap();
        let err = check_block_page("Checking your browser before accessing", None, &[re])
            .unwrap_err();
        assert!(err.to_string().contains("block page"));
    }

    #[test]
    fn no_match_is_ok() {
        let re = Regex::new(r"(?i)checking your browser").unwrap();
        assert!(check_block_page("Welcome to our store", None, &[re]).is_ok());
    }
}
