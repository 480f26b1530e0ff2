use sentinel_core::SentinelError;
use sentinel_diff::diff::remove_ignored_json_paths;
use sentinel_diff::stable_json::stringify;

/// JSON mode: parse, remove values addressed by each ignore
/// JSON-pointer (arrays shrink via removal), then stable-stringify.
/// Malformed JSON is a hard error.
pub fn extract_json_mode(raw_body: &str, ignore_json_paths: &[String]) -> Result<String, SentinelError> {
    let mut value: serde_json::Value = serde_json::from_str(raw_body)
        .map_err(|e| SentinelError::Parse(format!("malformed json: {e}")))?;
    remove_ignored_json_paths(&mut value, ignore_json_paths);
    Ok(stringify(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_ignored_path_and_sorts_keys() {
        let body = r#"{"b":1,"a":{"timestamp":"T1","session":"x"}}"#;
        let out = extract_json_mode(body, &["/a/timestamp".to_string()]).unwrap();
        assert_eq!(out, r#"{"a":{"session":"x"},"b":1}"#);
    }

    #[test]
    fn malformed_json_fails() {
        assert!(extract_json_mode("{not json", &[]).is_err());
    }
}
