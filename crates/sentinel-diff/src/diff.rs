use std::collections::{BTreeSet, HashMap};

use sentinel_core::{FieldChange, JsonDiffEntry, JsonOp, SentinelError, TextChange};
use serde_json::Value;

/// Computes a text change. Returns `None` when hashes are equal; `delta` is
/// set only when both texts are ≤64 chars and both parse a leading number.
pub fn compute_text_change(
    previous_hash: &str,
    previous_text: &str,
    current_hash: &str,
    current_text: &str,
) -> Option<TextChange> {
    if previous_hash == current_hash {
        return None;
    }
    let delta = if previous_text.len() <= 64 && current_text.len() <= 64 {
        match (parse_leading_number(previous_text), parse_leading_number(current_text)) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        }
    } else {
        None
    };
    Some(TextChange {
        old: previous_text.to_string(),
        new: current_text.to_string(),
        delta,
    })
}

/// Parses a leading numeric prefix (optional sign, digits, optional decimal
/// part) out of a trimmed string.
fn parse_leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let mut end = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0usize;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let mut saw_digit = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        saw_digit = true;
        end = i;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        let dot = i;
        let mut j = i + 1;
        let mut saw_frac = false;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
            saw_frac = true;
        }
        if saw_frac {
            end = j;
            let _ = dot;
        }
    }
    if !saw_digit {
        return None;
    }
    s[..end].parse::<f64>().ok()
}

/// `approxChangeRatio`: common-prefix/suffix trimming, ratio of
/// changed chars over total length. Defined as 0 for equal or both-empty
/// inputs.
pub fn approx_change_ratio(old: &str, new: &str) -> f64 {
    if old == new {
        return 0.0;
    }
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    if old_chars.is_empty() && new_chars.is_empty() {
        return 0.0;
    }

    let mut prefix = 0;
    while prefix < old_chars.len()
        && prefix < new_chars.len()
        && old_chars[prefix] == new_chars[prefix]
    {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old_chars.len() - prefix
        && suffix < new_chars.len() - prefix
        && old_chars[old_chars.len() - 1 - suffix] == new_chars[new_chars.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let changed_old = old_chars.len() - prefix - suffix;
    let changed_new = new_chars.len() - prefix - suffix;
    let total = old_chars.len() + new_chars.len();
    (changed_old + changed_new) as f64 / total as f64
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// `diffJson`: recursive structural diff producing an ordered
/// list of `{path, op, old?, new?}` entries. Object keys are visited in
/// sorted order; arrays are compared by index; subtrees under an ignore
/// pointer (or equal to one) are skipped; output is sorted by path.
pub fn diff_json(prev: &Value, curr: &Value, ignore_pointers: &[String]) -> Vec<JsonDiffEntry> {
    let mut out = Vec::new();
    walk(prev, curr, String::new(), ignore_pointers, &mut out);
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

fn is_ignored(path: &str, ignore_pointers: &[String]) -> bool {
    ignore_pointers
        .iter()
        .any(|p| path == p || path.starts_with(&format!("{p}/")))
}

fn walk(
    prev: &Value,
    curr: &Value,
    path: String,
    ignore_pointers: &[String],
    out: &mut Vec<JsonDiffEntry>,
) {
    if is_ignored(&path, ignore_pointers) {
        return;
    }

    match (prev, curr) {
        (Value::Object(p), Value::Object(c)) => {
            let mut keys: BTreeSet<&String> = BTreeSet::new();
            keys.extend(p.keys());
            keys.extend(c.keys());
            for key in keys {
                let child_path = format!("{path}/{}", escape_pointer_token(key));
                if is_ignored(&child_path, ignore_pointers) {
                    continue;
                }
                match (p.get(key), c.get(key)) {
                    (Some(pv), Some(cv)) => walk(pv, cv, child_path, ignore_pointers, out),
                    (Some(pv), None) => out.push(JsonDiffEntry {
                        path: child_path,
                        op: JsonOp::Remove,
                        old: Some(pv.clone()),
                        new: None,
                    }),
                    (None, Some(cv)) => out.push(JsonDiffEntry {
                        path: child_path,
                        op: JsonOp::Add,
                        old: None,
                        new: Some(cv.clone()),
                    }),
                    (None, None) => unreachable!(),
                }
            }
        }
        (Value::Array(p), Value::Array(c)) => {
            let max_len = p.len().max(c.len());
            for i in 0..max_len {
                let child_path = format!("{path}/{i}");
                if is_ignored(&child_path, ignore_pointers) {
                    continue;
                }
                match (p.get(i), c.get(i)) {
                    (Some(pv), Some(cv)) => walk(pv, cv, child_path, ignore_pointers, out),
                    (Some(pv), None) => out.push(JsonDiffEntry {
                        path: child_path,
                        op: JsonOp::Remove,
                        old: Some(pv.clone()),
                        new: None,
                    }),
                    (None, Some(cv)) => out.push(JsonDiffEntry {
                        path: child_path,
                        op: JsonOp::Add,
                        old: None,
                        new: Some(cv.clone()),
                    }),
                    (None, None) => unreachable!(),
                }
            }
        }
        (p, c) => {
            if p != c {
                out.push(JsonDiffEntry {
                    path,
                    op: JsonOp::Replace,
                    old: Some(p.clone()),
                    new: Some(c.clone()),
                });
            }
        }
    }
}

/// Removes every value addressed by `ignore_pointers` from `value` before
/// stable-stringification. Arrays shrink via removal
/// rather than leaving holes.
pub fn remove_ignored_json_paths(value: &mut Value, ignore_pointers: &[String]) {
    for pointer in ignore_pointers {
        remove_pointer(value, pointer);
    }
}

fn remove_pointer(value: &mut Value, pointer: &str) {
    let tokens: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    if tokens.is_empty() {
        return;
    }
    remove_at(value, &tokens);
}

fn remove_at(value: &mut Value, tokens: &[String]) {
    if tokens.len() == 1 {
        match value {
            Value::Object(map) => {
                map.remove(&tokens[0]);
            }
            Value::Array(arr) => {
                if let Ok(idx) = tokens[0].parse::<usize>() {
                    if idx < arr.len() {
                        arr.remove(idx);
                    }
                }
            }
            _ => {}
        }
        return;
    }
    let (head, rest) = (&tokens[0], &tokens[1..]);
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get_mut(head) {
                remove_at(child, rest);
            }
        }
        Value::Array(arr) => {
            if let Ok(idx) = head.parse::<usize>() {
                if let Some(child) = arr.get_mut(idx) {
                    remove_at(child, rest);
                }
            }
        }
        _ => {}
    }
}

/// `computeFieldsChange`: parses both texts as JSON objects
/// (fields-mode `text` is the stable stringification of a name→value map),
/// diffs the sorted union of keys.
pub fn compute_fields_change(
    prev_text: &str,
    curr_text: &str,
) -> Result<HashMap<String, FieldChange>, SentinelError> {
    let prev: Value = serde_json::from_str(prev_text)
        .map_err(|e| SentinelError::Parse(format!("fields previous text not json: {e}")))?;
    let curr: Value = serde_json::from_str(curr_text)
        .map_err(|e| SentinelError::Parse(format!("fields current text not json: {e}")))?;

    let prev_obj = prev.as_object().ok_or_else(|| {
        SentinelError::Parse("fields previous text is not a json object".to_string())
    })?;
    let curr_obj = curr.as_object().ok_or_else(|| {
        SentinelError::Parse("fields current text is not a json object".to_string())
    })?;

    let mut keys: BTreeSet<&String> = BTreeSet::new();
    keys.extend(prev_obj.keys());
    keys.extend(curr_obj.keys());

    let mut out = HashMap::new();
    for key in keys {
        let old = value_to_display_string(prev_obj.get(key));
        let new = value_to_display_string(curr_obj.get(key));
        if old == new {
            continue;
        }
        let delta = if old.len() <= 64 && new.len() <= 64 {
            match (parse_leading_number(&old), parse_leading_number(&new)) {
                (Some(o), Some(n)) => Some(n - o),
                _ => None,
            }
        } else {
            None
        };
        out.insert(key.clone(), FieldChange { old, new, delta });
    }
    Ok(out)
}

fn value_to_display_string(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_hashes_yield_no_change() {
        assert!(compute_text_change("h", "a", "h", "b").is_none());
    }

    #[test]
    fn delta_set_for_short_numeric_texts() {
        let change = compute_text_change("h1", "49.99", "h2", "45.00").unwrap();
        assert_eq!(change.delta, Some(-4.99));
    }

    #[test]
    fn delta_absent_for_long_texts() {
        let long_old = "1".repeat(65);
        let long_new = "2".repeat(65);
        let change = compute_text_change("h1", &long_old, "h2", &long_new).unwrap();
        assert_eq!(change.delta, None);
    }

    #[test]
    fn ratio_zero_for_equal_or_empty() {
        assert_eq!(approx_change_ratio("x", "x"), 0.0);
        assert_eq!(approx_change_ratio("", ""), 0.0);
    }

    #[test]
    fn ratio_reflects_common_affixes() {
        let r = approx_change_ratio("hello world", "hello there");
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn json_diff_respects_ignore_pointer() {
        let prev = json!({"meta": {"timestamp": "T1", "session": "abc"}, "data": 1});
        let curr = json!({"meta": {"timestamp": "T2", "session": "abc"}, "data": 1});
        let entries = diff_json(&prev, &curr, &["/meta/timestamp".to_string()]);
        assert!(entries.is_empty());
    }

    #[test]
    fn json_diff_sorted_by_path() {
        let prev = json!({"b": 1, "a": 1});
        let curr = json!({"b": 2, "a": 2});
        let entries = diff_json(&prev, &curr, &[]);
        assert_eq!(entries[0].path, "/a");
        assert_eq!(entries[1].path, "/b");
    }

    #[test]
    fn json_diff_no_entry_under_ignored_prefix() {
        let prev = json!({"a": {"x": 1, "y": 2}});
        let curr = json!({"a": {"x": 9, "y": 9}});
        let entries = diff_json(&prev, &curr, &["/a".to_string()]);
        assert!(entries.is_empty());
    }

    #[test]
    fn fields_change_coerces_and_computes_delta() {
        let prev = r#"{"price":"49.99"}"#;
        let curr = r#"{"price":"45.00"}"#;
        let changes = compute_fields_change(prev, curr).unwrap();
        let price = &changes["price"];
        assert_eq!(price.old, "49.99");
        assert_eq!(price.new, "45.00");
        assert_eq!(price.delta, Some(-4.99));
    }

    #[test]
    fn remove_ignored_json_path_shrinks_array() {
        let mut v = json!({"items": [1, 2, 3]});
        remove_ignored_json_paths(&mut v, &["/items/1".to_string()]);
        assert_eq!(v, json!({"items": [1, 3]}));
    }
}
