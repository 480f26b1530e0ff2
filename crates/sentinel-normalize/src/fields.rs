use std::collections::BTreeMap;

use regex::Regex;
use scraper::{Html, Selector};
use sentinel_core::{FieldSpec, SentinelError};
use sentinel_diff::stable_json::stringify;
use serde_json::Value;

use crate::content_type::ContentKind;
use crate::xml_text::extract_xml_field;

/// Fields mode: locate each spec's selector, take concatenated
/// text or a named attribute, apply ignore-regexes, collapse whitespace.
/// Fails if a selector matches zero nodes. Returns the stable
/// stringification of the resulting sorted name→value map.
pub fn extract_fields_mode(
    raw_body: &str,
    kind: ContentKind,
    fields: &[FieldSpec],
    ignore_regexes: &[Regex],
) -> Result<String, SentinelError> {
    let mut map: BTreeMap<String, Value> = BTreeMap::new();

    let document = if kind == ContentKind::Xml {
        None
    } else {
        Some(Html::parse_document(raw_body))
    };

    for field in fields {
        let mut value = match &document {
            Some(doc) => extract_html_field(doc, field)?,
            None => extract_xml_field(raw_body, field)?,
        };

        for pattern in ignore_regexes {
            value = pattern.replace_all(&value, "").to_string();
        }
        value = value.split_whitespace().collect::<Vec<_>>().join(" ");

        map.insert(field.name.clone(), Value::String(value));
    }

    let value = Value::Object(map.into_iter().collect());
    Ok(stringify(&value))
}

fn extract_html_field(document: &Html, field: &FieldSpec) -> Result<String, SentinelError> {
    let selector = Selector::parse(&field.selector).map_err(|e| SentinelError::FieldExtraction {
        field_name: format!("{}: invalid selector {}: {e}", field.name, field.selector),
    })?;

    let node = document.select(&selector).next().ok_or_else(|| {
        SentinelError::FieldExtraction {
            field_name: field.name.clone(),
        }
    })?;

    Ok(match &field.attribute {
        Some(attr) => node.value().attr(attr).unwrap_or("").to_string(),
        None => node.text().collect::<Vec<_>>().join(" "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_field() {
        let fields = vec![FieldSpec {
            name: "price".to_string(),
            selector: "#price".to_string(),
            attribute: None,
        }];
        let html = "<div id=\"price\">49.99</div>";
        let text = extract_fields_mode(html, ContentKind::Html, &fields, &[]).unwrap();
        assert_eq!(text, r#"{"price":"49.99"}"#);
    }

    #[test]
    fn extracts_attribute_field() {
        let fields = vec![FieldSpec {
            name: "img".to_string(),
            selector: "img".to_string(),
            attribute: Some("src".to_string()),
        }];
        let html = "<img src=\"https://example.com/a.png\">";
        let text = extract_fields_mode(html, ContentKind::Html, &fields, &[]).unwrap();
        assert_eq!(text, r#"{"img":"https://example.com/a.png"}"#);
    }

    #[test]
    fn zero_matches_is_hard_error() {
        let fields = vec![FieldSpec {
            name: "x".to_string(),
            selector: "#missing".to_string(),
            attribute: None,
        }];
        let err = extract_fields_mode("<div></div>", ContentKind::Html, &fields, &[]).unwrap_err();
        assert!(matches!(err, SentinelError::FieldExtraction { .. }));
    }

    #[test]
    fn keys_sorted_in_stable_output() {
        let fields = vec![
            FieldSpec {
                name: "z".to_string(),
                selector: "#z".to_string(),
                attribute: None,
            },
            FieldSpec {
                name: "a".to_string(),
                selector: "#a".to_string(),
                attribute: None,
            },
        ];
        let html = r#"<div id="z">1</div><div id="a">2</div>"#;
        let text = extract_fields_mode(html, ContentKind::Html, &fields, &[]).unwrap();
        assert_eq!(text, r#"{"a":"2","z":"1"}"#);
    }
}
