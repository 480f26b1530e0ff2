pub mod block_page;
pub mod content_type;
pub mod empty;
pub mod fields;
pub mod html_text;
pub mod json_mode;
pub mod presets;
pub mod xml_text;

use regex::Regex;
use sentinel_core::config::{AggregationMode, WhitespaceMode};
use sentinel_core::{FieldSpec, SentinelError, SnapshotMode};
use unicode_normalization::UnicodeNormalization;

use content_type::{classify, ContentKind};
use html_text::TextModeOptions;

pub use block_page::check_block_page;
pub use empty::{check_empty, EmptyOutcome};

/// Everything the Normalizer needs to turn a raw body into `{text, html?}`
///; one struct per call so the pure function stays easy to
/// unit-test in isolation from `TargetSpec`/`RunPolicy` wiring.
pub struct NormalizeInput<'a> {
    pub raw_body: &'a str,
    pub content_type: Option<&'a str>,
    pub fields: &'a [FieldSpec],
    pub ignore_json_paths: &'a [String],
    pub selector: Option<&'a str>,
    pub ignore_selectors: &'a [String],
    pub ignore_attributes: &'a [String],
    pub ignore_regexes: &'a [String],
    pub ignore_regex_presets: &'a [String],
    pub aggregation_mode: AggregationMode,
    pub whitespace_mode: WhitespaceMode,
    pub unicode_normalization: bool,
}

pub struct NormalizedResult {
    pub text: String,
    pub html: Option<String>,
    pub mode: SnapshotMode,
}

/// Pure function from `(raw body, mode, options)` to `{text, html?}` (spec
/// §4.4). Mode is chosen by priority: fields (non-empty field specs) >
/// JSON (content-type contains `json`) > text (otherwise).
pub fn normalize(input: &NormalizeInput) -> Result<NormalizedResult, SentinelError> {
    let kind = classify(input.content_type);
    let compiled_regexes = compile_regexes(input.ignore_regexes, input.ignore_regex_presets)?;

    if !input.fields.is_empty() {
        let text =
            fields::extract_fields_mode(input.raw_body, kind, input.fields, &compiled_regexes)?;
        return Ok(NormalizedResult {
            text,
            html: None,
            mode: SnapshotMode::Fields,
        });
    }

    if kind == ContentKind::Json {
        let text = json_mode::extract_json_mode(input.raw_body, input.ignore_json_paths)?;
        return Ok(NormalizedResult {
            text,
            html: None,
            mode: SnapshotMode::Json,
        });
    }

    if kind == ContentKind::Xml {
        let mut text = xml_text::extract_xml_text(input.raw_body)?;
        text = apply_regexes_and_whitespace(
            &text,
            &compiled_regexes,
            input.unicode_normalization,
            input.whitespace_mode,
        );
        return Ok(NormalizedResult {
            text,
            html: None,
            mode: SnapshotMode::Text,
        });
    }

    let text_opts = TextModeOptions {
        selector: input.selector,
        ignore_selectors: input.ignore_selectors,
        ignore_attributes: input.ignore_attributes,
        ignore_regexes: &compiled_regexes,
        aggregation_mode: input.aggregation_mode,
        whitespace_mode: input.whitespace_mode,
        unicode_normalization: input.unicode_normalization,
    };
    let text = html_text::extract_text_mode(input.raw_body, &text_opts)?;
    Ok(NormalizedResult {
        text,
        html: Some(input.raw_body.to_string()),
        mode: SnapshotMode::Text,
    })
}

fn compile_regexes(
    ignore_regexes: &[String],
    presets: &[String],
) -> Result<Vec<Regex>, SentinelError> {
    let mut out = Vec::new();
    for pattern in ignore_regexes {
        out.push(
            Regex::new(pattern)
                .map_err(|e| SentinelError::Config(format!("invalid ignore_regex {pattern}: {e}")))?,
        );
    }
    for preset_name in presets {
        let Some(patterns) = presets::resolve_preset(preset_name) else {
            return Err(SentinelError::Config(format!(
                "unknown ignore_regex_preset: {preset_name}"
            )));
        };
        for pattern in patterns {
            out.push(Regex::new(pattern).expect("built-in presets are valid regex"));
        }
    }
    Ok(out)
}

fn apply_regexes_and_whitespace(
    text: &str,
    regexes: &[Regex],
    unicode_normalization: bool,
    whitespace_mode: WhitespaceMode,
) -> String {
    let mut out = text.to_string();
    for pattern in regexes {
        out = pattern.replace_all(&out, "").to_string();
    }
    if unicode_normalization {
        out = out.nfkc().collect();
    }
    match whitespace_mode {
        WhitespaceMode::Collapse => out.split_whitespace().collect::<Vec<_>>().join(" "),
        WhitespaceMode::PreserveLines => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input(raw_body: &'static str) -> NormalizeInput<'static> {
        NormalizeInput {
            raw_body,
            content_type: Some("text/html"),
            fields: &[],
            ignore_json_paths: &[],
            selector: None,
            ignore_selectors: &[],
            ignore_attributes: &[],
            ignore_regexes: &[],
            ignore_regex_presets: &[],
            aggregation_mode: AggregationMode::First,
            whitespace_mode: WhitespaceMode::Collapse,
            unicode_normalization: false,
        }
    }

    #[test]
    fn fields_mode_takes_priority() {
        let fields = vec![FieldSpec {
            name: "x".to_string(),
            selector: "#x".to_string(),
            attribute: None,
        }];
        let mut input = base_input("<div id=\"x\">hi</div>");
        input.fields = &fields;
        let result = normalize(&input).unwrap();
        assert_eq!(result.mode, SnapshotMode::Fields);
        assert_eq!(result.text, r#"{"x":"hi"}"#);
    }

    #[test]
    fn json_content_type_drives_json_mode() {
        let mut input = base_input(r#"{"a":1}"#);
        input.content_type = Some("application/json");
        let result = normalize(&input).unwrap();
        assert_eq!(result.mode, SnapshotMode::Json);
        assert_eq!(result.text, r#"{"a":1}"#);
    }

    #[test]
    fn otherwise_falls_back_to_text_mode() {
        let input = base_input("<div id=\"x\">hello</div>");
        let result = normalize(&input).unwrap();
        assert_eq!(result.mode, SnapshotMode::Text);
        assert!(result.text.contains("hello"));
        assert!(result.html.is_some());
    }

    #[test]
    fn unknown_preset_is_config_error() {
        let mut input = base_input("<div>hi</div>");
        let presets = vec!["nonexistent".to_string()];
        input.ignore_regex_presets = &presets;
        assert!(normalize(&input).is_err());
    }
}
