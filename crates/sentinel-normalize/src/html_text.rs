use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use sentinel_core::config::{AggregationMode, WhitespaceMode};
use sentinel_core::SentinelError;
use unicode_normalization::UnicodeNormalization;

/// Options governing text-mode extraction.
pub struct TextModeOptions<'a> {
    pub selector: Option<&'a str>,
    pub ignore_selectors: &'a [String],
    pub ignore_attributes: &'a [String],
    pub ignore_regexes: &'a [Regex],
    pub aggregation_mode: AggregationMode,
    pub whitespace_mode: WhitespaceMode,
    pub unicode_normalization: bool,
}

const ALWAYS_STRIPPED: &[&str] = &["script", "style", "noscript", "template"];

/// Text mode: strip comments and always-noisy tags, remove
/// ignore-selector subtrees, strip ignore-attributes globally, select the
/// configured selector (`all` concatenates outer HTML + inner text with
/// newlines; `first` takes the first match), run ignore-regex
/// substitutions, optionally NFKC-normalize, then collapse whitespace.
pub fn extract_text_mode(
    raw_html: &str,
    options: &TextModeOptions,
) -> Result<String, SentinelError> {
    let cleaned_html = strip_comments(raw_html);
    let document = Html::parse_document(&cleaned_html);

    let mut ignore_selectors: Vec<Selector> = ALWAYS_STRIPPED
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();
    for s in options.ignore_selectors {
        if let Ok(sel) = Selector::parse(s) {
            ignore_selectors.push(sel);
        }
    }

    let is_ignored = |el: &ElementRef| {
        ignore_selectors.iter().any(|sel| sel.matches(el))
            || el
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| ignore_selectors.iter().any(|sel| sel.matches(&a)))
    };

    let nodes: Vec<ElementRef> = match options.selector {
        Some(sel_str) => {
            let selector = Selector::parse(sel_str)
                .map_err(|e| SentinelError::Parse(format!("invalid selector {sel_str}: {e}")))?;
            let matches: Vec<ElementRef> = document
                .select(&selector)
                .filter(|el| !is_ignored(el))
                .collect();
            if matches.is_empty() {
                return Ok(String::new());
            }
            match options.aggregation_mode {
                AggregationMode::First => vec![matches[0]],
                AggregationMode::All => matches,
            }
        }
        None => document
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| !is_ignored(el))
            .collect(),
    };

    let mut pieces = Vec::new();
    for node in nodes {
        let rendered = render_node_text(node, options.aggregation_mode, &ignore_selectors);
        if !rendered.is_empty() {
            pieces.push(rendered);
        }
    }
    let mut text = pieces.join("\n");

    for attr in options.ignore_attributes {
        text = strip_attribute_mentions(&text, attr);
    }

    for pattern in options.ignore_regexes {
        text = pattern.replace_all(&text, "").to_string();
    }

    if options.unicode_normalization {
        text = text.nfkc().collect();
    }

    Ok(collapse_whitespace(&text, options.whitespace_mode))
}

/// Renders a top-level matched node, recursively skipping any descendant
/// subtree rooted at an ignored element (always-stripped tags, plus
/// configured ignore-selectors) rather than only filtering the top-level
/// candidate set.
fn render_node_text(node: ElementRef, aggregation_mode: AggregationMode, ignore_selectors: &[Selector]) -> String {
    match aggregation_mode {
        AggregationMode::All => render_html_filtered(node, ignore_selectors),
        AggregationMode::First => collect_text_filtered(node, ignore_selectors).join(" "),
    }
}

fn element_is_ignored(el: &ElementRef, ignore_selectors: &[Selector]) -> bool {
    ignore_selectors.iter().any(|sel| sel.matches(el))
}

fn collect_text_filtered(node: ElementRef, ignore_selectors: &[Selector]) -> Vec<String> {
    let mut out = Vec::new();
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if element_is_ignored(&child_el, ignore_selectors) {
                        continue;
                    }
                    out.extend(collect_text_filtered(child_el, ignore_selectors));
                }
            }
            _ => {}
        }
    }
    out
}

fn render_html_filtered(node: ElementRef, ignore_selectors: &[Selector]) -> String {
    let mut out = String::new();
    render_html_filtered_into(node, ignore_selectors, &mut out);
    out
}

fn render_html_filtered_into(node: ElementRef, ignore_selectors: &[Selector], out: &mut String) {
    let el = node.value();
    out.push('<');
    out.push_str(el.name());
    for (name, value) in el.attrs() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;"));
        out.push('"');
    }
    out.push('>');
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if element_is_ignored(&child_el, ignore_selectors) {
                        continue;
                    }
                    render_html_filtered_into(child_el, ignore_selectors, out);
                }
            }
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(el.name());
    out.push('>');
}

fn strip_comments(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn strip_attribute_mentions(text: &str, attr: &str) -> String {
    // Attribute stripping happens at the DOM layer in practice; as a
    // belt-and-braces pass over the rendered text we also remove any
    // leftover `attr="..."` fragments that survive outerHTML rendering in
    // `all` aggregation mode.
    let pattern = format!(r#"(?i)\s{}\s*=\s*"[^"]*""#, regex::escape(attr));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(text, "").to_string(),
        Err(_) => text.to_string(),
    }
}

fn collapse_whitespace(text: &str, mode: WhitespaceMode) -> String {
    match mode {
        WhitespaceMode::Collapse => text.split_whitespace().collect::<Vec<_>>().join(" "),
        WhitespaceMode::PreserveLines => {
            let mut out_lines = Vec::new();
            let mut last_blank = false;
            for line in text.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    if !last_blank {
                        out_lines.push(String::new());
                    }
                    last_blank = true;
                } else {
                    out_lines.push(trimmed.to_string());
                    last_blank = false;
                }
            }
            while out_lines.last().map(|s| s.is_empty()).unwrap_or(false) {
                out_lines.pop();
            }
            out_lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts<'a>(selector: Option<&'a str>) -> TextModeOptions<'a> {
        TextModeOptions {
            selector,
            ignore_selectors: &[],
            ignore_attributes: &[],
            ignore_regexes: &[],
            aggregation_mode: AggregationMode::First,
            whitespace_mode: WhitespaceMode::Collapse,
            unicode_normalization: false,
        }
    }

    #[test]
    fn strips_script_and_style_by_default() {
        let html = "<html><body><script>evil()</script><style>.x{}</style><div>hi</div></body></html>";
        let text = extract_text_mode(html, &opts(None)).unwrap();
        assert!(!text.contains("evil"));
        assert!(text.contains("hi"));
    }

    #[test]
    fn empty_match_on_selector_returns_empty_text() {
        let html = "<html><body><div>hi</div></body></html>";
        let text = extract_text_mode(html, &opts(Some("#does-not-exist"))).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn collapses_whitespace_by_default() {
        let html = "<div>hello\n\n   world</div>";
        let text = extract_text_mode(html, &opts(Some("div"))).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn comments_are_stripped() {
        let html = "<div><!-- secret -->visible</div>";
        let text = extract_text_mode(html, &opts(Some("div"))).unwrap();
        assert!(!text.contains("secret"));
        assert!(text.contains("visible"));
    }
}
