/// Named ignore-regex bundles selectable via `ignore_regex_presets` (spec
/// §6). `waiting_screen` packages the short-body/keyword heuristic the
/// teacher hardcodes in `waiting_screen::is_waiting_screen` as a regular
/// expression list instead, so it's configurable rather than baked in.
pub fn resolve_preset(name: &str) -> Option<Vec<&'static str>> {
    match name {
        "waiting_screen" => Some(vec![
            r"(?i)please\s+wait",
            r"(?i)just a moment",
            r"(?i)checking your browser",
            r"(?i)ddos protection",
            r"(?i)verifying you are human",
            r"(?i)cloudflare",
        ]),
        "cookie_banner" => Some(vec![
            r"(?i)we use cookies",
            r"(?i)accept all cookies",
            r"(?i)cookie consent",
        ]),
        "timestamps" => Some(vec![
            r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?",
        ]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_preset_is_none() {
        assert!(resolve_preset("not-a-real-preset").is_none());
    }

    #[test]
    fn known_presets_compile_as_regex() {
        for name in ["waiting_screen", "cookie_banner", "timestamps"] {
            for pattern in resolve_preset(name).unwrap() {
                regex::Regex::new(pattern).unwrap();
            }
        }
    }
}
