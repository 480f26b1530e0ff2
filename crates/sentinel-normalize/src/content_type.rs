/// Pure classifier from a `Content-Type` header value to the shape that
/// drives the Normalizer switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Xml,
    Html,
    Other,
}

pub fn classify(content_type: Option<&str>) -> ContentKind {
    let Some(ct) = content_type else {
        return ContentKind::Other;
    };
    let ct = ct.to_lowercase();
    if ct.contains("json") {
        ContentKind::Json
    } else if ct.contains("xml") {
        ContentKind::Xml
    } else if ct.contains("html") {
        ContentKind::Html
    } else {
        ContentKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_kinds() {
        assert_eq!(classify(Some("application/json; charset=utf-8")), ContentKind::Json);
        assert_eq!(classify(Some("application/atom+xml")), ContentKind::Xml);
        assert_eq!(classify(Some("text/html")), ContentKind::Html);
        assert_eq!(classify(Some("text/plain")), ContentKind::Other);
        assert_eq!(classify(None), ContentKind::Other);
    }
}
