use quick_xml::events::Event;
use quick_xml::reader::Reader;
use sentinel_core::{FieldSpec, SentinelError};

/// Concatenates every text node in an XML document, in document order.
/// `scraper` only parses HTML, so XML mode gets its own minimal walker rather than
/// CSS-selector support; selectors in XML mode match element local names.
pub fn extract_xml_text(raw_body: &str) -> Result<String, SentinelError> {
    let mut reader = Reader::from_str(raw_body);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SentinelError::Parse(format!("xml text decode error: {e}")))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SentinelError::Parse(format!("xml parse error: {e}"))),
        }
        buf.clear();
    }
    Ok(out.join(" "))
}

/// Fields mode for XML bodies: the field's `selector` is matched against
/// element local names; `attribute`, if set, reads that attribute off the
/// first matching element, otherwise its concatenated text content.
pub fn extract_xml_field(raw_body: &str, field: &FieldSpec) -> Result<String, SentinelError> {
    let mut reader = Reader::from_str(raw_body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut depth_stack: Vec<String> = Vec::new();
    let mut capturing = false;
    let mut capture_depth = 0usize;
    let mut text_parts = Vec::new();
    let mut attr_value: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e.name().as_ref().to_vec());
                depth_stack.push(name.clone());
                if !capturing && name == field.selector {
                    capturing = true;
                    capture_depth = depth_stack.len();
                    if let Some(attr_name) = &field.attribute {
                        for attr in e.attributes().flatten() {
                            let key = local_name(attr.key.as_ref());
                            if &key == attr_name {
                                attr_value = Some(
                                    String::from_utf8_lossy(&attr.value).to_string(),
                                );
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e.name().as_ref().to_vec());
                if !capturing && name == field.selector {
                    if let Some(attr_name) = &field.attribute {
                        for attr in e.attributes().flatten() {
                            let key = local_name(attr.key.as_ref());
                            if &key == attr_name {
                                return Ok(String::from_utf8_lossy(&attr.value).to_string());
                            }
                        }
                    }
                    return Ok(String::new());
                }
            }
            Ok(Event::Text(t)) if capturing && field.attribute.is_none() => {
                let text = t
                    .unescape()
                    .map_err(|e| SentinelError::Parse(format!("xml text decode error: {e}")))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    text_parts.push(trimmed.to_string());
                }
            }
            Ok(Event::End(_)) => {
                if capturing && depth_stack.len() == capture_depth {
                    capturing = false;
                    if let Some(value) = attr_value.take() {
                        return Ok(value);
                    }
                    return Ok(text_parts.join(" "));
                }
                depth_stack.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SentinelError::Parse(format!("xml parse error: {e}"))),
        }
        buf.clear();
    }

    if let Some(value) = attr_value {
        return Ok(value);
    }
    if !text_parts.is_empty() {
        return Ok(text_parts.join(" "));
    }

    Err(SentinelError::FieldExtraction {
        field_name: field.name.clone(),
    })
}

fn local_name(qualified: &[u8]) -> String {
    let s = String::from_utf8_lossy(qualified);
    match s.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_concatenated_text() {
        let xml = "<root><a>hello</a><b>world</b></root>";
        assert_eq!(extract_xml_text(xml).unwrap(), "hello world");
    }

    #[test]
    fn extracts_field_text_by_tag_name() {
        let xml = "<item><price>49.99</price></item>";
        let field = FieldSpec {
            name: "price".to_string(),
            selector: "price".to_string(),
            attribute: None,
        };
        assert_eq!(extract_xml_field(xml, &field).unwrap(), "49.99");
    }

    #[test]
    fn extracts_field_attribute() {
        let xml = r#"<item><img src="a.png"/></item>"#;
        let field = FieldSpec {
            name: "img".to_string(),
            selector: "img".to_string(),
            attribute: Some("src".to_string()),
        };
        assert_eq!(extract_xml_field(xml, &field).unwrap(), "a.png");
    }

    #[test]
    fn missing_field_is_error() {
        let xml = "<item></item>";
        let field = FieldSpec {
            name: "missing".to_string(),
            selector: "missing".to_string(),
            attribute: None,
        };
        assert!(extract_xml_field(xml, &field).is_err());
    }
}
