use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sentinel_core::{SentinelError, Snapshot};
use std::io::{Read, Write};

/// On-disk envelope for a `Snapshot`: `text`/`html` are stored
/// gzip+base64 under `*_gzip_base64` only when that measurably shrinks the
/// payload, otherwise raw under `text`/`html`. `compression` tells the
/// reader which form is present.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, SentinelError> {
    let (text_field, text_value) = compress_field(&snapshot.text);
    let html_entry = snapshot.html.as_ref().map(|h| compress_field(h));

    let mut doc = serde_json::json!({
        "monitored_url": snapshot.monitored_url,
        "final_url": snapshot.final_url,
        "fetched_at": snapshot.fetched_at,
        "status": snapshot.status,
        "mode": snapshot.mode,
        "content_hash": snapshot.content_hash,
        "validators": snapshot.validators,
        "metrics": snapshot.metrics,
        "text_len": snapshot.text.len(),
        "compression": if text_field == "text_gzip_base64" { "gzip_base64" } else { "none" },
    });
    doc[text_field] = serde_json::Value::String(text_value);

    if let Some((html_field, html_value)) = html_entry {
        doc[html_field] = serde_json::Value::String(html_value);
    }

    serde_json::to_vec(&doc).map_err(|e| SentinelError::Store(format!("snapshot encode: {e}")))
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, SentinelError> {
    let doc: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| SentinelError::Store(format!("snapshot decode: {e}")))?;

    let compressed = doc
        .get("compression")
        .and_then(|v| v.as_str())
        .map(|s| s == "gzip_base64")
        .unwrap_or(false);

    let text = if compressed {
        let encoded = doc
            .get("text_gzip_base64")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SentinelError::Store("missing text_gzip_base64".into()))?;
        decompress_field(encoded)?
    } else {
        doc.get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SentinelError::Store("missing text".into()))?
            .to_string()
    };

    let html = if doc.get("html_gzip_base64").is_some() {
        Some(decompress_field(
            doc.get("html_gzip_base64").and_then(|v| v.as_str()).unwrap(),
        )?)
    } else if let Some(v) = doc.get("html").and_then(|v| v.as_str()) {
        Some(v.to_string())
    } else {
        None
    };

    Ok(Snapshot {
        monitored_url: field_string(&doc, "monitored_url")?,
        final_url: field_string(&doc, "final_url")?,
        fetched_at: serde_json::from_value(doc["fetched_at"].clone())
            .map_err(|e| SentinelError::Store(format!("fetched_at: {e}")))?,
        status: doc
            .get("status")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SentinelError::Store("missing status".into()))? as u16,
        mode: serde_json::from_value(doc["mode"].clone())
            .map_err(|e| SentinelError::Store(format!("mode: {e}")))?,
        text,
        html,
        content_hash: field_string(&doc, "content_hash")?,
        validators: serde_json::from_value(doc["validators"].clone())
            .map_err(|e| SentinelError::Store(format!("validators: {e}")))?,
        metrics: serde_json::from_value(doc["metrics"].clone())
            .map_err(|e| SentinelError::Store(format!("metrics: {e}")))?,
    })
}

fn field_string(doc: &serde_json::Value, name: &str) -> Result<String, SentinelError> {
    doc.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SentinelError::Store(format!("missing {name}")))
}

/// Returns `(field_name, value)` — gzip+base64 only if that's strictly
/// smaller than the raw string.
fn compress_field(text: &str) -> (&'static str, String) {
    let compressed = gzip_base64(text.as_bytes());
    if compressed.len() < text.len() {
        ("text_gzip_base64", compressed)
    } else {
        ("text", text.to_string())
    }
}

fn gzip_base64(data: &[u8]) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory gzip write");
    let gzipped = encoder.finish().expect("in-memory gzip finish");
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, gzipped)
}

fn decompress_field(encoded: &str) -> Result<String, SentinelError> {
    let raw = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .map_err(|e| SentinelError::Store(format!("base64 decode: {e}")))?;
    let mut decoder = GzDecoder::new(raw.as_slice());
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| SentinelError::Store(format!("gzip decode: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{FetchMetrics, SnapshotMode, Validators};

    fn sample_snapshot(text: &str) -> Snapshot {
        Snapshot {
            monitored_url: "https://example.com".to_string(),
            final_url: "https://example.com".to_string(),
            fetched_at: chrono::Utc::now(),
            status: 200,
            mode: SnapshotMode::Text,
            text: text.to_string(),
            html: None,
            content_hash: "deadbeef".to_string(),
            validators: Validators::default(),
            metrics: FetchMetrics::default(),
        }
    }

    #[test]
    fn round_trips_small_text_uncompressed() {
        let snap = sample_snapshot("hi");
        let bytes = encode_snapshot(&snap).unwrap();
        let decoded = decode_snapshot(&bytes).unwrap();
        assert_eq!(decoded.text, "hi");
        assert_eq!(decoded.content_hash, "deadbeef");
    }

    #[test]
    fn round_trips_large_text_compressed() {
        let text = "hello world ".repeat(500);
        let snap = sample_snapshot(&text);
        let bytes = encode_snapshot(&snap).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["compression"], "gzip_base64");
        let decoded = decode_snapshot(&bytes).unwrap();
        assert_eq!(decoded.text, text);
    }
}
