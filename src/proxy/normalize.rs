//! Response normalization
//!
//! Upstream bodies are always returned fully buffered and decoded, so the
//! framing and encoding headers describing the wire form are dropped.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use http::header::{CONTENT_ENCODING, TRANSFER_ENCODING};
use http::{HeaderMap, StatusCode};
use tracing::{debug, warn};

use crate::agent::{UpstreamBody, UpstreamResponse};
use crate::error::{ClearwayError, Result};

/// First two bytes of every gzip member
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upstream response ready to be re-emitted
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Check if the headers declare chunked transfer encoding
pub fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("chunked"))
}

fn is_gzip_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

/// Resolve chunked framing and gzip encoding, dropping the headers that described them
pub fn normalize_response(response: UpstreamResponse) -> Result<NormalizedResponse> {
    let UpstreamResponse {
        status,
        mut headers,
        body,
    } = response;

    let mut body = match body {
        UpstreamBody::Full(bytes) => bytes,
        UpstreamBody::Chunked(chunks) => {
            if !is_chunked(&headers) {
                debug!(chunks = chunks.len(), "Chunked body without chunked framing header");
            }
            join_chunks(chunks)
        }
    };

    if is_gzip_encoded(&headers) {
        if body.starts_with(&GZIP_MAGIC) {
            body = gunzip(&body)?;
        } else {
            debug!("Body labeled gzip but not gzip-framed, passing through");
        }
    }

    headers.remove(CONTENT_ENCODING);
    headers.remove(TRANSFER_ENCODING);

    Ok(NormalizedResponse {
        status,
        headers,
        body,
    })
}

fn join_chunks(chunks: Vec<Bytes>) -> Bytes {
    if chunks.len() == 1 {
        return chunks.into_iter().next().unwrap_or_default();
    }
    let total = chunks.iter().map(Bytes::len).sum();
    let mut joined = Vec::with_capacity(total);
    for chunk in &chunks {
        joined.extend_from_slice(chunk);
    }
    Bytes::from(joined)
}

fn gunzip(body: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut decoded)
        .map_err(|e| {
            warn!(error = %e, "Failed to decompress gzip body");
            ClearwayError::UpstreamRequest(format!("invalid gzip body: {}", e))
        })?;
    Ok(Bytes::from(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use http::HeaderValue;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn response(headers: &[(&'static str, &'static str)], body: UpstreamBody) -> UpstreamResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(value));
        }
        UpstreamResponse {
            status: StatusCode::OK,
            headers: map,
            body,
        }
    }

    #[test]
    fn test_chunked_body_is_joined() {
        let raw = response(
            &[("transfer-encoding", "chunked")],
            UpstreamBody::Chunked(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")]),
        );

        let normalized = normalize_response(raw).unwrap();
        assert_eq!(normalized.body, Bytes::from_static(b"abcd"));
        assert!(normalized.headers.get("transfer-encoding").is_none());
    }

    #[test]
    fn test_gzip_body_is_decompressed() {
        let compressed = gzip(b"hello, plaintext");
        assert_eq!(&compressed[..2], &GZIP_MAGIC);

        let raw = response(
            &[("content-encoding", "gzip"), ("content-type", "text/plain")],
            UpstreamBody::Full(Bytes::from(compressed)),
        );

        let normalized = normalize_response(raw).unwrap();
        assert_eq!(normalized.body, Bytes::from_static(b"hello, plaintext"));
        assert!(normalized.headers.get("content-encoding").is_none());
        assert_eq!(normalized.headers.get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn test_chunked_gzip_body_is_joined_then_decompressed() {
        let compressed = gzip(b"split across chunks");
        let (head, tail) = compressed.split_at(5);
        let raw = response(
            &[("transfer-encoding", "chunked"), ("content-encoding", "gzip")],
            UpstreamBody::Chunked(vec![Bytes::copy_from_slice(head), Bytes::copy_from_slice(tail)]),
        );

        let normalized = normalize_response(raw).unwrap();
        assert_eq!(normalized.body, Bytes::from_static(b"split across chunks"));
    }

    #[test]
    fn test_mislabeled_gzip_passes_through() {
        let raw = response(
            &[("content-encoding", "gzip")],
            UpstreamBody::Full(Bytes::from_static(b"already decoded")),
        );

        let normalized = normalize_response(raw).unwrap();
        assert_eq!(normalized.body, Bytes::from_static(b"already decoded"));
        assert!(normalized.headers.get("content-encoding").is_none());
    }

    #[test]
    fn test_gzip_magic_without_gzip_label_is_untouched() {
        let compressed = gzip(b"opaque");
        let raw = response(&[], UpstreamBody::Full(Bytes::from(compressed.clone())));

        let normalized = normalize_response(raw).unwrap();
        assert_eq!(normalized.body, Bytes::from(compressed));
    }

    #[test]
    fn test_corrupt_gzip_is_upstream_error() {
        let raw = response(
            &[("content-encoding", "gzip")],
            UpstreamBody::Full(Bytes::from_static(&[0x1f, 0x8b, 0x00, 0x01, 0x02])),
        );

        let err = normalize_response(raw).unwrap_err();
        assert!(matches!(err, ClearwayError::UpstreamRequest(_)));
    }

    #[test]
    fn test_status_and_other_headers_pass_through() {
        let mut raw = response(
            &[
                ("set-cookie", "a=1"),
                ("set-cookie", "b=2"),
                ("x-upstream", "yes"),
            ],
            UpstreamBody::Full(Bytes::from_static(b"teapot")),
        );
        raw.status = StatusCode::IM_A_TEAPOT;

        let normalized = normalize_response(raw).unwrap();
        assert_eq!(normalized.status, StatusCode::IM_A_TEAPOT);
        assert_eq!(normalized.headers.get_all("set-cookie").iter().count(), 2);
        assert_eq!(normalized.headers.get("x-upstream").unwrap(), "yes");
    }

    #[test]
    fn test_is_chunked_detects_mixed_case() {
        let mut headers = HeaderMap::new();
        headers.insert("transfer-encoding", HeaderValue::from_static("gzip, Chunked"));
        assert!(is_chunked(&headers));
        assert!(!is_chunked(&HeaderMap::new()));
    }
}
