//! Blocking EPG fetch with Content-Encoding handling
//!
//! Catch-up servers answer `Accept-Encoding: gzip, deflate` with either gzip or
//! *raw* deflate (no zlib header), so the body is decoded here rather than by
//! the HTTP client.

use std::io::Read;
use std::time::Duration;

use flate2::read::{DeflateDecoder, GzDecoder};

use super::request::{EpgRequest, Method};
use crate::error::{ArchiveError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a ureq agent bounded by a single global timeout
fn create_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .max_idle_connections(0)
        .build()
        .new_agent()
}

/// Perform the request and return the decoded body.
/// The response is fully consumed and dropped before returning on every path.
pub fn fetch(request: &EpgRequest, timeout: Duration) -> Result<Vec<u8>> {
    let agent = create_agent(timeout);

    let result = match request.method {
        Method::Get => {
            let mut builder = agent.get(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(*name, value.as_str());
            }
            builder.call()
        }
        Method::Post => {
            let mut builder = agent.post(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(*name, value.as_str());
            }
            builder
                .header("Content-Type", "application/x-www-form-urlencoded")
                .send(request.body.as_deref().unwrap_or(""))
        }
    };

    let mut response = result.map_err(|e| {
        tracing::warn!(target = %request.url, error = %e, "EPG request failed");
        ArchiveError::NetworkError(e.to_string())
    })?;

    let encoding = response
        .headers()
        .get("Content-Encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_ascii_lowercase());

    let raw = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| ArchiveError::NetworkError(format!("Read failed: {}", e)))?;

    decode_body(encoding.as_deref(), raw)
}

/// Undo `Content-Encoding`; unknown or missing encodings pass through
pub fn decode_body(encoding: Option<&str>, raw: Vec<u8>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len() * 4);
    match encoding {
        Some("gzip") | Some("x-gzip") => {
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::FeedParseError(format!("gzip body: {}", e)))?;
            Ok(out)
        }
        Some("deflate") => {
            DeflateDecoder::new(raw.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::FeedParseError(format!("deflate body: {}", e)))?;
            Ok(out)
        }
        _ => Ok(raw),
    }
}
