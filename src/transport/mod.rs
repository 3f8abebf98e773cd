//! HTTP plumbing: request execution, header parsing, status validation and
//! multipart decoding.
//!
//! Nothing in here knows about objects or buckets; it moves
//! [`HttpRequest`]s out and [`HttpResponse`]s back in.

pub mod executor;
pub mod headers;
pub mod multipart;
pub mod status;

use bytes::Bytes;
use headers::HeaderBlock;
use reqwest::Method;

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A response as captured off the wire, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    /// `"404 Not Found"`. The code is the one received; the reason is the
    /// code's canonical phrase, since reqwest does not expose the phrase the
    /// server sent.
    pub status_line: String,
    pub headers: HeaderBlock,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(url: impl Into<String>, status: u16, headers: HeaderBlock, body: Bytes) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        Self {
            url: url.into(),
            status,
            status_line: format!("{status} {reason}").trim_end().to_string(),
            headers,
            body,
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_pairs_code_with_canonical_reason() {
        let ok = HttpResponse::new("u", 300, HeaderBlock::default(), Bytes::new());
        assert_eq!(ok.status_line, "300 Multiple Choices");
        let unknown = HttpResponse::new("u", 599, HeaderBlock::default(), Bytes::new());
        assert_eq!(unknown.status_line, "599");
    }
}
