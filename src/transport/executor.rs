//! Executes HTTP requests and captures their responses.
//!
//! Every verb goes through [`Transport::execute`]. Non-2xx responses are
//! ordinary results here; deciding whether a status is acceptable is the
//! caller's job (see [`crate::transport::status`]).

use crate::{
    errors::{RiakError, RiakResult},
    transport::{HttpRequest, HttpResponse, headers::HeaderBlock},
};
use futures::future::join_all;
use reqwest::Method;
use std::{collections::HashMap, time::Duration, time::Instant};
use tracing::{debug, info, warn};

/// Thin wrapper over a `reqwest::Client` with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    profiling: bool,
}

impl Transport {
    pub fn new(request_timeout: Duration, profiling: bool) -> RiakResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(RiakError::ClientInit)?;
        Ok(Self { client, profiling })
    }

    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> RiakResult<HttpResponse> {
        self.execute(with_headers(HttpRequest::new(Method::GET, url), headers))
            .await
    }

    pub async fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: impl Into<bytes::Bytes>,
    ) -> RiakResult<HttpResponse> {
        self.execute(with_headers(HttpRequest::new(Method::POST, url), headers).body(body))
            .await
    }

    pub async fn put(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: impl Into<bytes::Bytes>,
    ) -> RiakResult<HttpResponse> {
        self.execute(with_headers(HttpRequest::new(Method::PUT, url), headers).body(body))
            .await
    }

    pub async fn delete(&self, url: &str, headers: &[(&str, &str)]) -> RiakResult<HttpResponse> {
        self.execute(with_headers(HttpRequest::new(Method::DELETE, url), headers))
            .await
    }

    /// Send one request and capture status, headers and body.
    ///
    /// GET and DELETE never carry a body even if one was attached.
    pub async fn execute(&self, request: HttpRequest) -> RiakResult<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let started = Instant::now();

        let mut builder = self.client.request(method.clone(), &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            if method != Method::GET && method != Method::DELETE {
                builder = builder.body(body);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|err| transport_error(&method, &url, err))?;
        let status = response.status().as_u16();
        let header_block = HeaderBlock::from_header_map(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(&method, &url, err))?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if self.profiling {
            info!(%method, %url, status, elapsed_ms, "riak request");
        } else {
            debug!(%method, %url, status, elapsed_ms, "riak request");
        }

        Ok(HttpResponse::new(url, status, header_block, body))
    }

    /// Run every request concurrently.
    ///
    /// The result is keyed by URL; a request that failed at the transport
    /// level maps to `None` and does not affect the others.
    pub async fn execute_many(
        &self,
        requests: Vec<HttpRequest>,
    ) -> HashMap<String, Option<HttpResponse>> {
        let pending = requests.into_iter().map(|request| async move {
            let url = request.url.clone();
            match self.execute(request).await {
                Ok(response) => (url, Some(response)),
                Err(err) => {
                    warn!(%url, error = %err, "batch request failed");
                    (url, None)
                }
            }
        });
        join_all(pending).await.into_iter().collect()
    }
}

fn with_headers(mut request: HttpRequest, headers: &[(&str, &str)]) -> HttpRequest {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}

fn transport_error(method: &Method, url: &str, err: reqwest::Error) -> RiakError {
    if err.is_connect() {
        RiakError::ServerUnreachable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else {
        RiakError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source: err,
        }
    }
}
