//! Entry point holding configuration, URL layout and transport.
//!
//! The client is cheap to clone; buckets and map/reduce jobs keep a clone as
//! their handle back to the server.

use crate::{
    config::ClientConfig,
    errors::{RiakError, RiakResult},
    models::bucket::BucketsEnvelope,
    routes::urls::UrlBuilder,
    services::{bucket::Bucket, mapreduce::MapReduce},
    transport::{
        HttpResponse,
        executor::Transport,
        status::{Action, validate},
    },
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    urls: UrlBuilder,
    transport: Transport,
}

#[derive(Debug, Clone)]
pub struct RiakClient {
    inner: Arc<ClientInner>,
}

impl RiakClient {
    pub fn new(config: ClientConfig) -> RiakResult<Self> {
        let transport = Transport::new(config.request_timeout, config.profiling)?;
        let urls = UrlBuilder::new(&config);
        debug!(base = urls.base(), client_id = %config.client_id, "riak client ready");
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                urls,
                transport,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.inner.urls
    }

    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    pub fn client_id(&self) -> &str {
        &self.inner.config.client_id
    }

    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.clone(), name)
    }

    pub fn mapreduce(&self) -> MapReduce {
        MapReduce::new(self.clone())
    }

    /// `true` when the node answers its ping endpoint with 200.
    pub async fn ping(&self) -> RiakResult<bool> {
        let url = self.urls().ping();
        match self.transport().get(&url, &[]).await {
            Ok(response) => Ok(validate(Some(&response), &url, &[Action::Ping]).is_ok()),
            Err(RiakError::ServerUnreachable { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Node statistics as returned by the stats endpoint.
    pub async fn stats(&self) -> RiakResult<Value> {
        let url = self.urls().stats();
        let response = self
            .transport()
            .get(&url, &[("Accept", "application/json")])
            .await?;
        validate(Some(&response), &url, &[Action::Stats])?;
        decode_json(&response)
    }

    /// Names of every bucket holding at least one key.
    ///
    /// This walks every key in the cluster on the server side.
    pub async fn buckets(&self) -> RiakResult<Vec<String>> {
        let url = self.urls().buckets();
        let response = self.transport().get(&url, &[]).await?;
        validate(Some(&response), &url, &[Action::ListBuckets])?;
        let envelope: BucketsEnvelope = decode_json(&response)?;
        Ok(envelope.buckets)
    }
}

/// Decode a JSON response body, keeping the URL in the error.
pub(crate) fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> RiakResult<T> {
    serde_json::from_slice(&response.body).map_err(|source| RiakError::Json {
        url: response.url.clone(),
        source,
    })
}
