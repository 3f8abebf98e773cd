//! Bucket handle: quorum defaults, properties, key listing and index queries.
//!
//! Object operations live in [`crate::services::objects`].

use crate::{
    errors::{RiakError, RiakResult},
    models::{
        bucket::{BucketProps, KeysChunk, PropsEnvelope, PropsUpdate},
        index::{IndexName, IndexType, IndexValue},
        link::Link,
        object::{JSON_CONTENT_TYPE, RiakObject},
        quorum::Quorum,
    },
    routes::urls::decode_segment,
    services::client::{RiakClient, decode_json},
    transport::status::{Action, validate},
};
use serde_json::{Deserializer, Value};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Bucket {
    pub(crate) client: RiakClient,
    name: String,
    r: Option<Quorum>,
    w: Option<Quorum>,
    dw: Option<Quorum>,
    props: Option<BucketProps>,
    keys: Option<Vec<String>>,
}

impl Bucket {
    pub(crate) fn new(client: RiakClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            r: None,
            w: None,
            dw: None,
            props: None,
            keys: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &RiakClient {
        &self.client
    }

    /// Effective R: explicit override, then bucket value, then client default.
    pub fn r(&self, explicit: Option<Quorum>) -> Quorum {
        explicit.or(self.r).unwrap_or(self.client.config().r)
    }

    pub fn w(&self, explicit: Option<Quorum>) -> Quorum {
        explicit.or(self.w).unwrap_or(self.client.config().w)
    }

    pub fn dw(&self, explicit: Option<Quorum>) -> Quorum {
        explicit.or(self.dw).unwrap_or(self.client.config().dw)
    }

    pub fn set_r(&mut self, r: Option<Quorum>) -> &mut Self {
        self.r = r;
        self
    }

    pub fn set_w(&mut self, w: Option<Quorum>) -> &mut Self {
        self.w = w;
        self
    }

    pub fn set_dw(&mut self, dw: Option<Quorum>) -> &mut Self {
        self.dw = dw;
        self
    }

    /// A new, unsaved JSON object in this bucket.
    pub fn new_object(&self, key: Option<&str>, data: Value) -> RiakObject {
        let mut obj = RiakObject::new(self.name.clone(), key.map(str::to_string));
        obj.set_data(data);
        obj
    }

    /// A new, unsaved raw object in this bucket.
    pub fn new_binary(
        &self,
        key: Option<&str>,
        content: impl Into<bytes::Bytes>,
        content_type: &str,
    ) -> RiakObject {
        let mut obj = RiakObject::new_binary(self.name.clone(), key.map(str::to_string), content_type);
        obj.set_content(content);
        obj
    }

    /// Bucket properties, fetched once and cached until `refresh` or a
    /// successful [`Bucket::set_properties`].
    pub async fn properties(&mut self, refresh: bool) -> RiakResult<&BucketProps> {
        if refresh || self.props.is_none() {
            let url = self.client.urls().bucket(
                &self.name,
                &[("props", "true".into()), ("keys", "false".into())],
            );
            let response = self.client.transport().get(&url, &[]).await?;
            validate(Some(&response), &url, &[Action::GetBucketProperties])?;
            let envelope: PropsEnvelope = decode_json(&response)?;
            self.props = Some(envelope.props);
        }
        Ok(&*self.props.get_or_insert_with(BucketProps::default))
    }

    pub async fn property(&mut self, name: &str) -> RiakResult<Option<Value>> {
        Ok(self.properties(false).await?.get(name).cloned())
    }

    pub async fn set_properties(&mut self, props: &BucketProps) -> RiakResult<()> {
        let url = self.client.urls().bucket(&self.name, &[]);
        let body = serde_json::to_vec(&PropsUpdate { props })?;
        let response = self
            .client
            .transport()
            .put(&url, &[("Content-Type", JSON_CONTENT_TYPE)], body)
            .await?;
        validate(Some(&response), &url, &[Action::SetBucketProperties])?;
        self.props = None;
        debug!(bucket = %self.name, "bucket properties updated");
        Ok(())
    }

    pub async fn set_property(&mut self, name: &str, value: impl Into<Value>) -> RiakResult<()> {
        let mut props = BucketProps::default();
        props.set(name, value);
        self.set_properties(&props).await
    }

    pub async fn n_val(&mut self) -> RiakResult<Option<u64>> {
        Ok(self.properties(false).await?.n_val())
    }

    pub async fn set_n_val(&mut self, n_val: u64) -> RiakResult<()> {
        self.set_property("n_val", n_val).await
    }

    pub async fn allow_multiples(&mut self) -> RiakResult<bool> {
        Ok(self.properties(false).await?.allow_mult().unwrap_or(false))
    }

    pub async fn set_allow_multiples(&mut self, allow: bool) -> RiakResult<()> {
        self.set_property("allow_mult", allow).await
    }

    /// Every key in the bucket, cached until `refresh`.
    pub async fn keys(&mut self, refresh: bool) -> RiakResult<&[String]> {
        if refresh || self.keys.is_none() {
            let url = self.client.urls().bucket(
                &self.name,
                &[("props", "false".into()), ("keys", "true".into())],
            );
            let response = self.client.transport().get(&url, &[]).await?;
            validate(Some(&response), &url, &[Action::ListKeys])?;
            let chunk: KeysChunk = decode_json(&response)?;
            self.keys = Some(chunk.keys.iter().map(|k| decode_segment(k)).collect());
        }
        Ok(self.keys.as_deref().unwrap_or(&[]))
    }

    /// Key listing in streaming mode (`keys=stream`).
    ///
    /// The server sends a sequence of `{"keys":[...]}` documents, either back
    /// to back or newline-separated; both are read with a streaming JSON
    /// deserializer. The result is not cached.
    pub async fn stream_keys(&self) -> RiakResult<Vec<String>> {
        let url = self.client.urls().bucket(
            &self.name,
            &[("props", "false".into()), ("keys", "stream".into())],
        );
        let response = self.client.transport().get(&url, &[]).await?;
        validate(Some(&response), &url, &[Action::ListKeys])?;
        demux_key_stream(&response.body).map_err(|source| RiakError::Json {
            url: url.clone(),
            source,
        })
    }

    /// Keys whose `name_<kind>` index equals `start`, or lies in
    /// `start..=end` when `end` is given, as links into this bucket.
    pub async fn index_search(
        &self,
        name: &str,
        kind: IndexType,
        start: &IndexValue,
        end: Option<&IndexValue>,
        dedupe: bool,
    ) -> RiakResult<Vec<Link>> {
        let index = IndexName::new(name, kind);
        let start = start.to_string();
        let end = end.map(ToString::to_string);
        let url = self
            .client
            .urls()
            .index(&self.name, &index.to_string(), &start, end.as_deref());
        let response = self.client.transport().get(&url, &[]).await?;
        validate(Some(&response), &url, &[Action::SecondaryIndex])?;
        let chunk: KeysChunk = decode_json(&response)?;

        let mut seen = HashSet::new();
        let links = chunk
            .keys
            .iter()
            .map(|k| decode_segment(k))
            .filter(|k| !dedupe || seen.insert(k.clone()))
            .map(|k| Link::new(self.name.clone(), k))
            .collect();
        Ok(links)
    }
}

/// Collect keys from a concatenated or newline-delimited run of key chunks.
pub(crate) fn demux_key_stream(body: &[u8]) -> Result<Vec<String>, serde_json::Error> {
    let mut keys = Vec::new();
    for chunk in Deserializer::from_slice(body).into_iter::<KeysChunk>() {
        keys.extend(chunk?.keys.iter().map(|k| decode_segment(k)));
    }
    Ok(keys)
}
