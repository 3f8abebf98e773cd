//! Builds request URLs for every Riak HTTP endpoint the client talks to.
//!
//! ## Layout
//! - `/{prefix}/{bucket}/{key}`                    objects (fetch, store, delete)
//! - `/{bucket_prefix}/{bucket}/{key_prefix}[/{key}]` objects, with `bucket_paths`
//! - `/{prefix}/{bucket}`                          bucket properties, key listing, POST create
//! - `/{prefix}?buckets=true`                      bucket listing
//! - `/{prefix}/{bucket}/{key}/{b,t,k}...`         link walking
//! - `/{bucket_prefix}/{bucket}/{index_prefix}/{name}_{type}/{start}[/{end}]`
//! - `/{mapred_prefix}`, `/{ping_prefix}`, `/{stats_prefix}`
//!
//! Every path segment is percent-encoded on its own, so a `/` inside a key
//! never splits it into two segments.

use crate::{config::ClientConfig, models::link::LinkSpec};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Everything except RFC 3986 unreserved characters gets encoded.
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ENCODE_SET).to_string()
}

pub fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Join `base` with individually encoded `segments` and an optional
/// form-encoded query string.
pub fn build<S: AsRef<str>>(base: &str, segments: &[S], query: &[(&str, String)]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(&encode_segment(segment.as_ref()));
    }
    if !query.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        url.push('?');
        url.push_str(&encoded);
    }
    url
}

/// Endpoint-aware wrapper over [`build`] bound to one server.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: String,
    prefix: String,
    bucket_prefix: String,
    key_prefix: String,
    bucket_paths: bool,
    index_prefix: String,
    mapred_prefix: String,
    ping_prefix: String,
    stats_prefix: String,
}

impl UrlBuilder {
    pub fn new(cfg: &ClientConfig) -> Self {
        Self {
            base: cfg.base_url(),
            prefix: cfg.prefix.clone(),
            bucket_prefix: cfg.bucket_prefix.clone(),
            key_prefix: cfg.key_prefix.clone(),
            bucket_paths: cfg.bucket_paths,
            index_prefix: cfg.index_prefix.clone(),
            mapred_prefix: cfg.mapred_prefix.clone(),
            ping_prefix: cfg.ping_prefix.clone(),
            stats_prefix: cfg.stats_prefix.clone(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path prefix used in `Link` headers.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object URL, or the bucket root when `key` is `None` (POST to create).
    pub fn object(&self, bucket: &str, key: Option<&str>, query: &[(&str, String)]) -> String {
        if self.bucket_paths {
            return self.keyed_object(bucket, key, query);
        }
        match key {
            Some(key) => build(&self.base, &[self.prefix.as_str(), bucket, key], query),
            None => self.bucket(bucket, query),
        }
    }

    /// `/{bucket_prefix}/{bucket}/{key_prefix}[/{key}]`.
    pub fn keyed_object(&self, bucket: &str, key: Option<&str>, query: &[(&str, String)]) -> String {
        let mut segments = vec![self.bucket_prefix.as_str(), bucket, self.key_prefix.as_str()];
        segments.extend(key);
        build(&self.base, &segments[..], query)
    }

    pub fn bucket(&self, bucket: &str, query: &[(&str, String)]) -> String {
        build(&self.base, &[self.prefix.as_str(), bucket], query)
    }

    pub fn buckets(&self) -> String {
        build(
            &self.base,
            &[self.prefix.as_str()],
            &[("buckets", "true".to_string())],
        )
    }

    pub fn index(&self, bucket: &str, index: &str, start: &str, end: Option<&str>) -> String {
        let mut segments = vec![
            self.bucket_prefix.as_str(),
            bucket,
            self.index_prefix.as_str(),
            index,
            start,
        ];
        if let Some(end) = end {
            segments.push(end);
        }
        build(&self.base, &segments[..], &[])
    }

    /// Link-walk URL; each spec contributes one `bucket,tag,keep` segment.
    ///
    /// The spec segments are encoded field by field so the commas survive.
    pub fn link_walk(&self, bucket: &str, key: &str, specs: &[LinkSpec]) -> String {
        let mut url = build(&self.base, &[self.prefix.as_str(), bucket, key], &[]);
        for spec in specs {
            url.push('/');
            url.push_str(&spec.to_path_segment());
        }
        url
    }

    pub fn mapred(&self) -> String {
        build(&self.base, &[self.mapred_prefix.as_str()], &[])
    }

    pub fn ping(&self) -> String {
        build(&self.base, &[self.ping_prefix.as_str()], &[])
    }

    pub fn stats(&self) -> String {
        build(&self.base, &[self.stats_prefix.as_str()], &[])
    }
}
