//! Bucket property documents as exchanged with `/{prefix}/{bucket}?props=true`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `props` object of a bucket.
///
/// Riak returns many more properties than the client understands, so the
/// document is kept as an open map with typed accessors for the common ones.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct BucketProps(pub Map<String, Value>);

impl BucketProps {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Replication factor.
    pub fn n_val(&self) -> Option<u64> {
        self.get("n_val").and_then(Value::as_u64)
    }

    /// Whether concurrent writes are kept as siblings.
    pub fn allow_mult(&self) -> Option<bool> {
        self.get("allow_mult").and_then(Value::as_bool)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Body of a bucket GET with `props=true`.
#[derive(Deserialize, Debug)]
pub(crate) struct PropsEnvelope {
    #[serde(default)]
    pub props: BucketProps,
}

/// Body of a bucket PUT.
#[derive(Serialize, Debug)]
pub(crate) struct PropsUpdate<'a> {
    pub props: &'a BucketProps,
}

/// One chunk of a key listing; a streamed listing is a sequence of these.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct KeysChunk {
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Body of `?buckets=true`.
#[derive(Deserialize, Debug)]
pub(crate) struct BucketsEnvelope {
    #[serde(default)]
    pub buckets: Vec<String>,
}
