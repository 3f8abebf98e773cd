//! Represents an object (value) stored under a bucket/key in Riak.

use crate::{
    models::{
        index::{IndexName, IndexType, IndexValue},
        link::Link,
    },
    transport::headers::HeaderBlock,
};
use bytes::Bytes;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Metadata entry recording which indexes are filled from data fields.
pub const AUTO_INDEX_META: &str = "client-autoindex";
/// Metadata entry recording explicit index values that coincided with an
/// auto-indexed field value at store time.
pub const AUTO_INDEX_COLLISIONS_META: &str = "client-autoindexcollisions";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A single value in a bucket, plus everything Riak stores alongside it.
///
/// Objects are plain data. A [`Bucket`](crate::services::bucket::Bucket)
/// stores, reloads and deletes them; every response rebuilds the object from
/// scratch.
#[derive(Debug, Clone)]
pub struct RiakObject {
    pub(crate) bucket: String,
    pub(crate) key: Option<String>,

    /// Encode `data` as JSON on store and decode bodies on fetch.
    pub(crate) json: bool,
    pub(crate) content_type: String,
    pub(crate) content: Bytes,
    pub(crate) data: Option<Value>,

    pub(crate) headers: HeaderBlock,
    pub(crate) vclock: Option<String>,
    pub(crate) exists: bool,

    pub(crate) links: Vec<Link>,
    pub(crate) siblings: Vec<String>,
    pub(crate) indexes: BTreeMap<IndexName, BTreeSet<IndexValue>>,
    pub(crate) metadata: BTreeMap<String, String>,

    /// Indexes whose values are taken from the data field of the same name.
    pub(crate) auto_indexes: BTreeSet<IndexName>,
    pub(crate) auto_index_collisions: BTreeMap<IndexName, BTreeSet<IndexValue>>,
}

impl RiakObject {
    /// A JSON object; `data` is serialized on store.
    pub fn new(bucket: impl Into<String>, key: Option<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key,
            json: true,
            content_type: JSON_CONTENT_TYPE.to_string(),
            content: Bytes::new(),
            data: None,
            headers: HeaderBlock::default(),
            vclock: None,
            exists: false,
            links: Vec::new(),
            siblings: Vec::new(),
            indexes: BTreeMap::new(),
            metadata: BTreeMap::new(),
            auto_indexes: BTreeSet::new(),
            auto_index_collisions: BTreeMap::new(),
        }
    }

    /// A raw payload object; `content` is sent as-is.
    pub fn new_binary(
        bucket: impl Into<String>,
        key: Option<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let mut obj = Self::new(bucket, key);
        obj.json = false;
        obj.content_type = content_type.into();
        obj
    }

    /// Drop everything learned from the server, keeping identity and mode.
    pub(crate) fn reset(&mut self) {
        self.content = Bytes::new();
        self.data = None;
        self.headers = HeaderBlock::default();
        self.vclock = None;
        self.exists = false;
        self.links.clear();
        self.siblings.clear();
        self.indexes.clear();
        self.metadata.clear();
        self.auto_indexes.clear();
        self.auto_index_collisions.clear();
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: Value) -> &mut Self {
        self.data = Some(data);
        self
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<Bytes>) -> &mut Self {
        self.content = content.into();
        self
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = content_type.into();
        self
    }

    pub fn headers(&self) -> &HeaderBlock {
        &self.headers
    }

    pub fn vclock(&self) -> Option<&str> {
        self.vclock.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Add a link unless an equal one is already present.
    pub fn add_link(&mut self, link: Link) -> &mut Self {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
        self
    }

    pub fn remove_link(&mut self, link: &Link) -> &mut Self {
        self.links.retain(|l| l != link);
        self
    }

    pub fn has_siblings(&self) -> bool {
        !self.siblings.is_empty()
    }

    /// Vtags of the conflicting values, in server order.
    pub fn siblings(&self) -> &[String] {
        &self.siblings
    }

    pub fn add_index(
        &mut self,
        name: &str,
        kind: IndexType,
        value: impl Into<IndexValue>,
    ) -> &mut Self {
        self.indexes
            .entry(IndexName::new(name, kind))
            .or_default()
            .insert(value.into());
        self
    }

    /// Replace every value of one index.
    pub fn set_index<I, V>(&mut self, name: &str, kind: IndexType, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<IndexValue>,
    {
        let values: BTreeSet<IndexValue> = values.into_iter().map(Into::into).collect();
        let name = IndexName::new(name, kind);
        if values.is_empty() {
            self.indexes.remove(&name);
        } else {
            self.indexes.insert(name, values);
        }
        self
    }

    /// Remove one value, or the whole index when `value` is `None`.
    pub fn remove_index(
        &mut self,
        name: &str,
        kind: IndexType,
        value: Option<IndexValue>,
    ) -> &mut Self {
        let name = IndexName::new(name, kind);
        match value {
            None => {
                self.indexes.remove(&name);
            }
            Some(value) => {
                if let Some(values) = self.indexes.get_mut(&name) {
                    values.remove(&value);
                    if values.is_empty() {
                        self.indexes.remove(&name);
                    }
                }
            }
        }
        self
    }

    pub fn index(&self, name: &str, kind: IndexType) -> Vec<IndexValue> {
        self.indexes
            .get(&IndexName::new(name, kind))
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn indexes(&self) -> &BTreeMap<IndexName, BTreeSet<IndexValue>> {
        &self.indexes
    }

    /// Index the data field `name` under `name_<kind>` on every store.
    pub fn add_auto_index(&mut self, name: &str, kind: IndexType) -> &mut Self {
        self.auto_indexes.insert(IndexName::new(name, kind));
        self
    }

    pub fn remove_auto_index(&mut self, name: &str, kind: IndexType) -> &mut Self {
        let name = IndexName::new(name, kind);
        self.auto_indexes.remove(&name);
        self.auto_index_collisions.remove(&name);
        self
    }

    pub fn auto_indexes(&self) -> &BTreeSet<IndexName> {
        &self.auto_indexes
    }

    pub fn set_meta(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.metadata
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn meta(&self, name: &str) -> Option<&str> {
        self.metadata
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove_meta(&mut self, name: &str) -> &mut Self {
        self.metadata.remove(&name.to_ascii_lowercase());
        self
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}
