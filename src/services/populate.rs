//! Rebuilds a [`RiakObject`] from a response.
//!
//! Population always starts from a reset object, so nothing from an earlier
//! response survives into the new state.

use crate::{
    errors::{RiakError, RiakResult},
    models::{
        index::{IndexName, IndexValue},
        link::Link,
        object::{AUTO_INDEX_COLLISIONS_META, AUTO_INDEX_META, RiakObject},
    },
    routes::urls::decode_segment,
    transport::{HttpResponse, status::Action},
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub const INDEX_HEADER_PREFIX: &str = "x-riak-index-";
pub const META_HEADER_PREFIX: &str = "x-riak-meta-";

/// Apply `response` (produced by `action`) to `obj`.
pub fn populate(obj: &mut RiakObject, response: &HttpResponse, action: Action) -> RiakResult<()> {
    obj.reset();

    if response.status == 404 {
        debug!(bucket = %obj.bucket, key = ?obj.key, %action, "object not found");
        return Ok(());
    }

    obj.exists = true;
    obj.headers = response.headers.clone();
    obj.vclock = response.headers.get("x-riak-vclock").map(str::to_string);
    if let Some(content_type) = response.headers.get("content-type") {
        obj.content_type = content_type.to_string();
    }

    if response.status == 300 {
        obj.siblings = parse_siblings(&response.body_text());
        debug!(
            bucket = %obj.bucket,
            key = ?obj.key,
            siblings = obj.siblings.len(),
            "object has siblings"
        );
        return Ok(());
    }

    if response.status == 201 {
        if let Some(location) = response.headers.get("location") {
            if let Some(last) = location.trim_end_matches('/').rsplit('/').next() {
                if !last.is_empty() {
                    obj.key = Some(decode_segment(last));
                }
            }
        }
    }

    obj.content = response.body.clone();
    if obj.json && matches!(response.status, 200 | 201) && !response.body.is_empty() {
        let data = serde_json::from_slice::<Value>(&response.body).map_err(|source| {
            RiakError::Json {
                url: response.url.clone(),
                source,
            }
        })?;
        obj.data = Some(data);
    }

    if let Some(links) = response.headers.joined("link") {
        obj.links = Link::parse_header(&links);
    }

    read_indexes_and_metadata(obj)?;
    reconcile_auto_indexes(obj);
    Ok(())
}

/// Vtags listed in a 300 body: a `Siblings:` line followed by one vtag per
/// line.
pub fn parse_siblings(body: &str) -> Vec<String> {
    body.lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fill indexes and metadata from `x-riak-index-*` / `x-riak-meta-*` headers.
///
/// The reserved auto-index metadata entries are lifted out of the metadata
/// map into the object's auto-index state.
fn read_indexes_and_metadata(obj: &mut RiakObject) -> RiakResult<()> {
    let mut indexes: BTreeMap<IndexName, BTreeSet<IndexValue>> = BTreeMap::new();
    for (suffix, values) in obj.headers.with_prefix(INDEX_HEADER_PREFIX) {
        let Some(name) = IndexName::parse(suffix) else {
            warn!(header = suffix, "ignoring index header with unknown type");
            continue;
        };
        let entry = indexes.entry(name.clone()).or_default();
        for raw in values.iter().flat_map(|v| v.split(',')) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            entry.insert(name.kind.parse_value(&decode_segment(raw))?);
        }
    }

    let mut metadata: BTreeMap<String, String> = obj
        .headers
        .with_prefix(META_HEADER_PREFIX)
        .map(|(name, values)| (name.to_string(), values.join(", ")))
        .collect();

    if let Some(raw) = metadata.remove(AUTO_INDEX_META) {
        match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(declared) => {
                obj.auto_indexes = declared
                    .iter()
                    .filter_map(|(name, kind)| {
                        let kind = kind.parse().ok()?;
                        Some(IndexName::new(name.as_str(), kind))
                    })
                    .collect();
            }
            Err(err) => warn!(error = %err, "ignoring malformed auto-index marker"),
        }
    }
    if let Some(raw) = metadata.remove(AUTO_INDEX_COLLISIONS_META) {
        match serde_json::from_str::<BTreeMap<String, Vec<Value>>>(&raw) {
            Ok(collisions) => {
                for (full_name, values) in collisions {
                    let Some(name) = IndexName::parse(&full_name) else {
                        continue;
                    };
                    let values: BTreeSet<IndexValue> = values
                        .iter()
                        .filter_map(|v| IndexValue::from_json(v, name.kind))
                        .collect();
                    obj.auto_index_collisions.insert(name, values);
                }
            }
            Err(err) => warn!(error = %err, "ignoring malformed auto-index collision marker"),
        }
    }

    obj.indexes = indexes;
    obj.metadata = metadata;
    Ok(())
}

/// Remove index values that were only present because of auto-indexing.
///
/// A value stays when it was recorded as a collision, i.e. it was also set
/// explicitly at store time. Only applies when data is a JSON object.
fn reconcile_auto_indexes(obj: &mut RiakObject) {
    let Some(Value::Object(fields)) = obj.data.as_ref() else {
        return;
    };
    for name in &obj.auto_indexes {
        let Some(field) = fields.get(&name.name) else {
            continue;
        };
        let Some(auto_value) = IndexValue::from_json(field, name.kind) else {
            continue;
        };
        let collided = obj
            .auto_index_collisions
            .get(name)
            .is_some_and(|values| values.contains(&auto_value));
        if collided {
            continue;
        }
        if let Some(values) = obj.indexes.get_mut(name) {
            values.remove(&auto_value);
            if values.is_empty() {
                obj.indexes.remove(name);
            }
        }
    }
}
