//! Object operations on a [`Bucket`]: fetch, store, reload, delete, sibling
//! resolution, batch fetch and link walking.

use crate::{
    errors::{RiakError, RiakResult},
    models::{
        index::{IndexName, IndexValue},
        link::LinkSpec,
        object::{AUTO_INDEX_COLLISIONS_META, AUTO_INDEX_META, JSON_CONTENT_TYPE, RiakObject},
        quorum::Quorum,
    },
    routes::urls::{decode_segment, encode_segment},
    services::{
        bucket::Bucket,
        populate::{INDEX_HEADER_PREFIX, META_HEADER_PREFIX, populate},
    },
    transport::{
        HttpRequest, HttpResponse, multipart,
        status::{Action, validate},
    },
};
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

type IndexSets = BTreeMap<IndexName, BTreeSet<IndexValue>>;

impl Bucket {
    /// Fetch `key` as a JSON object. A missing key yields an object with
    /// `exists() == false`, not an error.
    pub async fn get(&self, key: &str, r: Option<Quorum>) -> RiakResult<RiakObject> {
        let mut obj = RiakObject::new(self.name(), Some(key.to_string()));
        self.reload(&mut obj, r).await?;
        Ok(obj)
    }

    /// Fetch `key` keeping the payload as raw bytes.
    pub async fn get_binary(&self, key: &str, r: Option<Quorum>) -> RiakResult<RiakObject> {
        let mut obj = RiakObject::new_binary(
            self.name(),
            Some(key.to_string()),
            "application/octet-stream",
        );
        self.reload(&mut obj, r).await?;
        Ok(obj)
    }

    /// Fetch several keys concurrently.
    ///
    /// Each key gets its own result; a key whose request never completed is
    /// reported as unreachable without affecting the rest. A key listed more
    /// than once is fetched once.
    pub async fn get_many(
        &self,
        keys: &[&str],
        r: Option<Quorum>,
    ) -> HashMap<String, RiakResult<RiakObject>> {
        let query = [("r", self.r(r).to_string())];
        let unique: BTreeSet<&str> = keys.iter().copied().collect();
        let requests: Vec<(String, String)> = unique
            .into_iter()
            .map(|key| {
                let url = self.client.urls().object(self.name(), Some(key), &query);
                (key.to_string(), url)
            })
            .collect();
        let responses = self
            .client
            .transport()
            .execute_many(
                requests
                    .iter()
                    .map(|(_, url)| HttpRequest::new(Method::GET, url.clone()))
                    .collect(),
            )
            .await;

        let mut results = HashMap::new();
        for (key, url) in requests {
            let response = responses.get(&url).and_then(Option::as_ref);
            let outcome = self
                .fetched_object(key.clone(), response, &url, r)
                .await;
            results.insert(key, outcome);
        }
        results
    }

    async fn fetched_object(
        &self,
        key: String,
        response: Option<&HttpResponse>,
        url: &str,
        r: Option<Quorum>,
    ) -> RiakResult<RiakObject> {
        let response = validate_fetch(response, url)?;
        let mut obj = RiakObject::new(self.name(), Some(key));
        populate(&mut obj, response, Action::Fetch)?;
        self.adopt_first_sibling(&mut obj, r).await?;
        Ok(obj)
    }

    /// Write `obj`, then rebuild it from the server's answer.
    ///
    /// Objects without a key are POSTed and receive the server-assigned key.
    /// A bodiless answer (`204`, from a server ignoring `returnbody`) keeps
    /// the payload, links, indexes and metadata that were sent.
    pub async fn store(
        &self,
        obj: &mut RiakObject,
        w: Option<Quorum>,
        dw: Option<Quorum>,
    ) -> RiakResult<()> {
        let (headers, body) = self.store_request(obj)?;
        let query = [
            ("w", self.w(w).to_string()),
            ("dw", self.dw(dw).to_string()),
            ("returnbody", "true".to_string()),
        ];
        let url = self
            .client
            .urls()
            .object(&obj.bucket, obj.key.as_deref(), &query);
        let method = if obj.key.is_some() {
            Method::PUT
        } else {
            Method::POST
        };

        let mut request = HttpRequest::new(method, url.clone()).body(body);
        request.headers = headers;
        let response = self.client.transport().execute(request).await?;
        validate(Some(&response), &url, &[Action::Store, Action::Fetch])?;

        let declared = obj.auto_indexes.clone();
        let sent = response.body.is_empty().then(|| obj.clone());
        populate(obj, &response, Action::Store)?;
        if obj.auto_indexes.is_empty() {
            obj.auto_indexes = declared;
        }
        if let Some(sent) = sent {
            obj.data = sent.data;
            obj.content = sent.content;
            obj.links = sent.links;
            obj.indexes = sent.indexes;
            obj.metadata = sent.metadata;
        }
        info!(bucket = %obj.bucket, key = ?obj.key, status = response.status, "stored object");
        Ok(())
    }

    /// Re-read `obj` from the server.
    ///
    /// When the key has siblings the list stays on the object and the first
    /// sibling's value becomes the object's value.
    pub async fn reload(&self, obj: &mut RiakObject, r: Option<Quorum>) -> RiakResult<()> {
        let key = require_key(obj)?;
        let url = self
            .client
            .urls()
            .object(&obj.bucket, Some(&key), &[("r", self.r(r).to_string())]);
        let response = self.client.transport().get(&url, &[]).await?;
        let response = validate_fetch(Some(&response), &url)?;
        populate(obj, response, Action::Fetch)?;
        self.adopt_first_sibling(obj, r).await
    }

    /// Fetch sibling `index` of `obj` as its own object.
    pub async fn sibling(
        &self,
        obj: &RiakObject,
        index: usize,
        r: Option<Quorum>,
    ) -> RiakResult<RiakObject> {
        let vtag = obj.siblings.get(index).ok_or_else(|| {
            RiakError::data(format!(
                "sibling {} requested but object has {}",
                index,
                obj.siblings.len()
            ))
        })?;
        let url = self.sibling_url(obj, vtag, r)?;
        let response = self.client.transport().get(&url, &[]).await?;
        self.sibling_from_response(obj, Some(&response), &url)
    }

    /// Fetch every sibling of `obj` concurrently, in vtag order.
    pub async fn siblings(&self, obj: &RiakObject, r: Option<Quorum>) -> RiakResult<Vec<RiakObject>> {
        let urls = obj
            .siblings
            .iter()
            .map(|vtag| self.sibling_url(obj, vtag, r))
            .collect::<RiakResult<Vec<_>>>()?;
        let responses = self
            .client
            .transport()
            .execute_many(
                urls.iter()
                    .map(|url| HttpRequest::new(Method::GET, url.clone()))
                    .collect(),
            )
            .await;

        urls.iter()
            .map(|url| {
                let response = responses.get(url).and_then(Option::as_ref);
                self.sibling_from_response(obj, response, url)
            })
            .collect()
    }

    /// Delete `obj`. Deleting a missing key succeeds.
    pub async fn delete(&self, obj: &mut RiakObject, dw: Option<Quorum>) -> RiakResult<()> {
        let key = require_key(obj)?;
        let url = self
            .client
            .urls()
            .object(&obj.bucket, Some(&key), &[("dw", self.dw(dw).to_string())]);
        let response = self.client.transport().delete(&url, &[]).await?;
        validate(Some(&response), &url, &[Action::Delete])?;
        obj.reset();
        debug!(bucket = %obj.bucket, key = %key, status = response.status, "deleted object");
        Ok(())
    }

    /// Follow links from `key` one spec at a time.
    ///
    /// Returns one list of objects per spec whose results are kept.
    pub async fn walk(&self, key: &str, specs: &[LinkSpec]) -> RiakResult<Vec<Vec<RiakObject>>> {
        let url = self.client.urls().link_walk(self.name(), key, specs);
        let response = self.client.transport().get(&url, &[]).await?;
        validate(Some(&response), &url, &[Action::LinkWalk])?;

        let outer_boundary = response
            .headers
            .get("content-type")
            .and_then(multipart::boundary)
            .ok_or_else(|| RiakError::data(format!("link walk response from {url} is not multipart")))?;

        let mut phases = Vec::new();
        for phase in multipart::split(&response.body, &outer_boundary) {
            let mut objects = Vec::new();
            if let Some(inner_boundary) = phase.boundary() {
                for part in multipart::split(&phase.body, &inner_boundary) {
                    objects.push(self.object_from_part(part)?);
                }
            }
            phases.push(objects);
        }
        Ok(phases)
    }

    fn object_from_part(&self, part: multipart::Part) -> RiakResult<RiakObject> {
        let location = part
            .headers
            .get("location")
            .map(|l| l.trim_end_matches('/'))
            .filter(|l| !l.is_empty())
            .ok_or_else(|| RiakError::data("link walk part has no Location header"))?
            .to_string();
        let mut segments = location.rsplit('/');
        let key = segments.next().map(decode_segment);
        let bucket = segments
            .next()
            .map(decode_segment)
            .unwrap_or_else(|| self.name().to_string());

        let content_type = part.headers.get("content-type").unwrap_or(JSON_CONTENT_TYPE);
        let mut obj = if content_type.starts_with(JSON_CONTENT_TYPE) {
            RiakObject::new(bucket, key)
        } else {
            RiakObject::new_binary(bucket, key, content_type)
        };
        let url = format!("{}{}", self.client.urls().base(), location);
        let response = HttpResponse::new(url, 200, part.headers, part.body);
        populate(&mut obj, &response, Action::Fetch)?;
        Ok(obj)
    }

    async fn adopt_first_sibling(&self, obj: &mut RiakObject, r: Option<Quorum>) -> RiakResult<()> {
        if !obj.has_siblings() {
            return Ok(());
        }
        let first = self.sibling(obj, 0, r).await?;
        debug!(
            bucket = %obj.bucket,
            key = ?obj.key,
            siblings = obj.siblings.len(),
            "resolving siblings to the first value"
        );
        obj.data = first.data;
        obj.content = first.content;
        obj.content_type = first.content_type;
        Ok(())
    }

    fn sibling_url(&self, obj: &RiakObject, vtag: &str, r: Option<Quorum>) -> RiakResult<String> {
        let key = require_key(obj)?;
        Ok(self.client.urls().object(
            &obj.bucket,
            Some(&key),
            &[("r", self.r(r).to_string()), ("vtag", vtag.to_string())],
        ))
    }

    fn sibling_from_response(
        &self,
        obj: &RiakObject,
        response: Option<&HttpResponse>,
        url: &str,
    ) -> RiakResult<RiakObject> {
        let response = validate(response, url, &[Action::Fetch])?;
        let mut sibling = if obj.json {
            RiakObject::new(obj.bucket.clone(), obj.key.clone())
        } else {
            RiakObject::new_binary(obj.bucket.clone(), obj.key.clone(), obj.content_type.clone())
        };
        populate(&mut sibling, response, Action::Fetch)?;
        Ok(sibling)
    }

    /// Headers and body for a store of `obj`.
    fn store_request(&self, obj: &RiakObject) -> RiakResult<(Vec<(String, String)>, Bytes)> {
        let (body, content_type) = if obj.json {
            let data = obj.data.as_ref().unwrap_or(&Value::Null);
            (Bytes::from(serde_json::to_vec(data)?), JSON_CONTENT_TYPE.to_string())
        } else {
            (obj.content.clone(), obj.content_type.clone())
        };

        let mut headers = vec![
            ("Content-Type".to_string(), content_type),
            (
                "X-Riak-ClientId".to_string(),
                self.client.client_id().to_string(),
            ),
        ];
        if let Some(vclock) = &obj.vclock {
            headers.push(("X-Riak-Vclock".to_string(), vclock.clone()));
        }
        if !obj.links.is_empty() {
            let prefix = self.client.urls().prefix();
            let value = obj
                .links
                .iter()
                .map(|link| link.to_header(prefix))
                .collect::<Vec<_>>()
                .join(", ");
            headers.push(("Link".to_string(), value));
        }

        let (indexes, collisions) = merge_auto_indexes(obj)?;
        for (name, values) in &indexes {
            let value = values
                .iter()
                .map(|v| encode_segment(&v.to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            headers.push((format!("{INDEX_HEADER_PREFIX}{name}"), value));
        }

        for (name, value) in &obj.metadata {
            headers.push((format!("{META_HEADER_PREFIX}{name}"), value.clone()));
        }
        if !obj.auto_indexes.is_empty() {
            let declared: BTreeMap<&str, &str> = obj
                .auto_indexes
                .iter()
                .map(|name| (name.name.as_str(), name.kind.suffix()))
                .collect();
            headers.push((
                format!("{META_HEADER_PREFIX}{AUTO_INDEX_META}"),
                serde_json::to_string(&declared)?,
            ));
        }
        if !collisions.is_empty() {
            let recorded: BTreeMap<String, Vec<Value>> = collisions
                .iter()
                .map(|(name, values)| {
                    (name.to_string(), values.iter().map(IndexValue::to_json).collect())
                })
                .collect();
            headers.push((
                format!("{META_HEADER_PREFIX}{AUTO_INDEX_COLLISIONS_META}"),
                serde_json::to_string(&recorded)?,
            ));
        }

        Ok((headers, body))
    }
}

/// Explicit indexes plus the values taken from auto-indexed data fields.
///
/// Returns the merged index sets and, per index, the auto values that were
/// also present explicitly (collisions). Auto-indexing needs object data.
pub(crate) fn merge_auto_indexes(obj: &RiakObject) -> RiakResult<(IndexSets, IndexSets)> {
    let mut merged = obj.indexes.clone();
    let mut collisions = IndexSets::new();
    if obj.auto_indexes.is_empty() {
        return Ok((merged, collisions));
    }

    let Some(Value::Object(fields)) = obj.data.as_ref() else {
        return Err(RiakError::data(format!(
            "auto-indexing {:?}/{:?} requires JSON object data",
            obj.bucket, obj.key
        )));
    };
    for name in &obj.auto_indexes {
        let Some(field) = fields.get(&name.name) else {
            continue;
        };
        let value = IndexValue::from_json(field, name.kind).ok_or_else(|| {
            RiakError::data(format!(
                "field `{}` cannot be indexed as {}",
                name.name, name.kind
            ))
        })?;
        if obj
            .indexes
            .get(name)
            .is_some_and(|values| values.contains(&value))
        {
            collisions
                .entry(name.clone())
                .or_default()
                .insert(value.clone());
        }
        merged.entry(name.clone()).or_default().insert(value);
    }
    Ok((merged, collisions))
}

/// Fetch validation where a missing key is an answer, not a failure.
fn validate_fetch<'r>(
    response: Option<&'r HttpResponse>,
    url: &str,
) -> RiakResult<&'r HttpResponse> {
    match response {
        Some(response) if response.status == 404 => Ok(response),
        other => validate(other, url, &[Action::Fetch]),
    }
}

fn require_key(obj: &RiakObject) -> RiakResult<String> {
    obj.key.clone().ok_or_else(|| RiakError::MissingKey {
        bucket: obj.bucket.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ClientConfig, DEFAULT_TIMEOUT},
        models::index::IndexType,
        services::client::RiakClient,
        transport::headers::HeaderBlock,
    };
    use serde_json::json;

    fn people() -> Bucket {
        RiakClient::new(ClientConfig::new("127.0.0.1", 8098, DEFAULT_TIMEOUT))
            .unwrap()
            .bucket("people")
    }

    #[test]
    fn walk_part_location_names_the_object() {
        let part = multipart::Part {
            headers: HeaderBlock::parse(
                "Location: /riak/friends/carol%20b\r\nContent-Type: application/json\r\n",
            ),
            body: Bytes::from_static(br#"{"name":"carol"}"#),
        };
        let obj = people().object_from_part(part).unwrap();
        assert_eq!(obj.bucket(), "friends");
        assert_eq!(obj.key(), Some("carol b"));
        assert_eq!(obj.data().unwrap()["name"], "carol");
    }

    #[test]
    fn walk_part_without_location_is_rejected() {
        let part = multipart::Part {
            headers: HeaderBlock::parse("Content-Type: application/json\r\n"),
            body: Bytes::from_static(b"{}"),
        };
        assert!(matches!(
            people().object_from_part(part),
            Err(RiakError::Data(_))
        ));
    }

    #[test]
    fn auto_index_merges_field_values_and_records_collisions() {
        let mut obj = RiakObject::new("users", Some("bob".into()));
        obj.set_data(json!({"age": 30, "city": "paris"}))
            .add_index("city", IndexType::Bin, "paris")
            .add_index("city", IndexType::Bin, "lyon")
            .add_auto_index("age", IndexType::Int)
            .add_auto_index("city", IndexType::Bin);

        let (merged, collisions) = merge_auto_indexes(&obj).unwrap();
        let age = IndexName::new("age", IndexType::Int);
        let city = IndexName::new("city", IndexType::Bin);
        assert_eq!(merged[&age], BTreeSet::from([IndexValue::Int(30)]));
        assert_eq!(merged[&city].len(), 2);
        assert_eq!(
            collisions[&city],
            BTreeSet::from([IndexValue::Bin("paris".into())])
        );
        assert!(!collisions.contains_key(&age));
    }

    #[test]
    fn auto_index_requires_object_data() {
        let mut obj = RiakObject::new("users", Some("bob".into()));
        obj.set_data(json!([1, 2])).add_auto_index("age", IndexType::Int);
        assert!(matches!(merge_auto_indexes(&obj), Err(RiakError::Data(_))));

        let mut raw = RiakObject::new_binary("files", Some("f".into()), "text/plain");
        raw.add_auto_index("age", IndexType::Int);
        assert!(matches!(merge_auto_indexes(&raw), Err(RiakError::Data(_))));
    }

    #[test]
    fn auto_index_rejects_uncoercible_field() {
        let mut obj = RiakObject::new("users", Some("bob".into()));
        obj.set_data(json!({"age": "old"}))
            .add_auto_index("age", IndexType::Int);
        assert!(merge_auto_indexes(&obj).is_err());
    }
}
