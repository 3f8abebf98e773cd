//! In-process stand-in for a Riak node's HTTP interface.
//!
//! Covers just enough of the protocol for the client tests: legacy object
//! paths, bucket props and key listing, 2i, link walking, map/reduce, ping
//! and stats. Siblings are only produced for keys seeded through
//! [`MockRiak::seed_siblings`].

#![allow(dead_code)]

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use percent_encoding::percent_decode_str;
use riak_http::{ClientConfig, Link, RiakClient};
use serde_json::{Map, Value, json};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;

#[derive(Debug, Clone, Default)]
pub struct Stored {
    pub content_type: String,
    pub body: Bytes,
    /// Link, index and metadata headers exactly as received.
    pub headers: Vec<(String, String)>,
    pub vclock: String,
}

impl Stored {
    pub fn json(body: Value) -> Self {
        Self {
            content_type: "application/json".into(),
            body: Bytes::from(body.to_string()),
            headers: Vec::new(),
            vclock: "seeded".into(),
        }
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(n, _)| n == name)
            .flat_map(|(_, v)| v.split(',').map(|s| s.trim().to_string()))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    pub objects: BTreeMap<(String, String), Stored>,
    pub siblings: HashMap<(String, String), Vec<(String, Stored)>>,
    pub props: HashMap<String, Map<String, Value>>,
    pub last_job: Option<Value>,
    pub last_store_headers: Option<HeaderMap>,
    /// Answer stores with a bare `204`, whatever `returnbody` says.
    pub ignore_returnbody: bool,
    next_id: u64,
}

pub type Shared = Arc<Mutex<MockState>>;

pub struct MockRiak {
    pub state: Shared,
    pub port: u16,
}

impl MockRiak {
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { state, port }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.port, Duration::from_secs(5))
            .with_client_id("test-client")
    }

    pub fn client(&self) -> RiakClient {
        RiakClient::new(self.config()).unwrap()
    }

    pub fn seed(&self, bucket: &str, key: &str, stored: Stored) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((bucket.into(), key.into()), stored);
    }

    pub fn seed_siblings(&self, bucket: &str, key: &str, values: Vec<(&str, Value)>) {
        let siblings = values
            .into_iter()
            .map(|(vtag, body)| (vtag.to_string(), Stored::json(body)))
            .collect();
        self.state
            .lock()
            .unwrap()
            .siblings
            .insert((bucket.into(), key.into()), siblings);
    }

    pub fn stored(&self, bucket: &str, key: &str) -> Option<Stored> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/ping", get(|| async { "OK" }))
        .route("/stats", get(stats))
        .route("/riak", get(list_buckets))
        .route(
            "/riak/{bucket}",
            get(bucket_info).put(set_props).post(create_object),
        )
        .route(
            "/riak/{bucket}/{key}",
            get(fetch).put(store).delete(remove),
        )
        .route("/riak/{bucket}/{key}/{*steps}", get(walk))
        .route("/buckets/{bucket}/keys", post(create_object))
        .route(
            "/buckets/{bucket}/keys/{key}",
            get(fetch).put(store).delete(remove),
        )
        .route("/buckets/{bucket}/index/{index}/{start}", get(index_exact))
        .route(
            "/buckets/{bucket}/index/{index}/{start}/{end}",
            get(index_range),
        )
        .route("/mapred", post(mapred))
        .with_state(state)
}

async fn stats() -> impl IntoResponse {
    axum::Json(json!({"vnode_gets": 12, "ring_num_partitions": 64}))
}

async fn list_buckets(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("buckets").map(String::as_str) != Some("true") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let state = state.lock().unwrap();
    let mut buckets: Vec<&String> = state.objects.keys().map(|(b, _)| b).collect();
    buckets.dedup();
    axum::Json(json!({ "buckets": buckets })).into_response()
}

fn default_props() -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("n_val".into(), json!(3));
    props.insert("allow_mult".into(), json!(false));
    props
}

async fn bucket_info(
    State(state): State<Shared>,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = state.lock().unwrap();
    let keys: Vec<String> = state
        .objects
        .keys()
        .filter(|(b, _)| *b == bucket)
        .map(|(_, k)| k.clone())
        .collect();

    if query.get("keys").map(String::as_str) == Some("stream") {
        // Alternate the two framings Riak has been seen to use.
        let mut body = String::from(r#"{"keys":[]}"#);
        for (i, key) in keys.iter().enumerate() {
            if i % 2 == 1 {
                body.push('\n');
            }
            body.push_str(&json!({ "keys": [key] }).to_string());
        }
        return ([(header::CONTENT_TYPE, "application/json")], body).into_response();
    }

    let mut doc = Map::new();
    if query.get("props").map(String::as_str) != Some("false") {
        let props = state.props.get(&bucket).cloned().unwrap_or_else(default_props);
        doc.insert("props".into(), Value::Object(props));
    }
    if query.get("keys").map(String::as_str) == Some("true") {
        doc.insert("keys".into(), json!(keys));
    }
    axum::Json(Value::Object(doc)).into_response()
}

async fn set_props(
    State(state): State<Shared>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) != Some("application/json") {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE;
    }
    let Ok(doc) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(update) = doc.get("props").and_then(Value::as_object) else {
        return StatusCode::BAD_REQUEST;
    };
    let mut state = state.lock().unwrap();
    let props = state.props.entry(bucket).or_insert_with(default_props);
    for (name, value) in update {
        props.insert(name.clone(), value.clone());
    }
    StatusCode::NO_CONTENT
}

fn object_response(status: StatusCode, stored: &Stored, location: Option<String>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&stored.content_type).unwrap(),
    );
    headers.insert("x-riak-vclock", HeaderValue::from_str(&stored.vclock).unwrap());
    for (name, value) in &stored.headers {
        headers.append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    if let Some(location) = location {
        headers.insert(header::LOCATION, HeaderValue::from_str(&location).unwrap());
    }
    (status, headers, stored.body.clone()).into_response()
}

fn record(state: &mut MockState, headers: &HeaderMap, body: Bytes) -> Stored {
    state.next_id += 1;
    state.last_store_headers = Some(headers.clone());
    let kept = headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            name == "link" || name.starts_with("x-riak-index-") || name.starts_with("x-riak-meta-")
        })
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    Stored {
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string(),
        body,
        headers: kept,
        vclock: format!("vclock-{}", state.next_id),
    }
}

async fn create_object(
    State(state): State<Shared>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    let key = format!("generated{}", state.next_id + 1);
    let stored = record(&mut state, &headers, body);
    state.objects.insert((bucket.clone(), key.clone()), stored.clone());
    object_response(
        StatusCode::CREATED,
        &stored,
        Some(format!("/riak/{bucket}/{key}")),
    )
}

async fn store(
    State(state): State<Shared>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    let stored = record(&mut state, &headers, body);
    state.objects.insert((bucket, key), stored.clone());
    if !state.ignore_returnbody && query.get("returnbody").map(String::as_str) == Some("true") {
        object_response(StatusCode::OK, &stored, None)
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn fetch(
    State(state): State<Shared>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let state = state.lock().unwrap();
    let id = (bucket, key);
    if let Some(siblings) = state.siblings.get(&id) {
        if let Some(vtag) = query.get("vtag") {
            return match siblings.iter().find(|(tag, _)| tag == vtag) {
                Some((_, stored)) => object_response(StatusCode::OK, stored, None),
                None => (StatusCode::NOT_FOUND, "not found").into_response(),
            };
        }
        let mut body = String::from("Siblings:\n");
        for (vtag, _) in siblings {
            body.push_str(vtag);
            body.push('\n');
        }
        return (
            StatusCode::MULTIPLE_CHOICES,
            [
                (header::CONTENT_TYPE, "text/plain"),
                (HeaderName::from_static("x-riak-vclock"), "conflicted"),
            ],
            body,
        )
            .into_response();
    }
    match state.objects.get(&id) {
        Some(stored) => object_response(StatusCode::OK, stored, None),
        None => (StatusCode::NOT_FOUND, "not found\n").into_response(),
    }
}

async fn remove(
    State(state): State<Shared>,
    Path((bucket, key)): Path<(String, String)>,
) -> StatusCode {
    match state.lock().unwrap().objects.remove(&(bucket, key)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn walk(
    State(state): State<Shared>,
    Path((bucket, key, steps)): Path<(String, String, String)>,
) -> Response {
    let state = state.lock().unwrap();
    if !state.objects.contains_key(&(bucket.clone(), key.clone())) {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    let mut current = vec![(bucket, key)];
    let mut body = String::new();
    for step in steps.split('/').filter(|s| !s.is_empty()) {
        let fields: Vec<&str> = step.split(',').collect();
        if fields.len() != 3 {
            return StatusCode::BAD_REQUEST.into_response();
        }
        let mut next = Vec::new();
        for id in &current {
            let Some(stored) = state.objects.get(id) else {
                continue;
            };
            let header = stored.header_values("link").join(", ");
            for link in Link::parse_header(&header) {
                let bucket_ok = fields[0] == "_" || fields[0] == link.bucket;
                let tag_ok = fields[1] == "_" || fields[1] == link.tag();
                if bucket_ok && tag_ok {
                    next.push((link.bucket.clone(), link.key.clone()));
                }
            }
        }
        if fields[2] == "1" {
            body.push_str("--outer\r\nContent-Type: multipart/mixed; boundary=inner\r\n\r\n");
            for (b, k) in &next {
                if let Some(stored) = state.objects.get(&(b.clone(), k.clone())) {
                    body.push_str(&format!(
                        "--inner\r\nLocation: /riak/{b}/{k}\r\nContent-Type: {}\r\nX-Riak-Vclock: {}\r\n\r\n",
                        stored.content_type, stored.vclock
                    ));
                    body.push_str(&String::from_utf8_lossy(&stored.body));
                    body.push_str("\r\n");
                }
            }
            body.push_str("--inner--\r\n\r\n");
        }
        current = next;
    }
    body.push_str("--outer--\r\n");
    (
        [(header::CONTENT_TYPE, "multipart/mixed; boundary=outer")],
        body,
    )
        .into_response()
}

fn index_keys(state: &MockState, bucket: &str, index: &str, matches: impl Fn(&str) -> bool) -> Value {
    let header = format!("x-riak-index-{index}");
    let mut keys = Vec::new();
    for ((b, k), stored) in &state.objects {
        if b != bucket {
            continue;
        }
        for raw in stored.header_values(&header) {
            let value = percent_decode_str(&raw).decode_utf8_lossy().into_owned();
            if matches(&value) {
                keys.push(k.clone());
            }
        }
    }
    json!({ "keys": keys })
}

async fn index_exact(
    State(state): State<Shared>,
    Path((bucket, index, start)): Path<(String, String, String)>,
) -> Response {
    let state = state.lock().unwrap();
    axum::Json(index_keys(&state, &bucket, &index, |v| v == start)).into_response()
}

async fn index_range(
    State(state): State<Shared>,
    Path((bucket, index, start, end)): Path<(String, String, String, String)>,
) -> Response {
    let state = state.lock().unwrap();
    let keys = if index.ends_with("_int") {
        let (Ok(lo), Ok(hi)) = (start.parse::<i64>(), end.parse::<i64>()) else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        index_keys(&state, &bucket, &index, |v| {
            v.parse::<i64>().is_ok_and(|n| lo <= n && n <= hi)
        })
    } else {
        index_keys(&state, &bucket, &index, |v| {
            start.as_str() <= v && v <= end.as_str()
        })
    };
    axum::Json(keys).into_response()
}

/// Identity-reduce jobs echo their inputs as `[bucket, key]` rows; any other
/// job answers with the number of phases that asked to keep results.
async fn mapred(State(state): State<Shared>, body: Bytes) -> Response {
    let Ok(job) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut state = state.lock().unwrap();
    state.last_job = Some(job.clone());

    let inputs = match &job["inputs"] {
        Value::Array(rows) if rows.is_empty() => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "no inputs").into_response();
        }
        Value::Array(rows) => rows.clone(),
        Value::String(bucket) => state
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(b, k)| json!([b, k]))
            .collect(),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };
    let query = job["query"].as_array().cloned().unwrap_or_default();
    let identity = query.len() == 1 && query[0]["reduce"]["function"] == "reduce_identity";
    if identity {
        let rows: Vec<Value> = inputs
            .iter()
            .map(|row| json!([row[0], row[1]]))
            .collect();
        return axum::Json(Value::Array(rows)).into_response();
    }
    let kept = query
        .iter()
        .filter(|phase| {
            phase
                .as_object()
                .and_then(|p| p.values().next())
                .is_some_and(|spec| spec["keep"] == true)
        })
        .count();
    axum::Json(json!([kept])).into_response()
}
