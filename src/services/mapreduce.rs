//! Map/reduce job builder and runner.

use crate::{
    errors::{RiakError, RiakResult},
    models::{
        index::{IndexName, IndexType, IndexValue},
        link::Link,
        mapreduce::{IndexQuery, Inputs, Phase, PhaseFunction, job_body, prepare_phases},
        object::{JSON_CONTENT_TYPE, RiakObject},
    },
    services::client::{RiakClient, decode_json},
    transport::status::{Action, validate},
};
use serde_json::Value;
use tracing::debug;

/// Rows returned by a job.
#[derive(Debug, Clone, PartialEq)]
pub enum MapReduceOutput {
    /// The job ended in a link phase (or had no phases): `[bucket, key, tag]`
    /// rows decoded into links.
    Links(Vec<Link>),
    Values(Vec<Value>),
}

impl MapReduceOutput {
    pub fn into_values(self) -> Vec<Value> {
        match self {
            MapReduceOutput::Values(values) => values,
            MapReduceOutput::Links(links) => links
                .into_iter()
                .map(|link| serde_json::json!([link.bucket, link.key, link.tag()]))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapReduce {
    client: RiakClient,
    inputs: Inputs,
    phases: Vec<Phase>,
}

impl MapReduce {
    pub(crate) fn new(client: RiakClient) -> Self {
        Self {
            client,
            inputs: Inputs::Empty,
            phases: Vec::new(),
        }
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Read every key of `bucket`. Replaces any previous inputs.
    pub fn add_bucket(&mut self, bucket: impl Into<String>) -> &mut Self {
        self.inputs = Inputs::Bucket(bucket.into());
        self
    }

    /// Add one `bucket`/`key` input, with optional key data passed to the
    /// first phase.
    ///
    /// Fails when the job already reads a whole bucket or an index.
    pub fn add_object(
        &mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        keydata: Option<Value>,
    ) -> RiakResult<&mut Self> {
        let entry = (bucket.into(), key.into(), keydata);
        match self.inputs {
            Inputs::Empty => self.inputs = Inputs::Objects(vec![entry]),
            Inputs::Objects(ref mut objects) => objects.push(entry),
            Inputs::Bucket(_) | Inputs::Index { .. } => {
                return Err(RiakError::data(
                    "map/reduce job already reads a bucket or index; cannot add an object",
                ));
            }
        }
        Ok(self)
    }

    pub fn add_riak_object(&mut self, obj: &RiakObject) -> RiakResult<&mut Self> {
        let key = obj.key.clone().ok_or_else(|| RiakError::MissingKey {
            bucket: obj.bucket.clone(),
        })?;
        self.add_object(obj.bucket.clone(), key, None)
    }

    /// Add the target of `link`, e.g. one result of an index search.
    pub fn add_link(&mut self, link: &Link) -> RiakResult<&mut Self> {
        self.add_object(link.bucket.clone(), link.key.clone(), None)
    }

    /// Read the keys matching a secondary index; `end` makes it a range
    /// query. Replaces any previous inputs.
    pub fn add_index(
        &mut self,
        bucket: impl Into<String>,
        name: &str,
        kind: IndexType,
        start: IndexValue,
        end: Option<IndexValue>,
    ) -> &mut Self {
        let query = match end {
            Some(end) => IndexQuery::Range(start, end),
            None => IndexQuery::Exact(start),
        };
        self.inputs = Inputs::Index {
            bucket: bucket.into(),
            index: IndexName::new(name, kind),
            query,
        };
        self
    }

    pub fn map(&mut self, function: PhaseFunction, keep: bool, arg: Option<Value>) -> &mut Self {
        self.phases.push(Phase::Map {
            function,
            keep,
            arg,
        });
        self
    }

    pub fn reduce(&mut self, function: PhaseFunction, keep: bool, arg: Option<Value>) -> &mut Self {
        self.phases.push(Phase::Reduce {
            function,
            keep,
            arg,
        });
        self
    }

    /// Follow links matching `bucket`/`tag`; `None` matches anything.
    pub fn link(&mut self, bucket: Option<&str>, tag: Option<&str>, keep: bool) -> &mut Self {
        self.phases.push(Phase::Link {
            bucket: bucket.map(str::to_string),
            tag: tag.map(str::to_string),
            keep,
        });
        self
    }

    /// The JSON job that [`MapReduce::run`] would submit.
    pub fn job(&self, timeout_ms: Option<u64>) -> (Value, bool) {
        let mut phases = self.phases.clone();
        let link_results = prepare_phases(&mut phases);
        (job_body(&self.inputs, &phases, timeout_ms), link_results)
    }

    /// Submit the job and decode its result rows.
    pub async fn run(&self, timeout_ms: Option<u64>) -> RiakResult<MapReduceOutput> {
        let (job, link_results) = self.job(timeout_ms);
        let url = self.client.urls().mapred();
        let body = serde_json::to_vec(&job)?;
        let response = self
            .client
            .transport()
            .post(&url, &[("Content-Type", JSON_CONTENT_TYPE)], body)
            .await?;
        validate(Some(&response), &url, &[Action::MapReduce])?;

        let rows: Vec<Value> = decode_json(&response)?;
        debug!(rows = rows.len(), link_results, "map/reduce finished");
        if link_results {
            rows.iter()
                .map(link_from_row)
                .collect::<RiakResult<Vec<_>>>()
                .map(MapReduceOutput::Links)
        } else {
            Ok(MapReduceOutput::Values(rows))
        }
    }
}

/// `[bucket, key]` or `[bucket, key, tag]`.
fn link_from_row(row: &Value) -> RiakResult<Link> {
    let malformed = || RiakError::data(format!("malformed link row in map/reduce result: {row}"));
    let fields = row.as_array().ok_or_else(malformed)?;
    let bucket = fields.first().and_then(Value::as_str).ok_or_else(malformed)?;
    let key = fields.get(1).and_then(Value::as_str).ok_or_else(malformed)?;
    let mut link = Link::new(bucket, key);
    if let Some(tag) = fields.get(2).and_then(Value::as_str) {
        link.set_tag(Some(tag.to_string()));
    }
    Ok(link)
}
