//! Map/reduce job descriptions and their JSON encoding.

use crate::models::index::{IndexName, IndexValue};
use serde_json::{Map, Value, json};

/// The function a map or reduce phase runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseFunction {
    /// A named JavaScript function, e.g. `Riak.mapValuesJson`.
    Named(String),
    /// Anonymous JavaScript source.
    Source(String),
    Erlang { module: String, function: String },
}

impl PhaseFunction {
    /// Source text if it looks like `function(...) {...}`, a named function
    /// otherwise.
    pub fn javascript(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim_start().starts_with("function") {
            PhaseFunction::Source(text)
        } else {
            PhaseFunction::Named(text)
        }
    }

    pub fn erlang(module: impl Into<String>, function: impl Into<String>) -> Self {
        PhaseFunction::Erlang {
            module: module.into(),
            function: function.into(),
        }
    }

    pub fn language(&self) -> &'static str {
        match self {
            PhaseFunction::Named(_) | PhaseFunction::Source(_) => "javascript",
            PhaseFunction::Erlang { .. } => "erlang",
        }
    }

    fn write_into(&self, body: &mut Map<String, Value>) {
        body.insert("language".into(), self.language().into());
        match self {
            PhaseFunction::Named(name) => {
                body.insert("name".into(), name.as_str().into());
            }
            PhaseFunction::Source(source) => {
                body.insert("source".into(), source.as_str().into());
            }
            PhaseFunction::Erlang { module, function } => {
                body.insert("module".into(), module.as_str().into());
                body.insert("function".into(), function.as_str().into());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Map {
        function: PhaseFunction,
        keep: bool,
        arg: Option<Value>,
    },
    Reduce {
        function: PhaseFunction,
        keep: bool,
        arg: Option<Value>,
    },
    Link {
        bucket: Option<String>,
        tag: Option<String>,
        keep: bool,
    },
}

impl Phase {
    /// `riak_kv_mapreduce:reduce_identity`, used when a job has no phases.
    pub fn reduce_identity() -> Self {
        Phase::Reduce {
            function: PhaseFunction::erlang("riak_kv_mapreduce", "reduce_identity"),
            keep: true,
            arg: None,
        }
    }

    pub fn keep(&self) -> bool {
        match self {
            Phase::Map { keep, .. } | Phase::Reduce { keep, .. } | Phase::Link { keep, .. } => {
                *keep
            }
        }
    }

    pub fn set_keep(&mut self, value: bool) {
        match self {
            Phase::Map { keep, .. } | Phase::Reduce { keep, .. } | Phase::Link { keep, .. } => {
                *keep = value
            }
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Phase::Link { .. })
    }

    pub fn to_json(&self) -> Value {
        match self {
            Phase::Map {
                function,
                keep,
                arg,
            }
            | Phase::Reduce {
                function,
                keep,
                arg,
            } => {
                let mut body = Map::new();
                function.write_into(&mut body);
                body.insert("keep".into(), (*keep).into());
                if let Some(arg) = arg {
                    body.insert("arg".into(), arg.clone());
                }
                let kind = if matches!(self, Phase::Map { .. }) {
                    "map"
                } else {
                    "reduce"
                };
                let mut phase = Map::new();
                phase.insert(kind.into(), Value::Object(body));
                Value::Object(phase)
            }
            Phase::Link { bucket, tag, keep } => json!({
                "link": {
                    "bucket": bucket.as_deref().unwrap_or("_"),
                    "tag": tag.as_deref().unwrap_or("_"),
                    "keep": keep,
                }
            }),
        }
    }
}

/// Enforce the output invariants before a job is submitted.
///
/// An empty phase list gets a single identity reduce and the job's rows are
/// then link results. If no phase keeps its output the last one does.
/// Returns whether the result rows should be read as links.
pub fn prepare_phases(phases: &mut Vec<Phase>) -> bool {
    let mut link_results = false;
    if phases.is_empty() {
        phases.push(Phase::reduce_identity());
        link_results = true;
    }
    if !phases.iter().any(Phase::keep) {
        if let Some(last) = phases.last_mut() {
            last.set_keep(true);
        }
    }
    link_results || phases.last().is_some_and(Phase::is_link)
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    Exact(IndexValue),
    Range(IndexValue, IndexValue),
}

/// What a job reads from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Inputs {
    #[default]
    Empty,
    /// Every key in one bucket.
    Bucket(String),
    /// Explicit `[bucket, key, keydata?]` triples.
    Objects(Vec<(String, String, Option<Value>)>),
    /// Keys matching a secondary index query.
    Index {
        bucket: String,
        index: IndexName,
        query: IndexQuery,
    },
}

impl Inputs {
    pub fn to_json(&self) -> Value {
        match self {
            Inputs::Empty => Value::Array(Vec::new()),
            Inputs::Bucket(bucket) => Value::String(bucket.clone()),
            Inputs::Objects(objects) => Value::Array(
                objects
                    .iter()
                    .map(|(bucket, key, keydata)| match keydata {
                        Some(data) => json!([bucket, key, data]),
                        None => json!([bucket, key]),
                    })
                    .collect(),
            ),
            Inputs::Index {
                bucket,
                index,
                query,
            } => {
                let mut body = Map::new();
                body.insert("bucket".into(), bucket.as_str().into());
                body.insert("index".into(), index.to_string().into());
                match query {
                    IndexQuery::Exact(value) => {
                        body.insert("key".into(), value.to_json());
                    }
                    IndexQuery::Range(start, end) => {
                        body.insert("start".into(), start.to_json());
                        body.insert("end".into(), end.to_json());
                    }
                }
                Value::Object(body)
            }
        }
    }
}

/// Full job document as POSTed to the map/reduce endpoint.
pub fn job_body(inputs: &Inputs, phases: &[Phase], timeout_ms: Option<u64>) -> Value {
    let mut job = Map::new();
    job.insert("inputs".into(), inputs.to_json());
    job.insert(
        "query".into(),
        Value::Array(phases.iter().map(Phase::to_json).collect()),
    );
    if let Some(timeout) = timeout_ms {
        job.insert("timeout".into(), timeout.into());
    }
    Value::Object(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::index::IndexType;

    fn map(name: &str) -> Phase {
        Phase::Map {
            function: PhaseFunction::javascript(name),
            keep: false,
            arg: None,
        }
    }

    #[test]
    fn last_phase_is_forced_to_keep() {
        let mut phases = vec![
            map("Riak.mapValues"),
            map("Riak.mapValuesJson"),
            map("Riak.filterNotFound"),
        ];
        let link_results = prepare_phases(&mut phases);
        assert!(!link_results);
        let keeps: Vec<bool> = phases.iter().map(Phase::keep).collect();
        assert_eq!(keeps, vec![false, false, true]);
    }

    #[test]
    fn explicit_keep_is_left_alone() {
        let mut phases = vec![map("a"), map("b")];
        phases[0].set_keep(true);
        prepare_phases(&mut phases);
        assert!(phases[0].keep());
        assert!(!phases[1].keep());
    }

    #[test]
    fn empty_job_gets_identity_reduce() {
        let mut phases = Vec::new();
        assert!(prepare_phases(&mut phases));
        assert_eq!(phases, vec![Phase::reduce_identity()]);
    }

    #[test]
    fn trailing_link_phase_yields_links() {
        let mut phases = vec![Phase::Link {
            bucket: Some("people".into()),
            tag: None,
            keep: false,
        }];
        assert!(prepare_phases(&mut phases));
        assert_eq!(
            phases[0].to_json(),
            json!({"link": {"bucket": "people", "tag": "_", "keep": true}})
        );
    }

    #[test]
    fn javascript_source_is_detected() {
        assert_eq!(
            PhaseFunction::javascript("function(v) { return [v]; }").language(),
            "javascript"
        );
        assert!(matches!(
            PhaseFunction::javascript(" function(v) {}"),
            PhaseFunction::Source(_)
        ));
        let phase = Phase::Reduce {
            function: PhaseFunction::javascript("Riak.reduceSum"),
            keep: true,
            arg: Some(json!(1)),
        };
        assert_eq!(
            phase.to_json(),
            json!({"reduce": {"language": "javascript", "name": "Riak.reduceSum", "keep": true, "arg": 1}})
        );
    }

    #[test]
    fn job_body_encodes_inputs() {
        let inputs = Inputs::Index {
            bucket: "users".into(),
            index: IndexName::new("age", IndexType::Int),
            query: IndexQuery::Range(IndexValue::Int(20), IndexValue::Int(30)),
        };
        let body = job_body(&inputs, &[Phase::reduce_identity()], Some(5000));
        assert_eq!(
            body["inputs"],
            json!({"bucket": "users", "index": "age_int", "start": 20, "end": 30})
        );
        assert_eq!(body["timeout"], json!(5000));

        let objects = Inputs::Objects(vec![
            ("b".into(), "k1".into(), None),
            ("b".into(), "k2".into(), Some(json!("extra"))),
        ]);
        assert_eq!(objects.to_json(), json!([["b", "k1"], ["b", "k2", "extra"]]));
    }
}
