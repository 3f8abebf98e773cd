use crate::models::quorum::Quorum;
use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use std::{env, str::FromStr, time::Duration};
use uuid::Uuid;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Centralized client configuration.
///
/// `request_timeout` has no default in the constructor: every client must
/// decide how long a single request may take.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,

    /// Legacy object path prefix (`/riak/<bucket>/<key>`).
    pub prefix: String,
    pub bucket_prefix: String,
    /// Used when `bucket_paths` is on: `/<bucket_prefix>/<bucket>/<key_prefix>/<key>`.
    pub key_prefix: String,
    /// Address objects through the bucket/key path family instead of the
    /// legacy prefix. Link headers and link walks stay on the legacy paths.
    pub bucket_paths: bool,
    pub index_prefix: String,
    pub mapred_prefix: String,
    pub ping_prefix: String,
    pub stats_prefix: String,

    pub r: Quorum,
    pub w: Quorum,
    pub dw: Quorum,

    /// Sent as `X-Riak-ClientId` on writes.
    pub client_id: String,

    /// Log every request with its elapsed time at `info`.
    pub profiling: bool,

    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, request_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            ssl: false,
            prefix: "riak".into(),
            bucket_prefix: "buckets".into(),
            key_prefix: "keys".into(),
            bucket_paths: false,
            index_prefix: "index".into(),
            mapred_prefix: "mapred".into(),
            ping_prefix: "ping".into(),
            stats_prefix: "stats".into(),
            r: Quorum::Count(2),
            w: Quorum::Count(2),
            dw: Quorum::Count(2),
            client_id: generate_client_id(),
            profiling: false,
            request_timeout,
        }
    }

    /// Build a configuration from `RIAK_*` environment variables, falling back
    /// to `127.0.0.1:8098` and the stock prefixes.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", name)),
        })
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let host = lookup("RIAK_HOST")?.unwrap_or_else(|| "127.0.0.1".into());
        let port = parse_var::<u16>(&lookup, "RIAK_PORT")?.unwrap_or(8098);
        let timeout = parse_var::<u64>(&lookup, "RIAK_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let mut cfg = Self::new(host, port, timeout);
        if let Some(ssl) = parse_var::<bool>(&lookup, "RIAK_SSL")? {
            cfg.ssl = ssl;
        }
        for (name, field) in [
            ("RIAK_PREFIX", &mut cfg.prefix),
            ("RIAK_BUCKET_PREFIX", &mut cfg.bucket_prefix),
            ("RIAK_KEY_PREFIX", &mut cfg.key_prefix),
            ("RIAK_INDEX_PREFIX", &mut cfg.index_prefix),
            ("RIAK_MAPRED_PREFIX", &mut cfg.mapred_prefix),
            ("RIAK_PING_PREFIX", &mut cfg.ping_prefix),
            ("RIAK_STATS_PREFIX", &mut cfg.stats_prefix),
            ("RIAK_CLIENT_ID", &mut cfg.client_id),
        ] {
            if let Some(value) = lookup(name)? {
                *field = value;
            }
        }
        if let Some(bucket_paths) = parse_var::<bool>(&lookup, "RIAK_BUCKET_PATHS")? {
            cfg.bucket_paths = bucket_paths;
        }
        if let Some(r) = parse_var::<Quorum>(&lookup, "RIAK_R")? {
            cfg.r = r;
        }
        if let Some(w) = parse_var::<Quorum>(&lookup, "RIAK_W")? {
            cfg.w = w;
        }
        if let Some(dw) = parse_var::<Quorum>(&lookup, "RIAK_DW")? {
            cfg.dw = dw;
        }
        if let Some(profiling) = parse_var::<bool>(&lookup, "RIAK_PROFILING")? {
            cfg.profiling = profiling;
        }
        Ok(cfg)
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_quorums(mut self, r: Quorum, w: Quorum, dw: Quorum) -> Self {
        self.r = r;
        self.w = w;
        self.dw = dw;
        self
    }

    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    pub fn with_bucket_paths(mut self, bucket_paths: bool) -> Self {
        self.bucket_paths = bucket_paths;
        self
    }

    /// `scheme://host:port`, no trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Random client id of the form `rust_<base64>`.
pub fn generate_client_id() -> String {
    let id = Uuid::new_v4();
    format!("rust_{}", general_purpose::STANDARD.encode(&id.as_bytes()[..4]))
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Result<Option<String>>,
    name: &str,
) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name)? {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(None),
    }
}
