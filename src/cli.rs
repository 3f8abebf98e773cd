use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use riak_http::{ClientConfig, LinkSpec, Quorum};
use std::time::Duration;

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Command-line client for Riak's HTTP interface")]
pub struct Args {
    /// Riak host (overrides RIAK_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Riak HTTP port (overrides RIAK_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Use https (overrides RIAK_SSL)
    #[arg(long)]
    pub ssl: bool,

    /// Object path prefix (overrides RIAK_PREFIX)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Address objects as /buckets/<bucket>/keys/<key> (overrides RIAK_BUCKET_PATHS)
    #[arg(long)]
    pub bucket_paths: bool,

    /// Client id sent on writes (overrides RIAK_CLIENT_ID)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Per-request timeout in seconds (overrides RIAK_TIMEOUT_SECS)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log every request with its duration (overrides RIAK_PROFILING)
    #[arg(long)]
    pub profiling: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the node answers
    Ping,
    /// Print node statistics
    Stats,
    /// List every bucket
    Buckets,
    /// Fetch an object
    Get {
        bucket: String,
        key: String,
        #[arg(long)]
        r: Option<Quorum>,
        /// Print the raw payload instead of decoding JSON
        #[arg(long)]
        raw: bool,
    },
    /// Store a JSON object; omit the key to let the server assign one
    Put {
        bucket: String,
        key: Option<String>,
        /// JSON document to store
        #[arg(long)]
        data: String,
        /// Secondary index entry, `name_type=value` (repeatable)
        #[arg(long = "index")]
        indexes: Vec<String>,
        /// Auto-index a data field, `name_type` (repeatable)
        #[arg(long = "auto-index")]
        auto_indexes: Vec<String>,
        /// Metadata entry, `name=value` (repeatable)
        #[arg(long = "meta")]
        metadata: Vec<String>,
        /// Link to another object, `bucket/key[/tag]` (repeatable)
        #[arg(long = "link")]
        links: Vec<String>,
        #[arg(long)]
        w: Option<Quorum>,
        #[arg(long)]
        dw: Option<Quorum>,
    },
    /// Delete an object
    Delete {
        bucket: String,
        key: String,
        #[arg(long)]
        dw: Option<Quorum>,
    },
    /// List the keys of a bucket
    Keys {
        bucket: String,
        /// Use the streaming key listing
        #[arg(long)]
        stream: bool,
    },
    /// Show bucket properties, or set them with `--set name=json`
    Props {
        bucket: String,
        #[arg(long = "set")]
        set: Vec<String>,
    },
    /// Query a secondary index, e.g. `users email_bin bob@example.com`
    Index {
        bucket: String,
        index: String,
        start: String,
        end: Option<String>,
        /// Drop duplicate keys
        #[arg(long)]
        dedupe: bool,
    },
    /// Walk links from an object; each step is `bucket,tag,keep` with `_` as wildcard
    Walk {
        bucket: String,
        key: String,
        #[arg(long = "step", value_parser = parse_link_spec, required = true)]
        steps: Vec<LinkSpec>,
    },
    /// Run a map/reduce job: map phases in order, then an optional reduce
    Mapred {
        /// Read every key of this bucket
        #[arg(long, conflicts_with = "objects")]
        bucket: Option<String>,
        /// Input object, `bucket/key` (repeatable)
        #[arg(long = "object")]
        objects: Vec<String>,
        /// JavaScript map function, named or source (repeatable)
        #[arg(long = "map")]
        maps: Vec<String>,
        /// JavaScript reduce function run after the maps
        #[arg(long)]
        reduce: Option<String>,
        /// Job timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

impl Args {
    /// Environment configuration with command-line overrides applied.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut cfg = ClientConfig::from_env().context("reading RIAK_* environment")?;
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if self.ssl {
            cfg.ssl = true;
        }
        if let Some(prefix) = &self.prefix {
            cfg.prefix = prefix.clone();
        }
        if self.bucket_paths {
            cfg.bucket_paths = true;
        }
        if let Some(client_id) = &self.client_id {
            cfg.client_id = client_id.clone();
        }
        if let Some(secs) = self.timeout_secs {
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if self.profiling {
            cfg.profiling = true;
        }
        Ok(cfg)
    }
}

fn parse_link_spec(raw: &str) -> Result<LinkSpec, String> {
    let fields: Vec<&str> = raw.split(',').collect();
    let &[bucket, tag, keep] = fields.as_slice() else {
        return Err(format!("`{raw}` is not bucket,tag,keep"));
    };
    let bucket = (bucket != "_").then_some(bucket);
    let tag = (tag != "_").then_some(tag);
    let keep = matches!(keep, "1" | "true");
    Ok(LinkSpec::new(bucket, tag, keep))
}

/// Split `name=value`.
pub fn split_pair(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .with_context(|| format!("expected name=value, got `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_spec_argument_uses_underscore_wildcard() {
        let spec = parse_link_spec("people,_,1").unwrap();
        assert_eq!(spec, LinkSpec::new(Some("people"), None, true));
        assert!(parse_link_spec("people,1").is_err());
    }

    #[test]
    fn command_line_overrides_environment() {
        let args = Args::parse_from([
            "riak-http",
            "--host",
            "riak.internal",
            "--port",
            "18098",
            "--timeout-secs",
            "5",
            "ping",
        ]);
        let cfg = args.client_config().unwrap();
        assert_eq!(cfg.host, "riak.internal");
        assert_eq!(cfg.port, 18098);
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
    }
}
