use anyhow::{Context, Result, anyhow};
use clap::Parser;
use riak_http::{
    BucketProps, IndexName, Link, MapReduceOutput, PhaseFunction, RiakClient, RiakObject,
};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Command, split_pair};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config ---
    let args = Args::parse();
    let cfg = args.client_config()?;
    tracing::debug!("Using client config: {:?}", cfg);

    let client = RiakClient::new(cfg).context("building Riak client")?;
    let output = run(&client, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(client: &RiakClient, command: Command) -> Result<Value> {
    match command {
        Command::Ping => Ok(json!({ "alive": client.ping().await? })),
        Command::Stats => Ok(client.stats().await?),
        Command::Buckets => Ok(json!(client.buckets().await?)),
        Command::Get { bucket, key, r, raw } => {
            let bucket = client.bucket(bucket);
            let obj = if raw {
                bucket.get_binary(&key, r).await?
            } else {
                bucket.get(&key, r).await?
            };
            Ok(describe(&obj))
        }
        Command::Put {
            bucket,
            key,
            data,
            indexes,
            auto_indexes,
            metadata,
            links,
            w,
            dw,
        } => {
            let bucket = client.bucket(bucket);
            let data: Value = serde_json::from_str(&data).context("parsing --data as JSON")?;
            let mut obj = bucket.new_object(key.as_deref(), data);
            for raw in &indexes {
                let (name, value) = split_pair(raw)?;
                let name = index_name(name)?;
                obj.add_index(&name.name, name.kind, name.kind.parse_value(value)?);
            }
            for raw in &auto_indexes {
                let name = index_name(raw)?;
                obj.add_auto_index(&name.name, name.kind);
            }
            for raw in &metadata {
                let (name, value) = split_pair(raw)?;
                obj.set_meta(name, value);
            }
            for raw in &links {
                obj.add_link(parse_link(raw)?);
            }
            bucket.store(&mut obj, w, dw).await?;
            tracing::info!(key = ?obj.key(), "object stored");
            Ok(describe(&obj))
        }
        Command::Delete { bucket, key, dw } => {
            let bucket = client.bucket(bucket);
            let mut obj = RiakObject::new(bucket.name(), Some(key));
            bucket.delete(&mut obj, dw).await?;
            Ok(json!({ "deleted": true }))
        }
        Command::Keys { bucket, stream } => {
            let mut bucket = client.bucket(bucket);
            let keys = if stream {
                bucket.stream_keys().await?
            } else {
                bucket.keys(true).await?.to_vec()
            };
            Ok(json!(keys))
        }
        Command::Props { bucket, set } => {
            let mut bucket = client.bucket(bucket);
            if !set.is_empty() {
                let mut props = BucketProps::default();
                for raw in &set {
                    let (name, value) = split_pair(raw)?;
                    let value = serde_json::from_str::<Value>(value)
                        .unwrap_or_else(|_| Value::String(value.to_string()));
                    props.set(name, value);
                }
                bucket.set_properties(&props).await?;
            }
            Ok(serde_json::to_value(bucket.properties(true).await?)?)
        }
        Command::Index {
            bucket,
            index,
            start,
            end,
            dedupe,
        } => {
            let bucket = client.bucket(bucket);
            let name = index_name(&index)?;
            let start = name.kind.parse_value(&start)?;
            let end = end.map(|end| name.kind.parse_value(&end)).transpose()?;
            let links = bucket
                .index_search(&name.name, name.kind, &start, end.as_ref(), dedupe)
                .await?;
            Ok(json!(links.iter().map(|l| l.key.as_str()).collect::<Vec<_>>()))
        }
        Command::Walk { bucket, key, steps } => {
            let bucket = client.bucket(bucket);
            let phases = bucket.walk(&key, &steps).await?;
            Ok(json!(
                phases
                    .iter()
                    .map(|objects| objects.iter().map(describe).collect::<Vec<_>>())
                    .collect::<Vec<_>>()
            ))
        }
        Command::Mapred {
            bucket,
            objects,
            maps,
            reduce,
            timeout_ms,
        } => {
            let mut job = client.mapreduce();
            if let Some(bucket) = bucket {
                job.add_bucket(bucket);
            }
            for raw in &objects {
                let (bucket, key) = raw
                    .split_once('/')
                    .with_context(|| format!("expected bucket/key, got `{raw}`"))?;
                job.add_object(bucket, key, None)?;
            }
            for function in maps {
                job.map(PhaseFunction::javascript(function), false, None);
            }
            if let Some(function) = reduce {
                job.reduce(PhaseFunction::javascript(function), false, None);
            }
            Ok(match job.run(timeout_ms).await? {
                MapReduceOutput::Values(values) => Value::Array(values),
                links @ MapReduceOutput::Links(_) => Value::Array(links.into_values()),
            })
        }
    }
}

fn index_name(raw: &str) -> Result<IndexName> {
    IndexName::parse(raw).ok_or_else(|| anyhow!("index `{raw}` must end in _bin or _int"))
}

/// `bucket/key` or `bucket/key/tag`.
fn parse_link(raw: &str) -> Result<Link> {
    let mut fields = raw.splitn(3, '/');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(bucket), Some(key), tag) if !bucket.is_empty() && !key.is_empty() => {
            let link = Link::new(bucket, key);
            Ok(match tag {
                Some(tag) => link.with_tag(tag),
                None => link,
            })
        }
        _ => Err(anyhow!("expected bucket/key[/tag], got `{raw}`")),
    }
}

fn describe(obj: &RiakObject) -> Value {
    let indexes: Map<String, Value> = obj
        .indexes()
        .iter()
        .map(|(name, values)| {
            let values = values.iter().map(|v| v.to_json()).collect();
            (name.to_string(), Value::Array(values))
        })
        .collect();
    let payload = match obj.data() {
        Some(data) => data.clone(),
        None => Value::String(String::from_utf8_lossy(obj.content()).into_owned()),
    };
    json!({
        "bucket": obj.bucket(),
        "key": obj.key(),
        "exists": obj.exists(),
        "content_type": obj.content_type(),
        "vclock": obj.vclock(),
        "data": payload,
        "links": obj
            .links()
            .iter()
            .map(|l| json!([l.bucket, l.key, l.tag()]))
            .collect::<Vec<_>>(),
        "indexes": indexes,
        "metadata": obj.metadata(),
        "siblings": obj.siblings(),
    })
}
