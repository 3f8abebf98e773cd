//! Client for Riak's HTTP REST interface.
//!
//! ```no_run
//! # async fn demo() -> riak_http::RiakResult<()> {
//! use riak_http::{ClientConfig, RiakClient, DEFAULT_TIMEOUT};
//! use serde_json::json;
//!
//! let client = RiakClient::new(ClientConfig::new("127.0.0.1", 8098, DEFAULT_TIMEOUT))?;
//! let bucket = client.bucket("users");
//! let mut bob = bucket.new_object(Some("bob"), json!({"age": 30}));
//! bucket.store(&mut bob, None, None).await?;
//! let fetched = bucket.get("bob", None).await?;
//! assert!(fetched.exists());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;
pub mod transport;

pub use config::{ClientConfig, DEFAULT_TIMEOUT};
pub use errors::{RiakError, RiakResult};
pub use models::{
    bucket::BucketProps,
    index::{IndexName, IndexType, IndexValue},
    link::{Link, LinkSpec},
    mapreduce::{Phase, PhaseFunction},
    object::RiakObject,
    quorum::Quorum,
};
pub use services::{
    bucket::Bucket,
    client::RiakClient,
    mapreduce::{MapReduce, MapReduceOutput},
};
