//! Links between objects and their `Link` header representation.

use crate::routes::urls::{decode_segment, encode_segment};
use regex::Regex;
use serde::Serialize;
use std::{
    hash::{Hash, Hasher},
    sync::LazyLock,
};

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*</([^/>]+)/([^/>]+)/([^/>]+)>;\s*riaktag="([^"]*)"\s*$"#)
        .expect("link pattern is valid")
});

/// A tagged pointer from one object to another bucket/key pair.
///
/// When no tag is set the bucket name stands in for it, both on the wire and
/// for equality.
#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub bucket: String,
    pub key: String,
    tag: Option<String>,
}

impl Link {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.bucket)
    }

    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Render as one `Link` header entry under `prefix` (usually `riak`).
    pub fn to_header(&self, prefix: &str) -> String {
        format!(
            "</{}/{}/{}>; riaktag=\"{}\"",
            encode_segment(prefix),
            encode_segment(&self.bucket),
            encode_segment(&self.key),
            encode_segment(self.tag())
        )
    }

    /// Parse a comma-joined `Link` header value.
    ///
    /// Entries that are not object links (`rel="up"` and the like) or do not
    /// match the expected shape are skipped.
    pub fn parse_header(value: &str) -> Vec<Link> {
        value
            .split(',')
            .filter_map(|entry| {
                let caps = LINK_PATTERN.captures(entry)?;
                Some(
                    Link::new(decode_segment(&caps[2]), decode_segment(&caps[3]))
                        .with_tag(decode_segment(&caps[4])),
                )
            })
            .collect()
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.bucket == other.bucket && self.key == other.key && self.tag() == other.tag()
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bucket.hash(state);
        self.key.hash(state);
        self.tag().hash(state);
    }
}

/// One step of a link walk: follow links into `bucket` tagged `tag`
/// (`None` matches anything) and optionally keep the step's results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub bucket: Option<String>,
    pub tag: Option<String>,
    pub keep: bool,
}

impl LinkSpec {
    pub fn new(bucket: Option<&str>, tag: Option<&str>, keep: bool) -> Self {
        Self {
            bucket: bucket.map(str::to_string),
            tag: tag.map(str::to_string),
            keep,
        }
    }

    /// `bucket,tag,keep` with `_` for wildcards and `1`/`0` for keep.
    pub fn to_path_segment(&self) -> String {
        format!(
            "{},{},{}",
            encode_segment(self.bucket.as_deref().unwrap_or("_")),
            encode_segment(self.tag.as_deref().unwrap_or("_")),
            if self.keep { 1 } else { 0 }
        )
    }
}
