//! Which status codes each Riak operation accepts, and what the others mean.

use crate::{
    errors::{RiakError, RiakResult},
    transport::HttpResponse,
};
use std::fmt;

/// The semantic operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Fetch,
    Store,
    Delete,
    SetBucketProperties,
    GetBucketProperties,
    ListKeys,
    ListBuckets,
    SecondaryIndex,
    LinkWalk,
    MapReduce,
    Ping,
    Stats,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::Fetch => "fetch",
            Action::Store => "store",
            Action::Delete => "delete",
            Action::SetBucketProperties => "set bucket properties",
            Action::GetBucketProperties => "get bucket properties",
            Action::ListKeys => "list keys",
            Action::ListBuckets => "list buckets",
            Action::SecondaryIndex => "secondary index",
            Action::LinkWalk => "link walk",
            Action::MapReduce => "map/reduce",
            Action::Ping => "ping",
            Action::Stats => "stats",
        }
    }

    pub fn accepted(self) -> &'static [u16] {
        match self {
            Action::Fetch => &[200, 300, 304],
            // 200 comes back when `returnbody=true` is set on an existing key.
            Action::Store => &[200, 201, 204, 300],
            Action::Delete => &[204, 404],
            Action::SetBucketProperties => &[204],
            Action::GetBucketProperties
            | Action::ListKeys
            | Action::ListBuckets
            | Action::SecondaryIndex
            | Action::LinkWalk
            | Action::MapReduce
            | Action::Ping
            | Action::Stats => &[200],
        }
    }

    pub fn accepts(self, status: u16) -> bool {
        self.accepted().contains(&status)
    }

    /// Riak's documented meaning of `status` for this action, if any.
    pub fn describe(self, status: u16) -> Option<&'static str> {
        let text = match (self, status) {
            (Action::Fetch, 400) => "Bad Request - e.g. when the r parameter is invalid (> N)",
            (Action::Fetch, 404) => "Not Found - the object could not be found on enough partitions",
            (Action::Fetch, 406) => "Not Acceptable - the requested content type cannot be served",
            (Action::Fetch, 503) => "Service Unavailable - the request timed out internally",
            (Action::Store, 400) => "Bad Request - e.g. when the r, w or dw parameters are invalid (> N)",
            (Action::Store, 412) => "Precondition Failed - a conditional request header did not match",
            (Action::Store, 415) => "Unsupported Media Type - the content type is not accepted",
            (Action::Delete, 400) => "Bad Request - e.g. when the rw parameter is invalid (> N)",
            (Action::SetBucketProperties, 400) => {
                "Bad Request - the submitted JSON is invalid or contains an unknown property"
            }
            (Action::SetBucketProperties, 415) => {
                "Unsupported Media Type - the Content-Type was not set to application/json"
            }
            (Action::GetBucketProperties | Action::ListKeys, 400) => {
                "Bad Request - the props or keys parameter is invalid"
            }
            (Action::SecondaryIndex, 400) => {
                "Bad Request - the index name or value is malformed"
            }
            (Action::SecondaryIndex, 500) => {
                "Internal Server Error - the index query failed, the backend may not support 2i"
            }
            (Action::SecondaryIndex, 503) => "Service Unavailable - the index query timed out",
            (Action::LinkWalk, 400) => "Bad Request - the link walk specification is malformed",
            (Action::LinkWalk, 404) => "Not Found - the origin object of the walk does not exist",
            (Action::MapReduce, 400) => "Bad Request - the job body is not a valid map/reduce job",
            (Action::MapReduce, 500) => {
                "Internal Server Error - an error occurred while processing the job"
            }
            (Action::MapReduce, 503) => "Service Unavailable - the job timed out before finishing",
            (Action::Stats, 404) => "Not Found - the stats endpoint is disabled on this node",
            _ => return None,
        };
        Some(text)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accept `response` if any of `actions` accepts its status.
///
/// A missing response means the request never reached the server and is
/// reported as unreachable without consulting the tables.
pub fn validate<'r>(
    response: Option<&'r HttpResponse>,
    url: &str,
    actions: &[Action],
) -> RiakResult<&'r HttpResponse> {
    let Some(response) = response else {
        return Err(RiakError::ServerUnreachable {
            url: url.to_string(),
            reason: "no response received".into(),
        });
    };

    if actions.iter().any(|action| action.accepts(response.status)) {
        return Ok(response);
    }

    let reasons = actions
        .iter()
        .map(|action| match action.describe(response.status) {
            Some(text) => format!("{action}: {text}"),
            None => format!("{action}: undefined error for action `{action}`"),
        })
        .collect::<Vec<_>>()
        .join("; ");

    let message = format!(
        "unexpected status {} from {}: {}",
        response.status_line, response.url, reasons
    );
    tracing::debug!(status = response.status, url = %response.url, "{}", message);

    Err(RiakError::UnexpectedStatus {
        url: response.url.clone(),
        status: response.status,
        status_line: response.status_line.clone(),
        actions: actions.to_vec(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::headers::HeaderBlock;
    use bytes::Bytes;

    fn response(status: u16) -> HttpResponse {
        HttpResponse::new("http://h/riak/b/k", status, HeaderBlock::default(), Bytes::new())
    }

    #[test]
    fn accepts_when_any_action_accepts() {
        let resp = response(200);
        assert!(validate(Some(&resp), &resp.url, &[Action::Store, Action::Fetch]).is_ok());
        let resp = response(304);
        assert!(validate(Some(&resp), &resp.url, &[Action::Store]).is_err());
        assert!(validate(Some(&resp), &resp.url, &[Action::Store, Action::Fetch]).is_ok());
    }

    #[test]
    fn delete_treats_not_found_as_success() {
        let resp = response(404);
        assert!(validate(Some(&resp), &resp.url, &[Action::Delete]).is_ok());
        assert!(validate(Some(&resp), &resp.url, &[Action::LinkWalk]).is_err());
    }

    #[test]
    fn rejection_names_status_and_each_action() {
        let resp = response(400);
        let err = validate(Some(&resp), &resp.url, &[Action::Store, Action::Ping]).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("400 Bad Request"));
        assert!(text.contains("store: Bad Request - e.g. when the r, w or dw"));
        assert!(text.contains("ping: undefined error for action `ping`"));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn missing_response_is_unreachable() {
        let err = validate(None, "http://h:8098/ping", &[Action::Ping]).unwrap_err();
        assert!(matches!(err, RiakError::ServerUnreachable { .. }));
        assert!(err.to_string().contains("http://h:8098/ping"));
    }
}
