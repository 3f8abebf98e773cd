//! Minimal `multipart/mixed` reader for link-walk responses.
//!
//! A walk answers with one outer part per phase, each of which is itself a
//! `multipart/mixed` document holding one part per object.

use crate::transport::headers::HeaderBlock;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct Part {
    pub headers: HeaderBlock,
    pub body: Bytes,
}

impl Part {
    /// Boundary of this part if it is itself multipart.
    pub fn boundary(&self) -> Option<String> {
        self.headers.get("content-type").and_then(boundary)
    }
}

/// Extract the `boundary` parameter of a multipart content type.
pub fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.to_ascii_lowercase().starts_with("multipart/") {
        return None;
    }
    params.find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("boundary") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Split `body` on `boundary`. Preamble and epilogue are ignored; a missing
/// closing delimiter ends the document at the last complete part.
pub fn split(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut parts = Vec::new();
    let Some(mut pos) = find(body, &delimiter, 0) else {
        return parts;
    };

    loop {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            break;
        }
        let Some(line_end) = find(body, b"\n", after) else {
            break;
        };
        let start = line_end + 1;
        let Some(next) = find(body, &delimiter, start) else {
            break;
        };

        let mut end = next;
        if end >= start + 2 && &body[end - 2..end] == b"\r\n" {
            end -= 2;
        } else if end > start && body[end - 1] == b'\n' {
            end -= 1;
        }
        parts.push(parse_part(&body[start..end]));
        pos = next;
    }
    parts
}

fn parse_part(raw: &[u8]) -> Part {
    let (head, body) = if raw.starts_with(b"\r\n") {
        (&raw[..0], &raw[2..])
    } else if raw.starts_with(b"\n") {
        (&raw[..0], &raw[1..])
    } else if let Some(i) = find(raw, b"\r\n\r\n", 0) {
        (&raw[..i], &raw[i + 4..])
    } else if let Some(i) = find(raw, b"\n\n", 0) {
        (&raw[..i], &raw[i + 2..])
    } else {
        (raw, &raw[raw.len()..])
    };
    Part {
        headers: HeaderBlock::parse(&String::from_utf8_lossy(head)),
        body: Bytes::copy_from_slice(body),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALK: &str = "\r\n--outer\r\n\
Content-Type: multipart/mixed; boundary=inner\r\n\
\r\n\
--inner\r\n\
Location: /riak/people/alice\r\n\
Content-Type: application/json\r\n\
X-Riak-Vclock: a85hYGBgzGDKBVIcypz/fgaUHjmdwZTImMfKsMKK7RRfFgA=\r\n\
\r\n\
{\"name\":\"alice\"}\r\n\
--inner\r\n\
Location: /riak/people/carol\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"name\":\"carol\"}\r\n\
--inner--\r\n\
\r\n\
--outer--\r\n";

    #[test]
    fn extracts_boundary_parameter() {
        assert_eq!(
            boundary("multipart/mixed; boundary=\"ABC123\"").as_deref(),
            Some("ABC123")
        );
        assert_eq!(boundary("application/json; boundary=x"), None);
    }

    #[test]
    fn splits_nested_documents() {
        let outer = split(WALK.as_bytes(), "outer");
        assert_eq!(outer.len(), 1);
        let inner_boundary = outer[0].boundary().unwrap();
        assert_eq!(inner_boundary, "inner");

        let objects = split(&outer[0].body, &inner_boundary);
        assert_eq!(objects.len(), 2);
        assert_eq!(
            objects[0].headers.get("location"),
            Some("/riak/people/alice")
        );
        assert_eq!(&objects[0].body[..], b"{\"name\":\"alice\"}");
        assert_eq!(&objects[1].body[..], b"{\"name\":\"carol\"}");
    }

    #[test]
    fn empty_phase_has_no_parts() {
        let doc = "--outer\r\nContent-Type: multipart/mixed; boundary=in\r\n\r\n--in--\r\n\r\n--outer--\r\n";
        let outer = split(doc.as_bytes(), "outer");
        assert_eq!(outer.len(), 1);
        assert!(split(&outer[0].body, "in").is_empty());
    }
}
