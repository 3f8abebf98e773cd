//! Case-insensitive, multi-valued response headers.

use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

/// Pseudo-header holding the status code of the last status line seen in a
/// raw header block.
pub const HTTP_STATUS: &str = "http_status";

/// Response headers keyed by lower-case name.
///
/// A repeated header keeps every value in arrival order, which matters for
/// `Link` and `X-Riak-Index-*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    entries: BTreeMap<String, Vec<String>>,
}

impl HeaderBlock {
    /// Parse a raw header block (`Name: value` lines separated by CRLF).
    ///
    /// Folded continuation lines are joined to the previous value first.
    /// `HTTP/x.y NNN reason` lines are recorded under [`HTTP_STATUS`]; with a
    /// `100 Continue` relay in front, the final status wins.
    pub fn parse(raw: &str) -> Self {
        let mut lines: Vec<String> = Vec::new();
        for line in raw.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.starts_with(&[' ', '\t'][..]) {
                if let Some(prev) = lines.last_mut() {
                    prev.push(' ');
                    prev.push_str(line.trim());
                    continue;
                }
            }
            lines.push(line.to_string());
        }

        let mut block = Self::default();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with("HTTP/") {
                if let Some(code) = line.split_whitespace().nth(1) {
                    block
                        .entries
                        .insert(HTTP_STATUS.to_string(), vec![code.to_string()]);
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                block.append(name.trim(), value.trim());
            }
        }
        block
    }

    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut block = Self::default();
        for (name, value) in map {
            block.append(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }
        block
    }

    pub fn append(&mut self, name: &str, value: &str) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value of `name`, in arrival order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All values of `name` joined with `, `, the way a proxy would fold them.
    pub fn joined(&self, name: &str) -> Option<String> {
        let values = self.get_all(name);
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn status(&self) -> Option<u16> {
        self.get(HTTP_STATUS).and_then(|code| code.parse().ok())
    }

    /// Lower-case names with their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Same entries with `Title-Case` names (`X-Riak-Vclock`).
    pub fn iter_title_case(&self) -> impl Iterator<Item = (String, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (title_case(k), v.as_slice()))
    }

    /// Entries whose name starts with `prefix`, with the prefix stripped.
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [String])> + 'a {
        let prefix = prefix.to_ascii_lowercase();
        self.entries.iter().filter_map(move |(k, v)| {
            k.strip_prefix(prefix.as_str())
                .map(|rest| (rest, v.as_slice()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `x-riak-vclock` → `X-Riak-Vclock`.
pub fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
