//! Secondary index (2i) names, types and values.

use crate::errors::{RiakError, RiakResult};
use serde::Serialize;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Bin,
    Int,
}

impl IndexType {
    pub fn suffix(self) -> &'static str {
        match self {
            IndexType::Bin => "bin",
            IndexType::Int => "int",
        }
    }

    /// Parse a raw header or query value into a typed index value.
    pub fn parse_value(self, raw: &str) -> RiakResult<IndexValue> {
        match self {
            IndexType::Bin => Ok(IndexValue::Bin(raw.to_string())),
            IndexType::Int => raw.trim().parse::<i64>().map(IndexValue::Int).map_err(|_| {
                RiakError::data(format!("`{raw}` is not a valid integer index value"))
            }),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for IndexType {
    type Err = RiakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bin" => Ok(IndexType::Bin),
            "int" => Ok(IndexType::Int),
            other => Err(RiakError::data(format!("unknown index type `{other}`"))),
        }
    }
}

/// Full index name as it appears on the wire (`email_bin`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexName {
    pub name: String,
    pub kind: IndexType,
}

impl IndexName {
    pub fn new(name: impl Into<String>, kind: IndexType) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            kind,
        }
    }

    /// Split `email_bin` / `age_int` back into name and type.
    pub fn parse(full: &str) -> Option<Self> {
        let (name, suffix) = full.rsplit_once('_')?;
        let kind = suffix.parse().ok()?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, kind))
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum IndexValue {
    Int(i64),
    Bin(String),
}

impl IndexValue {
    pub fn kind(&self) -> IndexType {
        match self {
            IndexValue::Int(_) => IndexType::Int,
            IndexValue::Bin(_) => IndexType::Bin,
        }
    }

    /// Coerce a JSON field value to an index value of `kind`.
    ///
    /// Integer indexes accept JSON numbers and numeric strings; binary indexes
    /// accept strings and render numbers and booleans as text.
    pub fn from_json(value: &serde_json::Value, kind: IndexType) -> Option<Self> {
        use serde_json::Value;
        match (kind, value) {
            (IndexType::Int, Value::Number(n)) => n.as_i64().map(IndexValue::Int),
            (IndexType::Int, Value::String(s)) => s.trim().parse().ok().map(IndexValue::Int),
            (IndexType::Bin, Value::String(s)) => Some(IndexValue::Bin(s.clone())),
            (IndexType::Bin, Value::Number(n)) => Some(IndexValue::Bin(n.to_string())),
            (IndexType::Bin, Value::Bool(b)) => Some(IndexValue::Bin(b.to_string())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            IndexValue::Int(n) => serde_json::Value::from(*n),
            IndexValue::Bin(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Int(n) => write!(f, "{n}"),
            IndexValue::Bin(s) => f.write_str(s),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(n: i64) -> Self {
        IndexValue::Int(n)
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::Bin(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        IndexValue::Bin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_names_round_trip_through_wire_form() {
        let name = IndexName::new("Email", IndexType::Bin);
        assert_eq!(name.to_string(), "email_bin");
        assert_eq!(IndexName::parse("email_bin"), Some(name));
        assert_eq!(
            IndexName::parse("first_name_bin"),
            Some(IndexName::new("first_name", IndexType::Bin))
        );
        assert_eq!(IndexName::parse("age_float"), None);
        assert_eq!(IndexName::parse("_int"), None);
    }

    #[test]
    fn int_values_must_be_numeric() {
        assert_eq!(
            IndexType::Int.parse_value(" 42").unwrap(),
            IndexValue::Int(42)
        );
        assert!(IndexType::Int.parse_value("forty").is_err());
    }

    #[test]
    fn json_coercion_follows_index_type() {
        assert_eq!(
            IndexValue::from_json(&json!(30), IndexType::Int),
            Some(IndexValue::Int(30))
        );
        assert_eq!(
            IndexValue::from_json(&json!(30), IndexType::Bin),
            Some(IndexValue::Bin("30".into()))
        );
        assert_eq!(IndexValue::from_json(&json!([1]), IndexType::Int), None);
    }
}
