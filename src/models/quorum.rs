//! Replication quorum values (R, W, DW).

use std::{fmt, str::FromStr};

/// How many replicas must answer before Riak reports success.
///
/// Riak accepts either a symbolic value or an explicit replica count in the
/// `r`, `w` and `dw` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quorum {
    One,
    Quorum,
    All,
    Default,
    Count(u32),
}

impl fmt::Display for Quorum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quorum::One => f.write_str("one"),
            Quorum::Quorum => f.write_str("quorum"),
            Quorum::All => f.write_str("all"),
            Quorum::Default => f.write_str("default"),
            Quorum::Count(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Quorum {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one" => Ok(Quorum::One),
            "quorum" => Ok(Quorum::Quorum),
            "all" => Ok(Quorum::All),
            "default" => Ok(Quorum::Default),
            other => other
                .parse::<u32>()
                .map(Quorum::Count)
                .map_err(|_| format!("`{s}` is not a quorum value")),
        }
    }
}

impl From<u32> for Quorum {
    fn from(n: u32) -> Self {
        Quorum::Count(n)
    }
}
