//! Sort direction

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    #[serde(alias = "ASC", alias = "Asc")]
    Asc,
    /// Sort in descending order (Z-A, 9-0)
    #[serde(alias = "DESC", alias = "Desc")]
    Desc,
}

impl SortDirection {
    /// Permissive parse used for free-form input: `"desc"` in any casing means
    /// descending, everything else (including nothing) means ascending.
    /// The match is exact: padded input such as `" desc "` is ascending.
    pub fn lenient(direction: Option<&str>) -> Self {
        match direction {
            Some(d) if d.eq_ignore_ascii_case("desc") => Self::Desc,
            _ => Self::Asc,
        }
    }

    pub fn is_desc(self) -> bool {
        matches!(self, Self::Desc)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// Rejected sort direction string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sort direction '{0}', expected 'asc' or 'desc'")]
pub struct ParseSortDirectionError(pub String);

/// Strict parse for API edges: only `asc` and `desc` (any casing) are accepted.
impl FromStr for SortDirection {
    type Err = ParseSortDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if trimmed.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(ParseSortDirectionError(s.to_string()))
        }
    }
}
