//! Document identifiers and content

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document content: a JSON object.
pub type Document = Map<String, Value>;

/// Identifier of a document inside a collection.
///
/// Ids are strings; integer ids are accepted and stored in their decimal
/// form. Ordering is numeric between two canonical integers, integers sort
/// before other ids, and everything else compares lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create an id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integer value if the id is a canonical decimal integer
    pub fn as_integer(&self) -> Option<i64> {
        let n: i64 = self.0.parse().ok()?;
        // "01" and "+1" stay strings so Ord agrees with Eq
        if n.to_string() == self.0 {
            Some(n)
        } else {
            None
        }
    }
}

impl Ord for DocumentId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_integer(), other.as_integer()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for DocumentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for DocumentId {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for DocumentId {
                fn from(id: $t) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);
