use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-assigned request identifier.
///
/// JSON-RPC allows either a number or a string; the server treats the value
/// as fully opaque. Ids carry equality, ordering, and hashing, nothing
/// more. Uniqueness while a request is outstanding is a client obligation.
///
/// # Examples
///
/// ```
/// use spool_core::RequestId;
///
/// let a = RequestId::from(7);
/// let b: RequestId = serde_json::from_str("7").unwrap();
/// assert_eq!(a, b);
///
/// let s: RequestId = serde_json::from_str(r#""req-7""#).unwrap();
/// assert_ne!(b, s);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id. Clients commonly use a monotonically increasing counter.
    Number(i64),
    /// String id.
    Text(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
