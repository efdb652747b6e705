//! The token a round agrees on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque comparable token proposed by a client and agreed on by a quorum.
///
/// The demonstrated domain is two-valued (`"A"` / `"B"`), but nothing in the
/// engine relies on that beyond the default adversary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(String);

impl Value {
    /// Create a value from any string-like token.
    pub fn new(token: impl Into<String>) -> Self {
        Value(token.into())
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Value {
    fn from(token: &str) -> Self {
        Value::new(token)
    }
}

impl From<String> for Value {
    fn from(token: String) -> Self {
        Value(token)
    }
}

impl AsRef<str> for Value {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
