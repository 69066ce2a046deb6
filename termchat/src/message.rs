use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as stored server-side.
///
/// `time` is assigned by the store at write; clients only ever hold read-only copies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub time: DateTime<Utc>,
    pub alias: String,
    pub content: String,
    /// Logical room/path the author was in when posting.
    pub at: String,
}

/// Outgoing message. Carries no timestamp: the store assigns one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub alias: String,
    pub content: String,
    pub at: String,
}

impl NewMessage {
    pub fn new(alias: impl Into<String>, content: impl Into<String>, at: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            content: content.into(),
            at: at.into(),
        }
    }

    /// Stamp with a store-assigned time.
    pub fn stamp(self, time: DateTime<Utc>) -> Message {
        Message {
            time,
            alias: self.alias,
            content: self.content,
            at: self.at,
        }
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
///
/// Applied to each path segment before it is embedded in a request URL.
pub fn url_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Undo the whitespace substitution done by [`url_safe`] for display.
pub fn unescape_underscores(s: &str) -> String {
    s.replace('_', " ")
}
