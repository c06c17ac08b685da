use serde::{Deserialize, Serialize};
use std::fmt;

/// A keyword users summon a response with. Always stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trigger(String);

impl Trigger {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single file carried by a command, either received with a message or
/// sent back out with a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: i64,
    /// Seconds since the Unix epoch, fractional.
    pub created_at: f64,
    pub author: String,
    pub trigger: Trigger,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub enabled: bool,
}

/// What a trigger lookup resolves to. Both fields empty means "nothing to say".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredResponse {
    pub content: String,
    pub attachment: Option<Attachment>,
}

impl StoredResponse {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.attachment.is_none()
    }
}

/// One row of `!list`: an active trigger and its most recent author.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSummary {
    pub trigger: Trigger,
    pub last_author: String,
    pub elapsed_seconds: f64,
}

/// Reaction role mapping: reacting with `reaction_id` on `message_id` grants `role_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlairRecord {
    pub id: i64,
    pub created_at: f64,
    pub author: String,
    pub message_id: String,
    pub reaction_id: String,
    pub role_id: String,
    pub enabled: bool,
}
