//! Domain types shared by the pipeline

use serde::{Deserialize, Serialize};

/// A chat message, either from a source channel or already in the timeline
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    pub timestamp: String,
    /// Platform subtype, empty for plain messages
    pub subtype: String,
}

impl Message {
    pub fn new(text: &str, user_id: &str, channel_id: &str, timestamp: &str) -> Self {
        Self {
            text: text.to_string(),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            timestamp: timestamp.to_string(),
            subtype: String::new(),
        }
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = subtype.to_string();
        self
    }

    /// Relay key: `<channel>-<timestamp>`
    pub fn key(&self) -> String {
        format!("{}-{}", self.channel_id, self.timestamp)
    }
}

/// Directory snapshot of a single user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
}

impl User {
    pub fn new(id: &str, name: &str, avatar_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            avatar_url: avatar_url.to_string(),
        }
    }
}

/// Timeline copy of a relayed source message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedMessage {
    /// Key of the source message the copy was made from
    pub source_key: String,
    /// The copy itself; channel and timestamp point into the timeline
    pub message: Message,
}
