//! Message Filter
//!
//! Decides which source messages qualify for relay.

use std::collections::HashSet;

use crate::model::Message;

/// Channel ids of public channels start with this marker
pub const PUBLIC_CHANNEL_PREFIX: char = 'C';

#[derive(Debug, Clone)]
pub struct MessageFilter {
    timeline_channel_id: String,
    blacklist: HashSet<String>,
}

impl MessageFilter {
    pub fn new<I, S>(timeline_channel_id: &str, blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            timeline_channel_id: timeline_channel_id.to_string(),
            blacklist: blacklist.into_iter().map(Into::into).collect(),
        }
    }

    /// True for messages in public, non-blacklisted channels other than the timeline
    pub fn is_target(&self, message: &Message) -> bool {
        let channel = message.channel_id.as_str();

        channel != self.timeline_channel_id
            && is_public(channel)
            && !self.blacklist.contains(channel)
    }
}

pub fn is_public(channel_id: &str) -> bool {
    channel_id.starts_with(PUBLIC_CHANNEL_PREFIX)
}
