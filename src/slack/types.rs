//! Slack wire formats (Web API responses and RTM events)

use serde::Deserialize;

use crate::model::{Message, User};

/// Fields every Web API response carries
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UserInfoResponse {
    pub user: SlackUser,
}

#[derive(Debug, Deserialize)]
pub struct UserListResponse {
    #[serde(default)]
    pub members: Vec<SlackUser>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub image_48: String,
}

impl From<SlackUser> for User {
    fn from(u: SlackUser) -> Self {
        User {
            id: u.id,
            name: u.name,
            avatar_url: u.profile.image_48,
        }
    }
}

/// `chat.postMessage` response, also the stored relay payload
#[derive(Debug, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub message: Option<PostedBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostedBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: String,
}

/// RTM `message` event; every field may be absent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub subtype: String,
}

impl From<MessageEvent> for Message {
    fn from(e: MessageEvent) -> Self {
        Message {
            text: e.text,
            user_id: e.user,
            channel_id: e.channel,
            timestamp: e.ts,
            subtype: e.subtype,
        }
    }
}

/// `message_deleted` envelope; the prior message lacks its channel
#[derive(Debug, Deserialize)]
pub struct DeletedEvent {
    pub channel: String,
    pub previous_message: MessageEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_conversion() {
        let raw = r#"{"id":"U1","name":"dark","profile":{"image_48":"https://img/48.png"}}"#;
        let user: User = serde_json::from_str::<SlackUser>(raw).unwrap().into();
        assert_eq!(user, User::new("U1", "dark", "https://img/48.png"));
    }

    #[test]
    fn test_user_without_profile() {
        let user: SlackUser = serde_json::from_str(r#"{"id":"U2"}"#).unwrap();
        assert_eq!(user.profile.image_48, "");
    }

    #[test]
    fn test_deleted_event() {
        let raw = r#"{
            "type": "message",
            "subtype": "message_deleted",
            "channel": "C1",
            "deleted_ts": "1.0",
            "previous_message": {"type": "message", "user": "U1", "text": "bye", "ts": "1.0"}
        }"#;
        let event: DeletedEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.channel, "C1");
        assert_eq!(event.previous_message.text, "bye");
        assert_eq!(event.previous_message.channel, "");
    }
}
