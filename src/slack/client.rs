//! Slack Web API client
//!
//! Typed operations over a [`Transport`], each attempt driven by the
//! [`RetryingRequester`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use super::transport::{ApiRequest, HttpTransport, Transport};
use super::types::{ApiEnvelope, ConnectResponse, UserInfoResponse, UserListResponse};
use crate::error::{RelayError, Result};
use crate::model::User;
use crate::retry::{RetryPolicy, RetryingRequester};

/// Page size for `users.list`
const USER_PAGE_SIZE: &str = "200";

/// Chat platform operations the pipeline depends on
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Realtime handshake, returns the websocket URL
    async fn connect_url(&self) -> Result<String>;

    /// Post `text` to `channel_id` under the user's name and avatar.
    /// Returns the raw response body.
    async fn post_message(&self, channel_id: &str, text: &str, user: &User) -> Result<String>;

    async fn delete_message(&self, channel_id: &str, ts: &str) -> Result<()>;

    async fn get_user(&self, user_id: &str) -> Result<User>;

    async fn list_users(&self) -> Result<Vec<User>>;
}

/// [`ChatApi`] backed by the Slack Web API
pub struct SlackClient {
    transport: Arc<dyn Transport>,
    requester: RetryingRequester,
}

impl SlackClient {
    pub fn new(transport: Arc<dyn Transport>, requester: RetryingRequester) -> Self {
        Self {
            transport,
            requester,
        }
    }

    /// HTTP client against `base_url` with the given retry policy
    pub fn http(token: &str, base_url: &str, policy: RetryPolicy) -> Self {
        Self::new(
            Arc::new(HttpTransport::with_base_url(token, base_url)),
            RetryingRequester::new(policy),
        )
    }

    /// Send with retries and check the `ok` flag; returns the raw body
    async fn call(&self, request: ApiRequest) -> Result<String> {
        let response = self
            .requester
            .execute(|| self.transport.send(&request))
            .await?;

        let envelope: ApiEnvelope = serde_json::from_str(&response.body).map_err(|e| {
            warn!(
                "{} returned undecodable body (status {}): {}",
                request.method, response.status, e
            );
            RelayError::Json(e)
        })?;

        if !envelope.ok {
            let reason = envelope.error.unwrap_or_else(|| "unknown".to_string());
            return Err(RelayError::Api(format!("{}: {}", request.method, reason)));
        }

        Ok(response.body)
    }

    async fn call_as<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.call(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn connect_url(&self) -> Result<String> {
        let response: ConnectResponse = self
            .call_as(ApiRequest::new("rtm.connect"))
            .await
            .map_err(|e| RelayError::Connection(format!("rtm.connect failed: {}", e)))?;
        Ok(response.url)
    }

    async fn post_message(&self, channel_id: &str, text: &str, user: &User) -> Result<String> {
        let request = ApiRequest::new("chat.postMessage")
            .param("channel", channel_id)
            .param("text", text)
            .param("username", &user.name)
            .param("as_user", "false")
            .param("icon_url", &user.avatar_url)
            .param("link_names", "0");

        self.call(request).await
    }

    async fn delete_message(&self, channel_id: &str, ts: &str) -> Result<()> {
        let request = ApiRequest::new("chat.delete")
            .param("ts", ts)
            .param("channel", channel_id);

        self.call(request).await.map(|_| ())
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        let response: UserInfoResponse = self
            .call_as(ApiRequest::new("users.info").param("user", user_id))
            .await?;
        Ok(response.user.into())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut request = ApiRequest::new("users.list").param("limit", USER_PAGE_SIZE);
            if !cursor.is_empty() {
                request = request.param("cursor", &cursor);
            }

            let page: UserListResponse = self.call_as(request).await?;
            users.extend(page.members.into_iter().map(User::from));

            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }

        debug!("Fetched {} users", users.len());
        Ok(users)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use crate::slack::ApiResponse;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Transport replaying scripted results and recording requests
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<ApiResponse>>>,
        pub requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<Result<ApiResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(bodies: &[&str]) -> Self {
            Self::new(bodies.iter().map(|b| Ok(ApiResponse::new(200, b))).collect())
        }
    }

    /// In-memory chat platform counting every call
    #[derive(Default)]
    pub struct MockChatApi {
        pub users: Mutex<Vec<User>>,
        pub posts: Mutex<Vec<(String, String, String)>>,
        pub deletes: Mutex<Vec<(String, String)>>,
        pub user_fetches: Mutex<u32>,
        pub list_fetches: Mutex<u32>,
        pub fail_posts: Mutex<bool>,
        pub fail_deletes: Mutex<bool>,
        /// Websocket URL handed out by `connect_url`
        pub rtm_url: Mutex<Option<String>>,
    }

    impl MockChatApi {
        pub fn with_users(users: Vec<User>) -> Self {
            Self {
                users: Mutex::new(users),
                ..Self::default()
            }
        }

        pub fn post_count(&self) -> usize {
            self.posts.lock().len()
        }
    }

    #[async_trait]
    impl ChatApi for MockChatApi {
        async fn connect_url(&self) -> Result<String> {
            Ok(self
                .rtm_url
                .lock()
                .clone()
                .unwrap_or_else(|| "wss://example.invalid/rtm".to_string()))
        }

        async fn post_message(&self, channel_id: &str, text: &str, user: &User) -> Result<String> {
            if *self.fail_posts.lock() {
                return Err(RelayError::RetriesExhausted {
                    attempts: 10,
                    source: Box::new(RelayError::Transport("down".into())),
                });
            }
            let mut posts = self.posts.lock();
            posts.push((channel_id.to_string(), text.to_string(), user.name.clone()));
            let ts = format!("9000.{:06}", posts.len());
            Ok(serde_json::json!({
                "ok": true,
                "channel": channel_id,
                "ts": ts,
                "message": {"text": text, "user": user.id},
            })
            .to_string())
        }

        async fn delete_message(&self, channel_id: &str, ts: &str) -> Result<()> {
            if *self.fail_deletes.lock() {
                return Err(RelayError::Api("chat.delete: message_not_found".into()));
            }
            self.deletes
                .lock()
                .push((channel_id.to_string(), ts.to_string()));
            Ok(())
        }

        async fn get_user(&self, user_id: &str) -> Result<User> {
            *self.user_fetches.lock() += 1;
            self.users
                .lock()
                .iter()
                .find(|u| u.id == user_id)
                .cloned()
                .ok_or_else(|| RelayError::Api("users.info: user_not_found".into()))
        }

        async fn list_users(&self) -> Result<Vec<User>> {
            *self.list_fetches.lock() += 1;
            Ok(self.users.lock().clone())
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.requests.lock().push(request.clone());
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(RelayError::Transport("script exhausted".into())))
        }
    }
}
