//! In-memory Slack workspace shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use slack_timeline::slack::{ApiRequest, ApiResponse, Transport};
use slack_timeline::{Result, RetryPolicy, RetryingRequester, SlackClient};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Answers Web API methods from memory and records every request
#[derive(Default)]
pub struct FakeSlack {
    pub requests: Mutex<Vec<ApiRequest>>,
    /// Number of upcoming `chat.postMessage` calls answered with 429
    pub rate_limited_posts: AtomicU32,
    posted: AtomicU32,
}

impl FakeSlack {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn client(self: &Arc<Self>) -> Arc<SlackClient> {
        Arc::new(SlackClient::new(
            self.clone(),
            RetryingRequester::new(RetryPolicy::immediate(3)),
        ))
    }

    pub fn calls(&self, method: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for FakeSlack {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().push(request.clone());

        let body = match request.method.as_str() {
            "users.list" => json!({
                "ok": true,
                "members": [
                    {"id": "U1", "name": "dark", "profile": {"image_48": "https://img/u1.png"}},
                    {"id": "U2", "name": "light", "profile": {"image_48": "https://img/u2.png"}}
                ],
                "response_metadata": {"next_cursor": ""}
            }),
            "users.info" => match request.get("user") {
                Some("U1") => json!({
                    "ok": true,
                    "user": {"id": "U1", "name": "dark", "profile": {"image_48": "https://img/u1.png"}}
                }),
                _ => json!({"ok": false, "error": "user_not_found"}),
            },
            "chat.postMessage" => {
                let limited = self
                    .rate_limited_posts
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if limited {
                    return Ok(ApiResponse::new(429, r#"{"ok":false,"error":"ratelimited"}"#)
                        .with_retry_after(0));
                }

                let n = self.posted.fetch_add(1, Ordering::SeqCst) + 1;
                json!({
                    "ok": true,
                    "channel": request.get("channel"),
                    "ts": format!("1700000000.{:06}", n),
                    "message": {"text": request.get("text"), "user": "UBOT"}
                })
            }
            "chat.delete" => json!({"ok": true}),
            other => json!({"ok": false, "error": format!("unknown_method:{}", other)}),
        };

        Ok(ApiResponse::new(200, &body.to_string()))
    }
}
