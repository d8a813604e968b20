//! Stream Worker
//!
//! Owns the realtime session and turns raw frames into typed events:
//! - Partial frames are buffered until the buffer parses as JSON
//! - `channel_created` / `goodbye` close the session and open a new one
//! - `team_join` / `user_change` ask the coordinator to drop the user cache
//! - Socket errors are fatal and reported on the error channel
//!
//! ```text
//! Connector ──► FrameSource ──► FrameBuffer ──► classify ──► EventSenders
//!     ▲                                            │
//!     └──────────── reconnect ◄────────────────────┘
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{RelayError, Result};
use crate::events::EventSenders;
use crate::model::Message;
use crate::slack::types::{DeletedEvent, MessageEvent};
use crate::slack::{Connector, FrameSource};

/// Subtypes relayed like plain messages
const RELAYED_SUBTYPES: &[&str] = &["", "file_share"];
const DELETED_SUBTYPE: &str = "message_deleted";

/// Something that feeds the coordinator's event channels
#[async_trait]
pub trait Poller: Send {
    /// Run until shutdown or a fatal error. Ends by sending on either
    /// `end` or `errors`.
    async fn poll(self: Box<Self>, events: EventSenders);
}

/// What a complete frame means to the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Message),
    Deleted(Message),
    /// Session reset requested by the platform
    Reconnect(String),
    InvalidateCache(String),
    Ignored(String),
}

/// Accumulates partial frames until they parse
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    /// Append `chunk` and try to parse everything buffered so far.
    /// The buffer is kept on failure and emptied on success.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Value> {
        self.pending.extend_from_slice(chunk);

        match serde_json::from_slice::<Value>(&self.pending) {
            Ok(value) => {
                self.pending.clear();
                Ok(value)
            }
            Err(e) => Err(RelayError::Parse(format!(
                "{} (holding {} bytes)",
                e,
                self.pending.len()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Classify one complete frame
pub fn classify(value: Value) -> Result<Frame> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match kind.as_str() {
        "message" => classify_message(value),
        "channel_created" | "goodbye" => Ok(Frame::Reconnect(kind)),
        "team_join" | "user_change" => Ok(Frame::InvalidateCache(kind)),
        "" => Ok(Frame::Ignored("untyped".to_string())),
        _ => Ok(Frame::Ignored(kind)),
    }
}

fn classify_message(value: Value) -> Result<Frame> {
    let subtype = value
        .get("subtype")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if RELAYED_SUBTYPES.contains(&subtype.as_str()) {
        let event: MessageEvent = serde_json::from_value(value)
            .map_err(|e| RelayError::Parse(format!("message event: {}", e)))?;
        return Ok(Frame::Message(event.into()));
    }

    if subtype == DELETED_SUBTYPE {
        let event: DeletedEvent = serde_json::from_value(value)
            .map_err(|e| RelayError::Parse(format!("deleted event: {}", e)))?;
        let mut prior: Message = event.previous_message.into();
        prior.channel_id = event.channel;
        return Ok(Frame::Deleted(prior));
    }

    Ok(Frame::Ignored(format!("message/{}", subtype)))
}

/// Resolves once shutdown is requested or its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

enum Next {
    Shutdown,
    Frame(Option<Result<Vec<u8>>>),
}

/// [`Poller`] reading the realtime stream
pub struct StreamWorker {
    connector: Arc<dyn Connector>,
    shutdown: watch::Receiver<bool>,
}

impl StreamWorker {
    pub fn new(connector: Arc<dyn Connector>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            connector,
            shutdown,
        }
    }

    /// Ok on shutdown or when the coordinator stopped listening
    async fn run(&mut self, events: &EventSenders) -> Result<()> {
        let mut session = self.connector.connect().await?;
        let mut buffer = FrameBuffer::default();
        info!("Realtime session established");

        loop {
            let next = tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => Next::Shutdown,
                frame = session.next_frame() => Next::Frame(frame),
            };

            let chunk = match next {
                Next::Shutdown => {
                    info!("Shutdown requested, closing realtime session");
                    session.close().await;
                    return Ok(());
                }
                Next::Frame(Some(Ok(chunk))) => chunk,
                Next::Frame(Some(Err(e))) => return Err(e),
                Next::Frame(None) => {
                    return Err(RelayError::Connection(
                        "realtime connection closed by peer".to_string(),
                    ))
                }
            };

            let value = match buffer.push(&chunk) {
                Ok(value) => value,
                Err(e) => {
                    if events.warnings.send(e).await.is_err() {
                        return Ok(());
                    }
                    continue;
                }
            };

            let delivered = match classify(value) {
                Ok(Frame::Message(message)) => events.messages.send(message).await.is_ok(),
                Ok(Frame::Deleted(message)) => events.deleted.send(message).await.is_ok(),
                Ok(Frame::InvalidateCache(kind)) => {
                    debug!("Directory changed ({})", kind);
                    events.cache_invalidations.send(()).await.is_ok()
                }
                Ok(Frame::Reconnect(kind)) => {
                    session = self.reconnect(session, &kind).await?;
                    buffer.clear();
                    true
                }
                Ok(Frame::Ignored(kind)) => {
                    debug!("Ignoring {} event", kind);
                    true
                }
                Err(e) => events.warnings.send(e).await.is_ok(),
            };

            if !delivered {
                debug!("Event receiver dropped, stopping worker");
                session.close().await;
                return Ok(());
            }
        }
    }

    async fn reconnect(
        &self,
        mut session: Box<dyn FrameSource>,
        reason: &str,
    ) -> Result<Box<dyn FrameSource>> {
        info!("Session reset by {} event, reconnecting", reason);
        session.close().await;
        drop(session);

        self.connector.connect().await
    }
}

#[async_trait]
impl Poller for StreamWorker {
    async fn poll(mut self: Box<Self>, events: EventSenders) {
        match self.run(&events).await {
            Ok(()) => {
                let _ = events.end.send(()).await;
            }
            Err(e) => {
                error!("Stream worker stopped: {}", e);
                let _ = events.errors.send(e).await;
            }
        }
    }
}
