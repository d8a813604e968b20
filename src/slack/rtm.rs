//! Slack RTM websocket session
//!
//! A session is opened with the `rtm.connect` handshake and then dialled
//! with `tokio-tungstenite`. The worker only sees [`Connector`] and
//! [`FrameSource`], so tests can script frames without a socket.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::client::ChatApi;
use crate::error::{RelayError, Result};

/// Live stream of raw frames
#[async_trait]
pub trait FrameSource: Send {
    /// Next raw frame, `None` once the peer has closed the stream
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>>>;

    async fn close(&mut self);
}

/// Opens new realtime sessions
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn FrameSource>>;
}

/// Install ring as the process-wide rustls provider; later calls are no-ops
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Handshake through the Web API, then dial the returned URL
pub struct RtmConnector {
    api: Arc<dyn ChatApi>,
}

impl RtmConnector {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Connector for RtmConnector {
    async fn connect(&self) -> Result<Box<dyn FrameSource>> {
        let url = self.api.connect_url().await?;
        install_crypto_provider();

        info!("Connecting to Slack RTM");

        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RelayError::Connection(format!("websocket dial failed: {}", e)))?;

        Ok(Box::new(WsSession { stream }))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket-backed [`FrameSource`]
pub struct WsSession {
    stream: WsStream,
}

#[async_trait]
impl FrameSource for WsSession {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(RelayError::Connection(e.to_string()))),
            };

            match msg {
                WsMessage::Text(text) => return Some(Ok(text.as_str().as_bytes().to_vec())),
                WsMessage::Binary(data) => return Some(Ok(data.to_vec())),
                WsMessage::Close(frame) => {
                    debug!("Slack closed the websocket: {:?}", frame);
                    return None;
                }
                // Ping/pong is answered by tungstenite
                _ => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing websocket: {}", e);
        }
    }
}
