//! Slack platform layer
//!
//! - `transport`: single-attempt Web API calls (method + form params)
//! - `client`: typed Web API operations with retries ([`ChatApi`])
//! - `rtm`: realtime websocket sessions ([`Connector`])
//! - `types`: wire formats

pub mod client;
pub mod rtm;
pub mod transport;
pub mod types;

pub use client::{ChatApi, SlackClient};
pub use rtm::{install_crypto_provider, Connector, FrameSource, RtmConnector, WsSession};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, SLACK_API_BASE};
