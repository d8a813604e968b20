//! Slack Timeline
//!
//! Relays every message posted in a workspace's public channels into one
//! timeline channel, and removes the copy when the source is deleted.
//!
//! # Features
//!
//! - **Realtime stream**: RTM websocket with frame reassembly and reconnects
//! - **Idempotent relay**: SQLite relay records keyed by `<channel>-<ts>`
//! - **Retries**: bounded attempts with `Retry-After` aware backoff
//! - **User cache**: Moka-backed directory, invalidated on profile changes
//! - **Mentions**: `<@U123>` tokens rewritten to `@name` before posting
//!
//! # Architecture
//!
//! ```text
//! Slack RTM ──► StreamWorker ──► events ──► Coordinator ──► chat.postMessage
//!  (websocket)      (task)      (mpsc)          │             chat.delete
//!                                               ├── MessageFilter
//!                                               ├── UserDirectory (Moka)
//!                                               ├── MentionReplacer
//!                                               └── MessageStore (SQLite)
//! ```

pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod events;
pub mod filter;
pub mod mention;
pub mod model;
pub mod retry;
pub mod slack;
pub mod store;
pub mod worker;

pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorState};
pub use directory::{DirectoryStats, UserDirectory, UserRepository};
pub use error::{RelayError, Result};
pub use events::{event_channels, EventReceivers, EventSenders};
pub use filter::MessageFilter;
pub use mention::MentionReplacer;
pub use model::{Message, RelayedMessage, User};
pub use retry::{RetryPolicy, RetryingRequester};
pub use slack::{ChatApi, Connector, FrameSource, RtmConnector, SlackClient};
pub use store::{MessageRepository, MessageStore, RelayLedger};
pub use worker::{FrameBuffer, Poller, StreamWorker};
