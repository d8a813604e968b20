//! Worker → coordinator event channels
//!
//! One typed channel per event kind. Every channel has capacity 1, so the
//! worker blocks until the coordinator has taken the previous event.

use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::model::Message;

/// Capacity of every event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1;

/// Sending halves, owned by the stream worker
#[derive(Debug, Clone)]
pub struct EventSenders {
    pub messages: mpsc::Sender<Message>,
    pub deleted: mpsc::Sender<Message>,
    pub warnings: mpsc::Sender<RelayError>,
    pub errors: mpsc::Sender<RelayError>,
    pub cache_invalidations: mpsc::Sender<()>,
    pub end: mpsc::Sender<()>,
}

/// Receiving halves, owned by the coordinator
#[derive(Debug)]
pub struct EventReceivers {
    pub messages: mpsc::Receiver<Message>,
    pub deleted: mpsc::Receiver<Message>,
    pub warnings: mpsc::Receiver<RelayError>,
    pub errors: mpsc::Receiver<RelayError>,
    pub cache_invalidations: mpsc::Receiver<()>,
    pub end: mpsc::Receiver<()>,
}

/// Create a connected sender/receiver set
pub fn event_channels() -> (EventSenders, EventReceivers) {
    let (messages_tx, messages_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (deleted_tx, deleted_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (warnings_tx, warnings_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (errors_tx, errors_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (cache_tx, cache_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (end_tx, end_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    (
        EventSenders {
            messages: messages_tx,
            deleted: deleted_tx,
            warnings: warnings_tx,
            errors: errors_tx,
            cache_invalidations: cache_tx,
            end: end_tx,
        },
        EventReceivers {
            messages: messages_rx,
            deleted: deleted_rx,
            warnings: warnings_rx,
            errors: errors_rx,
            cache_invalidations: cache_rx,
            end: end_rx,
        },
    )
}
