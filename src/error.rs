//! Error types for the relay pipeline

use thiserror::Error;

/// Errors raised anywhere between the realtime stream and the timeline
#[derive(Debug, Error)]
pub enum RelayError {
    /// Handshake, dial or socket failure. Ends the run.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A single outbound call failed before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("{attempts} attempts made but all failed")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<RelayError>,
    },

    /// Malformed realtime frame
    #[error("Failed to parse frame: {0}")]
    Parse(String),

    #[error("Relay record not found: {0}")]
    NotFound(String),

    /// The platform answered `ok: false`
    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether this error must stop the coordinator loop.
    ///
    /// Connection failures, exhausted retries and a broken relay database
    /// leave the pipeline unable to make progress. Everything else concerns
    /// a single message and is logged instead.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::RetriesExhausted { .. } | Self::Storage(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
