//! Relay Coordinator
//!
//! Single control loop over the worker's event channels:
//! - **message**: filter, resolve author, rewrite mentions, relay once
//! - **deleted**: find the timeline copy and delete it
//! - **cache invalidation**: drop the user cache and rebuild the mention table
//! - **warning**: log only
//! - **error** / **end**: stop with or without an error
//!
//! Recoverable failures are logged and the loop keeps going. Anything
//! [`RelayError::is_fatal`] flags stops the run.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::directory::UserRepository;
use crate::error::{RelayError, Result};
use crate::events::event_channels;
use crate::filter::MessageFilter;
use crate::mention::MentionReplacer;
use crate::model::Message;
use crate::store::MessageRepository;
use crate::worker::Poller;

/// Coordinator lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Building the mention table and launching the worker
    Starting,
    /// Consuming events
    Running,
    /// Stopped on an `end` event
    StoppedClean,
    /// Stopped on a fatal error
    StoppedError,
}

pub struct Coordinator {
    filter: MessageFilter,
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    replacer: MentionReplacer,
    state: CoordinatorState,
}

impl Coordinator {
    pub fn new(
        filter: MessageFilter,
        users: Arc<dyn UserRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            filter,
            users,
            messages,
            replacer: MentionReplacer::default(),
            state: CoordinatorState::Starting,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Run until the poller signals `end` (Ok) or a fatal error (Err)
    pub async fn run(&mut self, poller: Box<dyn Poller>) -> Result<()> {
        self.state = CoordinatorState::Starting;

        self.replacer = match MentionReplacer::build_from_directory(self.users.as_ref()).await {
            Ok(replacer) => replacer,
            Err(e) => {
                error!("Failed to load user directory: {}", e);
                self.state = CoordinatorState::StoppedError;
                return Err(e);
            }
        };

        let (senders, mut rx) = event_channels();
        let worker = tokio::spawn(poller.poll(senders));

        self.state = CoordinatorState::Running;
        info!("Coordinator running");

        // Biased so events queued before `end`/`error` are handled first
        let outcome = loop {
            tokio::select! {
                biased;

                Some(message) = rx.messages.recv() => {
                    let result = self.on_message(message).await;
                    if let Err(e) = recover(result) {
                        break Err(e);
                    }
                }
                Some(message) = rx.deleted.recv() => {
                    let result = self.on_deleted(message).await;
                    if let Err(e) = recover(result) {
                        break Err(e);
                    }
                }
                Some(()) = rx.cache_invalidations.recv() => {
                    let result = self.on_cache_invalidated().await;
                    if let Err(e) = recover(result) {
                        break Err(e);
                    }
                }
                Some(warning) = rx.warnings.recv() => {
                    warn!("Stream warning: {}", warning);
                }
                Some(e) = rx.errors.recv() => break Err(e),
                Some(()) = rx.end.recv() => break Ok(()),
                else => {
                    break Err(RelayError::Connection(
                        "event stream closed without end signal".to_string(),
                    ))
                }
            }
        };

        worker.abort();

        match &outcome {
            Ok(()) => {
                self.state = CoordinatorState::StoppedClean;
                info!("Coordinator stopped");
            }
            Err(e) => {
                self.state = CoordinatorState::StoppedError;
                error!("Coordinator stopped on error: {}", e);
            }
        }
        outcome
    }

    async fn on_message(&self, mut message: Message) -> Result<()> {
        if !self.filter.is_target(&message) {
            debug!("Skipping message from {}", message.channel_id);
            return Ok(());
        }

        let user = self.users.get(&message.user_id).await?;
        message.text = self.replacer.replace(&message.text);

        self.messages.put(&user, &message).await
    }

    async fn on_deleted(&self, message: Message) -> Result<()> {
        let relayed = match self.messages.find_in_timeline(&message) {
            Ok(relayed) => relayed,
            Err(e) if e.is_not_found() => {
                debug!("No timeline copy for deleted {}", message.key());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.messages.delete(&relayed).await
    }

    async fn on_cache_invalidated(&mut self) -> Result<()> {
        self.users.clear().await;

        // On failure the previous snapshot stays in use
        let replacer = MentionReplacer::build_from_directory(self.users.as_ref()).await?;
        self.replacer = replacer;
        info!("Mention table rebuilt ({} users)", self.replacer.len());
        Ok(())
    }
}

/// Log recoverable errors, pass fatal ones through
fn recover(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("Recovered: {}", e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
