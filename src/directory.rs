//! User Directory
//!
//! Caches user profile lookups to bound outbound call volume.
//! Entries are filled lazily by `get` or in bulk by `get_all`, and only ever
//! dropped all at once.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::User;
use crate::slack::ChatApi;

/// User lookups as the coordinator sees them
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<User>;

    /// Fetch every user, refreshing the cache on the way
    async fn get_all(&self) -> Result<Vec<User>>;

    /// Drop all cached entries
    async fn clear(&self);
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct DirectoryStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

/// [`UserRepository`] caching chat API lookups in memory
pub struct UserDirectory {
    api: Arc<dyn ChatApi>,
    cache: Cache<String, User>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl UserDirectory {
    /// Entries never expire unless `ttl` is given
    pub fn new(api: Arc<dyn ChatApi>, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder();
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            api,
            cache: builder.build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> DirectoryStats {
        DirectoryStats {
            entries: self.cache.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl UserRepository for UserDirectory {
    async fn get(&self, user_id: &str) -> Result<User> {
        if let Some(user) = self.cache.get(user_id).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(user);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("User cache MISS: {}", user_id);

        let user = self.api.get_user(user_id).await?;
        self.cache.insert(user_id.to_string(), user.clone()).await;
        Ok(user)
    }

    async fn get_all(&self) -> Result<Vec<User>> {
        let users = self.api.list_users().await?;
        for user in &users {
            self.cache.insert(user.id.clone(), user.clone()).await;
        }

        info!("User directory loaded: {} users", users.len());
        Ok(users)
    }

    async fn clear(&self) {
        self.cache.invalidate_all();
        info!("User directory cleared");
    }
}
