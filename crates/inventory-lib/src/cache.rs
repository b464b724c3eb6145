//! Time-boxed snapshot cache
//!
//! Holds the most recent value with the time it was produced. Values are
//! replaced wholesale; readers get a shared handle and never see a partial
//! update.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A value and when it was stored
#[derive(Debug)]
pub struct Snapshot<T> {
    pub value: Arc<T>,
    pub collected_at: DateTime<Utc>,
    stored: Instant,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            collected_at: self.collected_at,
            stored: self.stored,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn age(&self) -> Duration {
        self.stored.elapsed()
    }
}

#[derive(Debug)]
pub struct SnapshotCache<T> {
    ttl: Duration,
    slot: RwLock<Option<Snapshot<T>>>,
}

impl<T> SnapshotCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the cached value
    pub async fn store(&self, value: T) -> Snapshot<T> {
        let snapshot = Snapshot {
            value: Arc::new(value),
            collected_at: Utc::now(),
            stored: Instant::now(),
        };
        *self.slot.write().await = Some(snapshot.clone());
        snapshot
    }

    /// The cached value, if any, regardless of age
    pub async fn latest(&self) -> Option<Snapshot<T>> {
        self.slot.read().await.clone()
    }

    /// The cached value while it is younger than the TTL
    pub async fn fresh(&self) -> Option<Snapshot<T>> {
        self.latest().await.filter(|s| s.age() < self.ttl)
    }

    pub async fn is_stale(&self) -> bool {
        self.fresh().await.is_none()
    }
}
