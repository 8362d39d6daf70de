//! Permit pool
//!
//! Every creator and reader holds one permit while it queries the row
//! source. Permits are released on drop, so each acquire is matched by
//! exactly one release on every exit path.

use super::types::TryAcquireResourcesStatus;
use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting permit pool sized to `max_concurrency`
#[derive(Debug, Clone)]
pub struct ResourcePool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    heartbeat: Duration,
}

/// A held permit; dropping it returns the permit to the pool
#[derive(Debug)]
pub struct AcquiredResources {
    _permit: OwnedSemaphorePermit,
}

impl ResourcePool {
    pub fn new(capacity: usize, heartbeat: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            heartbeat,
        }
    }

    /// Wait up to one heartbeat for a permit
    pub async fn try_acquire(&self) -> Option<AcquiredResources> {
        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        match tokio::time::timeout(self.heartbeat, acquire).await {
            Ok(Ok(permit)) => Some(AcquiredResources { _permit: permit }),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }
}

/// At most one permit, held by a creator or reader between
/// `try_acquire_resources` and `release_resources`
#[derive(Debug)]
pub struct ResourceSlot {
    pool: ResourcePool,
    held: Option<AcquiredResources>,
}

impl ResourceSlot {
    pub fn new(pool: ResourcePool) -> Self {
        Self { pool, held: None }
    }

    /// Acquire a permit unless one is already held
    pub async fn try_acquire(&mut self) -> TryAcquireResourcesStatus {
        if self.held.is_none() {
            self.held = self.pool.try_acquire().await;
        }
        if self.is_held() {
            TryAcquireResourcesStatus::ReadyToRun
        } else {
            TryAcquireResourcesStatus::RetryLater
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Fail unless a permit is held
    pub fn ensure_held(&self, holder: impl fmt::Display) -> Result<()> {
        if self.is_held() {
            Ok(())
        } else {
            Err(Error::resources_unavailable(format!(
                "{holder} ran without acquiring resources"
            )))
        }
    }

    /// Return the permit, if any
    pub fn release(&mut self) {
        self.held = None;
    }
}
