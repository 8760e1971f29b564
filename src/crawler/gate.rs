//! Process-wide admission gate for network fetches
//!
//! Every outbound request waits on the same gate, so the number of requests in
//! flight never exceeds the configured bound no matter how many items or links
//! are being worked on. A slot is held by a [`GatePermit`] and released when the
//! permit is dropped, which covers success, failure and cancellation alike.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate bounding concurrent fetches
#[derive(Debug, Clone)]
pub struct FetchGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One admitted fetch; dropping it frees the slot
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl FetchGate {
    /// Creates a gate admitting at most `capacity` fetches at once
    ///
    /// A capacity of zero is raised to one so the gate can never deadlock.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot and takes it
    ///
    /// Returns `None` once the gate is closed.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    #[cfg(test)]
    pub(crate) fn close(&self) {
        self.semaphore.close();
    }
}
