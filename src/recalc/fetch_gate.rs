use tokio::sync::{Semaphore, SemaphorePermit};

use super::error::RecalcError;

/// Caps how many items fetch, parse and calculate at the same time,
/// independently of the request rate.
#[derive(Debug)]
pub struct FetchGate {
    semaphore: Semaphore,
    capacity: usize
}

impl FetchGate {
    /// A `capacity` of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        FetchGate {
            semaphore: Semaphore::new(capacity),
            capacity
        }
    }

    /// The permit is released when dropped. The semaphore is never closed,
    /// so [`RecalcError::GateClosed`] only surfaces if that changes.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, RecalcError> {
        self.semaphore.acquire().await.map_err(|_| RecalcError::GateClosed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}
