//! Bounds in-process concurrency on each channel independently of whatever
//! pooling the underlying provider does internally.

use crate::connection::Channel;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Held by a caller between `acquire` and drop; releases its permit when
/// dropped.
pub struct Permit {
    _read: Option<OwnedSemaphorePermit>,
    _write: Option<OwnedSemaphorePermit>,
}

enum ChannelSemaphore {
    Unlimited,
    Bounded(Arc<Semaphore>),
}

impl ChannelSemaphore {
    async fn acquire(&self, timeout: Duration) -> Result<Option<OwnedSemaphorePermit>> {
        match self {
            ChannelSemaphore::Unlimited => Ok(None),
            ChannelSemaphore::Bounded(sem) => {
                let fut = sem.clone().acquire_owned();
                match tokio::time::timeout(timeout, fut).await {
                    Ok(Ok(permit)) => Ok(Some(permit)),
                    Ok(Err(_)) => Err(Error::provider("pool semaphore closed")),
                    Err(_) => Err(Error::PoolAcquireTimeout(timeout)),
                }
            }
        }
    }
}

/// Two independent semaphores, one per channel. A writer-preference flag
/// (default on) is honored by giving writer acquisitions their own
/// semaphore rather than sharing one FIFO queue with readers, so writers are
/// never starved behind a burst of reader acquisitions.
pub struct PoolGovernor {
    reads: ChannelSemaphore,
    writes: ChannelSemaphore,
    acquire_timeout: Duration,
    writer_preference: bool,
}

impl PoolGovernor {
    pub fn new(
        max_concurrent_reads: Option<usize>,
        max_concurrent_writes: Option<usize>,
        acquire_timeout: Duration,
        writer_preference: bool,
    ) -> Self {
        PoolGovernor {
            reads: max_concurrent_reads
                .map(|n| ChannelSemaphore::Bounded(Arc::new(Semaphore::new(n))))
                .unwrap_or(ChannelSemaphore::Unlimited),
            writes: max_concurrent_writes
                .map(|n| ChannelSemaphore::Bounded(Arc::new(Semaphore::new(n))))
                .unwrap_or(ChannelSemaphore::Unlimited),
            acquire_timeout,
            writer_preference,
        }
    }

    /// Always enabled, bounded or not: even `disabled()` still returns a
    /// governor, just one backed by unlimited semaphores, so callers always
    /// go through the same acquisition path.
    pub fn disabled() -> Self {
        PoolGovernor::new(None, None, Duration::from_secs(5), true)
    }

    pub fn writer_preference(&self) -> bool {
        self.writer_preference
    }

    pub async fn acquire(&self, channel: Channel) -> Result<Permit> {
        match channel {
            Channel::Read => {
                let permit = self.reads.acquire(self.acquire_timeout).await?;
                Ok(Permit { _read: permit, _write: None })
            }
            Channel::Write => {
                let permit = self.writes.acquire(self.acquire_timeout).await?;
                Ok(Permit { _read: None, _write: permit })
            }
        }
    }
}
