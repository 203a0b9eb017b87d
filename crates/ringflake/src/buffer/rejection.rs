use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;
use tracing::warn;

use crate::{Error, Result, buffer::RingBuffer};

/// Policy invoked when [`RingBuffer::put`] finds the buffer full.
///
/// Runs while the buffer's put lock is held. Closures of the form
/// `Fn(&RingBuffer, u64)` implement this trait.
pub trait RejectedPutHandler: Send + Sync {
    fn reject_put(&self, buffer: &RingBuffer, uid: u64);
}

/// Policy invoked when [`RingBuffer::take`] finds the buffer empty.
///
/// Whatever it returns is what `take` returns. Closures of the form
/// `Fn(&RingBuffer) -> Result<u64>` implement this trait.
pub trait RejectedTakeHandler: Send + Sync {
    /// # Errors
    ///
    /// Implementations decide; the default returns [`Error::BufferEmpty`].
    fn reject_take(&self, buffer: &RingBuffer) -> Result<u64>;
}

/// Logs the rejected id at `warn` and drops it.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardPutHandler;

impl RejectedPutHandler for DiscardPutHandler {
    fn reject_put(&self, buffer: &RingBuffer, uid: u64) {
        warn!("Rejected putting buffer for uid:{}. {}", uid, buffer);
    }
}

/// Logs at `warn` and fails the take with [`Error::BufferEmpty`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorTakeHandler;

impl RejectedTakeHandler for ErrorTakeHandler {
    fn reject_take(&self, buffer: &RingBuffer) -> Result<u64> {
        warn!("Rejected take buffer. {}", buffer);
        Err(Error::BufferEmpty {
            tail: buffer.tail(),
            cursor: buffer.cursor(),
        })
    }
}

/// Waits for a refill instead of failing right away.
///
/// Retries [`RingBuffer::try_take`] with exponential backoff (spin, then
/// yield, then short sleeps) until an id shows up or `timeout` elapses, then
/// fails like [`ErrorTakeHandler`].
#[derive(Clone, Copy, Debug)]
pub struct BackoffTakeHandler {
    timeout: Duration,
}

impl BackoffTakeHandler {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for BackoffTakeHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl RejectedTakeHandler for BackoffTakeHandler {
    fn reject_take(&self, buffer: &RingBuffer) -> Result<u64> {
        let deadline = Instant::now() + self.timeout;
        let backoff = Backoff::new();
        loop {
            if let Some(uid) = buffer.try_take() {
                return Ok(uid);
            }
            if Instant::now() >= deadline {
                return ErrorTakeHandler.reject_take(buffer);
            }
            if backoff.is_completed() {
                std::thread::sleep(Duration::from_micros(100));
            } else {
                backoff.snooze();
            }
        }
    }
}

impl<F> RejectedPutHandler for F
where
    F: Fn(&RingBuffer, u64) + Send + Sync,
{
    fn reject_put(&self, buffer: &RingBuffer, uid: u64) {
        self(buffer, uid);
    }
}

impl<F> RejectedTakeHandler for F
where
    F: Fn(&RingBuffer) -> Result<u64> + Send + Sync,
{
    fn reject_take(&self, buffer: &RingBuffer) -> Result<u64> {
        self(buffer)
    }
}
