use core::fmt;
use std::sync::{
    Arc, OnceLock, Weak,
    atomic::{AtomicI64, AtomicU8, AtomicU64, Ordering},
};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    Error, Result,
    buffer::{
        DiscardPutHandler, ErrorTakeHandler, PaddingExecutor, RejectedPutHandler,
        RejectedTakeHandler,
    },
};

/// Initial value of `tail` and `cursor`: nothing produced, nothing consumed.
pub const START_POINT: i64 = -1;

const CAN_PUT_FLAG: u8 = 0;
const CAN_TAKE_FLAG: u8 = 1;

/// A fixed-capacity circular cache of pre-generated ids.
///
/// The buffer is made of:
/// - `slots`: one id per slot
/// - `flags`: one `CAN_PUT`/`CAN_TAKE` flag per slot, same index as `slots`
/// - `tail`: sequence of the last slot produced
/// - `cursor`: sequence of the last slot consumed
///
/// Both sequences only grow; a sequence maps to a slot through
/// `sequence & (buffer_size - 1)`. One slot is always left empty, so the
/// buffer holds at most `buffer_size - 1` ids.
///
/// [`put`](Self::put) is serialized by a lock, [`take`](Self::take) is
/// lock-free and may be called from any number of threads. `tail`, `cursor`
/// and each flag are cache padded so that producers and consumers do not
/// contend on the same cache line.
pub struct RingBuffer {
    buffer_size: usize,
    index_mask: i64,
    slots: Box<[AtomicU64]>,
    flags: Box<[CachePadded<AtomicU8>]>,
    tail: CachePadded<AtomicI64>,
    cursor: CachePadded<AtomicI64>,
    padding_threshold: i64,
    put_lock: Mutex<()>,
    rejected_put: Box<dyn RejectedPutHandler>,
    rejected_take: Box<dyn RejectedTakeHandler>,
    padding: OnceLock<Weak<PaddingExecutor>>,
}

impl RingBuffer {
    /// Creates an empty buffer with the default rejection policies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `buffer_size` is not a power of two
    /// of at least 2, or `padding_factor` is not within `(0, 100)`.
    pub fn new(buffer_size: usize, padding_factor: u32) -> Result<Self> {
        if buffer_size < 2 || !buffer_size.is_power_of_two() {
            return Err(Error::invalid_config(format!(
                "ring buffer size must be a power of two of at least 2, got {buffer_size}"
            )));
        }
        if padding_factor == 0 || padding_factor >= 100 {
            return Err(Error::invalid_config(format!(
                "padding factor must be within (0, 100), got {padding_factor}"
            )));
        }
        let index_mask = i64::try_from(buffer_size - 1)
            .map_err(|_| Error::invalid_config("ring buffer size exceeds i64::MAX"))?;
        let padding_threshold = i64::try_from(
            (buffer_size as u128 * u128::from(padding_factor) / 100) as u64,
        )
        .map_err(|_| Error::invalid_config("padding threshold exceeds i64::MAX"))?;

        Ok(Self {
            buffer_size,
            index_mask,
            slots: (0..buffer_size).map(|_| AtomicU64::new(0)).collect(),
            flags: (0..buffer_size)
                .map(|_| CachePadded::new(AtomicU8::new(CAN_PUT_FLAG)))
                .collect(),
            tail: CachePadded::new(AtomicI64::new(START_POINT)),
            cursor: CachePadded::new(AtomicI64::new(START_POINT)),
            padding_threshold,
            put_lock: Mutex::new(()),
            rejected_put: Box::new(DiscardPutHandler),
            rejected_take: Box::new(ErrorTakeHandler),
            padding: OnceLock::new(),
        })
    }

    /// Replaces the policy invoked when a put finds the buffer full.
    #[must_use]
    pub fn with_rejected_put_handler(self, handler: impl RejectedPutHandler + 'static) -> Self {
        self.with_boxed_put_handler(Box::new(handler))
    }

    /// Replaces the policy invoked when a take finds the buffer empty.
    #[must_use]
    pub fn with_rejected_take_handler(self, handler: impl RejectedTakeHandler + 'static) -> Self {
        self.with_boxed_take_handler(Box::new(handler))
    }

    pub(crate) fn with_boxed_put_handler(mut self, handler: Box<dyn RejectedPutHandler>) -> Self {
        self.rejected_put = handler;
        self
    }

    pub(crate) fn with_boxed_take_handler(
        mut self,
        handler: Box<dyn RejectedTakeHandler>,
    ) -> Self {
        self.rejected_take = handler;
        self
    }

    /// Registers the executor to signal when supply runs low.
    ///
    /// Only the first registration sticks. The buffer keeps a weak reference,
    /// so it never keeps the executor alive.
    pub fn set_padding_executor(&self, executor: &Arc<PaddingExecutor>) {
        let _ = self.padding.set(Arc::downgrade(executor));
    }

    /// Adds an id to the next slot.
    ///
    /// Only one put runs at a time. The slot value and its `CAN_TAKE` flag
    /// are published before `tail` moves, so a consumer that sees the new
    /// tail also sees the id.
    ///
    /// Returns `false` after invoking the rejected-put policy if the buffer is
    /// full. The rejected id is not kept anywhere.
    ///
    /// The put lock is held while the policy runs: a policy must not call
    /// back into `put`.
    pub fn put(&self, uid: u64) -> bool {
        let _guard = self.put_lock.lock();

        let current_tail = self.tail.load(Ordering::Acquire);
        let current_cursor = self.cursor.load(Ordering::Acquire);

        // Both indices start at START_POINT, so the difference is the number
        // of ids held even before the first take.
        if current_tail - current_cursor >= self.index_mask {
            self.rejected_put.reject_put(self, uid);
            return false;
        }

        let next_index = self.slot_index(current_tail + 1);
        if self.flags[next_index].load(Ordering::Acquire) != CAN_PUT_FLAG {
            self.rejected_put.reject_put(self, uid);
            return false;
        }

        self.slots[next_index].store(uid, Ordering::Relaxed);
        self.flags[next_index].store(CAN_TAKE_FLAG, Ordering::Release);
        self.tail.fetch_add(1, Ordering::Release);
        true
    }

    /// Takes the oldest id.
    ///
    /// Lock-free: every successful call claims exactly one slot. When fewer
    /// than `padding_threshold` ids remain afterwards, the padding executor
    /// (if any) is signalled without blocking.
    ///
    /// # Errors
    ///
    /// On an empty buffer the cursor is left alone, a refill is signalled and
    /// the rejected-take policy decides the outcome. The default policy
    /// returns [`Error::BufferEmpty`].
    pub fn take(&self) -> Result<u64> {
        match self.try_take() {
            Some(uid) => Ok(uid),
            None => {
                self.signal_padding();
                self.rejected_take.reject_take(self)
            }
        }
    }

    /// Takes the oldest id, or returns `None` without invoking any policy if
    /// the buffer is empty.
    pub fn try_take(&self) -> Option<u64> {
        let next_cursor = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                if old == self.tail.load(Ordering::Acquire) {
                    None
                } else {
                    Some(old + 1)
                }
            })
            .ok()?
            + 1;

        let current_tail = self.tail.load(Ordering::Acquire);
        if current_tail - next_cursor < self.padding_threshold {
            debug!(
                "Reach the padding threshold:{}. tail:{}, cursor:{}, rest:{}",
                self.padding_threshold,
                current_tail,
                next_cursor,
                current_tail - next_cursor
            );
            self.signal_padding();
        }

        let index = self.slot_index(next_cursor);
        debug_assert_eq!(
            self.flags[index].load(Ordering::Acquire),
            CAN_TAKE_FLAG,
            "cursor not in can take status"
        );
        // The slot must be read before its flag goes back to CAN_PUT.
        let uid = self.slots[index].load(Ordering::Relaxed);
        self.flags[index].store(CAN_PUT_FLAG, Ordering::Release);
        Some(uid)
    }

    /// Sequence of the last slot produced, [`START_POINT`] if none.
    pub fn tail(&self) -> i64 {
        self.tail.load(Ordering::Acquire)
    }

    /// Sequence of the last slot consumed, [`START_POINT`] if none.
    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Number of ids produced but not yet consumed.
    pub fn remaining(&self) -> i64 {
        let cursor = self.cursor();
        (self.tail() - cursor).max(0)
    }

    /// Number of slots. At most `buffer_size - 1` ids are held at once.
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub const fn padding_threshold(&self) -> i64 {
        self.padding_threshold
    }

    #[inline]
    const fn slot_index(&self, sequence: i64) -> usize {
        (sequence & self.index_mask) as usize
    }

    fn signal_padding(&self) {
        if let Some(executor) = self.padding.get().and_then(Weak::upgrade) {
            executor.async_padding();
        }
    }
}

impl fmt::Display for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RingBuffer [bufferSize={}, tail={}, cursor={}, paddingThreshold={}]",
            self.buffer_size,
            self.tail(),
            self.cursor(),
            self.padding_threshold
        )
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("buffer_size", &self.buffer_size)
            .field("tail", &self.tail())
            .field("cursor", &self.cursor())
            .field("padding_threshold", &self.padding_threshold)
            .finish_non_exhaustive()
    }
}
