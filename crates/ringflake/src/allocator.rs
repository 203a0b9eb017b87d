use core::fmt;

use crate::{Error, Result};

/// Total width of an id.
pub const TOTAL_BITS: u8 = 64;

/// Width of the always-zero sign bit.
pub const SIGN_BITS: u8 = 1;

/// Packs and unpacks the fields of a 64-bit id.
///
/// ```text
/// +------+-----------------+-----------+----------+
/// | sign | timestamp delta | worker id | sequence |
/// +------+-----------------+-----------+----------+
///  1 bit   timestamp_bits   worker_bits  seq_bits
/// ```
///
/// The allocator is immutable after construction, so it can be shared freely
/// between threads.
///
/// # Example
///
/// ```
/// use ringflake::BitsAllocator;
///
/// let allocator = BitsAllocator::new(41, 10, 12).unwrap();
/// let id = allocator.allocate(5, 3, 7);
/// assert_eq!(allocator.decompose(id), (5, 3, 7));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitsAllocator {
    timestamp_bits: u8,
    worker_id_bits: u8,
    sequence_bits: u8,
    max_timestamp: u64,
    max_worker_id: u64,
    max_sequence: u64,
    timestamp_shift: u8,
    worker_id_shift: u8,
}

impl BitsAllocator {
    /// Creates an allocator for the given field widths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the sign bit plus the three widths
    /// do not sum to exactly 64.
    pub fn new(timestamp_bits: u8, worker_id_bits: u8, sequence_bits: u8) -> Result<Self> {
        let total = u32::from(SIGN_BITS)
            + u32::from(timestamp_bits)
            + u32::from(worker_id_bits)
            + u32::from(sequence_bits);
        if total != u32::from(TOTAL_BITS) {
            return Err(Error::invalid_config(format!(
                "allocated bits must sum to {TOTAL_BITS}, got {total} \
                 (sign={SIGN_BITS}, timestamp={timestamp_bits}, \
                 worker={worker_id_bits}, sequence={sequence_bits})"
            )));
        }

        Ok(Self {
            timestamp_bits,
            worker_id_bits,
            sequence_bits,
            max_timestamp: mask(timestamp_bits),
            max_worker_id: mask(worker_id_bits),
            max_sequence: mask(sequence_bits),
            timestamp_shift: worker_id_bits + sequence_bits,
            worker_id_shift: sequence_bits,
        })
    }

    /// Packs the three fields into an id.
    ///
    /// Callers are expected to pass in-range values; out-of-range bits are
    /// masked off so they can never bleed into a neighbouring field or the
    /// sign bit.
    #[inline]
    pub const fn allocate(&self, delta_ticks: u64, worker_id: u64, sequence: u64) -> u64 {
        ((delta_ticks & self.max_timestamp) << self.timestamp_shift)
            | ((worker_id & self.max_worker_id) << self.worker_id_shift)
            | (sequence & self.max_sequence)
    }

    /// Splits an id into `(delta_ticks, worker_id, sequence)`.
    #[inline]
    pub const fn decompose(&self, id: u64) -> (u64, u64, u64) {
        (
            (id >> self.timestamp_shift) & self.max_timestamp,
            (id >> self.worker_id_shift) & self.max_worker_id,
            id & self.max_sequence,
        )
    }

    pub const fn timestamp_bits(&self) -> u8 {
        self.timestamp_bits
    }

    pub const fn worker_id_bits(&self) -> u8 {
        self.worker_id_bits
    }

    pub const fn sequence_bits(&self) -> u8 {
        self.sequence_bits
    }

    /// Largest representable tick delta.
    pub const fn max_timestamp(&self) -> u64 {
        self.max_timestamp
    }

    /// Largest representable worker id.
    pub const fn max_worker_id(&self) -> u64 {
        self.max_worker_id
    }

    /// Largest sequence value within one tick.
    pub const fn max_sequence(&self) -> u64 {
        self.max_sequence
    }

    pub const fn timestamp_shift(&self) -> u8 {
        self.timestamp_shift
    }

    pub const fn worker_id_shift(&self) -> u8 {
        self.worker_id_shift
    }
}

const fn mask(bits: u8) -> u64 {
    if bits == 0 { 0 } else { u64::MAX >> (64 - bits as u32) }
}

impl fmt::Debug for BitsAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitsAllocator")
            .field("sign_bits", &SIGN_BITS)
            .field("timestamp_bits", &self.timestamp_bits)
            .field("worker_id_bits", &self.worker_id_bits)
            .field("sequence_bits", &self.sequence_bits)
            .field("max_timestamp", &self.max_timestamp)
            .field("max_worker_id", &self.max_worker_id)
            .field("max_sequence", &self.max_sequence)
            .finish()
    }
}
