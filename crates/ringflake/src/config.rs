//! Configuration records consumed by the generators.
//!
//! These are plain data: binding them from files, flags or the environment is
//! left to the embedding application (see the `ringflake-cli` crate).

use core::time::Duration;

use chrono::NaiveDate;

use crate::{Error, Result, allocator::BitsAllocator, time::TickUnit};

/// Default number of timestamp bits (~69 years of milliseconds).
pub const DEFAULT_TIMESTAMP_BITS: u8 = 41;
/// Default number of worker id bits (1024 workers).
pub const DEFAULT_WORKER_ID_BITS: u8 = 10;
/// Default number of sequence bits (4096 ids per tick).
pub const DEFAULT_SEQUENCE_BITS: u8 = 12;
/// Default percentage of the ring buffer below which a refill is triggered.
pub const DEFAULT_PADDING_FACTOR: u32 = 50;
/// Default boost power: the buffer holds `(max_sequence + 1) << 3` slots.
pub const DEFAULT_BOOST_POWER: u32 = 3;
/// Default period of the scheduled refill.
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// The generator configuration record.
///
/// `1 + timestamp_bits + worker_id_bits + sequence_bits` must equal 64, and
/// `worker_id` must fit in `worker_id_bits`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UidConfig {
    pub enabled: bool,
    pub worker_id: u64,
    pub timestamp_bits: u8,
    pub worker_id_bits: u8,
    pub sequence_bits: u8,
    /// Midnight UTC of this date is tick zero of every id.
    pub epoch: NaiveDate,
    pub tick_unit: TickUnit,
}

impl Default for UidConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_id: 1,
            timestamp_bits: DEFAULT_TIMESTAMP_BITS,
            worker_id_bits: DEFAULT_WORKER_ID_BITS,
            sequence_bits: DEFAULT_SEQUENCE_BITS,
            epoch: NaiveDate::from_ymd_opt(2018, 11, 11).unwrap_or_default(),
            tick_unit: TickUnit::Millis,
        }
    }
}

impl UidConfig {
    #[must_use]
    pub const fn with_worker_id(mut self, worker_id: u64) -> Self {
        self.worker_id = worker_id;
        self
    }

    #[must_use]
    pub const fn with_bits(
        mut self,
        timestamp_bits: u8,
        worker_id_bits: u8,
        sequence_bits: u8,
    ) -> Self {
        self.timestamp_bits = timestamp_bits;
        self.worker_id_bits = worker_id_bits;
        self.sequence_bits = sequence_bits;
        self
    }

    #[must_use]
    pub const fn with_epoch(mut self, epoch: NaiveDate) -> Self {
        self.epoch = epoch;
        self
    }

    #[must_use]
    pub const fn with_tick_unit(mut self, tick_unit: TickUnit) -> Self {
        self.tick_unit = tick_unit;
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Checks the record and returns the allocator it describes.
    ///
    /// # Errors
    ///
    /// - [`Error::Disabled`] if `enabled` is false
    /// - [`Error::InvalidConfig`] if the bit widths do not sum to 64, the
    ///   worker id does not fit its field or the epoch is before 1970
    pub fn validate(&self) -> Result<BitsAllocator> {
        if !self.enabled {
            return Err(Error::Disabled);
        }
        let allocator =
            BitsAllocator::new(self.timestamp_bits, self.worker_id_bits, self.sequence_bits)?;
        if self.worker_id > allocator.max_worker_id() {
            return Err(Error::invalid_config(format!(
                "worker id {} exceeds the max {}",
                self.worker_id,
                allocator.max_worker_id()
            )));
        }
        self.tick_unit.epoch_ticks(self.epoch)?;
        Ok(allocator)
    }
}

/// Ring buffer and refill settings of the cached generator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BufferConfig {
    /// The buffer holds `(max_sequence + 1) << boost_power` slots.
    pub boost_power: u32,
    /// Percentage in `(0, 100)`; a refill starts once fewer than
    /// `buffer_size * padding_factor / 100` ids remain.
    pub padding_factor: u32,
    /// Period of the safety-net refill. `None` disables the scheduler.
    pub schedule_interval: Option<Duration>,
    /// Number of ids requested from the generator per provide call. `None`
    /// means one full tick worth (`max_sequence + 1`).
    pub provide_batch: Option<usize>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            boost_power: DEFAULT_BOOST_POWER,
            padding_factor: DEFAULT_PADDING_FACTOR,
            schedule_interval: Some(DEFAULT_SCHEDULE_INTERVAL),
            provide_batch: None,
        }
    }
}

impl BufferConfig {
    #[must_use]
    pub const fn with_boost_power(mut self, boost_power: u32) -> Self {
        self.boost_power = boost_power;
        self
    }

    #[must_use]
    pub const fn with_padding_factor(mut self, padding_factor: u32) -> Self {
        self.padding_factor = padding_factor;
        self
    }

    #[must_use]
    pub const fn with_schedule_interval(mut self, interval: Option<Duration>) -> Self {
        self.schedule_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_provide_batch(mut self, batch: usize) -> Self {
        self.provide_batch = Some(batch);
        self
    }

    /// Computes the ring buffer size for a given allocator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the size overflows `usize` or
    /// leaves no usable slot.
    pub fn buffer_size(&self, allocator: &BitsAllocator) -> Result<usize> {
        let per_tick = usize::try_from(allocator.max_sequence())
            .ok()
            .and_then(|max| max.checked_add(1))
            .ok_or_else(|| Error::invalid_config("sequence bits too wide for a ring buffer"))?;
        let size = per_tick
            .checked_shl(self.boost_power)
            .filter(|size| *size >> self.boost_power == per_tick)
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "boost power {} overflows the buffer size",
                    self.boost_power
                ))
            })?;
        if size < 2 {
            return Err(Error::invalid_config("ring buffer needs at least 2 slots"));
        }
        Ok(size)
    }
}
