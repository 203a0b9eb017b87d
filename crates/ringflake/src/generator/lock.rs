use core::hint::spin_loop;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use tracing::{error, instrument};

use crate::{
    Error, ParsedUid, Result,
    allocator::BitsAllocator,
    config::UidConfig,
    time::{SystemClock, TickUnit, TimeSource},
};

/// A snapshot of the mutable generator state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GeneratorState {
    /// The tick of the last id handed out, `None` before the first id.
    pub last_tick: Option<u64>,
    /// The sequence of the last id handed out within `last_tick`.
    pub sequence: u64,
}

/// A lock-based Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// The tick/sequence state lives behind a single cache-padded
/// [`parking_lot::Mutex`]. Reading the clock, advancing the sequence and
/// publishing the new tick all happen while holding it, so two concurrent
/// callers can never observe (and hand out) the same `(tick, sequence)` pair.
///
/// ## Clock anomalies
/// - clock behind the last tick: [`Error::ClockRollback`], state untouched
/// - sequence exhausted within a tick: spins until the clock advances
/// - ticks since epoch overflow the timestamp field:
///   [`Error::TimestampExhausted`]
///
/// # Example
/// ```
/// use ringflake::{SnowflakeGenerator, SystemClock, UidConfig};
///
/// let config = UidConfig::default().with_worker_id(7);
/// let generator = SnowflakeGenerator::new(&config, SystemClock::new(config.tick_unit)).unwrap();
///
/// let a = generator.next_id().unwrap();
/// let b = generator.next_id().unwrap();
/// assert!(a < b);
/// assert_eq!(generator.parse(b).worker_id, 7);
/// ```
pub struct SnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    state: CachePadded<Mutex<GeneratorState>>,
    allocator: BitsAllocator,
    worker_id: u64,
    epoch_ticks: u64,
    tick_unit: TickUnit,
    pub(crate) provide_batch: usize,
    time: T,
}

impl<T> SnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator from a configuration record.
    ///
    /// `time` must report ticks in `config.tick_unit`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`UidConfig::validate`].
    pub fn new(config: &UidConfig, time: T) -> Result<Self> {
        let allocator = config.validate()?;
        let epoch_ticks = config.tick_unit.epoch_ticks(config.epoch)?;
        Ok(Self {
            state: CachePadded::new(Mutex::new(GeneratorState::default())),
            allocator,
            worker_id: config.worker_id,
            epoch_ticks,
            tick_unit: config.tick_unit,
            provide_batch: one_tick(&allocator),
            time,
        })
    }

    /// Sets how many ids a single [`UidProvider::provide`] call returns.
    ///
    /// Zero is treated as one.
    ///
    /// [`UidProvider::provide`]: crate::UidProvider::provide
    #[must_use]
    pub fn with_provide_batch(mut self, batch: usize) -> Self {
        self.provide_batch = batch.max(1);
        self
    }

    /// Generates the next id.
    ///
    /// Ids from one generator are strictly increasing. When the sequence of
    /// the current tick is used up, this call spins (without sleeping) until
    /// the clock moves on.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockRollback`] if the clock is behind the last tick used
    /// - [`Error::TimestampExhausted`] if the timestamp field is used up
    /// - [`Error::ClockBeforeEpoch`] if the clock is behind the epoch
    #[instrument(level = "trace", skip(self))]
    pub fn next_id(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let mut now = self.current_tick()?;
        let mut sequence = 0;

        if let Some(last_tick) = state.last_tick {
            if now < last_tick {
                return Err(Self::cold_clock_behind(now, last_tick));
            }
            if now == last_tick {
                sequence = (state.sequence + 1) & self.allocator.max_sequence();
                if sequence == 0 {
                    now = self.til_next_tick(last_tick)?;
                }
            }
        }

        state.last_tick = Some(now);
        state.sequence = sequence;
        Ok(self
            .allocator
            .allocate(now - self.epoch_ticks, self.worker_id, sequence))
    }

    /// Decomposes an id produced with this generator's layout and epoch.
    pub fn parse(&self, uid: u64) -> ParsedUid {
        let (delta, worker_id, sequence) = self.allocator.decompose(uid);
        let timestamp = self
            .tick_unit
            .to_datetime(self.epoch_ticks.saturating_add(delta));
        ParsedUid {
            uid,
            timestamp,
            worker_id,
            sequence,
        }
    }

    /// Returns a copy of the current tick/sequence state.
    pub fn state(&self) -> GeneratorState {
        *self.state.lock()
    }

    pub const fn allocator(&self) -> &BitsAllocator {
        &self.allocator
    }

    pub const fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// The epoch, in ticks since the Unix epoch.
    pub const fn epoch_ticks(&self) -> u64 {
        self.epoch_ticks
    }

    pub const fn tick_unit(&self) -> TickUnit {
        self.tick_unit
    }

    pub const fn time(&self) -> &T {
        &self.time
    }

    /// Reads the clock and checks it against the representable range.
    fn current_tick(&self) -> Result<u64> {
        let now = self.time.current_ticks();
        let elapsed = now
            .checked_sub(self.epoch_ticks)
            .ok_or(Error::ClockBeforeEpoch {
                now,
                epoch: self.epoch_ticks,
            })?;
        if elapsed > self.allocator.max_timestamp() {
            return Err(Error::TimestampExhausted {
                elapsed,
                max: self.allocator.max_timestamp(),
            });
        }
        Ok(now)
    }

    /// Busy-waits until the clock reports a tick past `last_tick`.
    #[cold]
    #[inline(never)]
    fn til_next_tick(&self, last_tick: u64) -> Result<u64> {
        loop {
            let now = self.current_tick()?;
            if now > last_tick {
                return Ok(now);
            }
            spin_loop();
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, last_tick: u64) -> Error {
        error!(
            "Clock is moving backwards, rejecting requests until tick {}",
            last_tick
        );
        Error::ClockRollback { last_tick, now }
    }
}

fn one_tick(allocator: &BitsAllocator) -> usize {
    usize::try_from(allocator.max_sequence())
        .ok()
        .and_then(|max| max.checked_add(1))
        .unwrap_or(usize::MAX)
}
