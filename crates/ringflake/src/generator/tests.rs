use crate::{
    Error, GeneratorState, SnowflakeGenerator, SystemClock, TickUnit, TimeSource, UidConfig,
    UidProvider, time::DEFAULT_EPOCH_MILLIS,
};
use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};
use std::thread::scope;

const EPOCH: u64 = DEFAULT_EPOCH_MILLIS;

struct MockTime {
    ticks: u64,
}

impl TimeSource for MockTime {
    fn current_ticks(&self) -> u64 {
        self.ticks
    }
}

/// A clock the test moves by hand.
#[derive(Clone)]
struct SharedMockTime {
    ticks: Arc<AtomicU64>,
}

impl SharedMockTime {
    fn at(ticks: u64) -> Self {
        Self {
            ticks: Arc::new(AtomicU64::new(ticks)),
        }
    }

    fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }
}

impl TimeSource for SharedMockTime {
    fn current_ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

/// Reports `base` for the first `advance_after` reads, then `base + 1`.
struct AdvancingTime {
    base: u64,
    reads: AtomicU64,
    advance_after: u64,
}

impl TimeSource for AdvancingTime {
    fn current_ticks(&self) -> u64 {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        if read < self.advance_after {
            self.base
        } else {
            self.base + 1
        }
    }
}

fn generator_at<T: TimeSource>(config: &UidConfig, time: T) -> SnowflakeGenerator<T> {
    SnowflakeGenerator::new(config, time).unwrap()
}

#[test]
fn sequence_increments_within_same_tick() {
    let generator = generator_at(
        &UidConfig::default().with_worker_id(5),
        MockTime { ticks: EPOCH + 42 },
    );
    let allocator = *generator.allocator();

    let id1 = generator.next_id().unwrap();
    let id2 = generator.next_id().unwrap();
    let id3 = generator.next_id().unwrap();

    assert_eq!(allocator.decompose(id1), (42, 5, 0));
    assert_eq!(allocator.decompose(id2), (42, 5, 1));
    assert_eq!(allocator.decompose(id3), (42, 5, 2));
    assert!(id1 < id2 && id2 < id3);
}

#[test]
fn sequence_resets_on_new_tick() {
    let time = SharedMockTime::at(EPOCH + 42);
    let generator = generator_at(&UidConfig::default(), time.clone());
    let allocator = *generator.allocator();

    generator.next_id().unwrap();
    generator.next_id().unwrap();
    time.set(EPOCH + 50);
    let id = generator.next_id().unwrap();

    assert_eq!(allocator.decompose(id), (50, 1, 0));
}

#[test]
fn exhausted_sequence_spins_until_next_tick() {
    // 2 sequence bits: 4 ids per tick
    let config = UidConfig::default().with_bits(41, 20, 2);
    let time = AdvancingTime {
        base: EPOCH + 42,
        reads: AtomicU64::new(0),
        advance_after: 16,
    };
    let generator = generator_at(&config, time);
    let allocator = *generator.allocator();

    for i in 0..=allocator.max_sequence() {
        let id = generator.next_id().unwrap();
        assert_eq!(allocator.decompose(id), (42, 1, i));
    }

    let id = generator.next_id().unwrap();
    assert_eq!(allocator.decompose(id), (43, 1, 0));
    assert!(generator.time().reads.load(Ordering::SeqCst) > 16);
    assert_eq!(
        generator.state(),
        GeneratorState {
            last_tick: Some(EPOCH + 43),
            sequence: 0,
        }
    );
}

#[test]
fn clock_rollback_fails_and_leaves_state_unchanged() {
    let time = SharedMockTime::at(EPOCH + 100);
    let generator = generator_at(&UidConfig::default(), time.clone());

    let before = generator.next_id().unwrap();
    generator.next_id().unwrap();
    let state = generator.state();
    assert_eq!(state.last_tick, Some(EPOCH + 100));
    assert_eq!(state.sequence, 1);

    time.set(EPOCH + 99);
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockRollback {
            last_tick: EPOCH + 100,
            now: EPOCH + 99,
        })
    );
    assert_eq!(generator.state(), state);

    // Once the clock catches up the sequence continues where it left off.
    time.set(EPOCH + 100);
    let after = generator.next_id().unwrap();
    assert_eq!(generator.allocator().decompose(after), (100, 1, 2));
    assert!(after > before);
}

#[test]
fn exhausted_timestamp_is_an_error() {
    // 10 timestamp bits: 1024 ticks after the epoch
    let config = UidConfig::default().with_bits(10, 20, 33);
    let time = SharedMockTime::at(EPOCH + 1023);
    let generator = generator_at(&config, time.clone());

    assert!(generator.next_id().is_ok());

    time.set(EPOCH + 1024);
    assert_eq!(
        generator.next_id(),
        Err(Error::TimestampExhausted {
            elapsed: 1024,
            max: 1023,
        })
    );
    time.set(EPOCH + 5000);
    assert!(matches!(
        generator.next_id(),
        Err(Error::TimestampExhausted { .. })
    ));
}

#[test]
fn clock_before_epoch_is_an_error() {
    let generator = generator_at(&UidConfig::default(), MockTime { ticks: EPOCH - 1 });
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockBeforeEpoch {
            now: EPOCH - 1,
            epoch: EPOCH,
        })
    );
    assert_eq!(generator.state(), GeneratorState::default());
}

#[test]
fn rejects_invalid_config() {
    let clock = SystemClock::default();
    assert!(matches!(
        SnowflakeGenerator::new(&UidConfig::default().with_worker_id(1024), clock),
        Err(Error::InvalidConfig { .. })
    ));
    assert!(matches!(
        SnowflakeGenerator::new(&UidConfig::default().with_bits(41, 10, 11), clock),
        Err(Error::InvalidConfig { .. })
    ));
    assert!(matches!(
        SnowflakeGenerator::new(&UidConfig::default().with_enabled(false), clock),
        Err(Error::Disabled)
    ));
}

#[test]
fn system_clock_ids_strictly_increase() {
    let config = UidConfig::default().with_worker_id(3);
    let generator = generator_at(&config, SystemClock::new(config.tick_unit));

    let mut last = 0;
    for _ in 0..4096 * 64 {
        let id = generator.next_id().unwrap();
        assert!(id > last, "{id} <= {last}");
        last = id;
    }
}

#[test]
fn seconds_clock_ids_strictly_increase() {
    // 22 sequence bits keep the test inside a handful of seconds
    let config = UidConfig::default()
        .with_bits(31, 10, 22)
        .with_tick_unit(TickUnit::Seconds);
    let generator = generator_at(&config, SystemClock::new(TickUnit::Seconds));

    let mut last = 0;
    for _ in 0..100_000 {
        let id = generator.next_id().unwrap();
        assert!(id > last);
        last = id;
    }
}

#[test]
fn threaded_ids_are_unique() {
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 4096 * 16;

    let generator = generator_at(&UidConfig::default(), SystemClock::default());
    let seen = Mutex::new(HashSet::with_capacity(THREADS * IDS_PER_THREAD));

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut local = Vec::with_capacity(IDS_PER_THREAD);
                for _ in 0..IDS_PER_THREAD {
                    local.push(generator.next_id().unwrap());
                }
                assert!(local.windows(2).all(|w| w[0] < w[1]));
                seen.lock().unwrap().extend(local);
            });
        }
    });

    let total = seen.lock().unwrap().len();
    assert_eq!(total, THREADS * IDS_PER_THREAD, "duplicate ids generated");
}

#[test]
fn provide_returns_batch_in_generation_order() {
    let generator =
        generator_at(&UidConfig::default(), SystemClock::default()).with_provide_batch(16);
    let ids = generator.provide(0).unwrap();
    assert_eq!(ids.len(), 16);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let next = generator.provide(1).unwrap();
    assert!(next[0] > ids[15]);
}

#[test]
fn provide_defaults_to_one_tick_and_never_zero() {
    let generator = generator_at(&UidConfig::default(), MockTime { ticks: EPOCH + 7 });
    assert_eq!(generator.provide(0).unwrap().len(), 4096);

    let generator =
        generator_at(&UidConfig::default(), SystemClock::default()).with_provide_batch(0);
    assert_eq!(generator.provide(0).unwrap().len(), 1);
}

#[test]
fn provide_propagates_generator_errors() {
    let time = SharedMockTime::at(EPOCH + 10);
    let generator = generator_at(&UidConfig::default(), time.clone()).with_provide_batch(4);
    generator.provide(0).unwrap();

    time.set(EPOCH + 9);
    assert!(matches!(
        generator.provide(1),
        Err(Error::ClockRollback { .. })
    ));
}

#[test]
fn parse_recovers_worker_and_time() {
    let config = UidConfig::default().with_worker_id(42);
    let generator = generator_at(&config, SystemClock::new(config.tick_unit));

    let before = chrono::Utc::now().timestamp_millis();
    let id = generator.next_id().unwrap();
    let after = chrono::Utc::now().timestamp_millis();

    let parsed = generator.parse(id);
    assert_eq!(parsed.uid, id);
    assert_eq!(parsed.worker_id, 42);
    assert_eq!(parsed.sequence, 0);
    let ts = parsed.timestamp.timestamp_millis();
    assert!(before <= ts && ts <= after, "{before} <= {ts} <= {after}");
}
