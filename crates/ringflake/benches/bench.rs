use core::hint::black_box;
use core::time::Duration;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ringflake::{
    BackoffTakeHandler, BufferConfig, CachedUidGenerator, DefaultUidGenerator, RingBuffer,
    SnowflakeGenerator, SystemClock, UidConfig, UidGenerator,
};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};

// Number of IDs handled per benchmark iteration (split across threads for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

fn discard(_buffer: &RingBuffer, _uid: u64) {}

/// Fills a fresh buffer with `count` ids.
fn filled_buffer(count: usize) -> RingBuffer {
    let buffer = RingBuffer::new((count + 1).next_power_of_two(), 50)
        .unwrap()
        .with_rejected_put_handler(discard);
    for uid in 0..count as u64 {
        buffer.put(uid);
    }
    buffer
}

/// Benchmarks the snowflake generator on the wall clock; includes spinning
/// whenever a millisecond's sequence is used up.
fn bench_generator(c: &mut Criterion, group_name: &str) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    let generator = SnowflakeGenerator::new(&UidConfig::default(), SystemClock::default()).unwrap();
    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..TOTAL_IDS {
                    black_box(generator.next_id().unwrap());
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks serialized puts into an emptied buffer.
fn bench_buffer_put(c: &mut Criterion, group_name: &str) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let buffer = RingBuffer::new(TOTAL_IDS * 2, 50).unwrap();
            let mut elapsed = Duration::ZERO;
            for i in 0..iters {
                let start = Instant::now();
                for uid in 0..TOTAL_IDS as u64 {
                    black_box(buffer.put(i ^ uid));
                }
                elapsed += start.elapsed();
                while buffer.try_take().is_some() {}
            }
            elapsed
        });
    });

    group.finish();
}

/// Benchmarks lock-free takes from a pre-filled buffer, single threaded.
fn bench_buffer_take(c: &mut Criterion, group_name: &str) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let mut elapsed = Duration::ZERO;
            for _ in 0..iters {
                let buffer = filled_buffer(TOTAL_IDS);
                let start = Instant::now();
                for _ in 0..TOTAL_IDS {
                    black_box(buffer.take().unwrap());
                }
                elapsed += start.elapsed();
            }
            elapsed
        });
    });

    group.finish();
}

/// Benchmarks takes from a shared pre-filled buffer across threads.
fn bench_buffer_take_contended(c: &mut Criterion, group_name: &str) {
    let mut group = c.benchmark_group(group_name);

    for thread_count in [1, 2, 4, 8, 16] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_IDS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let mut elapsed = Duration::ZERO;
                    for _ in 0..iters {
                        let buffer = Arc::new(filled_buffer(TOTAL_IDS));
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        let start = scope(|s| {
                            for _ in 0..thread_count {
                                let buffer = Arc::clone(&buffer);
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        black_box(buffer.take().unwrap());
                                    }
                                });
                            }
                            barrier.wait();
                            Instant::now()
                        });
                        elapsed += start.elapsed();
                    }
                    elapsed
                });
            },
        );
    }

    group.finish();
}

/// Benchmarks `get_uid` on a shared generator across threads.
fn bench_uid_generator_contended<G>(
    c: &mut Criterion,
    group_name: &str,
    generator_fn: impl Fn() -> G,
) where
    G: UidGenerator,
{
    let mut group = c.benchmark_group(group_name);
    let generator = Arc::new(generator_fn());

    for thread_count in [1, 2, 4, 8, 16] {
        let ids_per_thread = TOTAL_IDS / thread_count;

        group.throughput(Throughput::Elements(TOTAL_IDS as u64));
        group.bench_function(
            format!("elems/{}/threads/{}", TOTAL_IDS, thread_count),
            |b| {
                b.iter_custom(|iters| {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let barrier = Arc::new(Barrier::new(thread_count + 1));
                        scope(|s| {
                            for _ in 0..thread_count {
                                let generator = Arc::clone(&generator);
                                let barrier = Arc::clone(&barrier);
                                s.spawn(move || {
                                    barrier.wait();
                                    for _ in 0..ids_per_thread {
                                        black_box(generator.get_uid().unwrap());
                                    }
                                });
                            }
                            barrier.wait();
                        });
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn benchmarks(c: &mut Criterion) {
    bench_generator(c, "snowflake/generator");
    bench_buffer_put(c, "ring_buffer/put");
    bench_buffer_take(c, "ring_buffer/take");
    bench_buffer_take_contended(c, "ring_buffer/take/contended");
    bench_uid_generator_contended(c, "default/get_uid/contended", || {
        DefaultUidGenerator::from_config(&UidConfig::default()).unwrap()
    });
    bench_uid_generator_contended(c, "cached/get_uid/contended", || {
        CachedUidGenerator::builder(UidConfig::default())
            .buffer_config(BufferConfig::default())
            .rejected_take_handler(BackoffTakeHandler::new(Duration::from_secs(1)))
            .build(SystemClock::default())
            .unwrap()
    });
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
