//! Background refill of a [`RingBuffer`].
//!
//! A [`PaddingExecutor`] owns a small tokio runtime used only for refills:
//! - on-demand passes, requested by the buffer through
//!   [`PaddingExecutor::async_padding`] and run on the blocking pool
//! - an optional periodic pass, driven by an interval timer on its own
//!   `ringflake-padding-schedule` thread
//!
//! Passes are single-flight: a pass that finds another one running returns
//! immediately. Shutdown goes through a shared [`CancellationToken`] which
//! every pass checks between batches.

use core::time::Duration;
use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use tokio::{
    runtime::{Builder, Handle, Runtime},
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    Error, Result,
    buffer::RingBuffer,
    generator::UidProvider,
    time::{SystemClock, TickUnit, TimeSource},
};

const WORKER_THREAD_NAME: &str = "ringflake-padding-worker";
const SCHEDULE_THREAD_NAME: &str = "ringflake-padding-schedule";

/// Refills a [`RingBuffer`] from a [`UidProvider`].
pub struct PaddingExecutor {
    running: CachePadded<AtomicBool>,
    /// Watermark handed to the provider, in seconds; starts at the current
    /// second and moves by one per batch.
    last_second: CachePadded<AtomicU64>,
    completed_passes: AtomicU64,
    scheduled: AtomicBool,
    buffer: Arc<RingBuffer>,
    provider: Arc<dyn UidProvider>,
    schedule_interval: Option<Duration>,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    shutdown_token: CancellationToken,
}

impl PaddingExecutor {
    /// Builds an executor with `2 * num_cpus` padding workers and registers
    /// it with `buffer`.
    ///
    /// The periodic refill (if `schedule_interval` is set) does not run until
    /// [`start`](Self::start) is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExecutorStart`] if the worker pool cannot be built.
    pub fn new(
        buffer: Arc<RingBuffer>,
        provider: Arc<dyn UidProvider>,
        schedule_interval: Option<Duration>,
    ) -> Result<Arc<Self>> {
        let workers = num_cpus::get().max(1) * 2;
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name(WORKER_THREAD_NAME)
            .enable_time()
            .build()
            .map_err(|e| Error::ExecutorStart {
                reason: e.to_string(),
            })?;
        let handle = runtime.handle().clone();

        let executor = Arc::new(Self {
            running: CachePadded::new(AtomicBool::new(false)),
            last_second: CachePadded::new(AtomicU64::new(
                SystemClock::new(TickUnit::Seconds).current_ticks(),
            )),
            completed_passes: AtomicU64::new(0),
            scheduled: AtomicBool::new(false),
            buffer,
            provider,
            schedule_interval: schedule_interval.filter(|interval| !interval.is_zero()),
            runtime: Mutex::new(Some(runtime)),
            handle,
            shutdown_token: CancellationToken::new(),
        });
        executor.buffer.set_padding_executor(&executor);
        debug!(workers, "Padding executor ready. {}", executor.buffer);
        Ok(executor)
    }

    /// Starts the periodic refill.
    ///
    /// The first scheduled pass fires one interval after this call. Does
    /// nothing if no interval is configured or the timer already runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExecutorShutdown`] after [`shutdown`](Self::shutdown),
    /// or [`Error::ExecutorStart`] if the schedule thread cannot be spawned.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ExecutorShutdown);
        }
        let Some(interval) = self.schedule_interval else {
            return Ok(());
        };
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // The timer holds a weak reference so that an executor nobody uses
        // any more still gets dropped (and shut down).
        let executor = Arc::downgrade(self);
        let token = self.shutdown_token.clone();
        let spawned = Builder::new_current_thread()
            .enable_time()
            .build()
            .and_then(|runtime| {
                thread::Builder::new()
                    .name(SCHEDULE_THREAD_NAME.to_owned())
                    .spawn(move || runtime.block_on(schedule(executor, token, interval)))
            });
        if let Err(e) = spawned {
            self.scheduled.store(false, Ordering::Release);
            return Err(Error::ExecutorStart {
                reason: e.to_string(),
            });
        }
        info!("Padding schedule started, interval:{:?}", interval);
        Ok(())
    }

    /// Requests a refill without blocking the caller.
    ///
    /// Cheap when a pass is already running or the executor is shut down:
    /// nothing is scheduled.
    pub fn async_padding(self: &Arc<Self>) {
        if self.shutdown_token.is_cancelled() || self.running.load(Ordering::Acquire) {
            return;
        }
        let executor = Arc::clone(self);
        drop(self.handle.spawn_blocking(move || executor.padding_buffer()));
    }

    /// Runs one refill pass on the calling thread.
    ///
    /// Pulls batches from the provider and puts them until the buffer rejects
    /// a put (full), the provider fails or the executor shuts down.
    ///
    /// Returns the number of ids added, or `None` if another pass was already
    /// running.
    #[instrument(level = "debug", skip(self))]
    pub fn padding_buffer(&self) -> Option<usize> {
        debug!(
            "Ready to padding buffer lastSecond:{}. {}",
            self.last_second.load(Ordering::Relaxed),
            self.buffer
        );
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Padding buffer is still running. {}", self.buffer);
            return None;
        }
        let _running = RunningGuard(&self.running);

        let mut added = 0;
        let mut is_full = false;
        while !is_full {
            if self.shutdown_token.is_cancelled() {
                debug!("Padding interrupted by shutdown");
                break;
            }
            let second = self.last_second.fetch_add(1, Ordering::AcqRel) + 1;
            let uids = match self.provider.provide(second) {
                Ok(uids) => uids,
                Err(e) => {
                    error!("Failed to provide uids for padding: {e}");
                    break;
                }
            };
            if uids.is_empty() {
                warn!("Uid provider returned an empty batch, ending padding pass");
                break;
            }
            for uid in uids {
                if !self.buffer.put(uid) {
                    is_full = true;
                    break;
                }
                added += 1;
            }
        }

        self.completed_passes.fetch_add(1, Ordering::AcqRel);
        debug!("End to padding buffer, added:{}. {}", added, self.buffer);
        Some(added)
    }

    /// Stops the timer, refuses new passes and releases the workers.
    ///
    /// A pass in progress stops at its next batch boundary. Calling this more
    /// than once is harmless.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
            info!("Padding executor shut down. {}", self.buffer);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Number of passes that actually ran (coalesced calls are not counted).
    pub fn completed_passes(&self) -> u64 {
        self.completed_passes.load(Ordering::Acquire)
    }

    pub const fn schedule_interval(&self) -> Option<Duration> {
        self.schedule_interval
    }

    pub fn buffer(&self) -> &Arc<RingBuffer> {
        &self.buffer
    }
}

impl Drop for PaddingExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs a pass every `interval` on the schedule thread until shutdown or
/// until the executor is dropped.
async fn schedule(executor: Weak<PaddingExecutor>, token: CancellationToken, interval: Duration) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(executor) = executor.upgrade() else { break };
                executor.padding_buffer();
            }
        }
    }
    debug!("Padding schedule stopped");
}

/// Clears the running flag when a pass ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
