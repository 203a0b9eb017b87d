/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `ringflake` can emit.
///
/// Construction-time variants ([`Error::InvalidConfig`], [`Error::Disabled`])
/// are fatal and never recovered. Runtime variants are surfaced to the caller
/// of the operation that hit them; none of them is retried internally.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A configuration value is out of range or inconsistent.
    ///
    /// Raised for bit widths that do not sum to 64, a worker id that does not
    /// fit its bit width, a padding factor outside `(0, 100)` or a buffer size
    /// that is not a power of two.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The configuration record has `enabled = false`.
    #[error("uid generation is disabled by configuration")]
    Disabled,

    /// The clock reported a tick lower than the last tick handed out.
    ///
    /// The generator refuses to produce ids until the clock catches up with
    /// `last_tick`. The generator state is left untouched.
    #[error("clock moved backwards, refusing to generate ids for {} ticks", ticks_behind(.last_tick, .now))]
    ClockRollback { last_tick: u64, now: u64 },

    /// The ticks elapsed since the epoch no longer fit in the timestamp bits.
    ///
    /// This is permanent for the configured epoch; a new epoch (or a wider
    /// timestamp field) is required.
    #[error("timestamp bits are exhausted: {elapsed} ticks elapsed, max is {max}")]
    TimestampExhausted { elapsed: u64, max: u64 },

    /// The clock reported a tick earlier than the configured epoch.
    #[error("clock ({now}) is behind the configured epoch ({epoch})")]
    ClockBeforeEpoch { now: u64, epoch: u64 },

    /// A take was attempted on a ring buffer with no remaining ids.
    #[error("rejected take buffer: tail={tail}, cursor={cursor}")]
    BufferEmpty { tail: i64, cursor: i64 },

    /// The padding executor has been shut down.
    #[error("padding executor is shut down")]
    ExecutorShutdown,

    /// The padding executor's worker pool could not be started.
    #[error("failed to start padding workers: {reason}")]
    ExecutorStart { reason: String },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// The error returned by [`UidGenerator::get_uid`], wrapping the underlying
/// cause.
///
/// [`UidGenerator::get_uid`]: crate::UidGenerator::get_uid
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to generate uid: {source}")]
pub struct GenerateError {
    #[from]
    source: Error,
}

impl GenerateError {
    /// Returns the underlying cause.
    pub const fn cause(&self) -> &Error {
        &self.source
    }

    /// Consumes the wrapper and returns the underlying cause.
    pub fn into_cause(self) -> Error {
        self.source
    }
}

fn ticks_behind(last_tick: &u64, now: &u64) -> u64 {
    last_tick.saturating_sub(*now)
}
