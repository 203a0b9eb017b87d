use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::{Error, Result};

/// The default epoch: Sunday, November 11, 2018 00:00:00 UTC
pub const DEFAULT_EPOCH_MILLIS: u64 = 1_541_894_400_000;

/// The discretized unit of the timestamp component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TickUnit {
    /// One tick per second.
    Seconds,
    /// One tick per millisecond.
    #[default]
    Millis,
}

impl TickUnit {
    /// Number of milliseconds in one tick.
    pub const fn millis_per_tick(self) -> u64 {
        match self {
            Self::Seconds => 1_000,
            Self::Millis => 1,
        }
    }

    /// Converts milliseconds since the Unix epoch into whole ticks.
    pub const fn from_millis(self, millis: u64) -> u64 {
        millis / self.millis_per_tick()
    }

    /// Converts ticks since the Unix epoch back into milliseconds.
    pub const fn to_millis(self, ticks: u64) -> u64 {
        ticks.saturating_mul(self.millis_per_tick())
    }

    /// Returns the epoch date at midnight UTC, expressed in ticks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the date is before 1970-01-01.
    pub fn epoch_ticks(self, epoch: NaiveDate) -> Result<u64> {
        let millis = epoch.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        let millis = u64::try_from(millis).map_err(|_| {
            Error::invalid_config(format!("epoch {epoch} is before 1970-01-01"))
        })?;
        Ok(self.from_millis(millis))
    }

    /// Converts an absolute tick count into a UTC wall-clock instant.
    pub fn to_datetime(self, ticks: u64) -> DateTime<Utc> {
        let millis = i64::try_from(self.to_millis(ticks)).unwrap_or(i64::MAX);
        DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl core::str::FromStr for TickUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "seconds" => Ok(Self::Seconds),
            "ms" | "millis" | "milliseconds" => Ok(Self::Millis),
            other => Err(format!("unknown tick unit `{other}`")),
        }
    }
}

/// A trait for time sources that return a wall-clock tick count.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests. Unlike a monotonic timer, a wall clock may move
/// backwards, and the generator is expected to detect that.
///
/// Ticks are absolute, i.e. counted from the Unix epoch, in whatever
/// [`TickUnit`] the source was built with.
///
/// # Example
///
/// ```
/// use ringflake::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_ticks(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_ticks(), 1234);
/// ```
pub trait TimeSource: Send + Sync {
    /// Returns the current tick count since the Unix epoch.
    fn current_ticks(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn current_ticks(&self) -> u64 {
        (**self).current_ticks()
    }
}

/// The system wall clock, read through [`SystemTime::now`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemClock {
    unit: TickUnit,
}

impl SystemClock {
    /// Creates a clock reporting ticks in `unit`.
    pub const fn new(unit: TickUnit) -> Self {
        Self { unit }
    }

    /// The tick unit of this clock.
    pub const fn unit(&self) -> TickUnit {
        self.unit
    }
}

impl TimeSource for SystemClock {
    fn current_ticks(&self) -> u64 {
        // A clock before 1970 reads as zero, which the generator reports as
        // being behind the epoch.
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        self.unit.from_millis(millis)
    }
}
