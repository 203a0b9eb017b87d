use tracing::error;

use crate::{
    GenerateError, ParsedUid, Result, SnowflakeGenerator, SystemClock, TimeSource, UidConfig,
    UidGenerator,
};

/// Generates an id on every call, under the generator's lock.
pub struct DefaultUidGenerator<T = SystemClock>
where
    T: TimeSource,
{
    generator: SnowflakeGenerator<T>,
}

impl DefaultUidGenerator<SystemClock> {
    /// Creates a generator reading the system clock in `config.tick_unit`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`UidConfig::validate`].
    pub fn from_config(config: &UidConfig) -> Result<Self> {
        Self::new(config, SystemClock::new(config.tick_unit))
    }
}

impl<T> DefaultUidGenerator<T>
where
    T: TimeSource,
{
    /// # Errors
    ///
    /// Returns any error from [`UidConfig::validate`].
    pub fn new(config: &UidConfig, time: T) -> Result<Self> {
        Ok(Self {
            generator: SnowflakeGenerator::new(config, time)?,
        })
    }

    pub const fn generator(&self) -> &SnowflakeGenerator<T> {
        &self.generator
    }
}

impl<T> UidGenerator for DefaultUidGenerator<T>
where
    T: TimeSource,
{
    fn get_uid(&self) -> Result<u64, GenerateError> {
        self.generator.next_id().map_err(|e| {
            error!("Generate unique id exception. {e}");
            GenerateError::from(e)
        })
    }

    fn parse_uid(&self, uid: u64) -> ParsedUid {
        self.generator.parse(uid)
    }
}
