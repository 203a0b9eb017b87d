use std::sync::Arc;

use tracing::{error, info};

use crate::{
    BufferConfig, GenerateError, PaddingExecutor, ParsedUid, RejectedPutHandler,
    RejectedTakeHandler, Result, RingBuffer, SnowflakeGenerator, SystemClock, TimeSource,
    UidConfig, UidGenerator, UidProvider,
};

/// Serves ids from a pre-filled [`RingBuffer`].
///
/// Construction fills the buffer once, synchronously, then starts the
/// periodic refill. From there on a [`get_uid`](UidGenerator::get_uid) call
/// is a lock-free take; the [`PaddingExecutor`] tops the buffer up in the
/// background whenever supply drops below the padding threshold.
///
/// Dropping the generator shuts the executor down.
///
/// # Example
/// ```
/// use ringflake::{BufferConfig, CachedUidGenerator, UidConfig, UidGenerator};
///
/// let generator =
///     CachedUidGenerator::new(&UidConfig::default(), &BufferConfig::default().with_boost_power(0))
///         .unwrap();
/// let uid = generator.get_uid().unwrap();
/// assert_eq!(generator.parse_uid(uid).worker_id, 1);
/// ```
pub struct CachedUidGenerator<T = SystemClock>
where
    T: TimeSource + 'static,
{
    generator: Arc<SnowflakeGenerator<T>>,
    buffer: Arc<RingBuffer>,
    executor: Arc<PaddingExecutor>,
}

impl CachedUidGenerator<SystemClock> {
    /// Builds a cached generator on the system clock with the default
    /// rejection policies.
    ///
    /// # Errors
    ///
    /// See [`CachedUidGeneratorBuilder::build`].
    pub fn new(config: &UidConfig, buffer_config: &BufferConfig) -> Result<Self> {
        Self::builder(config.clone())
            .buffer_config(buffer_config.clone())
            .build(SystemClock::new(config.tick_unit))
    }

    pub fn builder(config: UidConfig) -> CachedUidGeneratorBuilder {
        CachedUidGeneratorBuilder::new(config)
    }
}

impl<T> CachedUidGenerator<T>
where
    T: TimeSource + 'static,
{
    /// Stops the background refill. Ids already buffered can still be taken.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    pub const fn buffer(&self) -> &Arc<RingBuffer> {
        &self.buffer
    }

    pub const fn executor(&self) -> &Arc<PaddingExecutor> {
        &self.executor
    }

    pub const fn generator(&self) -> &Arc<SnowflakeGenerator<T>> {
        &self.generator
    }
}

impl<T> UidGenerator for CachedUidGenerator<T>
where
    T: TimeSource + 'static,
{
    fn get_uid(&self) -> Result<u64, GenerateError> {
        self.buffer.take().map_err(|e| {
            error!("Generate unique id exception. {e}");
            GenerateError::from(e)
        })
    }

    fn parse_uid(&self, uid: u64) -> ParsedUid {
        self.generator.parse(uid)
    }
}

impl<T> Drop for CachedUidGenerator<T>
where
    T: TimeSource + 'static,
{
    fn drop(&mut self) {
        self.executor.shutdown();
    }
}

/// Assembles a [`CachedUidGenerator`].
pub struct CachedUidGeneratorBuilder {
    config: UidConfig,
    buffer_config: BufferConfig,
    rejected_put: Option<Box<dyn RejectedPutHandler>>,
    rejected_take: Option<Box<dyn RejectedTakeHandler>>,
}

impl CachedUidGeneratorBuilder {
    pub fn new(config: UidConfig) -> Self {
        Self {
            config,
            buffer_config: BufferConfig::default(),
            rejected_put: None,
            rejected_take: None,
        }
    }

    #[must_use]
    pub fn buffer_config(mut self, buffer_config: BufferConfig) -> Self {
        self.buffer_config = buffer_config;
        self
    }

    #[must_use]
    pub fn rejected_put_handler(mut self, handler: impl RejectedPutHandler + 'static) -> Self {
        self.rejected_put = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn rejected_take_handler(mut self, handler: impl RejectedTakeHandler + 'static) -> Self {
        self.rejected_take = Some(Box::new(handler));
        self
    }

    /// Validates the configuration, fills the buffer and starts the refill
    /// schedule.
    ///
    /// A failure during the initial fill is logged, not returned: the buffer
    /// then starts partially filled and is topped up on the next signal.
    ///
    /// # Errors
    ///
    /// - any error from [`UidConfig::validate`] or
    ///   [`BufferConfig::buffer_size`]
    /// - [`Error::InvalidConfig`](crate::Error::InvalidConfig) for a padding
    ///   factor outside `(0, 100)`
    /// - [`Error::ExecutorStart`](crate::Error::ExecutorStart) if the refill
    ///   workers cannot be started
    pub fn build<T>(self, time: T) -> Result<CachedUidGenerator<T>>
    where
        T: TimeSource + 'static,
    {
        let generator = SnowflakeGenerator::new(&self.config, time)?;
        let buffer_size = self.buffer_config.buffer_size(generator.allocator())?;
        let generator = Arc::new(match self.buffer_config.provide_batch {
            Some(batch) => generator.with_provide_batch(batch),
            None => generator,
        });

        let mut buffer = RingBuffer::new(buffer_size, self.buffer_config.padding_factor)?;
        if let Some(handler) = self.rejected_put {
            buffer = buffer.with_boxed_put_handler(handler);
        }
        if let Some(handler) = self.rejected_take {
            buffer = buffer.with_boxed_take_handler(handler);
        }
        let buffer = Arc::new(buffer);
        info!(
            "Initialized ring buffer size:{}, paddingFactor:{}",
            buffer_size, self.buffer_config.padding_factor
        );

        let provider: Arc<dyn UidProvider> = generator.clone();
        let executor = PaddingExecutor::new(
            Arc::clone(&buffer),
            provider,
            self.buffer_config.schedule_interval,
        )?;
        executor.padding_buffer();
        executor.start()?;
        info!("Initialized padding executor. {}", buffer);

        Ok(CachedUidGenerator {
            generator,
            buffer,
            executor,
        })
    }
}
