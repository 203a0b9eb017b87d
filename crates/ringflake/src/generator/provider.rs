use crate::{Result, generator::SnowflakeGenerator, time::TimeSource};

/// A source of freshly generated ids, consumed by the padding executor.
///
/// `tick` is the executor's watermark and is informational only: the ids
/// returned must be newly generated, unique and in generation order.
///
/// Closures of the form `Fn(u64) -> Result<Vec<u64>>` implement this trait,
/// which keeps refill behavior easy to stub out.
pub trait UidProvider: Send + Sync {
    /// Returns at least one new id, in generation order.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the underlying generator.
    fn provide(&self, tick: u64) -> Result<Vec<u64>>;
}

impl<T> UidProvider for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn provide(&self, _tick: u64) -> Result<Vec<u64>> {
        (0..self.provide_batch.max(1))
            .map(|_| self.next_id())
            .collect()
    }
}

impl<F> UidProvider for F
where
    F: Fn(u64) -> Result<Vec<u64>> + Send + Sync,
{
    fn provide(&self, tick: u64) -> Result<Vec<u64>> {
        self(tick)
    }
}
