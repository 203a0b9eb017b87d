mod cached;
mod default;
mod parsed;

pub use cached::*;
pub use default::*;
pub use parsed::*;

use crate::GenerateError;

/// The public face of an id source.
///
/// [`DefaultUidGenerator`] generates on every call; [`CachedUidGenerator`]
/// serves pre-generated ids from a ring buffer. Both decompose ids the same
/// way.
pub trait UidGenerator: Send + Sync {
    /// Returns a new unique id.
    ///
    /// # Errors
    ///
    /// Wraps whatever stopped the id from being produced: a clock anomaly,
    /// an exhausted timestamp or an empty buffer.
    fn get_uid(&self) -> Result<u64, GenerateError>;

    /// Decomposes an id into its timestamp, worker id and sequence.
    fn parse_uid(&self, uid: u64) -> ParsedUid;
}
