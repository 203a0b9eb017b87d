mod lock;
mod provider;
#[cfg(test)]
mod tests;

pub use lock::*;
pub use provider::*;
