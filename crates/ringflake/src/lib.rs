mod allocator;
mod buffer;
mod config;
mod error;
mod generator;
mod time;
mod uid;

pub use crate::allocator::*;
pub use crate::buffer::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::time::*;
pub use crate::uid::*;
