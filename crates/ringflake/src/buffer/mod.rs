mod padding;
mod rejection;
mod ring;

pub use padding::*;
pub use rejection::*;
pub use ring::*;
