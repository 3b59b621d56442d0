mod delegate;
mod hash;

pub use delegate::*;
pub use hash::*;
