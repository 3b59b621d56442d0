mod common;
mod counter;

pub use common::*;
pub use counter::*;
