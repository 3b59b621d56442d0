mod allocator;
mod erased;
mod typed;

pub use allocator::*;
pub use erased::*;
pub use typed::*;
