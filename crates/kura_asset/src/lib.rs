mod asset;
mod bundle;
mod cache;
mod error;
mod handle;
mod manager;
mod memory;
mod pending;
mod pool;
mod request;

pub use asset::*;
pub use bundle::*;
pub use cache::*;
pub use error::*;
pub use handle::*;
pub use manager::*;
pub use memory::*;
pub use pending::*;
pub use pool::*;
pub use request::*;

pub use kura_handle::*;
pub use kura_utils::{Callback, MulticastDelegate};
