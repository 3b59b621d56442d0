pub mod utils {
    pub use kura_utils::*;
}
pub mod handle {
    pub use kura_handle::*;
}
pub mod asset {
    pub use kura_asset::*;
}
