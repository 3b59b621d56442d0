#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum RefMessage {
    /// The last retain of the asset with this id was released
    Unload(usize),
}
