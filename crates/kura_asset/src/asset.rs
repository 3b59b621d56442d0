use std::any::TypeId;

pub trait Asset: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Type tag of an asset type. Request pools are keyed by it and bundles filter by it.
#[derive(Clone, Copy, Debug)]
pub struct AssetKind {
    type_id: TypeId,
    name: &'static str,
}

impl AssetKind {
    pub fn of<T: Asset>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::NAME,
        }
    }
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn is<T: Asset>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for AssetKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}
impl Eq for AssetKind {}

impl std::hash::Hash for AssetKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A scene as far as the loading layer is concerned: its name and the urls of
/// the assets it pulls in. Composing the scene is someone else's job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneAsset {
    pub name: String,
    pub dependencies: Vec<String>,
}

impl Asset for SceneAsset {
    const NAME: &'static str = "SceneAsset";
}
