use std::collections::{HashMap, HashSet};

pub type BuildHasher = fxhash::FxBuildHasher;

pub type FxHashMap<K, V> = HashMap<K, V, BuildHasher>;
pub type FxHashSet<K> = HashSet<K, BuildHasher>;
