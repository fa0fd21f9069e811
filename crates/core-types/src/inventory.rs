use std::collections::btree_map::{self, BTreeMap};

use crate::{ModId, ReportedHash};

/// A single module together with the hash computed for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Module identifier
    pub id: ModId,

    /// Hash of the module's content
    pub hash: ReportedHash,
}

impl ModuleRecord {
    /// Create a new record.
    pub fn new(id: impl Into<ModId>, hash: impl Into<ReportedHash>) -> Self {
        Self {
            id: id.into(),
            hash: hash.into(),
        }
    }
}

/// An ordered mapping of module id to reported hash.
///
/// Used both for the set of modules installed in the local process and for the
/// report assembled from a peer. Iteration order is lexicographic by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    modules: BTreeMap<ModId, ReportedHash>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module, replacing any previous hash for the same id.
    pub fn insert(&mut self, id: impl Into<ModId>, hash: impl Into<ReportedHash>) {
        self.modules.insert(id.into(), hash.into());
    }

    /// Look up the hash reported for a module.
    pub fn get(&self, id: &str) -> Option<&ReportedHash> {
        self.modules.get(id)
    }

    /// Whether the inventory contains the given module.
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the inventory is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterate over the modules in id order.
    pub fn iter(&self) -> btree_map::Iter<'_, ModId, ReportedHash> {
        self.modules.iter()
    }

    /// Render the inventory as the `id → digest string` mapping carried on the wire.
    pub fn to_wire_entries(&self) -> BTreeMap<String, String> {
        self.modules
            .iter()
            .map(|(id, hash)| (id.to_string(), hash.to_string()))
            .collect()
    }

    /// Rebuild an inventory from a wire mapping.
    ///
    /// Digest strings that do not parse are recorded as unverifiable.
    pub fn from_wire_entries(entries: BTreeMap<String, String>) -> Self {
        entries
            .into_iter()
            .map(|(id, hash)| (ModId::from(id), ReportedHash::parse_lossy(&hash)))
            .collect()
    }
}

impl FromIterator<(ModId, ReportedHash)> for Inventory {
    fn from_iter<I: IntoIterator<Item = (ModId, ReportedHash)>>(iter: I) -> Self {
        Self {
            modules: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<ModuleRecord> for Inventory {
    fn from_iter<I: IntoIterator<Item = ModuleRecord>>(iter: I) -> Self {
        iter.into_iter().map(|r| (r.id, r.hash)).collect()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = (&'a ModId, &'a ReportedHash);
    type IntoIter = btree_map::Iter<'a, ModId, ReportedHash>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
