use std::sync::{Arc, RwLock};

use crate::AllowlistStore;

/// An allowlist shared between the verifier and the configuration reloader.
///
/// Readers share the lock; a reload or auto-update takes it exclusively.
#[derive(Clone, Debug, Default)]
pub struct SharedAllowlist(Arc<RwLock<AllowlistStore>>);

impl SharedAllowlist {
    pub fn new(store: AllowlistStore) -> Self {
        Self(Arc::new(RwLock::new(store)))
    }

    pub fn read<A>(&self, f: impl FnOnce(&AllowlistStore) -> A) -> A {
        f(&self.0.read().expect("poisoned lock"))
    }

    pub fn write<A>(&self, f: impl FnOnce(&mut AllowlistStore) -> A) -> A {
        f(&mut self.0.write().expect("poisoned lock"))
    }

    /// Swap in a freshly loaded store, returning the previous one.
    pub fn replace(&self, store: AllowlistStore) -> AllowlistStore {
        self.write(|current| std::mem::replace(current, store))
    }
}

impl From<AllowlistStore> for SharedAllowlist {
    fn from(store: AllowlistStore) -> Self {
        Self::new(store)
    }
}

#[cfg(test)]
mod tests {
    use modguard_core_types::Digest;

    use super::*;

    #[test]
    fn replace_is_seen_by_every_handle() {
        let shared = SharedAllowlist::new(AllowlistStore::new(false));
        let reader = shared.clone();

        let mut reloaded = AllowlistStore::new(true);
        reloaded.insert("jei", Digest::from_bytes([1; 32]));

        let previous = shared.replace(reloaded);

        assert!(previous.is_empty());
        assert_eq!(reader.read(|store| store.len()), 1);
        assert!(reader.read(|store| store.auto_update()));
    }
}
