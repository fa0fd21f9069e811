use std::collections::btree_map::{self, BTreeMap};

use tracing::{error, info, warn};

use modguard_core_types::{Digest, Inventory, ModId, ReportedHash, Violation, ViolationKind};

use crate::entry::{parse_entry, render_entry, MalformedEntry};
use crate::sink::{AllowlistSink, PersistError};

/// In-memory allowlist of module id to expected digest.
#[derive(Clone, Debug, Default)]
pub struct AllowlistStore {
    entries: BTreeMap<ModId, Digest>,
    violations: Vec<Violation>,
    auto_update: bool,
}

impl AllowlistStore {
    pub fn new(auto_update: bool) -> Self {
        Self {
            auto_update,
            ..Default::default()
        }
    }

    /// Whether unseen or changed local modules are learned automatically.
    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
    }

    /// Replace the contents of the store with the given `"id:hexdigest"` lines.
    ///
    /// Malformed lines are logged and skipped; they are returned to the caller.
    /// When an id appears more than once, the last line wins.
    pub fn load<I, S>(&mut self, raw_entries: I) -> Vec<MalformedEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entries.clear();
        self.violations.clear();

        let mut malformed = Vec::new();

        for entry in raw_entries {
            match parse_entry(entry.as_ref()) {
                Ok((id, digest)) => {
                    self.entries.insert(id, digest);
                }
                Err(e) => {
                    error!("{e}");
                    malformed.push(e);
                }
            }
        }

        malformed
    }

    pub fn get(&self, id: &str) -> Option<&Digest> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: impl Into<ModId>, digest: Digest) -> Option<Digest> {
        self.entries.insert(id.into(), digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ModId, Digest> {
        self.entries.iter()
    }

    /// Compare a set of modules against the allowlist, in inventory order.
    ///
    /// Modules only present in the allowlist are never flagged.
    pub fn check(&self, modules: &Inventory) -> Vec<Violation> {
        modules
            .iter()
            .filter_map(|(id, hash)| {
                let kind = match (hash, self.entries.get(id)) {
                    (ReportedHash::Unverifiable, _) => ViolationKind::Unverifiable,
                    (ReportedHash::Known(_), None) => ViolationKind::Missing,
                    (ReportedHash::Known(actual), Some(expected)) if actual != expected => {
                        ViolationKind::Mismatch {
                            expected: *expected,
                        }
                    }
                    (ReportedHash::Known(_), Some(_)) => return None,
                };

                Some(Violation::new(id.clone(), kind))
            })
            .collect()
    }

    /// Compare the local inventory against the allowlist and record the violations.
    pub fn reconcile(&mut self, local: &Inventory) -> &[Violation] {
        self.violations = self.check(local);

        for violation in &self.violations {
            let current = local.get(violation.id.as_str());
            let configured = self.entries.get(violation.id.as_str());

            warn!(
                id = %violation.id,
                current = %DisplayOpt(current),
                configured = %DisplayOpt(configured),
                "Mod is mismatched"
            );
        }

        &self.violations
    }

    /// The violations found by the last [`reconcile`](Self::reconcile).
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Learn the local digest of every violated module and persist the result.
    ///
    /// Does nothing unless auto-update is enabled. Unverifiable modules are never
    /// learned. Returns whether the store changed.
    pub fn auto_apply(
        &mut self,
        local: &Inventory,
        sink: &mut impl AllowlistSink,
    ) -> Result<bool, PersistError> {
        if !self.auto_update || self.violations.is_empty() {
            return Ok(false);
        }

        info!("Automatically updating mod allowlist");
        info!("Set `auto_update_mod_allowlist = false` in the config to disable");

        let mut changed = false;

        for violation in &self.violations {
            match local.get(violation.id.as_str()) {
                Some(ReportedHash::Known(digest)) => {
                    self.entries.insert(violation.id.clone(), *digest);
                    changed = true;
                }
                Some(ReportedHash::Unverifiable) => {
                    warn!(id = %violation.id, "Not learning unverifiable mod");
                }
                None => {}
            }
        }

        if changed {
            self.persist(sink)?;
        }

        Ok(changed)
    }

    /// Render the allowlist as `"id:hexdigest"` lines in id order.
    pub fn to_entries(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(id, digest)| render_entry(id, digest))
            .collect()
    }

    /// Hand the allowlist to the sink.
    pub fn persist(&self, sink: &mut impl AllowlistSink) -> Result<(), PersistError> {
        sink.save(self.to_entries())?;
        info!(entries = self.entries.len(), "Updated mod allowlist");
        Ok(())
    }
}

struct DisplayOpt<T>(Option<T>);

impl<T: std::fmt::Display> std::fmt::Display for DisplayOpt<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn digest(byte: u8) -> Digest {
        Digest::from_bytes([byte; 32])
    }

    fn entry(id: &str, byte: u8) -> String {
        format!("{id}:{}", digest(byte))
    }

    fn inventory(modules: &[(&str, u8)]) -> Inventory {
        modules
            .iter()
            .map(|&(id, byte)| (ModId::from(id), ReportedHash::Known(digest(byte))))
            .collect()
    }

    fn ids(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.id.as_str()).collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        saves: Vec<Vec<String>>,
    }

    impl AllowlistSink for RecordingSink {
        fn save(&mut self, entries: Vec<String>) -> Result<(), PersistError> {
            self.saves.push(entries);
            Ok(())
        }
    }

    #[test]
    fn load_skips_malformed_entries() {
        let mut store = AllowlistStore::new(false);
        let malformed = store.load([
            entry("a", 1),
            "garbage".to_string(),
            "b:c:d".to_string(),
            entry("b", 2),
        ]);

        assert_eq!(malformed.len(), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a"), Some(&digest(1)));
    }

    #[test]
    fn load_is_last_write_wins() {
        let mut store = AllowlistStore::new(false);
        store.load([entry("a", 1), entry("a", 2)]);

        assert_eq!(store.get("a"), Some(&digest(2)));
    }

    #[test]
    fn reconcile_flags_unknown_modules() {
        let mut store = AllowlistStore::new(false);
        store.load([entry("A", 1)]);

        let local = inventory(&[("A", 1), ("B", 2)]);
        assert_eq!(ids(store.reconcile(&local)), ["B"]);
        assert_eq!(store.violations()[0].kind, ViolationKind::Missing);

        store.load([entry("A", 1), entry("B", 2)]);
        assert!(store.reconcile(&local).is_empty());
    }

    #[test]
    fn reconcile_flags_mismatches_and_ignores_removed_modules() {
        let mut store = AllowlistStore::new(false);
        store.load([entry("A", 1), entry("B", 2), entry("gone", 3)]);

        let local = inventory(&[("A", 9), ("B", 2)]);
        let violations = store.reconcile(&local);

        assert_eq!(
            violations,
            [Violation::new(
                "A",
                ViolationKind::Mismatch {
                    expected: digest(1)
                }
            )]
        );
    }

    #[test]
    fn digest_comparison_ignores_case() {
        let mut store = AllowlistStore::new(false);
        store.load([format!("A:{}", digest(0xab).to_hex().to_uppercase())]);

        assert!(store.reconcile(&inventory(&[("A", 0xab)])).is_empty());
    }

    #[test]
    fn unverifiable_modules_always_violate() {
        let mut store = AllowlistStore::new(true);
        store.load([entry("A", 1)]);

        let mut local = Inventory::new();
        local.insert("A", ReportedHash::Unverifiable);

        let mut sink = RecordingSink::default();
        assert_eq!(
            store.reconcile(&local)[0].kind,
            ViolationKind::Unverifiable
        );
        assert!(!store.auto_apply(&local, &mut sink).unwrap());
        assert!(sink.saves.is_empty());
        assert_eq!(store.get("A"), Some(&digest(1)));
    }

    #[test]
    fn auto_update_learns_and_persists() {
        let mut store = AllowlistStore::new(true);
        store.load([entry("A", 1)]);

        let local = inventory(&[("A", 1), ("C", 3)]);
        assert_eq!(ids(store.reconcile(&local)), ["C"]);

        let mut sink = RecordingSink::default();
        assert!(store.auto_apply(&local, &mut sink).unwrap());

        assert_eq!(store.get("C"), Some(&digest(3)));
        assert_eq!(sink.saves, vec![vec![entry("A", 1), entry("C", 3)]]);
    }

    #[test]
    fn auto_update_disabled_leaves_store_unchanged() {
        let mut store = AllowlistStore::new(false);
        store.load([entry("A", 1)]);

        let local = inventory(&[("A", 1), ("C", 3)]);
        assert_eq!(ids(store.reconcile(&local)), ["C"]);

        let mut sink = RecordingSink::default();
        assert!(!store.auto_apply(&local, &mut sink).unwrap());

        assert_eq!(store.get("C"), None);
        assert!(sink.saves.is_empty());
        assert_eq!(ids(store.violations()), ["C"]);
    }

    #[test]
    fn persist_renders_entries_in_id_order() {
        let mut store = AllowlistStore::new(false);
        store.insert("zeta", digest(1));
        store.insert("alpha", digest(2));

        let mut saved = Vec::new();
        store
            .persist(&mut |entries: Vec<String>| {
                saved = entries;
                Ok(())
            })
            .unwrap();

        assert_eq!(saved, vec![entry("alpha", 2), entry("zeta", 1)]);
    }
}
