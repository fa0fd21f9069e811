use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use modguard_core_types::{Inventory, ModId, ReportedHash};

use crate::ContentHasher;

/// Hash every module once and build the local inventory.
///
/// Modules whose root path does not exist are skipped. Modules that fail to hash are
/// recorded as [`ReportedHash::Unverifiable`] so they can never pass a check.
pub fn scan<I, P>(hasher: &ContentHasher, modules: I) -> Inventory
where
    I: IntoIterator<Item = (ModId, P)>,
    P: AsRef<Path>,
{
    let mut inventory = Inventory::new();

    for (id, path) in modules {
        let path = path.as_ref();

        if !path.exists() {
            debug!(%id, path = %path.display(), "Module path does not exist, skipping");
            continue;
        }

        let hash = match hasher.digest(path) {
            Ok(digest) => ReportedHash::Known(digest),
            Err(e) => {
                error!(%id, "Error while hashing module: {e}");
                ReportedHash::Unverifiable
            }
        };

        debug!(%id, path = %path.display(), %hash, "Found module");

        inventory.insert(id, hash);
    }

    inventory
}

/// List the modules installed in a mods directory.
///
/// Every direct child is one module. The id is the file stem for files and the
/// name for directories. Hidden entries are ignored. Results are sorted by id.
pub fn discover(dir: impl AsRef<Path>) -> io::Result<Vec<(ModId, PathBuf)>> {
    let mut modules = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            debug!(path = %path.display(), "Skipping module with non UTF-8 name");
            continue;
        };

        if name.starts_with('.') {
            continue;
        }

        let id = if entry.file_type()?.is_dir() {
            name
        } else {
            path.file_stem().and_then(|s| s.to_str()).unwrap_or(name)
        };

        modules.push((ModId::new(id), path.clone()));
    }

    modules.sort_by(|(a, _), (b, _)| a.cmp(b));

    Ok(modules)
}
