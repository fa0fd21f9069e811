use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use tracing::{info, warn};

use modguard_allowlist::AllowlistStore;
use modguard_config::{Config, FileConfigStore};
use modguard_core_types::Inventory;

use super::hash::hash_dir;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct CheckCmd {
    /// Directory holding the installed modules, overriding the configuration file
    #[clap(long, value_name = "DIR")]
    pub mods_dir: Option<PathBuf>,
}

impl CheckCmd {
    pub fn run(&self, config_file: &Path, config: &Config) -> Result<()> {
        let mods_dir = super::mods_dir(self.mods_dir.as_deref(), config, config_file);
        let local = hash_dir(&mods_dir)?;

        info!(dir = %mods_dir.display(), modules = local.len(), "Hashed local mods");

        prepare_allowlist(config_file, config, &local).map(|_| ())
    }
}

/// Load the configured allowlist and reconcile it with the local mods.
///
/// With auto-update enabled, mismatches are learned and written back to the
/// configuration file. Otherwise they are an error.
pub fn prepare_allowlist(
    config_file: &Path,
    config: &Config,
    local: &Inventory,
) -> Result<AllowlistStore> {
    let mut store = AllowlistStore::new(config.auto_update_mod_allowlist);

    let malformed = store.load(&config.mod_allowlist);
    if !malformed.is_empty() {
        warn!(count = malformed.len(), "Skipped malformed allowlist entries");
    }

    let violations = store.reconcile(local).len();

    if violations == 0 {
        info!(entries = store.len(), "All mods match the allowlist");
        return Ok(store);
    }

    if !store.auto_update() {
        return Err(eyre!("{violations} mod(s) do not match the allowlist"));
    }

    store.auto_apply(local, &mut FileConfigStore::new(config_file))?;

    Ok(store)
}
