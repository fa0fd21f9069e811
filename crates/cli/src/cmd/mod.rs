pub mod check;
pub mod hash;
pub mod init;
pub mod loopback;

use std::path::{Path, PathBuf};

use modguard_config::Config;

/// Resolve the mods directory: an explicit path wins over the configured one, and a
/// relative configured path is taken relative to the configuration file.
pub fn mods_dir(explicit: Option<&Path>, config: &Config, config_file: &Path) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    if config.mods_dir.is_absolute() {
        return config.mods_dir.clone();
    }

    config_file
        .parent()
        .map(|parent| parent.join(&config.mods_dir))
        .unwrap_or_else(|| config.mods_dir.clone())
}
