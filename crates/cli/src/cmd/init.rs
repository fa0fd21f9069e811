use std::path::Path;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use tracing::info;

use modguard_config::{save_config, Config};

#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct InitCmd {
    /// Overwrite an existing configuration file
    #[clap(long)]
    pub overwrite: bool,
}

impl InitCmd {
    pub fn run(&self, config_file: &Path) -> Result<()> {
        if config_file.exists() && !self.overwrite {
            return Err(eyre!(
                "Configuration file already exists at {}, use --overwrite to replace it",
                config_file.display()
            ));
        }

        save_config(config_file, &Config::default())?;

        info!(file = %config_file.display(), "Wrote default configuration");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_overwrite_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        InitCmd::default().run(&path).unwrap();
        assert!(path.exists());

        assert!(InitCmd::default().run(&path).is_err());
        assert!(InitCmd { overwrite: true }.run(&path).is_ok());
    }
}
