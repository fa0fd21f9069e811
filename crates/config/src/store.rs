use std::path::{Path, PathBuf};

use tracing::debug;

use modguard_allowlist::{AllowlistSink, PersistError};

use crate::{write_file, ConfigError};

const ALLOWLIST_KEY: &str = "mod_allowlist";

/// Persists the allowlist into the `mod_allowlist` key of a configuration file.
///
/// Every other key of the file is left as it is.
#[derive(Clone, Debug)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<toml::Table, ConfigError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        contents.parse().map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn write_allowlist(&self, entries: Vec<String>) -> Result<(), ConfigError> {
        let mut table = self.read_table()?;
        let count = entries.len();

        table.insert(
            ALLOWLIST_KEY.to_string(),
            toml::Value::Array(entries.into_iter().map(toml::Value::String).collect()),
        );

        write_file(&self.path, &toml::to_string_pretty(&table)?)?;

        debug!(path = %self.path.display(), entries = count, "Saved mod allowlist");

        Ok(())
    }
}

impl AllowlistSink for FileConfigStore {
    fn save(&mut self, entries: Vec<String>) -> Result<(), PersistError> {
        self.write_allowlist(entries).map_err(|e| match e {
            ConfigError::Io { source, .. } => PersistError::Io(source),
            e => PersistError::Serialize(e.to_string()),
        })
    }
}
