//! ModGuard configuration.
//!
//! The configuration is read from a TOML file, with every key overridable from the
//! environment (eg. `MODGUARD__MAX_CLIENT_WAIT_DURATION=30`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

mod store;
mod utils;

pub use store::FileConfigStore;
pub use utils::{bool_from_anything, secs_from_anything};

/// Prefix of the environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "MODGUARD";

/// Upper bound of [`Config::max_client_wait_duration`], in seconds.
pub const MAX_WAIT_SECS: u64 = 120;

/// ModGuard configuration options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Learn the digests of the local modules into the allowlist when they differ
    #[serde(deserialize_with = "bool_from_anything")]
    pub auto_update_mod_allowlist: bool,

    /// Allowed modules, as `"id:hexdigest"` entries
    pub mod_allowlist: Vec<String>,

    /// How long a client has to send its mod list, in seconds (0 to 120)
    #[serde(deserialize_with = "secs_from_anything")]
    pub max_client_wait_duration: u64,

    /// Budget for the entries of a single report frame
    pub max_frame_size: ByteSize,

    /// Directory holding the installed modules
    pub mods_dir: PathBuf,

    /// Log configuration options
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_update_mod_allowlist: true,
            mod_allowlist: Vec::new(),
            max_client_wait_duration: 10,
            max_frame_size: ByteSize::b(1000),
            mods_dir: PathBuf::from("mods"),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_client_wait_duration > MAX_WAIT_SECS {
            return Err(ConfigError::WaitDurationOutOfRange(
                self.max_client_wait_duration,
            ));
        }

        if self.max_frame_size.as_u64() == 0 {
            return Err(ConfigError::EmptyFrameSize);
        }

        Ok(())
    }

    pub fn wait_duration(&self) -> Duration {
        Duration::from_secs(self.max_client_wait_duration)
    }

    pub fn max_frame_size(&self) -> usize {
        usize::try_from(self.max_frame_size.as_u64()).unwrap_or(usize::MAX)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            e => Err(format!("Invalid log level: {e}")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            e => Err(format!("Invalid log format: {e}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("max_client_wait_duration must be between 0 and 120 seconds, got {0}")]
    WaitDurationOutOfRange(u64),

    #[error("max_frame_size must not be zero")]
    EmptyFrameSize,
}

/// Parse the configuration file at `path`, applying the environment overrides
/// starting with `prefix` (default [`ENV_PREFIX`]).
pub fn load_config(path: impl AsRef<Path>, prefix: Option<&str>) -> Result<Config, ConfigError> {
    let config: Config = ::config::Config::builder()
        .add_source(::config::File::from(path.as_ref()))
        .add_source(::config::Environment::with_prefix(prefix.unwrap_or(ENV_PREFIX)).separator("__"))
        .build()?
        .try_deserialize()?;

    config.validate()?;

    Ok(config)
}

/// Write the configuration to `path`, creating its parent directory if needed.
pub fn save_config(path: impl AsRef<Path>, config: &Config) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let contents = toml::to_string_pretty(config)?;

    write_file(path, &contents)
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_owned(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    std::fs::write(path, contents).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert!(config.auto_update_mod_allowlist);
        assert!(config.mod_allowlist.is_empty());
        assert_eq!(config.wait_duration(), Duration::from_secs(10));
        assert_eq!(config.max_frame_size(), 1000);
        assert_eq!(config.logging.log_level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_survives_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modguard").join("config.toml");

        save_config(&path, &Config::default()).unwrap();
        let config = load_config(&path, Some("MODGUARD_TEST_ROUND_TRIP")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn missing_keys_take_their_defaults() {
        let config: Config = toml::from_str("max_client_wait_duration = 30").unwrap();

        assert_eq!(config.max_client_wait_duration, 30);
        assert!(config.auto_update_mod_allowlist);
        assert_eq!(config.mods_dir, PathBuf::from("mods"));
    }

    #[test]
    fn lenient_values() {
        let config: Config = toml::from_str(
            r#"
            auto_update_mod_allowlist = "false"
            max_client_wait_duration = "45"
            max_frame_size = "2 KiB"

            [logging]
            log_level = "debug"
            log_format = "json"
            "#,
        )
        .unwrap();

        assert!(!config.auto_update_mod_allowlist);
        assert_eq!(config.max_client_wait_duration, 45);
        assert_eq!(config.max_frame_size(), 2048);
        assert_eq!(config.logging.log_level, LogLevel::Debug);
        assert_eq!(config.logging.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_wait_duration_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_client_wait_duration = 121").unwrap();

        let err = load_config(&path, Some("MODGUARD_TEST_RANGE")).unwrap_err();
        assert!(matches!(err, ConfigError::WaitDurationOutOfRange(121)));

        std::fs::write(&path, "max_client_wait_duration = -1").unwrap();
        assert!(load_config(&path, Some("MODGUARD_TEST_RANGE")).is_err());
    }

    #[test]
    fn errors_name_the_offending_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::create_dir(&path).unwrap();

        // A directory cannot be written as a file
        let err = save_config(&path, &Config::default()).unwrap_err();

        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().starts_with(&format!("failed to access {}: ", path.display())));
    }

    #[test]
    fn environment_overrides_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_client_wait_duration = 5").unwrap();

        std::env::set_var("MODGUARD_TEST_ENV__MAX_CLIENT_WAIT_DURATION", "20");
        std::env::set_var("MODGUARD_TEST_ENV__AUTO_UPDATE_MOD_ALLOWLIST", "false");

        let config = load_config(&path, Some("MODGUARD_TEST_ENV")).unwrap();

        assert_eq!(config.max_client_wait_duration, 20);
        assert!(!config.auto_update_mod_allowlist);
    }

    #[test]
    fn parses_log_settings_from_strings() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
