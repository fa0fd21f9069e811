//! Command-line arguments.
//!
//! Every subcommand reads the configuration file, by default
//! `$HOME/.modguard/config.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use directories::BaseDirs;

use modguard_config::{LogFormat, LogLevel};

use crate::cmd::check::CheckCmd;
use crate::cmd::hash::HashCmd;
use crate::cmd::init::InitCmd;
use crate::cmd::loopback::LoopbackCmd;

const APP_FOLDER: &str = ".modguard";
const CONFIG_FILE: &str = "config.toml";

#[derive(Parser, Clone, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file. Defaults to `$HOME/.modguard/config.toml`
    #[arg(long, global = true, env = "MODGUARD_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level, overriding the configuration file (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log format, overriding the configuration file (plain, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init(InitCmd),

    /// Print the allowlist entries of every module in a directory
    Hash(HashCmd),

    /// Check the installed modules against the allowlist
    Check(CheckCmd),

    /// Run the verification handshake in-process against the installed modules
    Loopback(LoopbackCmd),
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Init(InitCmd::default())
    }
}

impl Args {
    pub fn new() -> Self {
        Args::parse()
    }

    /// The configuration file to use.
    pub fn get_config_file_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(get_home_dir()?.join(APP_FOLDER).join(CONFIG_FILE)),
        }
    }
}

fn get_home_dir() -> Result<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| eyre!("could not determine the home directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_the_subcommand() {
        let args = Args::parse_from([
            "modguard",
            "check",
            "--config",
            "/tmp/modguard.toml",
            "--log-level",
            "debug",
        ]);

        assert_eq!(args.config, Some(PathBuf::from("/tmp/modguard.toml")));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(matches!(args.command, Commands::Check(_)));
        assert_eq!(
            args.get_config_file_path().unwrap(),
            PathBuf::from("/tmp/modguard.toml")
        );
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Args::try_parse_from(["modguard", "--log-format", "xml", "init"]).is_err());
    }

    #[test]
    fn default_config_lives_in_the_home_directory() {
        let args = Args::parse_from(["modguard", "init"]);
        let path = args.get_config_file_path().unwrap();

        assert!(path.ends_with(".modguard/config.toml"));
    }
}
