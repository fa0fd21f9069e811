use color_eyre::eyre::Result;
use tracing::{debug, warn};

use modguard_config::{load_config, Config};

use args::{Args, Commands};

mod args;
mod cmd;
mod logging;

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::new();
    let config_file = args.get_config_file_path()?;

    if let Commands::Init(cmd) = &args.command {
        logging::init(
            args.log_level.unwrap_or_default(),
            args.log_format.unwrap_or_default(),
        );

        return cmd.run(&config_file);
    }

    let config = if config_file.exists() {
        load_config(&config_file, None)?
    } else {
        Config::default()
    };

    logging::init(
        args.log_level.unwrap_or(config.logging.log_level),
        args.log_format.unwrap_or(config.logging.log_format),
    );

    if !config_file.exists() {
        warn!(file = %config_file.display(), "Configuration file not found, using defaults");
    }

    debug!("Command-line parameters: {args:?}");

    match &args.command {
        Commands::Init(_) => Ok(()),
        Commands::Hash(cmd) => cmd.run(),
        Commands::Check(cmd) => cmd.run(&config_file, &config),
        Commands::Loopback(cmd) => cmd.run(&config_file, &config).await,
    }
}
