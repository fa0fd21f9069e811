use tracing_subscriber::EnvFilter;

use modguard_config::{LogFormat, LogLevel};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init(log_level: LogLevel, log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match log_format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn default_directive(log_level: LogLevel) -> String {
    // Keep dependencies quiet below the warning level
    let level = log_level.as_str();
    format!("warn,modguard={level},modguard_allowlist={level},modguard_config={level},modguard_core_verifier={level},modguard_engine={level},modguard_hasher={level}")
}
