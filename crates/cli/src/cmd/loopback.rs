use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{info, info_span};

use modguard_allowlist::SharedAllowlist;
use modguard_config::Config;
use modguard_core_types::PeerId;
use modguard_core_verifier::{Metrics, Params};
use modguard_engine::loopback::LoopbackTransport;
use modguard_engine::reporter::Reporter;
use modguard_engine::verifier::{Verifier, VerifierEvent, VerifierMsg};
use modguard_metrics::SharedRegistry;

use super::check::prepare_allowlist;
use super::hash::hash_dir;

/// Extra time granted on top of the client deadline before giving up.
const GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct LoopbackCmd {
    /// Directory holding the installed modules, overriding the configuration file
    #[clap(long, value_name = "DIR")]
    pub mods_dir: Option<PathBuf>,

    /// Number of clients to connect
    #[clap(long, default_value_t = 1)]
    pub clients: usize,

    /// Print the metrics in the Prometheus text format once done
    #[clap(long)]
    pub print_metrics: bool,
}

impl Default for LoopbackCmd {
    fn default() -> Self {
        Self {
            mods_dir: None,
            clients: 1,
            print_metrics: false,
        }
    }
}

/// Outcome of a loopback run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub verified: usize,
    pub rejected: usize,
}

impl LoopbackCmd {
    pub async fn run(&self, config_file: &Path, config: &Config) -> Result<()> {
        let summary = self.verify(config_file, config).await?;

        if self.print_metrics {
            print!("{}", SharedRegistry::global().encode()?);
        }

        if summary.rejected > 0 {
            return Err(eyre!(
                "{} of {} client(s) were rejected",
                summary.rejected,
                self.clients
            ));
        }

        Ok(())
    }

    /// Connect every client with the local inventory and collect the outcomes.
    pub async fn verify(&self, config_file: &Path, config: &Config) -> Result<Summary> {
        let mods_dir = super::mods_dir(self.mods_dir.as_deref(), config, config_file);
        let local = hash_dir(&mods_dir)?;
        let store = prepare_allowlist(config_file, config, &local)?;

        let span = info_span!("loopback");
        let transport = LoopbackTransport::new();

        let verifier = Verifier::spawn(
            Arc::new(transport.clone()),
            SharedAllowlist::new(store),
            Params {
                wait_duration: config.wait_duration(),
            },
            Metrics::register(SharedRegistry::global()),
            span.clone(),
        )
        .await?;

        transport.attach(verifier.clone());

        let (tx, mut events) = mpsc::unbounded_channel();
        verifier
            .cast(VerifierMsg::Subscribe(tx))
            .map_err(|e| eyre!("failed to subscribe to the verifier: {e}"))?;

        let mut clients = Vec::with_capacity(self.clients);

        for i in 0..self.clients {
            let peer = PeerId::new(format!("client-{i}"));

            let reporter = Reporter::spawn(
                Arc::new(transport.link(peer.clone())),
                local.clone(),
                config.max_frame_size(),
                span.clone(),
            )
            .await?;

            clients.push(transport.connect(peer, reporter)?);
        }

        info!(clients = self.clients, modules = local.len(), "Connected clients");

        let deadline = Instant::now() + config.wait_duration() + GRACE;
        let mut summary = Summary::default();

        while summary.verified + summary.rejected < self.clients {
            let event = timeout_at(deadline, events.recv())
                .await
                .map_err(|_| eyre!("timed out waiting for verification outcomes"))?
                .ok_or_else(|| eyre!("verifier stopped unexpectedly"))?;

            match event {
                VerifierEvent::Verified(peer) => {
                    summary.verified += 1;
                    println!("{peer}: verified");
                }

                VerifierEvent::Disconnected(peer, reason) => {
                    summary.rejected += 1;
                    println!("{peer}: disconnected");

                    for line in reason.message().lines() {
                        println!("  {line}");
                    }
                }
            }
        }

        verifier.stop(None);

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use modguard_config::{load_config, save_config};

    use super::*;

    #[tokio::test]
    async fn every_client_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let mods = dir.path().join("mods");
        std::fs::create_dir(&mods).unwrap();
        std::fs::write(mods.join("jei.jar"), b"jei").unwrap();
        std::fs::write(mods.join("create.jar"), b"create").unwrap();

        let config_file = dir.path().join("config.toml");
        save_config(&config_file, &Config::default()).unwrap();
        let config = load_config(&config_file, Some("MODGUARD_TEST_LOOPBACK")).unwrap();

        let cmd = LoopbackCmd {
            clients: 3,
            ..LoopbackCmd::default()
        };

        let summary = cmd.verify(&config_file, &config).await.unwrap();

        assert_eq!(
            summary,
            Summary {
                verified: 3,
                rejected: 0
            }
        );
    }

    #[tokio::test]
    async fn no_clients_means_nothing_to_wait_for() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("mods")).unwrap();

        let config_file = dir.path().join("config.toml");
        let config = Config::default();

        let cmd = LoopbackCmd {
            clients: 0,
            ..LoopbackCmd::default()
        };

        assert_eq!(
            cmd.verify(&config_file, &config).await.unwrap(),
            Summary::default()
        );
    }
}
