use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use eyre::eyre;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use modguard_core_types::PeerId;

use crate::reporter::{ReporterMsg, ReporterRef};
use crate::transport::{ServerLink, Transport};
use crate::verifier::{VerifierMsg, VerifierRef};

struct Peer {
    reporter: ReporterRef,
    on_disconnect: oneshot::Sender<String>,
}

#[derive(Default)]
struct Inner {
    verifier: Option<VerifierRef>,
    peers: BTreeMap<PeerId, Peer>,
}

/// In-process channel connecting one verifier to any number of reporters.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    inner: Arc<Mutex<Inner>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<A>(&self, f: impl FnOnce(&mut Inner) -> A) -> A {
        f(&mut self.inner.lock().expect("poisoned lock"))
    }

    /// Route frames and connection events to the given verifier.
    pub fn attach(&self, verifier: VerifierRef) {
        self.with_inner(|inner| inner.verifier = Some(verifier));
    }

    /// The link a reporter for `peer` uses to reach the verifier.
    pub fn link(&self, peer: PeerId) -> LoopbackLink {
        LoopbackLink {
            peer,
            transport: self.clone(),
        }
    }

    /// Connect a peer served by `reporter`, as if it just joined the server.
    pub fn connect(&self, peer: PeerId, reporter: ReporterRef) -> eyre::Result<LoopbackClient> {
        let (tx, rx) = oneshot::channel();

        self.with_inner(|inner| {
            let verifier = inner
                .verifier
                .clone()
                .ok_or_else(|| eyre!("no verifier attached"))?;

            inner.peers.insert(
                peer.clone(),
                Peer {
                    reporter,
                    on_disconnect: tx,
                },
            );

            verifier
                .cast(VerifierMsg::PeerConnected(peer.clone()))
                .map_err(|e| eyre!("failed to reach verifier: {e}"))?;

            Ok::<_, eyre::Report>(())
        })?;

        Ok(LoopbackClient {
            peer,
            disconnected: rx,
        })
    }

    /// Disconnect a peer on its own initiative.
    pub fn leave(&self, peer: &PeerId) -> eyre::Result<()> {
        self.with_inner(|inner| {
            inner.peers.remove(peer);

            if let Some(verifier) = &inner.verifier {
                verifier
                    .cast(VerifierMsg::PeerDisconnected(peer.clone()))
                    .map_err(|e| eyre!("failed to reach verifier: {e}"))?;
            }

            Ok(())
        })
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.with_inner(|inner| inner.peers.contains_key(peer))
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send_to_peer(&self, peer: &PeerId, frame: Bytes) -> eyre::Result<()> {
        self.with_inner(|inner| {
            let target = inner
                .peers
                .get(peer)
                .ok_or_else(|| eyre!("unknown peer {peer}"))?;

            target
                .reporter
                .cast(ReporterMsg::FrameReceived(frame))
                .map_err(|e| eyre!("failed to reach {peer}: {e}"))?;

            Ok(())
        })
    }

    async fn send_to_all(&self, frame: Bytes) -> eyre::Result<()> {
        self.with_inner(|inner| {
            for (peer, target) in &inner.peers {
                if let Err(e) = target.reporter.cast(ReporterMsg::FrameReceived(frame.clone())) {
                    warn!(%peer, "Failed to deliver frame: {e}");
                }
            }
        });

        Ok(())
    }

    async fn disconnect_peer(&self, peer: &PeerId, message: String) -> eyre::Result<()> {
        self.with_inner(|inner| {
            let Some(target) = inner.peers.remove(peer) else {
                debug!(%peer, "Peer already gone");
                return Ok(());
            };

            // The client may have stopped listening
            let _ = target.on_disconnect.send(message);

            if let Some(verifier) = &inner.verifier {
                verifier
                    .cast(VerifierMsg::PeerDisconnected(peer.clone()))
                    .map_err(|e| eyre!("failed to reach verifier: {e}"))?;
            }

            Ok(())
        })
    }
}

/// Client end of a [`LoopbackTransport`] connection.
pub struct LoopbackClient {
    peer: PeerId,
    disconnected: oneshot::Receiver<String>,
}

impl LoopbackClient {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Wait until the server drops the connection, returning the message shown to the player.
    ///
    /// Returns `None` if the transport went away without disconnecting the peer.
    pub async fn disconnected(&mut self) -> Option<String> {
        (&mut self.disconnected).await.ok()
    }

    /// The disconnect message, if the server already dropped the connection.
    pub fn try_disconnected(&mut self) -> Option<String> {
        self.disconnected.try_recv().ok()
    }
}

/// Sends a reporter's frames to the verifier of a [`LoopbackTransport`].
#[derive(Clone)]
pub struct LoopbackLink {
    peer: PeerId,
    transport: LoopbackTransport,
}

#[async_trait]
impl ServerLink for LoopbackLink {
    async fn send_to_server(&self, frame: Bytes) -> eyre::Result<()> {
        self.transport.with_inner(|inner| {
            let verifier = inner
                .verifier
                .as_ref()
                .ok_or_else(|| eyre!("no verifier attached"))?;

            verifier
                .cast(VerifierMsg::FrameReceived {
                    from: self.peer.clone(),
                    bytes: frame,
                })
                .map_err(|e| eyre!("failed to reach verifier: {e}"))?;

            Ok(())
        })
    }
}
