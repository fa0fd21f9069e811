use async_trait::async_trait;
use bytes::Bytes;

use modguard_core_types::PeerId;

/// Server side of the host's messaging channel.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a frame to a single peer.
    async fn send_to_peer(&self, peer: &PeerId, frame: Bytes) -> eyre::Result<()>;

    /// Send a frame to every connected peer.
    async fn send_to_all(&self, frame: Bytes) -> eyre::Result<()>;

    /// Drop the connection to a peer, showing it the given message.
    ///
    /// The host is expected to report the disconnection back to the verifier.
    async fn disconnect_peer(&self, peer: &PeerId, message: String) -> eyre::Result<()>;
}

/// Client side of the host's messaging channel.
#[async_trait]
pub trait ServerLink: Send + Sync + 'static {
    /// Send a frame to the server.
    async fn send_to_server(&self, frame: Bytes) -> eyre::Result<()>;
}
