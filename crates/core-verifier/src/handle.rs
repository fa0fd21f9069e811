use std::fmt::Write as _;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use modguard_codec::{ChunkEnvelope, Progress, REPORT_REQUEST_FRAME};
use modguard_core_types::{Inventory, PeerId, Violation};

use crate::{Metrics, Session, State, Timeout};

const BRAND: &str = "ModGuard";

#[derive(Clone, Debug)]
pub enum Input {
    /// A peer joined the server
    PeerConnected(PeerId),

    /// A peer left the server
    PeerDisconnected(PeerId),

    /// A frame was received from a peer
    Frame(PeerId, Bytes),

    /// The deadline of a session has passed
    TimeoutElapsed(Timeout),

    /// Challenge every connected peer again, eg. after the allowlist was reloaded
    ReverifyAll,

    /// Forget every peer and session, eg. when the server restarts
    Reset,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Send a frame to a single peer
    SendRequest(PeerId, Bytes),

    /// Send a frame to every connected peer
    BroadcastRequest(Bytes),

    /// Start the deadline timer of a session
    ScheduleTimeout(Timeout, Duration),

    /// Stop the deadline timer of a session
    CancelTimeout(Timeout),

    /// Drop the connection to a peer
    Disconnect(PeerId, DisconnectReason),

    /// The peer's report matched the allowlist
    Verified(PeerId),
}

/// Why a peer is being disconnected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No complete report arrived before the deadline
    Timeout,

    /// The report does not match the allowlist
    Mismatch(Vec<Violation>),
}

impl DisconnectReason {
    /// The text shown to the disconnected player.
    pub fn message(&self) -> String {
        match self {
            Self::Timeout => format!(
                "{BRAND}\n\nCouldn't check your client's security.\nDid you install {BRAND}?"
            ),

            Self::Mismatch(violations) => {
                let mut message = format!(
                    "{BRAND}\nMod mismatch detected!\nIs your modpack the same version as the server's?:\n\n"
                );

                for violation in violations {
                    let _ = writeln!(message, "{}", violation.id);
                }

                message
            }
        }
    }
}

pub fn handle(state: &mut State, metrics: &Metrics, input: Input) -> Vec<Effect> {
    let mut effects = Vec::new();

    match input {
        Input::PeerConnected(peer) => on_peer_connected(state, metrics, &mut effects, peer),
        Input::PeerDisconnected(peer) => on_peer_disconnected(state, &mut effects, peer),
        Input::Frame(peer, bytes) => on_frame(state, metrics, &mut effects, peer, bytes),
        Input::TimeoutElapsed(timeout) => on_timeout_elapsed(state, metrics, &mut effects, timeout),
        Input::ReverifyAll => on_reverify_all(state, metrics, &mut effects),
        Input::Reset => on_reset(state, &mut effects),
    }

    metrics.active_sessions.set(state.active_sessions() as i64);

    effects
}

fn request_frame() -> Bytes {
    Bytes::from_static(&REPORT_REQUEST_FRAME)
}

/// Start a session for `peer` and arm its timer, tearing down any session it replaces.
fn start_session(state: &mut State, metrics: &Metrics, effects: &mut Vec<Effect>, peer: PeerId) {
    let (timeout, replaced) = state.start_session(peer);

    if let Some(replaced) = replaced {
        debug!(peer = %replaced.peer, session = %replaced.id, "Replacing pending session");
        effects.push(Effect::CancelTimeout(replaced.timeout()));
    }

    debug!(peer = %timeout.peer, session = %timeout.session, "Started session");

    metrics.sessions_started.inc();
    effects.push(Effect::ScheduleTimeout(timeout, state.params.wait_duration));
}

fn on_peer_connected(state: &mut State, metrics: &Metrics, effects: &mut Vec<Effect>, peer: PeerId) {
    state.connected.insert(peer.clone());

    start_session(state, metrics, effects, peer.clone());
    effects.push(Effect::SendRequest(peer, request_frame()));
}

fn on_peer_disconnected(state: &mut State, effects: &mut Vec<Effect>, peer: PeerId) {
    state.connected.remove(&peer);

    if let Some(session) = state.remove_session(&peer) {
        debug!(%peer, session = %session.id, "Peer left before completing its report");
        effects.push(Effect::CancelTimeout(session.timeout()));
    }
}

fn on_frame(
    state: &mut State,
    metrics: &Metrics,
    effects: &mut Vec<Effect>,
    peer: PeerId,
    bytes: Bytes,
) {
    metrics.frames_received.inc();

    let Some(session) = state.sessions.get_mut(&peer) else {
        debug!(%peer, "Ignoring frame from peer without a pending session");
        return;
    };

    let envelope = match ChunkEnvelope::decode(bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(%peer, "Dropping undecodable frame: {e}");
            metrics.frames_dropped.inc();
            return;
        }
    };

    let chunk_index = envelope.chunk_index;

    match session.reassembly.insert(envelope) {
        Ok(Progress::Complete) => {
            if let Some(session) = state.remove_session(&peer) {
                complete_session(state, metrics, effects, session);
            }
        }

        Ok(Progress::Incomplete { received, total }) => {
            debug!(%peer, chunk_index, received, ?total, "Received report chunk");
        }

        Err(e) => {
            warn!(%peer, chunk_index, "Dropping frame: {e}");
            metrics.frames_dropped.inc();
        }
    }
}

fn complete_session(
    state: &mut State,
    metrics: &Metrics,
    effects: &mut Vec<Effect>,
    session: Session,
) {
    effects.push(Effect::CancelTimeout(session.timeout()));

    let chunks = session.reassembly.received_chunks();
    metrics.report_chunks.observe(chunks as f64);

    let report = Inventory::from_wire_entries(session.reassembly.into_entries());
    let violations = state.allowlist.read(|allowlist| allowlist.check(&report));
    let peer = session.peer;

    if violations.is_empty() {
        info!(
            %peer,
            modules = report.len(),
            chunks,
            elapsed = ?session.started_at.elapsed(),
            "Peer verified"
        );

        metrics.sessions_verified.inc();
        effects.push(Effect::Verified(peer));
    } else {
        for violation in &violations {
            warn!(%peer, "Mod is mismatched: {violation}");
        }

        metrics.sessions_rejected.inc();
        disconnect(state, effects, peer, DisconnectReason::Mismatch(violations));
    }
}

fn on_timeout_elapsed(
    state: &mut State,
    metrics: &Metrics,
    effects: &mut Vec<Effect>,
    timeout: Timeout,
) {
    let is_live = state
        .session(&timeout.peer)
        .is_some_and(|session| session.id == timeout.session);

    if !is_live {
        debug!(peer = %timeout.peer, session = %timeout.session, "Ignoring stale timeout");
        return;
    }

    let Some(session) = state.remove_session(&timeout.peer) else {
        return;
    };

    warn!(
        peer = %session.peer,
        session = %session.id,
        received = session.reassembly.received_chunks(),
        total = ?session.reassembly.total_chunks(),
        "Peer did not send its mod list in time"
    );

    metrics.sessions_timed_out.inc();
    disconnect(state, effects, session.peer, DisconnectReason::Timeout);
}

fn disconnect(
    state: &mut State,
    effects: &mut Vec<Effect>,
    peer: PeerId,
    reason: DisconnectReason,
) {
    state.connected.remove(&peer);
    effects.push(Effect::Disconnect(peer, reason));
}

fn on_reverify_all(state: &mut State, metrics: &Metrics, effects: &mut Vec<Effect>) {
    if state.connected.is_empty() {
        return;
    }

    info!(peers = state.connected.len(), "Re-verifying all connected peers");

    let peers: Vec<_> = state.connected.iter().cloned().collect();
    for peer in peers {
        start_session(state, metrics, effects, peer);
    }

    effects.push(Effect::BroadcastRequest(request_frame()));
}

fn on_reset(state: &mut State, effects: &mut Vec<Effect>) {
    for session in state.reset() {
        effects.push(Effect::CancelTimeout(session.timeout()));
    }
}
