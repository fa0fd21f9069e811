use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use modguard_allowlist::SharedAllowlist;
use modguard_core_types::PeerId;
use modguard_core_verifier::{
    self as core, DisconnectReason, Effect, Input, Metrics, Params, Timeout,
};

use crate::transport::Transport;
use crate::util::timers::{TimeoutElapsed, TimerScheduler};

type Timers = TimerScheduler<Timeout, Msg>;

pub type VerifierRef = ActorRef<Msg>;
pub type VerifierMsg = Msg;

/// Outcome of a verification, reported to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifierEvent {
    /// The peer's report matched the allowlist
    Verified(PeerId),

    /// The peer was disconnected
    Disconnected(PeerId, DisconnectReason),
}

/// Snapshot of the verifier state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Number of connected peers
    pub connected: usize,

    /// Peers that still owe us their report
    pub pending: Vec<PeerId>,

    /// Number of armed deadline timers
    pub active_timers: usize,
}

pub enum Msg {
    /// A peer joined the server
    PeerConnected(PeerId),

    /// A peer left the server
    PeerDisconnected(PeerId),

    /// A frame was received from a peer
    FrameReceived { from: PeerId, bytes: Bytes },

    /// Challenge every connected peer again
    ReverifyAll,

    /// Forget every peer and session
    Reset,

    /// Subscribe to verification outcomes
    Subscribe(mpsc::UnboundedSender<VerifierEvent>),

    /// Request a snapshot of the verifier state
    GetStatus(RpcReplyPort<Status>),

    // Internal message
    #[doc(hidden)]
    TimeoutElapsed(TimeoutElapsed<Timeout>),
}

impl From<TimeoutElapsed<Timeout>> for Msg {
    fn from(elapsed: TimeoutElapsed<Timeout>) -> Self {
        Msg::TimeoutElapsed(elapsed)
    }
}

pub struct State {
    /// The state of the verification state machine
    core: core::State,

    /// Scheduler for the session deadlines
    timers: Timers,

    /// Channels notified of every outcome
    subscribers: Vec<mpsc::UnboundedSender<VerifierEvent>>,
}

/// Server side of the protocol: challenges peers and checks their reports.
pub struct Verifier {
    transport: Arc<dyn Transport>,
    allowlist: SharedAllowlist,
    params: Params,
    metrics: Metrics,
    span: tracing::Span,
}

impl Verifier {
    pub fn new(
        transport: Arc<dyn Transport>,
        allowlist: SharedAllowlist,
        params: Params,
        metrics: Metrics,
        span: tracing::Span,
    ) -> Self {
        Self {
            transport,
            allowlist,
            params,
            metrics,
            span,
        }
    }

    pub async fn spawn(
        transport: Arc<dyn Transport>,
        allowlist: SharedAllowlist,
        params: Params,
        metrics: Metrics,
        span: tracing::Span,
    ) -> Result<VerifierRef, ractor::SpawnErr> {
        let actor = Self::new(transport, allowlist, params, metrics, span);
        let (actor_ref, _) = Actor::spawn(None, actor, ()).await?;
        Ok(actor_ref)
    }

    async fn process_input(
        &self,
        state: &mut State,
        input: Input,
    ) -> Result<(), ActorProcessingErr> {
        let effects = core::handle(&mut state.core, &self.metrics, input);

        for effect in effects {
            self.handle_effect(state, effect).await?;
        }

        Ok(())
    }

    async fn handle_effect(
        &self,
        state: &mut State,
        effect: Effect,
    ) -> Result<(), ActorProcessingErr> {
        match effect {
            Effect::SendRequest(peer, frame) => {
                if let Err(e) = self.transport.send_to_peer(&peer, frame).await {
                    warn!(%peer, "Failed to send report request: {e}");
                }
            }

            Effect::BroadcastRequest(frame) => {
                if let Err(e) = self.transport.send_to_all(frame).await {
                    warn!("Failed to broadcast report request: {e}");
                }
            }

            Effect::ScheduleTimeout(timeout, duration) => {
                state.timers.start_timer(timeout, duration);
            }

            Effect::CancelTimeout(timeout) => {
                state.timers.cancel(&timeout);
            }

            Effect::Disconnect(peer, reason) => {
                if let Err(e) = self
                    .transport
                    .disconnect_peer(&peer, reason.message())
                    .await
                {
                    error!(%peer, "Failed to disconnect peer: {e}");
                }

                notify(state, VerifierEvent::Disconnected(peer, reason));
            }

            Effect::Verified(peer) => {
                notify(state, VerifierEvent::Verified(peer));
            }
        }

        Ok(())
    }

    async fn handle_msg(
        &self,
        msg: Msg,
        state: &mut State,
    ) -> Result<(), ActorProcessingErr> {
        match msg {
            Msg::PeerConnected(peer) => {
                info!(%peer, "Peer connected, requesting its mod list");
                self.process_input(state, Input::PeerConnected(peer)).await
            }

            Msg::PeerDisconnected(peer) => {
                debug!(%peer, "Peer disconnected");
                self.process_input(state, Input::PeerDisconnected(peer)).await
            }

            Msg::FrameReceived { from, bytes } => {
                self.process_input(state, Input::Frame(from, bytes)).await
            }

            Msg::ReverifyAll => self.process_input(state, Input::ReverifyAll).await,

            Msg::Reset => self.process_input(state, Input::Reset).await,

            Msg::Subscribe(subscriber) => {
                state.subscribers.push(subscriber);
                Ok(())
            }

            Msg::GetStatus(reply) => {
                let status = Status {
                    connected: state.core.connected.len(),
                    pending: state.core.sessions.keys().cloned().collect(),
                    active_timers: state.timers.active_timers(),
                };

                if let Err(e) = reply.send(status) {
                    error!("Failed to reply with status: {e}");
                }

                Ok(())
            }

            Msg::TimeoutElapsed(elapsed) => {
                let Some(timeout) = state.timers.intercept_timer_msg(elapsed) else {
                    // Timer was cancelled or replaced, ignore
                    return Ok(());
                };

                self.process_input(state, Input::TimeoutElapsed(timeout))
                    .await
            }
        }
    }
}

fn notify(state: &mut State, event: VerifierEvent) {
    state
        .subscribers
        .retain(|subscriber| subscriber.send(event.clone()).is_ok());
}

#[async_trait]
impl Actor for Verifier {
    type Msg = Msg;
    type State = State;
    type Arguments = ();

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            wait = ?self.params.wait_duration,
            allowlist = self.allowlist.read(|allowlist| allowlist.len()),
            "Verifier started"
        );

        Ok(State {
            core: core::State::new(self.params, self.allowlist.clone()),
            timers: Timers::new(myself),
            subscribers: Vec::new(),
        })
    }

    #[tracing::instrument(
        name = "verifier",
        parent = &self.span,
        skip_all,
        fields(pending = state.core.active_sessions()),
    )]
    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        msg: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Err(e) = self.handle_msg(msg, state).await {
            error!("Error handling message: {e:?}");
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.timers.cancel_all();
        Ok(())
    }
}
