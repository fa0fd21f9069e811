use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{debug, error, info, warn};

use modguard_codec::{split_into_chunks, ChunkEnvelope, EncodeError};
use modguard_core_types::Inventory;

use crate::transport::ServerLink;

pub type ReporterRef = ActorRef<Msg>;
pub type ReporterMsg = Msg;

pub enum Msg {
    /// A frame was received from the server
    FrameReceived(Bytes),

    /// Replace the cached inventory, eg. after the mods were rescanned
    SetInventory(Inventory),

    /// Request the cached inventory
    GetInventory(RpcReplyPort<Inventory>),
}

pub struct State {
    /// The local modules, hashed once at startup
    inventory: Inventory,

    /// Number of reports sent so far
    reports_sent: u64,
}

/// Client side of the protocol: answers every report request with the local inventory.
pub struct Reporter {
    link: Arc<dyn ServerLink>,
    max_frame_size: usize,
    span: tracing::Span,
}

impl Reporter {
    pub fn new(link: Arc<dyn ServerLink>, max_frame_size: usize, span: tracing::Span) -> Self {
        Self {
            link,
            max_frame_size,
            span,
        }
    }

    pub async fn spawn(
        link: Arc<dyn ServerLink>,
        inventory: Inventory,
        max_frame_size: usize,
        span: tracing::Span,
    ) -> Result<ReporterRef, ractor::SpawnErr> {
        let actor = Self::new(link, max_frame_size, span);
        let (actor_ref, _) = Actor::spawn(None, actor, inventory).await?;
        Ok(actor_ref)
    }

    fn encode_report(&self, inventory: &Inventory) -> Result<Vec<Bytes>, EncodeError> {
        split_into_chunks(&inventory.to_wire_entries(), self.max_frame_size)
            .iter()
            .map(ChunkEnvelope::encode)
            .collect()
    }

    async fn send_report(&self, state: &mut State) -> Result<(), ActorProcessingErr> {
        let frames = match self.encode_report(&state.inventory) {
            Ok(frames) => frames,
            Err(e) => {
                error!("Failed to encode mod list: {e}");
                return Ok(());
            }
        };

        let count = frames.len();

        // Frames must leave in chunk order
        for frame in frames {
            self.link.send_to_server(frame).await?;
        }

        state.reports_sent += 1;

        debug!(
            modules = state.inventory.len(),
            frames = count,
            reports_sent = state.reports_sent,
            "Sent mod list"
        );

        Ok(())
    }

    async fn handle_msg(&self, msg: Msg, state: &mut State) -> Result<(), ActorProcessingErr> {
        match msg {
            Msg::FrameReceived(bytes) => match ChunkEnvelope::decode(bytes) {
                Ok(_) => self.send_report(state).await,
                Err(e) => {
                    warn!("Dropping undecodable frame from server: {e}");
                    Ok(())
                }
            },

            Msg::SetInventory(inventory) => {
                info!(modules = inventory.len(), "Updated local mod list");
                state.inventory = inventory;
                Ok(())
            }

            Msg::GetInventory(reply) => {
                if let Err(e) = reply.send(state.inventory.clone()) {
                    error!("Failed to reply with inventory: {e}");
                }

                Ok(())
            }
        }
    }
}

#[async_trait]
impl Actor for Reporter {
    type Msg = Msg;
    type State = State;
    type Arguments = Inventory;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        inventory: Inventory,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(State {
            inventory,
            reports_sent: 0,
        })
    }

    #[tracing::instrument(name = "reporter", parent = &self.span, skip_all)]
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
}
