//! Verification protocol core.
//!
//! The server side of the handshake is a pure state machine: the engine feeds it
//! [`Input`]s (connections, frames, elapsed timers) and carries out the [`Effect`]s
//! it returns (sending requests, scheduling timers, disconnecting peers).

mod handle;
mod metrics;
mod state;

pub use handle::{handle, DisconnectReason, Effect, Input};
pub use metrics::Metrics;
pub use state::{Params, Session, SessionId, State, Timeout};
