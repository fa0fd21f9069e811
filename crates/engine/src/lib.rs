//! Actor runtime for the verification protocol.
//!
//! The [`verifier::Verifier`] actor drives the server side of the handshake on top
//! of the pure state machine in `modguard-core-verifier`, while the
//! [`reporter::Reporter`] actor answers report requests on the client side. Both
//! talk to the host's messaging channel through the traits in [`transport`].

pub mod loopback;
pub mod reporter;
pub mod transport;
pub mod util;
pub mod verifier;
