//! The allowlist of module id to expected digest.
//!
//! The allowlist is loaded from the persisted configuration as `"id:hexdigest"` lines,
//! compared against the local inventory on every load and, when auto-update is enabled,
//! learns any module it has not seen before (trust on first use).

mod entry;
mod shared;
mod sink;
mod store;

pub use entry::{parse_entry, render_entry, MalformedEntry};
pub use shared::SharedAllowlist;
pub use sink::{AllowlistSink, PersistError};
pub use store::AllowlistStore;
