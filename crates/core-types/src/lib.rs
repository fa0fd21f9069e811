//! Core types shared by every ModGuard crate: module identifiers, content digests,
//! inventories of reported hashes, peer identifiers and allowlist violations.

#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_import_braces,
    unused_qualifications
)]

mod digest;
mod inventory;
mod mod_id;
mod peer;
mod violation;

pub use digest::{Digest, DigestParseError, ReportedHash, DIGEST_LEN, UNVERIFIABLE_TOKEN};
pub use inventory::{Inventory, ModuleRecord};
pub use mod_id::ModId;
pub use peer::PeerId;
pub use violation::{Violation, ViolationKind};
