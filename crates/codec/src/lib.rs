//! Chunked wire framing for module reports.
//!
//! A report maps module ids to digest strings. It may be too large for a single
//! message on the host's channel, so it is split into one or more
//! [`ChunkEnvelope`]s, each carrying a disjoint part of the mapping. The receiver
//! merges the envelopes back together with a [`Reassembly`].

mod envelope;
mod pack;
mod reassembly;

pub use envelope::{
    ChunkEnvelope, DecodeError, EncodeError, Entries, HEADER_LEN, REPORT_REQUEST_FRAME,
};
pub use pack::{entry_cost, split_into_chunks, DEFAULT_MAX_FRAME_SIZE, ENTRY_OVERHEAD};
pub use reassembly::{Progress, Reassembly, ReassemblyError, MAX_CHUNKS, MAX_ENTRIES};
