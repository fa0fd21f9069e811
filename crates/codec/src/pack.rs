use crate::{ChunkEnvelope, Entries};

/// Default budget for the entries of a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1000;

/// Bytes taken by the two length prefixes of an entry.
pub const ENTRY_OVERHEAD: usize = 8;

/// Encoded size of one entry.
pub fn entry_cost(id: &str, digest: &str) -> usize {
    id.len() + digest.len() + ENTRY_OVERHEAD
}

/// Split a report into envelopes whose entries fit within `max_frame_size` bytes.
///
/// Entries are packed greedily in id order. If the whole report fits, a single
/// `{0, 1}` envelope is produced (even for an empty report). Otherwise every envelope
/// but the last carries an unknown total, and the last carries the final count.
/// An entry larger than the budget is sent alone in its own envelope.
pub fn split_into_chunks(entries: &Entries, max_frame_size: usize) -> Vec<ChunkEnvelope> {
    let total_size: usize = entries
        .iter()
        .map(|(id, digest)| entry_cost(id, digest))
        .sum();

    if total_size <= max_frame_size {
        return vec![ChunkEnvelope::single(entries.clone())];
    }

    let mut chunks = Vec::new();
    let mut current = Entries::new();
    let mut current_size = 0;
    let mut chunk_index = 0;

    for (id, digest) in entries {
        let cost = entry_cost(id, digest);

        if current_size + cost > max_frame_size && !current.is_empty() {
            chunks.push(ChunkEnvelope::new(
                chunk_index,
                None,
                std::mem::take(&mut current),
            ));

            current_size = 0;
            chunk_index += 1;
        }

        current.insert(id.clone(), digest.clone());
        current_size += cost;
    }

    if !current.is_empty() {
        chunks.push(ChunkEnvelope::new(chunk_index, Some(chunk_index + 1), current));
    }

    chunks
}
