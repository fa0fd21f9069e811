use std::collections::BTreeSet;

use crate::{ChunkEnvelope, Entries};

/// Outcome of feeding one envelope into a [`Reassembly`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// More chunks are needed.
    Incomplete {
        /// Number of distinct chunks received so far
        received: usize,
        /// Total number of chunks, if already announced
        total: Option<u32>,
    },

    /// Every chunk of the report has been received.
    Complete,
}

/// An envelope that does not fit the report being reassembled.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReassemblyError {
    #[error("chunk announces {got} chunks but the report already has {known}")]
    ConflictingTotal { known: u32, got: u32 },

    #[error("chunk index {index} is out of range for {total} chunks")]
    IndexOutOfRange { index: u32, total: u32 },

    #[error("report exceeds the limit of {limit} chunks")]
    TooManyChunks { limit: u32 },

    #[error("report exceeds the limit of {limit} entries")]
    TooManyEntries { limit: usize },
}

/// Default upper bound on the chunks of one report.
pub const MAX_CHUNKS: u32 = 1024;

/// Default upper bound on the entries of one report.
pub const MAX_ENTRIES: usize = 16 * 1024;

/// Merges the envelopes of one report back into a full mapping.
///
/// Chunks may arrive in any order. The report is complete once a chunk announcing
/// the total count `n` has been seen and every index in `0..n` has been received.
#[derive(Clone, Debug)]
pub struct Reassembly {
    entries: Entries,
    received: BTreeSet<u32>,
    total: Option<u32>,
    max_chunks: u32,
    max_entries: usize,
}

impl Default for Reassembly {
    fn default() -> Self {
        Self::with_limits(MAX_CHUNKS, MAX_ENTRIES)
    }
}

impl Reassembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the memory a single report can take before it completes.
    pub fn with_limits(max_chunks: u32, max_entries: usize) -> Self {
        Self {
            entries: Entries::new(),
            received: BTreeSet::new(),
            total: None,
            max_chunks,
            max_entries,
        }
    }

    /// Merge an envelope into the report.
    ///
    /// An envelope that contradicts the announced total is rejected and leaves the
    /// report untouched. Entries repeated across chunks are last-write-wins.
    pub fn insert(&mut self, envelope: ChunkEnvelope) -> Result<Progress, ReassemblyError> {
        let index = envelope.chunk_index;

        let total = match (self.total, envelope.total_chunks) {
            (Some(known), Some(got)) if known != got => {
                return Err(ReassemblyError::ConflictingTotal { known, got });
            }
            (known, got) => known.or(got),
        };

        if let Some(total) = total {
            let stale = self.received.range(total..).next().copied();

            if let Some(index) = stale.or((index >= total).then_some(index)) {
                return Err(ReassemblyError::IndexOutOfRange { index, total });
            }
        }

        let limit = self.max_chunks;
        let new_index = !self.received.contains(&index);

        if total.is_some_and(|total| total > limit)
            || (new_index && self.received.len() >= limit as usize)
        {
            return Err(ReassemblyError::TooManyChunks { limit });
        }

        let new_entries = envelope
            .entries
            .keys()
            .filter(|id| !self.entries.contains_key(*id))
            .count();

        if self.entries.len() + new_entries > self.max_entries {
            return Err(ReassemblyError::TooManyEntries {
                limit: self.max_entries,
            });
        }

        self.total = total;
        self.received.insert(index);
        self.entries.extend(envelope.entries);

        Ok(self.progress())
    }

    pub fn progress(&self) -> Progress {
        if self.is_complete() {
            Progress::Complete
        } else {
            Progress::Incomplete {
                received: self.received.len(),
                total: self.total,
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        // Out-of-range indices are rejected on insert, so a full count means every index is present
        self.total
            .is_some_and(|total| self.received.len() == total as usize)
    }

    /// Number of distinct chunks received.
    pub fn received_chunks(&self) -> usize {
        self.received.len()
    }

    /// Total number of chunks, once announced.
    pub fn total_chunks(&self) -> Option<u32> {
        self.total
    }

    /// Entries merged so far.
    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn into_entries(self) -> Entries {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32, total: Option<u32>, ids: &[&str]) -> ChunkEnvelope {
        ChunkEnvelope::new(
            index,
            total,
            ids.iter()
                .map(|id| (id.to_string(), format!("hash-of-{id}")))
                .collect(),
        )
    }

    #[test]
    fn single_chunk_is_immediately_complete() {
        let mut reassembly = Reassembly::new();
        assert_eq!(
            reassembly.insert(chunk(0, Some(1), &["a"])),
            Ok(Progress::Complete)
        );
        assert_eq!(reassembly.into_entries().len(), 1);
    }

    #[test]
    fn out_of_order_chunks_complete_once_all_indices_arrive() {
        let mut reassembly = Reassembly::new();

        assert_eq!(
            reassembly.insert(chunk(2, Some(3), &["e"])),
            Ok(Progress::Incomplete {
                received: 1,
                total: Some(3)
            })
        );
        assert_eq!(
            reassembly.insert(chunk(0, None, &["a", "b"])),
            Ok(Progress::Incomplete {
                received: 2,
                total: Some(3)
            })
        );
        assert_eq!(
            reassembly.insert(chunk(1, None, &["c", "d"])),
            Ok(Progress::Complete)
        );

        let ids: Vec<_> = reassembly.into_entries().into_keys().collect();
        assert_eq!(ids, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn not_complete_without_a_known_total() {
        let mut reassembly = Reassembly::new();
        reassembly.insert(chunk(0, None, &["a"])).unwrap();
        reassembly.insert(chunk(1, None, &["b"])).unwrap();

        assert!(!reassembly.is_complete());
        assert_eq!(reassembly.total_chunks(), None);
    }

    #[test]
    fn duplicate_index_does_not_count_twice() {
        let mut reassembly = Reassembly::new();
        reassembly.insert(chunk(0, None, &["a"])).unwrap();
        reassembly.insert(chunk(0, None, &["a"])).unwrap();

        assert_eq!(
            reassembly.insert(chunk(2, Some(3), &["c"])),
            Ok(Progress::Incomplete {
                received: 2,
                total: Some(3)
            })
        );
    }

    #[test]
    fn rejects_conflicting_totals() {
        let mut reassembly = Reassembly::new();
        reassembly.insert(chunk(1, Some(2), &["b"])).unwrap();

        assert_eq!(
            reassembly.insert(chunk(2, Some(3), &["c"])),
            Err(ReassemblyError::ConflictingTotal { known: 2, got: 3 })
        );
        assert_eq!(reassembly.received_chunks(), 1);
    }

    #[test]
    fn pending_chunks_are_capped() {
        let mut reassembly = Reassembly::with_limits(3, MAX_ENTRIES);

        for index in 0..3 {
            reassembly.insert(chunk(index, None, &[])).unwrap();
        }

        assert_eq!(
            reassembly.insert(chunk(3, None, &["x"])),
            Err(ReassemblyError::TooManyChunks { limit: 3 })
        );

        // A repeated index takes no extra room
        assert!(reassembly.insert(chunk(1, None, &["b"])).is_ok());
        assert_eq!(reassembly.received_chunks(), 3);

        assert_eq!(
            Reassembly::with_limits(3, MAX_ENTRIES).insert(chunk(0, Some(4), &[])),
            Err(ReassemblyError::TooManyChunks { limit: 3 })
        );
    }

    #[test]
    fn accumulated_entries_are_capped() {
        let mut reassembly = Reassembly::with_limits(MAX_CHUNKS, 3);
        reassembly.insert(chunk(0, None, &["a", "b"])).unwrap();

        assert_eq!(
            reassembly.insert(chunk(1, None, &["c", "d"])),
            Err(ReassemblyError::TooManyEntries { limit: 3 })
        );

        // Overwriting known ids does not grow the report
        assert!(reassembly.insert(chunk(1, Some(2), &["a", "c"])).is_ok());
        assert_eq!(reassembly.entries().len(), 3);
    }

    #[test]
    fn rejects_indices_beyond_the_total() {
        let mut reassembly = Reassembly::new();
        reassembly.insert(chunk(5, None, &["x"])).unwrap();

        assert_eq!(
            reassembly.insert(chunk(1, Some(2), &["b"])),
            Err(ReassemblyError::IndexOutOfRange { index: 5, total: 2 })
        );

        let mut reassembly = Reassembly::new();
        reassembly.insert(chunk(0, Some(2), &["a"])).unwrap();

        assert_eq!(
            reassembly.insert(chunk(4, None, &["y"])),
            Err(ReassemblyError::IndexOutOfRange { index: 4, total: 2 })
        );
    }
}
