use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The part of a report carried by one envelope: module id to digest string.
pub type Entries = BTreeMap<String, String>;

/// Length of the envelope header (chunk index, total chunks, entry count).
pub const HEADER_LEN: usize = 3 * size_of::<i32>();

const UNKNOWN_TOTAL: i32 = -1;

/// Encoding of [`ChunkEnvelope::report_request`].
pub const REPORT_REQUEST_FRAME: [u8; HEADER_LEN] = [0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0];

/// One frame of a chunked report.
///
/// Each frame has the following format on the wire, all integers big-endian:
///
/// ```text
/// +-----------------+-----------------+-----------------+-----------------+
/// |   Chunk index   |  Total chunks   |   Entry count   |   Entry #1..n   |
/// |    (4 bytes)    |    (4 bytes)    |    (4 bytes)    |   (variable)    |
/// +-----------------+-----------------+-----------------+-----------------+
/// ```
///
/// where each entry is
///
/// ```text
/// +-----------------+-----------------+-----------------+-----------------+
/// |    Id length    |   Id (UTF-8)    |  Digest length  | Digest (UTF-8)  |
/// |    (4 bytes)    | ($length bytes) |    (4 bytes)    | ($length bytes) |
/// +-----------------+-----------------+-----------------+-----------------+
/// ```
///
/// A total of `-1` on the wire means the sender did not know the chunk count yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkEnvelope {
    /// Position of this chunk in the report, starting from 0
    pub chunk_index: u32,

    /// Number of chunks in the report, if known to the sender when this chunk was sent
    pub total_chunks: Option<u32>,

    /// The entries carried by this chunk
    pub entries: Entries,
}

impl ChunkEnvelope {
    pub fn new(chunk_index: u32, total_chunks: Option<u32>, entries: Entries) -> Self {
        Self {
            chunk_index,
            total_chunks,
            entries,
        }
    }

    /// A report that fits in a single chunk.
    pub fn single(entries: Entries) -> Self {
        Self::new(0, Some(1), entries)
    }

    /// The empty frame used to ask a peer for its report.
    pub fn report_request() -> Self {
        Self::single(Entries::new())
    }

    /// Whether this envelope alone holds a complete report.
    pub fn is_single(&self) -> bool {
        self.chunk_index == 0 && self.total_chunks == Some(1)
    }

    /// Size of this envelope once encoded.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + self
                .entries
                .iter()
                .map(|(id, digest)| 2 * size_of::<i32>() + id.len() + digest.len())
                .sum::<usize>()
    }

    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        buf.put_i32(to_i32(self.chunk_index as usize, "chunk index")?);
        buf.put_i32(match self.total_chunks {
            Some(total) => to_i32(total as usize, "total chunks")?,
            None => UNKNOWN_TOTAL,
        });
        buf.put_i32(to_i32(self.entries.len(), "entry count")?);

        for (id, digest) in &self.entries {
            put_string(&mut buf, id)?;
            put_string(&mut buf, digest)?;
        }

        Ok(buf.freeze())
    }

    pub fn decode(mut buf: impl Buf) -> Result<Self, DecodeError> {
        let chunk_index = get_i32(&mut buf)?;
        let total_chunks = get_i32(&mut buf)?;
        let entry_count = get_i32(&mut buf)?;

        let chunk_index =
            u32::try_from(chunk_index).map_err(|_| DecodeError::InvalidIndex(chunk_index))?;

        let total_chunks = match total_chunks {
            UNKNOWN_TOTAL => None,
            total => Some(u32::try_from(total).map_err(|_| DecodeError::InvalidTotal(total))?),
        };

        if let Some(total) = total_chunks {
            if chunk_index >= total {
                return Err(DecodeError::IndexOutOfRange {
                    index: chunk_index,
                    total,
                });
            }
        }

        let entry_count =
            usize::try_from(entry_count).map_err(|_| DecodeError::NegativeLength(entry_count))?;

        // Every entry takes at least its two length prefixes
        if entry_count > buf.remaining() / (2 * size_of::<i32>()) {
            return Err(DecodeError::Truncated);
        }

        let mut entries = Entries::new();
        for _ in 0..entry_count {
            let id = get_string(&mut buf)?;
            let digest = get_string(&mut buf)?;
            entries.insert(id, digest);
        }

        if buf.has_remaining() {
            return Err(DecodeError::TrailingBytes(buf.remaining()));
        }

        Ok(Self {
            chunk_index,
            total_chunks,
            entries,
        })
    }
}

/// Failure to encode an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("{what} of {value} does not fit in a 32-bit field")]
    TooLarge { what: &'static str, value: usize },
}

/// Failure to decode an envelope.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is truncated")]
    Truncated,

    #[error("negative length {0}")]
    NegativeLength(i32),

    #[error("invalid chunk index {0}")]
    InvalidIndex(i32),

    #[error("invalid total chunk count {0}")]
    InvalidTotal(i32),

    #[error("chunk index {index} is out of range for {total} chunks")]
    IndexOutOfRange { index: u32, total: u32 },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

fn to_i32(value: usize, what: &'static str) -> Result<i32, EncodeError> {
    i32::try_from(value).map_err(|_| EncodeError::TooLarge { what, value })
}

fn put_string(buf: &mut BytesMut, s: &str) -> Result<(), EncodeError> {
    buf.put_i32(to_i32(s.len(), "string length")?);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn get_i32(buf: &mut impl Buf) -> Result<i32, DecodeError> {
    if buf.remaining() < size_of::<i32>() {
        return Err(DecodeError::Truncated);
    }

    Ok(buf.get_i32())
}

fn get_string(buf: &mut impl Buf) -> Result<String, DecodeError> {
    let len = get_i32(buf)?;
    let len = usize::try_from(len).map_err(|_| DecodeError::NegativeLength(len))?;

    if buf.remaining() < len {
        return Err(DecodeError::Truncated);
    }

    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}
