use modguard_core_types::{Digest, DigestParseError, ModId};

/// An allowlist line that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEntry {
    #[error("invalid mod allowlist entry `{0}`: expected `id:hexdigest`")]
    Fields(String),

    #[error("invalid mod allowlist entry `{0}`: empty module id")]
    EmptyId(String),

    #[error("invalid mod allowlist entry `{entry}`: {source}")]
    Digest {
        entry: String,
        #[source]
        source: DigestParseError,
    },
}

/// Parse one `"id:hexdigest"` allowlist line.
pub fn parse_entry(entry: &str) -> Result<(ModId, Digest), MalformedEntry> {
    let mut fields = entry.split(':');

    let (Some(id), Some(digest), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(MalformedEntry::Fields(entry.to_string()));
    };

    if id.is_empty() {
        return Err(MalformedEntry::EmptyId(entry.to_string()));
    }

    let digest = Digest::from_hex(digest).map_err(|source| MalformedEntry::Digest {
        entry: entry.to_string(),
        source,
    })?;

    Ok((ModId::new(id), digest))
}

/// Render an allowlist line.
pub fn render_entry(id: &ModId, digest: &Digest) -> String {
    format!("{id}:{digest}")
}
