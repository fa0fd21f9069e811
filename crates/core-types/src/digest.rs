use core::fmt;
use core::str::FromStr;

/// Length in bytes of a module digest (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Reserved token standing in for a module that could not be hashed.
///
/// It is not valid hex, so it can never be mistaken for a real digest.
pub const UNVERIFIABLE_TOKEN: &str = "NULL";

/// A SHA-256 digest of a module's full content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Create a digest from raw bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Encode as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string, in either case.
    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        if s.len() != DIGEST_LEN * 2 {
            return Err(DigestParseError::InvalidLength(s.len()));
        }

        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| DigestParseError::InvalidHex)?;

        Ok(Self(bytes))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Error returned when a string is not a valid hex digest.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DigestParseError {
    /// The string does not have exactly 64 characters.
    #[error("expected {len} hex characters, got {0}", len = DIGEST_LEN * 2)]
    InvalidLength(usize),

    /// The string contains non-hex characters.
    #[error("invalid hex character in digest")]
    InvalidHex,
}

/// The hash reported for a single module.
///
/// A module whose content could not be read is `Unverifiable`: it never matches
/// an allowlist entry and is never learned into one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportedHash {
    /// The module was hashed successfully.
    Known(Digest),

    /// The module could not be hashed.
    Unverifiable,
}

impl ReportedHash {
    /// Interpret a digest string coming from the wire or from a peer.
    ///
    /// Anything that is not a valid hex digest (including [`UNVERIFIABLE_TOKEN`])
    /// is treated as `Unverifiable`.
    pub fn parse_lossy(s: &str) -> Self {
        Digest::from_hex(s).map_or(Self::Unverifiable, Self::Known)
    }

    /// The digest, if the module was hashed successfully.
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            Self::Known(digest) => Some(digest),
            Self::Unverifiable => None,
        }
    }

    /// Whether the module could not be hashed.
    pub fn is_unverifiable(&self) -> bool {
        matches!(self, Self::Unverifiable)
    }
}

impl From<Digest> for ReportedHash {
    fn from(digest: Digest) -> Self {
        Self::Known(digest)
    }
}

impl fmt::Display for ReportedHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(digest) => digest.fmt(f),
            Self::Unverifiable => f.write_str(UNVERIFIABLE_TOKEN),
        }
    }
}
