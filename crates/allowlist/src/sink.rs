use std::io;

/// Failure to persist the allowlist.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write allowlist: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize allowlist: {0}")]
    Serialize(String),
}

/// Destination of a persisted allowlist, typically the configuration file.
pub trait AllowlistSink {
    /// Save the given `"id:hexdigest"` lines, replacing any previous allowlist.
    fn save(&mut self, entries: Vec<String>) -> Result<(), PersistError>;
}

impl<F> AllowlistSink for F
where
    F: FnMut(Vec<String>) -> Result<(), PersistError>,
{
    fn save(&mut self, entries: Vec<String>) -> Result<(), PersistError> {
        self(entries)
    }
}
