use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use prometheus_client::encoding::text::encode;
pub use prometheus_client::registry::Registry;

/// Prefix of every metric name.
pub const PREFIX: &str = "modguard";

/// A metrics registry shared by every component that records metrics.
///
/// Metrics are always registered under [`PREFIX`].
#[derive(Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, rendered by `modguard loopback --print-metrics`.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<SharedRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SharedRegistry::new)
    }

    /// Register metrics in the `modguard` namespace.
    pub fn register<A>(&self, f: impl FnOnce(&mut Registry) -> A) -> A {
        let mut registry = self.inner.write().expect("poisoned lock");
        f(registry.sub_registry_with_prefix(PREFIX))
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode_into(&self, writer: &mut impl fmt::Write) -> fmt::Result {
        encode(writer, &self.inner.read().expect("poisoned lock"))
    }

    pub fn encode(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }
}
