mod registry;

pub use prometheus_client::metrics::counter::Counter;
pub use prometheus_client::metrics::gauge::Gauge;
pub use prometheus_client::metrics::histogram::{linear_buckets, Histogram};
pub use registry::{Registry, SharedRegistry, PREFIX};
