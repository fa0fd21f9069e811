use std::ops::Deref;
use std::sync::Arc;

use modguard_metrics::{linear_buckets, Counter, Gauge, Histogram, SharedRegistry};

#[derive(Clone, Debug)]
pub struct Metrics(Arc<Inner>);

impl Deref for Metrics {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct Inner {
    /// Number of verification sessions started
    pub sessions_started: Counter,

    /// Number of sessions whose report matched the allowlist
    pub sessions_verified: Counter,

    /// Number of sessions rejected because of a mismatched report
    pub sessions_rejected: Counter,

    /// Number of sessions that ran out of time before a full report arrived
    pub sessions_timed_out: Counter,

    /// Number of frames received from peers
    pub frames_received: Counter,

    /// Number of frames dropped because they could not be decoded or merged
    pub frames_dropped: Counter,

    /// Number of sessions awaiting a report
    pub active_sessions: Gauge,

    /// Number of chunks per completed report
    pub report_chunks: Histogram,
}

impl Inner {
    pub fn new() -> Self {
        Self {
            sessions_started: Counter::default(),
            sessions_verified: Counter::default(),
            sessions_rejected: Counter::default(),
            sessions_timed_out: Counter::default(),
            frames_received: Counter::default(),
            frames_dropped: Counter::default(),
            active_sessions: Gauge::default(),
            report_chunks: Histogram::new(linear_buckets(1.0, 1.0, 16)),
        }
    }
}

impl Default for Inner {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self(Arc::new(Inner::new()))
    }

    pub fn register(registry: &SharedRegistry) -> Self {
        let metrics = Self::new();

        registry.register(|registry| {
            registry.register(
                "sessions_started",
                "Number of verification sessions started",
                metrics.sessions_started.clone(),
            );

            registry.register(
                "sessions_verified",
                "Number of sessions whose report matched the allowlist",
                metrics.sessions_verified.clone(),
            );

            registry.register(
                "sessions_rejected",
                "Number of sessions rejected because of a mismatched report",
                metrics.sessions_rejected.clone(),
            );

            registry.register(
                "sessions_timed_out",
                "Number of sessions that ran out of time before a full report arrived",
                metrics.sessions_timed_out.clone(),
            );

            registry.register(
                "frames_received",
                "Number of frames received from peers",
                metrics.frames_received.clone(),
            );

            registry.register(
                "frames_dropped",
                "Number of frames dropped because they could not be decoded or merged",
                metrics.frames_dropped.clone(),
            );

            registry.register(
                "active_sessions",
                "Number of sessions awaiting a report",
                metrics.active_sessions.clone(),
            );

            registry.register(
                "report_chunks",
                "Number of chunks per completed report",
                metrics.report_chunks.clone(),
            );
        });

        metrics
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
