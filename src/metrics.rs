use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for stream decoding and accumulation
///
/// Thread-safe atomic counters; each stream is single-consumer but many
/// streams may run concurrently in one process.
#[derive(Default)]
pub struct StreamMetrics {
    /// Frames decoded into chunks, including decode failures
    pub frames_decoded: AtomicU64,

    /// Frames whose payload could not be parsed
    pub decode_errors: AtomicU64,

    /// Accumulator protocol-sequence violations
    pub protocol_errors: AtomicU64,

    /// Tool calls whose assembled arguments were not valid JSON
    pub tool_argument_failures: AtomicU64,

    /// Streams that reached message_stop
    pub streams_completed: AtomicU64,

    /// Streams whose upstream closed before message_stop
    pub streams_truncated: AtomicU64,

    /// Streams ended by a transport error, server error event or protocol violation
    pub streams_failed: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_argument_failure(&self) {
        self.tool_argument_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.streams_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncated(&self) {
        self.streams_truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.streams_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Share of decoded frames that parsed cleanly, as percentage
    pub fn decode_success_rate(&self) -> f64 {
        let total = self.frames_decoded.load(Ordering::Relaxed);
        let errors = self.decode_errors.load(Ordering::Relaxed);
        if total > 0 {
            ((total - errors.min(total)) as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            tool_argument_failures: self.tool_argument_failures.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_truncated: self.streams_truncated.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
            decode_success_rate: self.decode_success_rate(),
        }
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.protocol_errors.store(0, Ordering::Relaxed);
        self.tool_argument_failures.store(0, Ordering::Relaxed);
        self.streams_completed.store(0, Ordering::Relaxed);
        self.streams_truncated.store(0, Ordering::Relaxed);
        self.streams_failed.store(0, Ordering::Relaxed);
    }
}

/// Immutable snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub frames_decoded: u64,
    pub decode_errors: u64,
    pub protocol_errors: u64,
    pub tool_argument_failures: u64,
    pub streams_completed: u64,
    pub streams_truncated: u64,
    pub streams_failed: u64,
    pub decode_success_rate: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stream Metrics: {} frames ({:.1}% clean), {} streams completed, {} truncated, {} failed, {} protocol errors, {} bad tool arguments",
            self.frames_decoded,
            self.decode_success_rate,
            self.streams_completed,
            self.streams_truncated,
            self.streams_failed,
            self.protocol_errors,
            self.tool_argument_failures
        )
    }
}

lazy_static::lazy_static! {
    /// Global metrics instance
    pub static ref STREAM_METRICS: StreamMetrics = StreamMetrics::new();
}
