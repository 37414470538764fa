use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    cells_chunked: AtomicU64,
    chunks_produced: AtomicU64,
    summaries_generated: AtomicU64,
    summary_failures: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chunked cell and the number of chunks produced for it.
    pub fn record_cell(&self, chunk_count: u64) {
        self.cells_chunked.fetch_add(1, Ordering::Relaxed);
        self.chunks_produced
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record an injected summary cell.
    pub fn record_summary(&self) {
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed completion attempt.
    pub fn record_summary_failure(&self) {
        self.summary_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cells_chunked: self.cells_chunked.load(Ordering::Relaxed),
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            summary_failures: self.summary_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Cells passed through the chunking engine.
    pub cells_chunked: u64,
    /// Total chunks produced across all cells.
    pub chunks_produced: u64,
    /// Summary cells injected by summarization runs.
    pub summaries_generated: u64,
    /// Completion attempts that failed (including timeouts).
    pub summary_failures: u64,
}
