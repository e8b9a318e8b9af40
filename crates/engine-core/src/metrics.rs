use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_written: AtomicU64,
    messages_dropped: AtomicU64,
    raw_bytes: AtomicU64,
    parts_opened: AtomicU64,
    parts_completed: AtomicU64,
    bytes_uploaded: AtomicU64,
    upload_retries: AtomicU64,
}

/// Shared counters of one dump (or of every dump a consumer ran).
#[derive(Debug, Clone, Default)]
pub struct DumpMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpMetricsSnapshot {
    pub records_written: u64,
    pub messages_dropped: u64,
    pub raw_bytes: u64,
    pub parts_opened: u64,
    pub parts_completed: u64,
    pub bytes_uploaded: u64,
    pub upload_retries: u64,
}

impl DumpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&self, line_bytes: u64) {
        self.inner.records_written.fetch_add(1, Ordering::Relaxed);
        self.inner.raw_bytes.fetch_add(line_bytes, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.inner.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn part_opened(&self) {
        self.inner.parts_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn part_completed(&self) {
        self.inner.parts_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_uploaded(&self, count: u64) {
        self.inner.bytes_uploaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn upload_retried(&self) {
        self.inner.upload_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DumpMetricsSnapshot {
        DumpMetricsSnapshot {
            records_written: self.inner.records_written.load(Ordering::Relaxed),
            messages_dropped: self.inner.messages_dropped.load(Ordering::Relaxed),
            raw_bytes: self.inner.raw_bytes.load(Ordering::Relaxed),
            parts_opened: self.inner.parts_opened.load(Ordering::Relaxed),
            parts_completed: self.inner.parts_completed.load(Ordering::Relaxed),
            bytes_uploaded: self.inner.bytes_uploaded.load(Ordering::Relaxed),
            upload_retries: self.inner.upload_retries.load(Ordering::Relaxed),
        }
    }
}
