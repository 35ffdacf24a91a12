use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

const CHUNK_SIZE: usize = 64 * 1024;

/// Byte counters for the real transfer. Cloning shares the counters, so the
/// body stream and the batch observe the same values.
#[derive(Debug, Clone, Default)]
pub struct TransferProgress {
    sent: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, total: u64) {
        self.sent.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.start(0);
    }

    pub fn record(&self, bytes: u64) {
        self.sent.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn bytes_total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// `bytes_sent / bytes_total × 100`, clamped to 0–100; 0 before a transfer.
    pub fn percent(&self) -> u8 {
        let total = self.bytes_total();
        if total == 0 {
            return 0;
        }
        let pct = self.bytes_sent().saturating_mul(100) / total;
        pct.min(100) as u8
    }
}

/// Splits `contents` into chunks and records each chunk as it is pulled by
/// the HTTP body.
pub fn counted_stream(
    contents: Bytes,
    progress: TransferProgress,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let chunks: Vec<Bytes> = (0..contents.len())
        .step_by(CHUNK_SIZE)
        .map(|start| contents.slice(start..(start + CHUNK_SIZE).min(contents.len())))
        .collect();

    stream::iter(chunks).map(move |chunk| {
        progress.record(chunk.len() as u64);
        Ok(chunk)
    })
}
