//! Batched hand-off of flushed series to a consumer thread.
//!
//! Series are grouped in batches before crossing the channel so the consumer
//! (typically a serializer) wakes up once per batch rather than once per
//! serie. The channel is bounded; what happens when it is full is decided by
//! the [`OverflowPolicy`].

use crate::core::config::{OverflowKind, SerieBufferConfig};
use crate::metrics::serie::Serie;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Behavior of [`SerieSender::put`] when the channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for room
    Block,
    /// Wait up to the given time, then drop the batch
    Timeout(Duration),
    /// Drop the oldest queued batch to make room
    DropOldest,
}

impl OverflowPolicy {
    /// Policy from the configuration section
    pub fn from_config(config: &SerieBufferConfig) -> Self {
        match config.overflow {
            OverflowKind::Block => OverflowPolicy::Block,
            OverflowKind::Timeout => OverflowPolicy::Timeout(config.send_timeout),
            OverflowKind::DropOldest => OverflowPolicy::DropOldest,
        }
    }
}

/// Anything flushed series can be written to
pub trait SerieSink {
    /// Take one serie
    fn put(&mut self, serie: Serie);
}

impl SerieSink for Vec<Serie> {
    fn put(&mut self, serie: Serie) {
        self.push(serie);
    }
}

/// Create a channel holding up to `channel_size` batches of `batch_size`
/// series each.
pub fn serie_buffer(
    channel_size: usize,
    batch_size: usize,
    overflow: OverflowPolicy,
) -> (SerieSender, SerieReceiver) {
    let batch_size = batch_size.max(1);
    let (tx, rx) = bounded(channel_size.max(1));
    let receiver_alive = Arc::new(AtomicBool::new(true));

    let sender = SerieSender {
        tx,
        oldest: matches!(overflow, OverflowPolicy::DropOldest).then(|| rx.clone()),
        batch: Vec::with_capacity(batch_size),
        batch_size,
        overflow,
        count: Arc::new(AtomicU64::new(0)),
        dropped: Arc::new(AtomicU64::new(0)),
        receiver_alive: Arc::clone(&receiver_alive),
    };
    let receiver = SerieReceiver {
        rx,
        current: Vec::new().into_iter(),
        receiver_alive,
    };
    (sender, receiver)
}

/// Producer side. Call [`close`](Self::close) when done: series still in the
/// current batch are only sent by `close`.
pub struct SerieSender {
    tx: Sender<Vec<Serie>>,
    // only with DropOldest: lets the sender pop queued batches
    oldest: Option<Receiver<Vec<Serie>>>,
    batch: Vec<Serie>,
    batch_size: usize,
    overflow: OverflowPolicy,
    count: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    receiver_alive: Arc<AtomicBool>,
}

impl SerieSender {
    /// Append a serie, sending the batch once it is full
    pub fn put(&mut self, serie: Serie) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.batch.push(serie);
        if self.batch.len() >= self.batch_size {
            let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
            self.send(batch);
        }
    }

    /// Send what is left and close the channel
    pub fn close(mut self) {
        if !self.batch.is_empty() {
            let batch = std::mem::take(&mut self.batch);
            self.send(batch);
        }
    }

    fn send(&mut self, batch: Vec<Serie>) {
        if !self.receiver_alive.load(Ordering::Acquire) {
            self.discard(batch.len());
            return;
        }

        match self.overflow {
            OverflowPolicy::Block => {
                if let Err(e) = self.tx.send(batch) {
                    self.discard(e.into_inner().len());
                }
            },
            OverflowPolicy::Timeout(timeout) => match self.tx.send_timeout(batch, timeout) {
                Ok(()) => {},
                Err(SendTimeoutError::Timeout(batch)) => {
                    tracing::warn!(
                        series = batch.len(),
                        ?timeout,
                        "serie channel full, dropping batch"
                    );
                    self.dropped.fetch_add(batch.len() as u64, Ordering::Relaxed);
                },
                Err(SendTimeoutError::Disconnected(batch)) => self.discard(batch.len()),
            },
            OverflowPolicy::DropOldest => self.send_dropping_oldest(batch),
        }
    }

    fn send_dropping_oldest(&mut self, mut batch: Vec<Serie>) {
        loop {
            match self.tx.try_send(batch) {
                Ok(()) => return,
                Err(TrySendError::Full(b)) => {
                    batch = b;
                    if !self.receiver_alive.load(Ordering::Acquire) {
                        self.discard(batch.len());
                        return;
                    }
                    if let Some(old) = self.oldest.as_ref().and_then(|rx| rx.try_recv().ok()) {
                        tracing::warn!(series = old.len(), "serie channel full, dropping oldest batch");
                        self.dropped.fetch_add(old.len() as u64, Ordering::Relaxed);
                    }
                },
                Err(TrySendError::Disconnected(b)) => {
                    self.discard(b.len());
                    return;
                },
            }
        }
    }

    // receiver is gone: nobody will ever read these
    fn discard(&self, n: usize) {
        self.dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Series passed to `put` so far
    pub fn series_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Series dropped because the channel was full or the receiver gone
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SerieSink for SerieSender {
    fn put(&mut self, serie: Serie) {
        SerieSender::put(self, serie);
    }
}

/// Consumer side. Yields series in the order they were put.
pub struct SerieReceiver {
    rx: Receiver<Vec<Serie>>,
    current: std::vec::IntoIter<Serie>,
    receiver_alive: Arc<AtomicBool>,
}

impl SerieReceiver {
    /// Next serie, waiting for a batch if needed. `None` once the sender is
    /// closed and everything has been read.
    pub fn get(&mut self) -> Option<Serie> {
        loop {
            if let Some(serie) = self.current.next() {
                return Some(serie);
            }
            match self.rx.recv() {
                Ok(batch) => self.current = batch.into_iter(),
                Err(_) => return None,
            }
        }
    }
}

impl Iterator for SerieReceiver {
    type Item = Serie;

    fn next(&mut self) -> Option<Serie> {
        self.get()
    }
}

impl Drop for SerieReceiver {
    fn drop(&mut self) {
        self.receiver_alive.store(false, Ordering::Release);
    }
}
