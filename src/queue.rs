//! Hand-off queue between the network ingestor and the persistence loop
//!
//! A thin wrapper over an unbounded crossbeam channel. The queue owns both
//! ends, so the channel can never become disconnected while any clone of the
//! queue is alive: `enqueue` cannot fail and `try_dequeue` only ever reports
//! "empty".

use crate::types::TimestampRecord;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

/// Unbounded FIFO of [`TimestampRecord`]s
///
/// Cloning yields another handle to the same queue. Records come out in
/// exactly the order they went in, and producers never block.
#[derive(Debug, Clone)]
pub struct RecordQueue {
    tx: Sender<TimestampRecord>,
    rx: Receiver<TimestampRecord>,
}

impl Default for RecordQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append a record; never blocks
    pub fn enqueue(&self, record: TimestampRecord) {
        // Only fails when every receiver is gone, and `self` holds one.
        if let Err(e) = self.tx.send(record) {
            tracing::error!("Record queue disconnected, dropping {}", e.into_inner());
        }
    }

    /// Take the oldest record, if any; never blocks
    pub fn try_dequeue(&self) -> Option<TimestampRecord> {
        match self.rx.try_recv() {
            Ok(record) => Some(record),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Number of records waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no records are waiting
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
