//! MCU log persistence
//!
//! A background thread drains the [`RecordQueue`] into an append-only text
//! file in the run directory, one `payload,timestamp` line per record, in
//! dequeue order. When the queue is empty the thread waits for the poll
//! interval (or a stop request) before looking again.
//!
//! The file is opened lazily on the first write and reopened after a failed
//! write, so a temporarily unwritable file does not stop the loop. Every
//! record is flushed to the OS before it counts as written; a record whose
//! write or flush fails is dropped and counted. On stop the queue is drained
//! one last time and the file is synced.

use crate::error::{Result, ResultExt};
use crate::queue::RecordQueue;
use crate::types::TimestampRecord;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

/// Counters returned when the persistence thread ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceStats {
    /// Records appended to the log
    pub records_written: u64,
    /// Records lost to write failures
    pub write_failures: u64,
}

/// Append-only MCU log file
#[derive(Debug)]
pub struct McuLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl McuLog {
    /// Log at `path`; nothing is opened until the first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .context(format!("Failed to open {:?}", self.path))?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }

    /// Append one record as a line and flush it to the OS
    pub fn append(&mut self, record: &TimestampRecord) -> Result<()> {
        let result = self.writer().and_then(|w| {
            writeln!(w, "{}", record)
                .and_then(|()| w.flush())
                .context("Failed to append record")
        });
        if result.is_err() {
            self.writer = None;
        }
        result
    }

    /// Push buffered lines to the OS
    pub fn flush(&mut self) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let result = writer.flush().context("Failed to flush MCU log");
        if result.is_err() {
            self.writer = None;
        }
        result
    }

    /// Flush and sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(writer) = self.writer.as_ref() {
            writer
                .get_ref()
                .sync_all()
                .context("Failed to sync MCU log")?;
        }
        Ok(())
    }
}

/// Background writer draining the record queue
#[derive(Debug)]
pub struct PersistenceLoop {
    queue: RecordQueue,
    log: McuLog,
    poll_interval: Duration,
}

impl PersistenceLoop {
    /// Create a loop appending to the log at `log_path`
    pub fn new(queue: RecordQueue, log_path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            queue,
            log: McuLog::new(log_path),
            poll_interval,
        }
    }

    /// Spawn the persistence thread
    pub fn start(self) -> Result<PersistenceHandle> {
        let (stop_tx, stop_rx) = bounded(1);
        let thread = std::thread::Builder::new()
            .name("mcu-persist".to_string())
            .spawn(move || self.run(stop_rx))
            .context("Failed to spawn persistence thread")?;

        Ok(PersistenceHandle {
            stop_tx,
            thread: Some(thread),
        })
    }

    fn run(mut self, stop_rx: Receiver<()>) -> PersistenceStats {
        let mut stats = PersistenceStats::default();
        tracing::debug!("Persisting MCU records to {:?}", self.log.path());

        loop {
            if self.drain(&mut stats) == 0 {
                match stop_rx.recv_timeout(self.poll_interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            } else if !stop_rx.is_empty() {
                break;
            }
        }

        self.drain(&mut stats);
        if let Err(e) = self.log.sync() {
            tracing::error!("{}", e);
        }
        tracing::info!(
            "Persistence stopped: {} records written, {} lost",
            stats.records_written,
            stats.write_failures
        );
        stats
    }

    /// Write out everything currently queued; returns the number dequeued
    fn drain(&mut self, stats: &mut PersistenceStats) -> usize {
        let mut drained = 0;
        while let Some(record) = self.queue.try_dequeue() {
            drained += 1;
            match self.log.append(&record) {
                Ok(()) => stats.records_written += 1,
                Err(e) => {
                    stats.write_failures += 1;
                    tracing::error!("Dropping MCU record {:?}: {}", record.payload(), e);
                }
            }
        }
        drained
    }
}

/// Owner handle of the persistence thread
#[derive(Debug)]
pub struct PersistenceHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<PersistenceStats>>,
}

impl PersistenceHandle {
    /// Stop the loop after a final drain and wait for it
    pub fn stop(mut self) -> PersistenceStats {
        self.stop_inner()
    }

    fn stop_inner(&mut self) -> PersistenceStats {
        let Some(thread) = self.thread.take() else {
            return PersistenceStats::default();
        };
        let _ = self.stop_tx.try_send(());
        match thread.join() {
            Ok(stats) => stats,
            Err(_) => {
                tracing::error!("Persistence thread panicked");
                PersistenceStats::default()
            }
        }
    }
}

impl Drop for PersistenceHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
