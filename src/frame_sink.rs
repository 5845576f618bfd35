//! Frame event sink
//!
//! Receives frame-ready notifications on the driver's thread and saves each
//! frame into the run directory before returning. The save has to finish
//! inside the callback: once it returns, the driver may overwrite the buffer.
//!
//! # File Naming
//!
//! `Frame-<seq>--Aux time-<aux>--Host time-<host>.<ext>`, where `aux` and
//! `host` are the two frame timestamps in seconds. Sequence numbers are unique
//! per run, so names never collide.
//!
//! # Failure Handling
//!
//! A failed save is logged and counted. The frame is not retried (its buffer
//! is no longer valid) and the next frame is handled normally. A stalled
//! frame rate is logged as a warning only.

use crate::acquisition::{FrameEvent, FrameHandler};
use crate::config::ImageFormat;
use crate::types::FrameRateStatistics;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name for a frame
pub fn frame_filename(
    sequence: u64,
    aux_timestamp: f64,
    host_timestamp: f64,
    format: ImageFormat,
) -> String {
    format!(
        "Frame-{}--Aux time-{}--Host time-{}.{}",
        sequence,
        aux_timestamp,
        host_timestamp,
        format.extension()
    )
}

/// Counters kept by the sink
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkStats {
    /// Notifications received
    pub frames_received: u64,
    /// Frames written to disk
    pub frames_saved: u64,
    /// Frames whose save failed
    pub persist_failures: u64,
    /// Notifications that reported a stalled frame rate
    pub stall_events: u64,
    /// Sequence number of the most recent frame
    pub last_sequence: Option<u64>,
    /// Frame-rate health after the most recent frame
    pub frame_rate: FrameRateStatistics,
}

/// Saves every notified frame into the run directory
#[derive(Debug)]
pub struct FrameEventSink {
    run_dir: PathBuf,
    format: ImageFormat,
    stats: Mutex<SinkStats>,
}

impl FrameEventSink {
    /// Create a sink writing into `run_dir`
    pub fn new(run_dir: impl Into<PathBuf>, format: ImageFormat) -> Self {
        Self {
            run_dir: run_dir.into(),
            format,
            stats: Mutex::new(SinkStats::default()),
        }
    }

    /// Directory frames are written to
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Full path a frame event is saved to
    pub fn frame_path(&self, event: &FrameEvent<'_>) -> PathBuf {
        self.run_dir.join(frame_filename(
            event.sequence,
            event.aux_timestamp,
            event.host_timestamp,
            self.format,
        ))
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> SinkStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl FrameHandler for FrameEventSink {
    fn on_frame_ready(&self, event: FrameEvent<'_>) {
        let path = self.frame_path(&event);
        let saved = event.buffer.persist(&path, self.format);

        tracing::debug!(
            "Aux time: {}, Host time: {}, Frame: {}",
            event.aux_timestamp,
            event.host_timestamp,
            event.sequence
        );

        if let Err(e) = &saved {
            tracing::error!("Failed to save frame {} to {:?}: {}", event.sequence, path, e);
        }

        let frame_rate = event
            .transfer
            .update_frame_rate_statistics()
            .map(FrameRateStatistics::from);

        if frame_rate.is_some_and(|rate| rate.stalled) {
            tracing::warn!("Live frame rate is stalled.");
        }

        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.frames_received += 1;
        stats.last_sequence = Some(event.sequence);
        if saved.is_ok() {
            stats.frames_saved += 1;
        } else {
            stats.persist_failures += 1;
        }
        if let Some(rate) = frame_rate {
            if rate.stalled {
                stats.stall_events += 1;
            }
            stats.frame_rate = rate;
        }
    }
}
