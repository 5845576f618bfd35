//! Core data types shared by the capture pipelines

use crate::clock;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fmt;

/// One MCU message plus the local wall-clock time it was received
///
/// Rendered as `payload,receipt_timestamp`, which is exactly the line written
/// to the MCU log (without the trailing newline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampRecord {
    payload: String,
    received_at: DateTime<Local>,
}

impl TimestampRecord {
    /// Create a record for a payload received at `received_at`
    pub fn new(payload: impl Into<String>, received_at: DateTime<Local>) -> Self {
        Self {
            payload: payload.into(),
            received_at,
        }
    }

    /// Create a record stamped with the current local time
    pub fn received_now(payload: impl Into<String>) -> Self {
        Self::new(payload, Local::now())
    }

    /// Message text without its delimiter
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Receipt time
    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    /// Receipt time in dash format
    pub fn receipt_timestamp(&self) -> String {
        clock::format_dash(&self.received_at)
    }
}

impl fmt::Display for TimestampRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.payload, self.receipt_timestamp())
    }
}

/// A line read back from the MCU log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McuLogEntry {
    /// Message text (may itself contain commas)
    pub payload: String,
    /// Receipt time, local clock
    pub received_at: NaiveDateTime,
}

impl McuLogEntry {
    /// Parse one log line
    ///
    /// The timestamp never contains a comma, so the line is split at its last
    /// comma; payloads containing commas survive intact.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let (payload, stamp) = line.rsplit_once(',')?;
        Some(Self {
            payload: payload.to_string(),
            received_at: clock::parse_dash(stamp)?,
        })
    }
}

/// Frame-rate health as last reported by the transfer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameRateStatistics {
    /// Live frame rate in Hz, when the transfer can estimate one
    pub live_rate: Option<f32>,
    /// No frame arrived within the expected window
    pub stalled: bool,
}

impl fmt::Display for FrameRateStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.live_rate {
            Some(rate) => write!(f, "{:.1} Hz", rate)?,
            None => write!(f, "n/a")?,
        }
        if self.stalled {
            write!(f, " (stalled)")?;
        }
        Ok(())
    }
}

/// Network ingestor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestorState {
    /// Created, not yet listening
    #[default]
    Idle,
    /// Waiting in accept
    Listening,
    /// Client attached, between reads
    Connected,
    /// Blocked in a socket read
    Receiving,
    /// Connection ended; terminal
    Closed,
}

impl fmt::Display for IngestorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestorState::Idle => write!(f, "Idle"),
            IngestorState::Listening => write!(f, "Listening"),
            IngestorState::Connected => write!(f, "Connected"),
            IngestorState::Receiving => write!(f, "Receiving"),
            IngestorState::Closed => write!(f, "Closed"),
        }
    }
}
