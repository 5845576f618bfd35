//! # linescan-capture: Line-Scan Capture with MCU Timestamp Logging
//!
//! Records a line-scan camera and a microcontroller's event stream side by
//! side on one host. Every frame the camera driver delivers is saved as an
//! image whose name carries the frame's sequence number and both of its
//! timestamps; every line the MCU sends over TCP is stamped with the local
//! wall-clock time and appended to a log. Both end up in one run directory so
//! the two streams can be correlated offline.
//!
//! ## Architecture
//!
//! Two independent pipelines share only the run directory and the process
//! lifetime:
//!
//! - **Frames**: camera driver -> [`FrameEventSink`] -> image files
//! - **MCU records**: TCP client -> [`NetworkIngestor`] -> [`RecordQueue`] ->
//!   [`PersistenceLoop`] -> `MCU_data.txt`
//!
//! [`CaptureSession`] starts both and shuts them down cooperatively; no thread
//! is ever killed.
//!
//! ## Example
//!
//! ```ignore
//! use linescan_capture::{AppConfig, CaptureSession, ShutdownSignal, SimulatedGrabber};
//!
//! let config = AppConfig::resolve(None)?;
//! let grabber = SimulatedGrabber::new(config.simulation.clone());
//! let session = CaptureSession::start(&config, grabber)?;
//!
//! ShutdownSignal::install()?.wait();
//! let report = session.shutdown();
//! println!("{} MCU records written", report.persistence.records_written);
//! ```

pub mod acquisition;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame_sink;
pub mod ingest;
pub mod lifecycle;
pub mod persistence;
pub mod queue;
pub mod signal;
pub mod types;

// Re-export commonly used types
pub use acquisition::{FrameEvent, FrameGrabber, FrameHandler, InitStage, SimulatedGrabber};
pub use config::AppConfig;
pub use error::{CaptureError, Result};
pub use frame_sink::{frame_filename, FrameEventSink, SinkStats};
pub use ingest::{IngestorHandle, IngestorStats, NetworkIngestor};
pub use lifecycle::{CaptureSession, RunDirectory, ShutdownReport};
pub use persistence::{McuLog, PersistenceLoop, PersistenceStats};
pub use queue::RecordQueue;
pub use signal::ShutdownSignal;
pub use types::{IngestorState, McuLogEntry, TimestampRecord};
