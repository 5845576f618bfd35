//! Frame grabber collaborator contract
//!
//! The camera driver is an external collaborator. This module describes what
//! the capture core needs from it: a way to initialize and tear down the
//! acquisition chain, a callback invoked once per captured frame, and the
//! buffer and transfer operations that callback is allowed to use.
//!
//! A [`FrameEvent`] only borrows the frame buffer and the transfer. The driver
//! is free to recycle the buffer the moment the callback returns, so the
//! borrow ends there too.

use crate::config::{AcquisitionParams, ImageFormat};
use crate::error::Result;
use crate::types::FrameRateStatistics;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Auxiliary (camera) clock ticks per second
pub const AUX_TICKS_PER_SECOND: f64 = 1e6;

/// Host clock ticks per second
pub const HOST_TICKS_PER_SECOND: f64 = 1e7;

/// Stage of device initialization, in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStage {
    /// Resolving server name and resource index
    Location,
    /// Acquisition device (camera, loaded with its config file)
    Device,
    /// Frame buffer ring
    Buffers,
    /// Device-to-buffer transfer
    Transfer,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStage::Location => write!(f, "device location"),
            InitStage::Device => write!(f, "acquisition device"),
            InitStage::Buffers => write!(f, "buffers"),
            InitStage::Transfer => write!(f, "transfer"),
        }
    }
}

/// Frame-rate statistics as reported by a transfer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameRateInfo {
    /// Whether `live_rate` holds an estimate
    pub live_rate_available: bool,
    /// Live frame rate in Hz
    pub live_rate: f32,
    /// No frame arrived within the expected window
    pub stalled: bool,
}

impl From<FrameRateInfo> for FrameRateStatistics {
    fn from(info: FrameRateInfo) -> Self {
        Self {
            live_rate: info.live_rate_available.then_some(info.live_rate),
            stalled: info.stalled,
        }
    }
}

/// A driver-owned frame buffer
#[cfg_attr(test, mockall::automock)]
pub trait FrameBuffer {
    /// Encode the buffer contents to `path`, synchronously
    fn persist(&self, path: &Path, format: ImageFormat) -> Result<()>;
}

/// Statistics side of a running transfer
#[cfg_attr(test, mockall::automock)]
pub trait TransferStatistics {
    /// Refresh and return the frame-rate statistics, `None` if unavailable
    fn update_frame_rate_statistics(&self) -> Option<FrameRateInfo>;
}

/// One frame-ready notification
pub struct FrameEvent<'a> {
    /// Frame sequence number, starting at 0
    pub sequence: u64,
    /// Camera clock timestamp in seconds
    pub aux_timestamp: f64,
    /// Host clock timestamp in seconds
    pub host_timestamp: f64,
    /// Buffer holding the frame; valid only during the callback
    pub buffer: &'a dyn FrameBuffer,
    /// Transfer that delivered the frame
    pub transfer: &'a dyn TransferStatistics,
}

impl<'a> FrameEvent<'a> {
    /// Build an event from raw driver values
    ///
    /// The driver's frame counter starts at 1, the camera clock ticks in
    /// microseconds and the host clock in 100 ns units.
    pub fn from_raw(
        frame_counter: u64,
        aux_ticks: u64,
        host_ticks: u64,
        buffer: &'a dyn FrameBuffer,
        transfer: &'a dyn TransferStatistics,
    ) -> Self {
        Self {
            sequence: frame_counter.saturating_sub(1),
            aux_timestamp: aux_ticks as f64 / AUX_TICKS_PER_SECOND,
            host_timestamp: host_ticks as f64 / HOST_TICKS_PER_SECOND,
            buffer,
            transfer,
        }
    }
}

impl fmt::Debug for FrameEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameEvent")
            .field("sequence", &self.sequence)
            .field("aux_timestamp", &self.aux_timestamp)
            .field("host_timestamp", &self.host_timestamp)
            .finish_non_exhaustive()
    }
}

/// Receiver of frame-ready notifications
///
/// Called on a thread owned by the driver. Implementations must finish with
/// the buffer before returning and must not block on anything but the
/// persist itself.
pub trait FrameHandler: Send + Sync {
    /// Handle one captured frame
    fn on_frame_ready(&self, event: FrameEvent<'_>);
}

/// Acquisition chain of a frame grabber
///
/// # Example
///
/// ```ignore
/// let mut grabber = SimulatedGrabber::new(config.simulation.clone());
/// grabber.init_device(&config.acquisition, sink.clone())?;
/// // frames now arrive on the driver thread
/// grabber.teardown();
/// ```
pub trait FrameGrabber: Send {
    /// Create device, buffers and transfer, register `handler` and start
    /// grabbing
    ///
    /// On failure everything created so far has been released again and a
    /// [`CaptureError::Init`](crate::error::CaptureError::Init) names the
    /// failing stage.
    fn init_device(
        &mut self,
        params: &AcquisitionParams,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<()>;

    /// Stop grabbing and release transfer, device and buffers, in that order
    ///
    /// Safe to call more than once.
    fn teardown(&mut self);

    /// Whether frames are currently being delivered
    fn is_grabbing(&self) -> bool;
}
