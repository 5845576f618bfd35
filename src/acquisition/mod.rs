//! Frame acquisition: the camera driver seen from the capture core
//!
//! The camera driver is an external collaborator. Its contract is expressed as
//! traits so the core never depends on a particular SDK.
//!
//! # Components
//!
//! - [`FrameGrabber`] - Initialization and teardown of the acquisition chain
//! - [`FrameHandler`] - Callback invoked once per captured frame
//! - [`FrameBuffer`] / [`TransferStatistics`] - What the callback may do with
//!   the buffer and the transfer while it runs
//! - [`FrameRateMonitor`] - Rolling live-rate and stall estimation
//! - [`SimulatedGrabber`] - Hardware-free grabber with fault injection

pub mod grabber_trait;
pub mod simulated;
pub mod statistics;

pub use grabber_trait::{
    FrameBuffer, FrameEvent, FrameGrabber, FrameHandler, FrameRateInfo, InitStage,
    TransferStatistics, AUX_TICKS_PER_SECOND, HOST_TICKS_PER_SECOND,
};
pub use simulated::{SimulatedGrabber, SIMULATED_RESOURCE_COUNT};
pub use statistics::{FrameRateMonitor, STALL_FACTOR};

#[cfg(test)]
pub use grabber_trait::{MockFrameBuffer, MockTransferStatistics};
