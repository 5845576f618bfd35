//! Simulated Frame Grabber
//!
//! This module provides a frame grabber that behaves like the rig's
//! line-scan camera without any hardware attached. It is used by the binary
//! when no vendor driver is linked, and by the tests.
//!
//! # Behavior
//!
//! - **Initialization**: resolves the device location, then creates the
//!   acquisition device, the buffer ring and the transfer, in that order
//! - **Acquisition**: the transfer runs its own driver thread, ticking at the
//!   configured trigger rate, writing a synthetic line pattern into the next
//!   buffer of the ring and invoking the registered [`FrameHandler`]
//! - **Persist**: encodes the frame as an 8-bit grayscale image with the
//!   `image` crate
//! - **Teardown**: stops the transfer thread, then releases device and buffers
//!
//! # Fault Injection
//!
//! Any initialization stage can be made to fail, and persist can be made to
//! fail for chosen frame sequence numbers:
//!
//! ```ignore
//! use linescan_capture::acquisition::{InitStage, SimulatedGrabber};
//!
//! let grabber = SimulatedGrabber::new(config.simulation.clone())
//!     .with_init_failure(InitStage::Buffers)
//!     .with_persist_failure(3);
//! ```

use super::grabber_trait::{
    FrameBuffer, FrameEvent, FrameGrabber, FrameHandler, FrameRateInfo, InitStage,
    TransferStatistics,
};
use super::statistics::FrameRateMonitor;
use crate::config::{AcquisitionParams, ImageFormat, SimulationConfig};
use crate::error::{CaptureError, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Number of acquisition devices the simulated server exposes
pub const SIMULATED_RESOURCE_COUNT: u32 = 1;

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The simulated camera
#[derive(Debug)]
struct SimDevice {
    server_name: String,
    resource_index: u32,
    config_file: PathBuf,
}

/// Ring of frame buffers shared with the transfer thread
#[derive(Debug)]
struct BufferRing {
    width: u32,
    lines: u32,
    slots: Vec<Mutex<Vec<u8>>>,
}

impl BufferRing {
    fn new(width: u32, lines: u32, count: usize) -> Self {
        let size = width as usize * lines as usize;
        Self {
            width,
            lines,
            slots: (0..count).map(|_| Mutex::new(vec![0u8; size])).collect(),
        }
    }

    fn slot(&self, sequence: u64) -> &Mutex<Vec<u8>> {
        &self.slots[(sequence % self.slots.len() as u64) as usize]
    }
}

/// Running transfer: driver thread plus its stop channel
#[derive(Debug)]
struct SimTransfer {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

/// Borrowed view of one buffer slot, handed to the frame callback
struct SimBuffer<'a> {
    pixels: &'a [u8],
    width: u32,
    lines: u32,
    sequence: u64,
    persist_failures: &'a HashSet<u64>,
}

impl FrameBuffer for SimBuffer<'_> {
    fn persist(&self, path: &Path, format: ImageFormat) -> Result<()> {
        if self.persist_failures.contains(&self.sequence) {
            return Err(CaptureError::Io(std::io::Error::other(format!(
                "simulated write failure for frame {}",
                self.sequence
            ))));
        }

        let image = image::ImageBuffer::<image::Luma<u8>, &[u8]>::from_raw(
            self.width,
            self.lines,
            self.pixels,
        )
        .ok_or_else(|| {
            CaptureError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "buffer size does not match frame geometry",
            ))
        })?;

        image.save_with_format(path, format.encoder_format())?;
        Ok(())
    }
}

/// Statistics computed by the transfer when the frame arrived
struct SimTransferView {
    info: FrameRateInfo,
}

impl TransferStatistics for SimTransferView {
    fn update_frame_rate_statistics(&self) -> Option<FrameRateInfo> {
        Some(self.info)
    }
}

/// Frame grabber that synthesizes line-scan frames on a driver thread
pub struct SimulatedGrabber {
    settings: SimulationConfig,
    frame_limit: Option<u64>,
    fail_stage: Option<InitStage>,
    persist_failures: Arc<HashSet<u64>>,
    device: Option<SimDevice>,
    buffers: Option<Arc<BufferRing>>,
    transfer: Option<SimTransfer>,
    grabbing: Arc<AtomicBool>,
    frames_delivered: Arc<AtomicU64>,
    released: Vec<InitStage>,
}

impl SimulatedGrabber {
    /// Create an uninitialized grabber
    pub fn new(settings: SimulationConfig) -> Self {
        Self {
            settings,
            frame_limit: None,
            fail_stage: None,
            persist_failures: Arc::new(HashSet::new()),
            device: None,
            buffers: None,
            transfer: None,
            grabbing: Arc::new(AtomicBool::new(false)),
            frames_delivered: Arc::new(AtomicU64::new(0)),
            released: Vec::new(),
        }
    }

    /// Stop triggering after `frames` frames
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Make initialization fail when creating `stage`
    pub fn with_init_failure(mut self, stage: InitStage) -> Self {
        self.fail_stage = Some(stage);
        self
    }

    /// Make persist fail for the frame with this sequence number
    pub fn with_persist_failure(mut self, sequence: u64) -> Self {
        Arc::make_mut(&mut self.persist_failures).insert(sequence);
        self
    }

    /// Number of frames handed to the callback so far
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::SeqCst)
    }

    /// Resources released so far, in release order
    pub fn released_stages(&self) -> &[InitStage] {
        &self.released
    }

    /// Fail with an init error at `stage` if one was injected
    fn check_injected(&mut self, stage: InitStage) -> Result<()> {
        if self.fail_stage == Some(stage) {
            self.release_resources();
            return Err(CaptureError::Init {
                stage,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn start_transfer(&mut self, handler: Arc<dyn FrameHandler>) -> Result<()> {
        let Some(ring) = self.buffers.clone() else {
            return Err(CaptureError::Init {
                stage: InitStage::Transfer,
                message: "no buffers to transfer into".to_string(),
            });
        };

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let interval = self.settings.frame_interval();
        let frame_limit = self.frame_limit;
        let persist_failures = Arc::clone(&self.persist_failures);
        let grabbing = Arc::clone(&self.grabbing);
        let delivered = Arc::clone(&self.frames_delivered);

        grabbing.store(true, Ordering::SeqCst);
        let thread = std::thread::Builder::new()
            .name("sim-xfer".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut monitor = FrameRateMonitor::new(interval);
                let mut next_tick = started + interval;
                let mut counter: u64 = 0;

                loop {
                    if frame_limit.is_some_and(|limit| counter >= limit) {
                        break;
                    }

                    let wait = next_tick.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    next_tick += interval;
                    counter += 1;

                    let sequence = counter - 1;
                    let mut pixels = lock_recover(ring.slot(sequence));
                    fill_line_pattern(&mut pixels, ring.width, sequence);

                    let arrived = Instant::now();
                    monitor.record_frame(arrived);
                    let transfer = SimTransferView {
                        info: monitor.snapshot(arrived),
                    };
                    let buffer = SimBuffer {
                        pixels: &pixels,
                        width: ring.width,
                        lines: ring.lines,
                        sequence,
                        persist_failures: &persist_failures,
                    };

                    let aux_ticks = started.elapsed().as_micros() as u64;
                    let host_ticks = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| (d.as_nanos() / 100) as u64)
                        .unwrap_or(0);

                    handler.on_frame_ready(FrameEvent::from_raw(
                        counter, aux_ticks, host_ticks, &buffer, &transfer,
                    ));
                    delivered.fetch_add(1, Ordering::SeqCst);
                }

                grabbing.store(false, Ordering::SeqCst);
                tracing::debug!("Transfer thread exiting after {} frames", counter);
            })
            .map_err(|e| {
                self.grabbing.store(false, Ordering::SeqCst);
                CaptureError::Init {
                    stage: InitStage::Transfer,
                    message: format!("failed to spawn transfer thread: {}", e),
                }
            })?;

        self.transfer = Some(SimTransfer {
            stop_tx,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Release whatever exists, transfer first, then device, then buffers
    fn release_resources(&mut self) {
        if let Some(mut transfer) = self.transfer.take() {
            let _ = transfer.stop_tx.try_send(());
            if let Some(thread) = transfer.thread.take() {
                if thread.join().is_err() {
                    tracing::error!("Transfer thread panicked");
                }
            }
            self.grabbing.store(false, Ordering::SeqCst);
            self.released.push(InitStage::Transfer);
            tracing::info!("Transfer destroyed");
        }

        if let Some(device) = self.device.take() {
            self.released.push(InitStage::Device);
            tracing::info!(
                "Acquisition device {}[{}] ({:?}) destroyed",
                device.server_name,
                device.resource_index,
                device.config_file
            );
        }

        if self.buffers.take().is_some() {
            self.released.push(InitStage::Buffers);
            tracing::info!("Buffers destroyed");
        }
    }
}

impl FrameGrabber for SimulatedGrabber {
    fn init_device(
        &mut self,
        params: &AcquisitionParams,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<()> {
        if self.device.is_some() {
            return Err(CaptureError::Init {
                stage: InitStage::Device,
                message: "device already initialized".to_string(),
            });
        }

        if params.server_name.trim().is_empty()
            || params.resource_index >= SIMULATED_RESOURCE_COUNT
        {
            return Err(CaptureError::Init {
                stage: InitStage::Location,
                message: format!(
                    "no acquisition device at '{}' resource {}",
                    params.server_name, params.resource_index
                ),
            });
        }
        self.check_injected(InitStage::Location)?;

        self.check_injected(InitStage::Device)?;
        self.device = Some(SimDevice {
            server_name: params.server_name.clone(),
            resource_index: params.resource_index,
            config_file: params.config_file.clone(),
        });
        tracing::info!(
            "Acquisition device {}[{}] created with {:?}",
            params.server_name,
            params.resource_index,
            params.config_file
        );

        self.check_injected(InitStage::Buffers)?;
        self.buffers = Some(Arc::new(BufferRing::new(
            self.settings.width,
            self.settings.lines,
            self.settings.buffer_count,
        )));
        tracing::info!(
            "{} buffers of {}x{} created",
            self.settings.buffer_count,
            self.settings.width,
            self.settings.lines
        );

        self.check_injected(InitStage::Transfer)?;
        if let Err(e) = self.start_transfer(handler) {
            self.release_resources();
            return Err(e);
        }
        tracing::info!(
            "Grabbing at {} Hz (end-of-frame events)",
            self.settings.frame_rate_hz
        );

        Ok(())
    }

    fn teardown(&mut self) {
        self.release_resources();
    }

    fn is_grabbing(&self) -> bool {
        self.grabbing.load(Ordering::SeqCst)
    }
}

impl Drop for SimulatedGrabber {
    fn drop(&mut self) {
        self.release_resources();
    }
}

impl std::fmt::Debug for SimulatedGrabber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedGrabber")
            .field("settings", &self.settings)
            .field("device", &self.device)
            .field("grabbing", &self.is_grabbing())
            .field("frames_delivered", &self.frames_delivered())
            .finish()
    }
}

/// Diagonal ramp that shifts by one pixel per frame
fn fill_line_pattern(pixels: &mut [u8], width: u32, sequence: u64) {
    let width = width.max(1) as usize;
    let shift = (sequence % 256) as usize;
    for (i, px) in pixels.iter_mut().enumerate() {
        let (line, x) = (i / width, i % width);
        *px = ((x + line + shift) % 256) as u8;
    }
}
