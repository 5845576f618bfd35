//! Capture session lifecycle
//!
//! [`CaptureSession`] owns every running part of a capture: the persistence
//! thread, the network ingestor and the frame grabber. It starts them in
//! dependency order and stops them cooperatively.
//!
//! # Startup
//!
//! 1. Create the run directory (see [`RunDirectory`])
//! 2. Start the persistence loop on the MCU log
//! 3. Bind and start the network ingestor. A bind failure is logged and the
//!    session carries on camera-only.
//! 4. Initialize the grabber with a [`FrameEventSink`]. A failure stops what
//!    was started and is returned, unless
//!    [`PolicyConfig::continue_without_camera`](crate::config::PolicyConfig)
//!    is set, in which case the session carries on network-only.
//!
//! # Shutdown
//!
//! Ingestor first (its sockets are closed), then the persistence loop after a
//! final drain, then the grabber, which releases transfer, device and buffers.

use crate::acquisition::FrameGrabber;
use crate::clock;
use crate::config::AppConfig;
use crate::error::{Result, ResultExt};
use crate::frame_sink::{FrameEventSink, SinkStats};
use crate::ingest::{IngestorHandle, IngestorStats, NetworkIngestor};
use crate::persistence::{PersistenceHandle, PersistenceLoop, PersistenceStats};
use crate::queue::RecordQueue;
use crate::types::IngestorState;
use chrono::{DateTime, Local};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-run output directory, `<root>/<YYYY-M-D-H-Min-S-Ms>-cam`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create the run directory for a process started at `started`
    pub fn create(root: &Path, started: &DateTime<Local>) -> Result<Self> {
        let path = root.join(clock::run_dir_name(started));
        std::fs::create_dir_all(&path)
            .context(format!("Failed to create run directory {:?}", path))?;
        Ok(Self { path })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the run directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

/// Final statistics of a capture session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShutdownReport {
    /// Network ingestion; `None` when the listener never started
    pub ingest: Option<IngestorStats>,
    /// MCU log persistence
    pub persistence: PersistenceStats,
    /// Frame pipeline; `None` when the camera never initialized
    pub frames: Option<SinkStats>,
}

/// A running capture: persistence, network ingestion and frame acquisition
pub struct CaptureSession<G: FrameGrabber> {
    run_dir: RunDirectory,
    persistence: Option<PersistenceHandle>,
    ingestor: Option<IngestorHandle>,
    grabber: G,
    sink: Option<Arc<FrameEventSink>>,
}

impl<G: FrameGrabber> CaptureSession<G> {
    /// Create a fresh run directory under `output.root_dir` and start
    pub fn start(config: &AppConfig, grabber: G) -> Result<Self> {
        let run_dir = RunDirectory::create(&config.output.root_dir, &Local::now())?;
        Self::start_in(config, run_dir, grabber)
    }

    /// Start all pipelines writing into `run_dir`
    pub fn start_in(config: &AppConfig, run_dir: RunDirectory, mut grabber: G) -> Result<Self> {
        tracing::info!("Run directory: {}", run_dir.path().display());
        let queue = RecordQueue::new();

        let persistence = PersistenceLoop::new(
            queue.clone(),
            run_dir.file(&config.persistence.log_file_name),
            config.persistence.poll_interval(),
        )
        .start()?;

        let ingestor = match NetworkIngestor::new(config.network.clone(), queue.clone()).start() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("{}; continuing without MCU timestamps", e);
                None
            }
        };

        let sink = Arc::new(FrameEventSink::new(run_dir.path(), config.frames.image_format));
        let sink = match grabber.init_device(&config.acquisition, sink.clone()) {
            Ok(()) => {
                tracing::info!(
                    "Camera {} acquiring with {}",
                    config.acquisition.server_name,
                    config.acquisition.config_file.display()
                );
                Some(sink)
            }
            Err(e) if config.policy.continue_without_camera => {
                tracing::error!("{}; continuing without camera", e);
                None
            }
            Err(e) => {
                tracing::error!("{}", e);
                if let Some(ingestor) = ingestor {
                    ingestor.stop();
                }
                persistence.stop();
                return Err(e);
            }
        };

        Ok(Self {
            run_dir,
            persistence: Some(persistence),
            ingestor,
            grabber,
            sink,
        })
    }

    /// Directory this session writes into
    pub fn run_dir(&self) -> &Path {
        self.run_dir.path()
    }

    /// Address the MCU listener is bound to, if it started
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.ingestor.as_ref().map(IngestorHandle::local_addr)
    }

    /// Current ingestor state; `Idle` when the listener never started
    pub fn ingestor_state(&self) -> IngestorState {
        self.ingestor
            .as_ref()
            .map_or(IngestorState::Idle, IngestorHandle::state)
    }

    /// The frame grabber
    pub fn grabber(&self) -> &G {
        &self.grabber
    }

    /// Whether the camera initialized
    pub fn camera_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Frame counters so far, if the camera initialized
    pub fn frame_stats(&self) -> Option<SinkStats> {
        self.sink.as_ref().map(|sink| sink.stats())
    }

    /// Stop everything and report
    pub fn shutdown(mut self) -> ShutdownReport {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let Some(persistence) = self.persistence.take() else {
            return report;
        };
        tracing::info!("Shutting down capture session");

        report.ingest = self.ingestor.take().map(IngestorHandle::stop);
        report.persistence = persistence.stop();

        self.grabber.teardown();
        report.frames = self.sink.take().map(|sink| sink.stats());

        if let Some(frames) = &report.frames {
            tracing::info!(
                "Frames saved: {}, failed: {}",
                frames.frames_saved,
                frames.persist_failures
            );
        }
        report
    }
}

impl<G: FrameGrabber> Drop for CaptureSession<G> {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

impl<G: FrameGrabber> std::fmt::Debug for CaptureSession<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("run_dir", &self.run_dir)
            .field("listen_addr", &self.listen_addr())
            .field("camera_active", &self.camera_active())
            .finish_non_exhaustive()
    }
}
