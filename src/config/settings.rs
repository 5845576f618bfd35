//! Configuration sections
//!
//! Each section is deserialized with `#[serde(default)]` so a config file only
//! needs to name the values it changes. Defaults match the lab rig: a
//! Linea line-scan camera on resource 0, the MCU link on a link-local address
//! and a two second drain cadence for the MCU log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

/// Default camera configuration file
pub const DEFAULT_CAMERA_CONFIG: &str =
    "dalsa_config/500Hz_ex1800_gain_1_blk_1_tr_line1__debounce_100us.ccf";

/// Default acquisition server (camera) name
pub const DEFAULT_SERVER_NAME: &str = "Linea_M4096-7um_1";

/// Default MCU listen port
pub const DEFAULT_LISTEN_PORT: u16 = 1234;

/// Default interval between drains of an empty record queue
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default name of the MCU record log inside the run directory
pub const DEFAULT_LOG_FILE_NAME: &str = "MCU_data.txt";

/// Acquisition device selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionParams {
    /// Camera configuration file (opaque to this crate)
    pub config_file: PathBuf,
    /// Resource index on the acquisition server
    pub resource_index: u32,
    /// Acquisition server / device name
    pub server_name: String,
}

impl Default for AcquisitionParams {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CAMERA_CONFIG),
            resource_index: 0,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

/// MCU link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the ingestor listens on
    pub listen_addr: SocketAddr,
    /// Size of each socket read
    pub read_chunk_bytes: usize,
    /// Longest accepted line before the connection is dropped
    pub max_line_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::new(169, 254, 39, 115),
                DEFAULT_LISTEN_PORT,
            )),
            read_chunk_bytes: 1024,
            max_line_bytes: 64 * 1024,
        }
    }
}

/// MCU log persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// File name of the append-only record log
    pub log_file_name: String,
    /// Wait between polls of an empty queue, in milliseconds
    pub poll_interval_ms: u64,
}

impl PersistenceConfig {
    /// Poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            log_file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// On-disk frame encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Windows bitmap (the rig's native format)
    #[default]
    Bmp,
    /// Portable network graphics
    Png,
    /// Tagged image file format
    Tiff,
}

impl ImageFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Bmp => "bmp",
            ImageFormat::Png => "png",
            ImageFormat::Tiff => "tif",
        }
    }

    /// Matching encoder format of the `image` crate
    pub fn encoder_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Bmp => write!(f, "BMP"),
            ImageFormat::Png => write!(f, "PNG"),
            ImageFormat::Tiff => write!(f, "TIFF"),
        }
    }
}

/// Frame persistence settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Encoding used for every saved frame
    pub image_format: ImageFormat,
}

/// Output location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory under which each run directory is created
    pub root_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
        }
    }
}

/// Failure policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Keep capturing MCU records when the camera fails to initialize
    pub continue_without_camera: bool,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub filter: String,
    /// Also write `capture.log` into the run directory
    pub log_to_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,linescan_capture=debug".to_string(),
            log_to_file: true,
        }
    }
}

/// Settings of the built-in simulated frame grabber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Trigger rate in frames per second
    pub frame_rate_hz: f64,
    /// Pixels per line
    pub width: u32,
    /// Lines per frame
    pub lines: u32,
    /// Number of buffers in the transfer ring
    pub buffer_count: usize,
}

impl SimulationConfig {
    /// Expected time between two frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 500.0,
            width: 4096,
            lines: 64,
            buffer_count: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_defaults() {
        let net = NetworkConfig::default();
        assert_eq!(net.listen_addr.to_string(), "169.254.39.115:1234");
        assert_eq!(net.read_chunk_bytes, 1024);
    }

    #[test]
    fn test_image_format_extension() {
        assert_eq!(ImageFormat::Bmp.extension(), "bmp");
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Tiff.extension(), "tif");
        assert_eq!(ImageFormat::default(), ImageFormat::Bmp);
    }

    #[test]
    fn test_frame_interval() {
        let sim = SimulationConfig {
            frame_rate_hz: 100.0,
            ..Default::default()
        };
        assert_eq!(sim.frame_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_poll_interval() {
        assert_eq!(
            PersistenceConfig::default().poll_interval(),
            Duration::from_secs(2)
        );
    }
}
