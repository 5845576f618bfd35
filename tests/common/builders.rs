//! Test data builders for sessions and grabbers

use linescan_capture::config::{AppConfig, ImageFormat, SimulationConfig};
use std::path::Path;

/// Builder for configurations that are safe to run in tests
pub struct ConfigBuilder {
    config: AppConfig,
}

impl ConfigBuilder {
    /// Loopback listener on an ephemeral port, fast polling, output in `root`
    pub fn new(root: &Path) -> Self {
        let mut config = AppConfig::default();
        config.network.listen_addr = "127.0.0.1:0".parse().unwrap();
        config.persistence.poll_interval_ms = 20;
        config.output.root_dir = root.to_path_buf();
        config.simulation = small_simulation();
        Self { config }
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.persistence.poll_interval_ms = ms;
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.config.frames.image_format = format;
        self
    }

    pub fn continue_without_camera(mut self, allowed: bool) -> Self {
        self.config.policy.continue_without_camera = allowed;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

/// A small, quick simulated camera
pub fn small_simulation() -> SimulationConfig {
    SimulationConfig {
        frame_rate_hz: 200.0,
        width: 32,
        lines: 4,
        buffer_count: 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new(Path::new("/tmp/out"))
            .poll_interval_ms(5)
            .image_format(ImageFormat::Png)
            .continue_without_camera(true)
            .build();

        assert_eq!(config.persistence.poll_interval_ms, 5);
        assert_eq!(config.frames.image_format, ImageFormat::Png);
        assert!(config.policy.continue_without_camera);
        assert!(config.validate().is_ok());
    }
}
