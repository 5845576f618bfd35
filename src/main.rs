//! Line-scan capture - Main Entry Point
//!
//! Starts a capture session in a fresh run directory and runs until Ctrl+C.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use linescan_capture::{
    config::AppConfig, CaptureSession, RunDirectory, ShutdownSignal, SimulatedGrabber,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Diagnostic log written into the run directory
const CAPTURE_LOG_FILE: &str = "capture.log";

/// Capture line-scan frames and MCU timestamps into one run directory
#[derive(Debug, Parser)]
#[command(name = "linescan-capture", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Camera configuration file passed to the acquisition device
    #[arg(long = "camera-config", value_name = "PATH")]
    camera_config: Option<PathBuf>,

    /// Acquisition server (device) name
    #[arg(long = "server-name", value_name = "NAME")]
    server_name: Option<String>,

    /// Resource index on the acquisition server
    #[arg(long = "resource-index", value_name = "N")]
    resource_index: Option<u32>,
}

impl Cli {
    /// Resolve the config file, apply the overrides and validate the result
    fn load_config(mut self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::resolve(self.config.take().as_deref())
            .context("Failed to load configuration")?;
        self.apply(&mut config);
        config
            .validate()
            .context("Invalid command-line override")?;
        Ok(config)
    }

    fn apply(self, config: &mut AppConfig) {
        if let Some(path) = self.camera_config {
            config.acquisition.config_file = path;
        }
        if let Some(name) = self.server_name {
            config.acquisition.server_name = name;
        }
        if let Some(index) = self.resource_index {
            config.acquisition.resource_index = index;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let started = Local::now();
    let config = Cli::parse().load_config()?;

    let run_dir = RunDirectory::create(&config.output.root_dir, &started)
        .context("Failed to create run directory")?;

    // Initialize logging; the guard flushes the file writer on exit
    let (file_layer, _log_guard) = if config.logging.log_to_file {
        let appender = tracing_appender::rolling::never(run_dir.path(), CAPTURE_LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting linescan-capture {}", env!("CARGO_PKG_VERSION"));

    let shutdown = ShutdownSignal::install().context("Failed to install Ctrl+C handler")?;

    let grabber = SimulatedGrabber::new(config.simulation.clone());
    let session = CaptureSession::start_in(&config, run_dir, grabber)
        .context("Failed to start capture")?;

    if let Some(addr) = session.listen_addr() {
        tracing::info!("MCU listener bound to {}", addr);
    }
    tracing::info!("Capturing; press Ctrl+C to stop");

    shutdown.wait();

    let report = session.shutdown();
    tracing::info!(
        "Capture finished: {} MCU records written ({} lost)",
        report.persistence.records_written,
        report.persistence.write_failures
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file(dir: &TempDir) -> String {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[acquisition]\nserver_name = \"Linea_M2048-7um_1\"\n").unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let dir = TempDir::new().unwrap();
        let path = config_file(&dir);
        let cli = Cli::try_parse_from([
            "linescan-capture",
            "--config",
            path.as_str(),
            "--server-name",
            "Linea_M4096-7um_2",
            "--resource-index",
            "0",
            "--camera-config",
            "cam.ccf",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.acquisition.server_name, "Linea_M4096-7um_2");
        assert_eq!(config.acquisition.config_file, PathBuf::from("cam.ccf"));
    }

    #[test]
    fn test_file_values_kept_without_overrides() {
        let dir = TempDir::new().unwrap();
        let path = config_file(&dir);
        let cli = Cli::try_parse_from(["linescan-capture", "--config", path.as_str()]).unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.acquisition.server_name, "Linea_M2048-7um_1");
    }

    #[test]
    fn test_empty_server_override_rejected() {
        let dir = TempDir::new().unwrap();
        let path = config_file(&dir);
        let cli = Cli::try_parse_from([
            "linescan-capture",
            "--config",
            path.as_str(),
            "--server-name",
            "",
        ])
        .unwrap();

        let err = cli.load_config().unwrap_err();
        assert!(format!("{:#}", err).contains("acquisition.server_name"));
    }
}
