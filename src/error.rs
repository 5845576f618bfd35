//! Error handling for linescan-capture
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the capture pipelines. Errors are handled at the component
//! boundary where they occur; only device initialization failures during
//! startup are allowed to stop the process.

use crate::acquisition::InitStage;
use thiserror::Error;

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Frame grabber setup failed at a specific stage
    #[error("Device initialization failed while creating {stage}: {message}")]
    Init { stage: InitStage, message: String },

    /// Socket accept/receive/send failures
    #[error("Network error: {0}")]
    Network(String),

    /// A client sent more bytes than allowed without a line feed
    #[error("Line exceeds {limit} bytes without a delimiter")]
    LineTooLong { limit: usize },

    /// Frame encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Interrupt handler registration failed
    #[error("Signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CaptureError>,
    },
}

impl CaptureError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CaptureError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is a device initialization failure
    pub fn is_init(&self) -> bool {
        match self {
            CaptureError::Init { .. } => true,
            CaptureError::WithContext { source, .. } => source.is_init(),
            _ => false,
        }
    }
}

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CaptureError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| CaptureError::Io(e).with_context(f()))
    }
}
