//! Operator interrupt handling
//!
//! [`ShutdownSignal`] turns Ctrl+C (SIGINT) into a stop request the main
//! thread can block on. The capture session itself never waits on it; the
//! caller waits, then shuts the session down.

use crate::error::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stop request raised by an interrupt or by [`ShutdownSignal::trigger`]
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl ShutdownSignal {
    /// Create a signal and register the Ctrl+C handler
    ///
    /// Only one handler can be registered per process.
    pub fn install() -> Result<Self> {
        let signal = Self::manual();
        let handler = signal.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Interrupt received, shutting down");
            handler.trigger();
        })?;
        Ok(signal)
    }

    /// Create a signal without registering a handler
    pub fn manual() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Request shutdown
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            let _ = self.tx.try_send(());
        }
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Block until shutdown is requested
    pub fn wait(&self) {
        while !self.is_triggered() {
            let _ = self.rx.recv_timeout(Duration::from_millis(250));
        }
    }

    /// Block until shutdown is requested or `timeout` elapses
    ///
    /// Returns whether shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        let _ = self.rx.recv_timeout(timeout);
        self.is_triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_manual_signal_initially_clear() {
        let signal = ShutdownSignal::manual();
        assert!(!signal.is_triggered());
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_trigger_releases_waiter() {
        let signal = ShutdownSignal::manual();
        let waiter = signal.clone();
        let thread = std::thread::spawn(move || waiter.wait());

        std::thread::sleep(Duration::from_millis(20));
        signal.trigger();
        thread.join().unwrap();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let signal = ShutdownSignal::manual();
        signal.trigger();
        signal.trigger();
        assert!(signal.wait_timeout(Duration::from_millis(10)));
        signal.wait();
    }

    #[test]
    #[serial]
    fn test_install_registers_once() {
        // A second registration in the same process is rejected.
        let _ = ShutdownSignal::install();
        assert!(matches!(
            ShutdownSignal::install(),
            Err(crate::error::CaptureError::Signal(_))
        ));
    }
}
