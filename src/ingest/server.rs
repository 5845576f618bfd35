//! MCU network ingestor
//!
//! Runs on its own thread. Listens on the configured address, accepts a single
//! client, and for every line received: stamps it with the local wall-clock
//! time, enqueues `payload,timestamp` on the [`RecordQueue`], and answers with
//! the payload's byte length followed by a line feed.
//!
//! # State Machine
//!
//! `Idle -> Listening -> Connected <-> Receiving -> Closed`
//!
//! A socket error or a clean disconnect closes the connection for good: the
//! listener is gone after the first accept, so there is no re-listen. The
//! queue and everything already in it are unaffected.
//!
//! # Stopping
//!
//! [`IngestorHandle::stop`] sets a stop flag and then releases whatever the
//! thread is blocked in: a pending read is released by shutting the socket
//! down, a pending accept by a throwaway loopback connection.

use super::framing::LineFramer;
use crate::clock;
use crate::config::NetworkConfig;
use crate::error::{CaptureError, Result, ResultExt};
use crate::queue::RecordQueue;
use crate::types::{IngestorState, TimestampRecord};
use chrono::Local;
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// How long a wake-up connection may take before giving up
const WAKE_TIMEOUT: Duration = Duration::from_millis(500);

/// Counters returned when the ingestor thread ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestorStats {
    /// Connections accepted (0 or 1)
    pub connections: u64,
    /// Messages enqueued
    pub messages: u64,
    /// Payload bytes enqueued, delimiters excluded
    pub payload_bytes: u64,
    /// Bytes of an unterminated line dropped at disconnect
    pub discarded_bytes: u64,
}

/// State shared between the ingestor thread and its handle
#[derive(Debug, Default)]
struct Shared {
    stop: AtomicBool,
    state: Mutex<IngestorState>,
    active: Mutex<Option<TcpStream>>,
}

impl Shared {
    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: IngestorState) {
        *Self::lock(&self.state) = state;
    }

    fn state(&self) -> IngestorState {
        *Self::lock(&self.state)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Listener for the MCU record stream
#[derive(Debug)]
pub struct NetworkIngestor {
    config: NetworkConfig,
    queue: RecordQueue,
}

impl NetworkIngestor {
    /// Create an ingestor feeding `queue`
    pub fn new(config: NetworkConfig, queue: RecordQueue) -> Self {
        Self { config, queue }
    }

    /// Bind the listener and start the ingestor thread
    ///
    /// Binding happens before this returns, so an unusable address is
    /// reported here rather than on the thread.
    pub fn start(self) -> Result<IngestorHandle> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .map_err(|e| CaptureError::Network(format!("bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read listener address")?;

        let shared = Arc::new(Shared::default());
        shared.set_state(IngestorState::Listening);

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("mcu-ingest".to_string())
            .spawn(move || {
                let stats = run(listener, &thread_shared, &self.queue, &self.config);
                thread_shared.set_state(IngestorState::Closed);
                stats
            })
            .context("Failed to spawn ingestor thread")?;

        Ok(IngestorHandle {
            shared,
            local_addr,
            thread: Some(thread),
        })
    }
}

/// Owner handle of a running ingestor
#[derive(Debug)]
pub struct IngestorHandle {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<IngestorStats>>,
}

impl IngestorHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current state of the ingestor
    pub fn state(&self) -> IngestorState {
        self.shared.state()
    }

    /// Whether the ingestor thread has ended
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the ingestor, close its sockets and wait for the thread
    pub fn stop(mut self) -> IngestorStats {
        self.stop_inner()
    }

    fn stop_inner(&mut self) -> IngestorStats {
        let Some(thread) = self.thread.take() else {
            return IngestorStats::default();
        };

        self.shared.stop.store(true, Ordering::SeqCst);

        if let Some(stream) = Shared::lock(&self.shared.active).as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        if self.shared.state() == IngestorState::Listening {
            // Releases a blocked accept; refused or timed out is fine too.
            let _ = TcpStream::connect_timeout(&wake_addr(self.local_addr), WAKE_TIMEOUT);
        }

        match thread.join() {
            Ok(stats) => {
                tracing::info!(
                    "Ingestor stopped: {} messages, {} payload bytes",
                    stats.messages,
                    stats.payload_bytes
                );
                stats
            }
            Err(_) => {
                tracing::error!("Ingestor thread panicked");
                IngestorStats::default()
            }
        }
    }
}

impl Drop for IngestorHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

/// Loopback equivalent of a wildcard listen address
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

/// Ingestor thread body
fn run(
    listener: TcpListener,
    shared: &Shared,
    queue: &RecordQueue,
    config: &NetworkConfig,
) -> IngestorStats {
    let mut stats = IngestorStats::default();

    tracing::info!("Waiting for a connection on {}...", config.listen_addr);
    let (stream, peer) = match listener.accept() {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::error!("Network error: accept failed: {}", e);
            return stats;
        }
    };
    drop(listener);

    // Register before checking the flag so `stop` either sees the stream or
    // the thread sees the flag.
    match stream.try_clone() {
        Ok(clone) => *Shared::lock(&shared.active) = Some(clone),
        Err(e) => {
            tracing::error!("Network error: cannot register connection: {}", e);
            return stats;
        }
    }
    if shared.stop_requested() {
        tracing::debug!("Stop requested while listening");
        *Shared::lock(&shared.active) = None;
        return stats;
    }
    stats.connections += 1;
    shared.set_state(IngestorState::Connected);
    tracing::info!("MCU connected from {}", peer);

    if let Err(e) = receive(stream, shared, queue, config, &mut stats) {
        if !shared.stop_requested() {
            tracing::warn!("Connection from {} closed: {}", peer, e);
        }
    }

    *Shared::lock(&shared.active) = None;
    stats
}

/// Receive loop for the accepted connection
///
/// Returns `Ok` on a clean disconnect or a stop request, and the error that
/// ended the connection otherwise.
fn receive(
    mut stream: TcpStream,
    shared: &Shared,
    queue: &RecordQueue,
    config: &NetworkConfig,
    stats: &mut IngestorStats,
) -> Result<()> {
    let mut framer = LineFramer::new(config.max_line_bytes);
    let mut chunk = vec![0u8; config.read_chunk_bytes];

    let result = loop {
        if shared.stop_requested() {
            break Ok(());
        }

        shared.set_state(IngestorState::Receiving);
        let n = match stream.read(&mut chunk) {
            Ok(0) => {
                tracing::info!("MCU disconnected");
                break Ok(());
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => break Err(CaptureError::Network(format!("receive failed: {}", e))),
        };
        shared.set_state(IngestorState::Connected);

        framer.push(&chunk[..n]);
        let dispatched = loop {
            match framer.next_line() {
                Ok(Some(payload)) => {
                    if let Err(e) = dispatch(&mut stream, &payload, queue, stats) {
                        break Err(e);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        if let Err(e) = dispatched {
            break Err(e);
        }
    };

    if framer.pending() > 0 {
        stats.discarded_bytes += framer.pending() as u64;
        tracing::warn!(
            "Discarding {} bytes of an unterminated line",
            framer.pending()
        );
    }
    let _ = stream.shutdown(Shutdown::Both);
    result
}

/// Enqueue one payload and acknowledge it
fn dispatch(
    stream: &mut TcpStream,
    payload: &[u8],
    queue: &RecordQueue,
    stats: &mut IngestorStats,
) -> Result<()> {
    let received_at = Local::now();
    let text = String::from_utf8_lossy(payload);
    queue.enqueue(TimestampRecord::new(text, received_at));
    stats.messages += 1;
    stats.payload_bytes += payload.len() as u64;
    tracing::debug!("Text enqueued at: {}", clock::format_dash(&received_at));

    let ack = format!("{}\n", payload.len());
    stream
        .write_all(ack.as_bytes())
        .map_err(|e| CaptureError::Network(format!("acknowledge failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::time::Instant;

    fn test_config() -> NetworkConfig {
        NetworkConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    fn wait_for_state(handle: &IngestorHandle, state: IngestorState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if handle.state() == state {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_wake_addr_maps_wildcard() {
        let addr: SocketAddr = "0.0.0.0:1234".parse().unwrap();
        assert_eq!(wake_addr(addr), "127.0.0.1:1234".parse().unwrap());
        let addr: SocketAddr = "[::]:1234".parse().unwrap();
        assert_eq!(wake_addr(addr), "[::1]:1234".parse().unwrap());
        let addr: SocketAddr = "10.0.0.2:1234".parse().unwrap();
        assert_eq!(wake_addr(addr), addr);
    }

    #[test]
    fn test_stop_while_listening() {
        let handle = NetworkIngestor::new(test_config(), RecordQueue::new())
            .start()
            .unwrap();
        assert_eq!(handle.state(), IngestorState::Listening);

        let stats = handle.stop();
        assert_eq!(stats.connections, 0);
    }

    #[test]
    fn test_stop_while_receiving() {
        let queue = RecordQueue::new();
        let handle = NetworkIngestor::new(test_config(), queue.clone())
            .start()
            .unwrap();
        let _client = TcpStream::connect(handle.local_addr()).unwrap();
        assert!(wait_for_state(&handle, IngestorState::Receiving));

        let stats = handle.stop();
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.messages, 0);
    }

    #[test]
    fn test_message_enqueued_and_acknowledged() {
        let queue = RecordQueue::new();
        let handle = NetworkIngestor::new(test_config(), queue.clone())
            .start()
            .unwrap();

        let mut client = TcpStream::connect(handle.local_addr()).unwrap();
        client.write_all(b"trigger-42\n").unwrap();
        let mut reader = BufReader::new(client.try_clone().unwrap());
        let mut ack = String::new();
        reader.read_line(&mut ack).unwrap();
        assert_eq!(ack, "10\n");

        let record = queue.try_dequeue().unwrap();
        assert_eq!(record.payload(), "trigger-42");

        drop(reader);
        drop(client);
        assert!(wait_for_state(&handle, IngestorState::Closed));
        let stats = handle.stop();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.payload_bytes, 10);
    }

    #[test]
    fn test_disconnect_closes_and_second_client_refused() {
        let handle = NetworkIngestor::new(test_config(), RecordQueue::new())
            .start()
            .unwrap();
        let addr = handle.local_addr();

        let first = TcpStream::connect(addr).unwrap();
        assert!(wait_for_state(&handle, IngestorState::Receiving));
        drop(first);
        assert!(wait_for_state(&handle, IngestorState::Closed));
        assert!(handle.is_finished() || wait_for_finish(&handle));

        assert!(TcpStream::connect(addr).is_err());
        handle.stop();
    }

    fn wait_for_finish(handle: &IngestorHandle) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if handle.is_finished() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_oversized_line_drops_connection() {
        let config = NetworkConfig {
            max_line_bytes: 8,
            ..test_config()
        };
        let queue = RecordQueue::new();
        let handle = NetworkIngestor::new(config, queue.clone()).start().unwrap();

        let mut client = TcpStream::connect(handle.local_addr()).unwrap();
        client.write_all(b"0123456789abcdef").unwrap();
        assert!(wait_for_state(&handle, IngestorState::Closed));

        let stats = handle.stop();
        assert_eq!(stats.messages, 0);
        assert!(stats.discarded_bytes > 8);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_oversized_terminated_line_drops_connection() {
        let config = NetworkConfig {
            max_line_bytes: 8,
            ..test_config()
        };
        let queue = RecordQueue::new();
        let handle = NetworkIngestor::new(config, queue.clone()).start().unwrap();

        let mut client = TcpStream::connect(handle.local_addr()).unwrap();
        client.write_all(b"0123456789abcdef\nok\n").unwrap();
        assert!(wait_for_state(&handle, IngestorState::Closed));

        let stats = handle.stop();
        assert_eq!(stats.messages, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_bind_failure_is_network_error() {
        let holder = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = NetworkConfig {
            listen_addr: holder.local_addr().unwrap(),
            ..Default::default()
        };
        let err = NetworkIngestor::new(config, RecordQueue::new())
            .start()
            .unwrap_err();
        assert!(matches!(err, CaptureError::Network(_)));
    }
}
