//! Integration tests for the MCU record pipeline
//!
//! These tests drive a real TCP client against a capture session and check
//! what ends up in the MCU log:
//! - Acknowledgment values
//! - Message boundaries across arbitrary reads
//! - Order and receipt timestamps of logged records
//! - Draining of queued records at shutdown

mod common;

use common::builders::{small_simulation, ConfigBuilder};
use common::client::McuClient;
use common::wait_until;
use linescan_capture::{
    CaptureSession, IngestorState, McuLogEntry, NetworkIngestor, PersistenceLoop, RecordQueue,
    SimulatedGrabber, TimestampRecord,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn read_log(run_dir: &Path) -> Vec<McuLogEntry> {
    let content = std::fs::read_to_string(run_dir.join("MCU_data.txt")).unwrap_or_default();
    content
        .lines()
        .map(|line| McuLogEntry::parse(line).expect("well-formed log line"))
        .collect()
}

fn start_session(root: &Path) -> CaptureSession<SimulatedGrabber> {
    let config = ConfigBuilder::new(root).build();
    CaptureSession::start(&config, SimulatedGrabber::new(small_simulation())).unwrap()
}

#[test]
fn test_trigger_message_acknowledged_and_logged() {
    let dir = TempDir::new().unwrap();
    let session = start_session(dir.path());
    let run_dir = session.run_dir().to_path_buf();

    let mut client = McuClient::connect(session.listen_addr().unwrap());
    assert_eq!(client.send_line("trigger-42"), "10");

    session.shutdown();
    let entries = read_log(&run_dir);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, "trigger-42");
}

#[test]
fn test_messages_logged_in_order_with_monotonic_timestamps() {
    let dir = TempDir::new().unwrap();
    let session = start_session(dir.path());
    let run_dir = session.run_dir().to_path_buf();

    let mut client = McuClient::connect(session.listen_addr().unwrap());
    let payloads: Vec<String> = (0..100).map(|i| format!("evt,{},{}", i, i * 7)).collect();
    for payload in &payloads {
        assert_eq!(client.send_line(payload), payload.len().to_string());
    }

    session.shutdown();
    let entries = read_log(&run_dir);
    let logged: Vec<&str> = entries.iter().map(|e| e.payload.as_str()).collect();
    assert_eq!(logged, payloads);
    assert!(entries
        .windows(2)
        .all(|pair| pair[0].received_at <= pair[1].received_at));
}

#[test]
fn test_byte_by_byte_message_is_one_record() {
    let dir = TempDir::new().unwrap();
    let session = start_session(dir.path());
    let run_dir = session.run_dir().to_path_buf();

    let mut client = McuClient::connect(session.listen_addr().unwrap());
    for byte in b"slow-frame-7\n" {
        client.send_raw(&[*byte]);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(client.read_ack(), "12");

    session.shutdown();
    let entries = read_log(&run_dir);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, "slow-frame-7");
}

#[test]
fn test_two_messages_in_one_write() {
    let dir = TempDir::new().unwrap();
    let session = start_session(dir.path());
    let run_dir = session.run_dir().to_path_buf();

    let mut client = McuClient::connect(session.listen_addr().unwrap());
    client.send_raw(b"alpha\nbe\n");
    assert_eq!(client.read_ack(), "5");
    assert_eq!(client.read_ack(), "2");

    session.shutdown();
    let payloads: Vec<String> = read_log(&run_dir).into_iter().map(|e| e.payload).collect();
    assert_eq!(payloads, vec!["alpha", "be"]);
}

#[test]
fn test_disconnect_keeps_logged_records() {
    let dir = TempDir::new().unwrap();
    let session = start_session(dir.path());
    let run_dir = session.run_dir().to_path_buf();

    let mut client = McuClient::connect(session.listen_addr().unwrap());
    client.send_line("before-drop");
    client.send_raw(b"unterminated");
    drop(client);

    assert!(wait_until(|| session.ingestor_state() == IngestorState::Closed));
    let report = session.shutdown();
    let ingest = report.ingest.unwrap();
    assert_eq!(ingest.messages, 1);
    assert_eq!(ingest.discarded_bytes, "unterminated".len() as u64);

    let entries = read_log(&run_dir);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, "before-drop");
}

#[test]
fn test_shutdown_drains_undrained_records() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("MCU_data.txt");
    let queue = RecordQueue::new();

    // A long poll interval leaves records sitting in the queue.
    let persistence = PersistenceLoop::new(queue.clone(), &log_path, Duration::from_secs(3600))
        .start()
        .unwrap();
    std::thread::sleep(Duration::from_millis(50));
    for i in 0..250 {
        queue.enqueue(TimestampRecord::received_now(format!("pending-{}", i)));
    }
    let stats = persistence.stop();

    assert_eq!(stats.records_written, 250);
    assert_eq!(read_log(dir.path()).len(), 250);
}

#[test]
fn test_ingestor_alone_feeds_queue() {
    let queue = RecordQueue::new();
    let config = linescan_capture::config::NetworkConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let handle = NetworkIngestor::new(config, queue.clone()).start().unwrap();

    let mut client = McuClient::connect(handle.local_addr());
    assert_eq!(client.send_line(""), "0");
    assert_eq!(client.send_line("x\r"), "2");

    let stats = handle.stop();
    assert_eq!(stats.messages, 2);
    assert_eq!(queue.try_dequeue().unwrap().payload(), "");
    assert_eq!(queue.try_dequeue().unwrap().payload(), "x\r");
}
