//! Minimal MCU client speaking the line protocol

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};

/// Client side of the MCU link
pub struct McuClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl McuClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to ingestor");
        stream
            .set_read_timeout(Some(super::test_timeout()))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { stream, reader }
    }

    /// Write raw bytes as-is
    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).unwrap();
        self.stream.flush().unwrap();
    }

    /// Read one acknowledgment line, without its line feed
    pub fn read_ack(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line.strip_suffix('\n').unwrap_or(&line).to_string()
    }

    /// Send one message and return its acknowledgment
    pub fn send_line(&mut self, payload: &str) -> String {
        self.send_raw(format!("{}\n", payload).as_bytes());
        self.read_ack()
    }
}
