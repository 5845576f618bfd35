//! MCU record ingestion over TCP
//!
//! - [`LineFramer`] - Splits the byte stream into line-delimited payloads
//! - [`NetworkIngestor`] - Single-connection listener that stamps, enqueues
//!   and acknowledges every payload

pub mod framing;
pub mod server;

pub use framing::{LineFramer, DELIMITER};
pub use server::{IngestorHandle, IngestorStats, NetworkIngestor};
