//! Test doubles shared by the unit tests.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SendError;
use crate::sender::PacketSender;

/// In-memory writer for capturing event output.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Parses every line written so far.
    pub fn events(&self) -> Vec<serde_json::Value> {
        self.contents()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Counts events with the given `"type"` tag.
    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e["type"] == kind).count()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A sent datagram as seen by [`RecordingSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub target: String,
    pub port: u16,
    pub payload: Vec<u8>,
}

/// Packet sender that records calls and optionally fails or stalls
/// every send.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentPacket>>,
    calls: AtomicUsize,
    fail: bool,
    stall: Option<Duration>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every send blocks for `stall` before completing.
    pub fn stalling(stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PacketSender for RecordingSender {
    async fn send(&self, target: &str, port: u16, payload: &[u8]) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail {
            return Err(SendError::Transmit {
                target: target.to_string(),
                port,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "blocked"),
            });
        }
        self.sent.lock().unwrap().push(SentPacket {
            target: target.to_string(),
            port,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
