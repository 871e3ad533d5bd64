//! Packet sender capability.
//!
//! The engine only needs "send one best-effort datagram to this
//! destination". [`PacketSender`] is that seam; [`UdpSender`] is the
//! production implementation over a single unconnected UDP socket.

use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;

use crate::error::SendError;

/// Transmits a single datagram.
///
/// Implementations must not retry: the caller logs the failure and moves
/// on to its next cycle.
#[async_trait::async_trait]
pub trait PacketSender: Send + Sync {
    /// Sends `payload` to `target:port`.
    async fn send(&self, target: &str, port: u16, payload: &[u8]) -> Result<(), SendError>;
}

/// UDP datagram sender sharing one socket across all workers.
///
/// Destinations are checked against the deny list after resolution, so
/// any spelling of a protected address (decimal, hex, IPv4-mapped, or a
/// hostname) is refused before a datagram leaves.
#[derive(Debug)]
pub struct UdpSender {
    socket: UdpSocket,
    denied: Vec<IpAddr>,
}

impl UdpSender {
    /// Binds an ephemeral IPv4 socket.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Bind`] if the socket cannot be created.
    pub async fn bind() -> Result<Self, SendError> {
        Self::bind_to(SocketAddr::from(([0, 0, 0, 0], 0))).await
    }

    /// Binds to an explicit local address.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Bind`] if the socket cannot be created.
    pub async fn bind_to(local: SocketAddr) -> Result<Self, SendError> {
        let socket = UdpSocket::bind(local).await.map_err(SendError::Bind)?;
        Ok(Self {
            socket,
            denied: Vec::new(),
        })
    }

    /// Refuses to transmit to any of `addrs`.
    #[must_use]
    pub fn deny(mut self, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        for ip in addrs {
            let ip = ip.to_canonical();
            if !self.denied.contains(&ip) {
                self.denied.push(ip);
            }
        }
        self
    }

    /// Local address of the underlying socket.
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    async fn resolve(&self, target: &str, port: u16) -> Result<SocketAddr, SendError> {
        let want_v4 = self.socket.local_addr().is_ok_and(|a| a.is_ipv4());
        let mut addrs = tokio::net::lookup_host((target, port))
            .await
            .map_err(|e| SendError::Resolve {
                target: target.to_string(),
                reason: e.to_string(),
            })?;
        addrs
            .find(|a| a.is_ipv4() == want_v4)
            .ok_or_else(|| SendError::Resolve {
                target: target.to_string(),
                reason: "no address of a matching family".to_string(),
            })
    }
}

#[async_trait::async_trait]
impl PacketSender for UdpSender {
    async fn send(&self, target: &str, port: u16, payload: &[u8]) -> Result<(), SendError> {
        let dest = self.resolve(target, port).await?;
        let ip = dest.ip().to_canonical();
        if self.denied.contains(&ip) {
            return Err(SendError::Protected {
                target: target.to_string(),
                addr: ip,
            });
        }
        self.socket
            .send_to(payload, dest)
            .await
            .map(|_| ())
            .map_err(|source| SendError::Transmit {
                target: target.to_string(),
                port,
                source,
            })
    }
}
