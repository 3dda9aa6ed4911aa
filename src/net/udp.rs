//! Tokio UDP transport.
//!
//! Unicast sockets serve tunnelling, multicast sockets serve routing. Sockets
//! are created synchronously and handed to tokio, so binding must happen from
//! inside a tokio runtime.

use core::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::config::RoutingConfig;
use crate::error::{KnxError, Result};
use crate::knx_log;
use crate::net::transport::AsyncTransport;

/// UDP socket driven by tokio
#[derive(Debug, Default)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    /// Create an unbound transport
    pub const fn new() -> Self {
        Self { socket: None }
    }

    /// Create a transport joined to the routing multicast group.
    ///
    /// The socket binds the group port on all interfaces with address reuse,
    /// so several clients on one host can share the group.
    pub fn bind_multicast(config: &RoutingConfig) -> Result<Self> {
        let group = config.multicast_group;
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_error)?;
        socket.set_reuse_address(true).map_err(bind_error)?;
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, group.port()).into())
            .map_err(bind_error)?;
        socket
            .join_multicast_v4(group.ip(), &config.interface)
            .map_err(|e| {
                knx_log!(error, "joining multicast group failed: {}", IoError(&e));
                KnxError::multicast_join_failed()
            })?;
        socket.set_multicast_if_v4(&config.interface).map_err(bind_error)?;
        socket.set_multicast_loop_v4(config.multicast_loopback).map_err(bind_error)?;
        socket.set_nonblocking(true).map_err(bind_error)?;

        let socket = UdpSocket::from_std(socket.into()).map_err(bind_error)?;
        knx_log!(info, "joined multicast group on port {}", group.port());
        Ok(Self { socket: Some(socket) })
    }

    /// Local endpoint of the bound socket
    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        match self.socket.as_ref()?.local_addr().ok()? {
            SocketAddr::V4(addr) => Some(addr),
            SocketAddr::V6(_) => None,
        }
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(KnxError::transport_closed)
    }
}

/// Log adapter for I/O errors, which only have a `Display` form.
struct IoError<'a>(&'a io::Error);

impl fmt::Display for IoError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.0, f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for IoError<'_> {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{}", defmt::Display2Format(self.0));
    }
}

fn bind_error(e: io::Error) -> KnxError {
    knx_log!(error, "socket setup failed: {}", IoError(&e));
    KnxError::bind_failed()
}

impl AsyncTransport for UdpTransport {
    fn bind(&mut self, local: SocketAddrV4) -> Result<()> {
        let socket = std::net::UdpSocket::bind(local).map_err(bind_error)?;
        socket.set_nonblocking(true).map_err(bind_error)?;
        self.socket = Some(UdpSocket::from_std(socket).map_err(bind_error)?);
        Ok(())
    }

    async fn send_to(&mut self, data: &[u8], addr: SocketAddrV4) -> Result<()> {
        self.socket()?.send_to(data, SocketAddr::V4(addr)).await.map_err(|e| {
            knx_log!(warn, "send failed: {}", IoError(&e));
            KnxError::send_failed()
        })?;
        Ok(())
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)> {
        loop {
            let (n, from) = self.socket()?.recv_from(buf).await.map_err(|e| {
                knx_log!(warn, "receive failed: {}", IoError(&e));
                KnxError::receive_failed()
            })?;
            match from {
                SocketAddr::V4(from) => return Ok((n, from)),
                SocketAddr::V6(_) => knx_log!(trace, "dropping datagram from IPv6 peer"),
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.socket.is_some()
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)
    }

    #[test]
    fn test_io_error_display() {
        let e = io::Error::new(io::ErrorKind::AddrInUse, "port taken");
        assert_eq!(IoError(&e).to_string(), e.to_string());
    }

    #[tokio::test]
    async fn test_unbound_transport_is_closed() {
        let mut transport = UdpTransport::new();
        assert!(!transport.is_ready());
        let err = transport.send_to(&[1], loopback()).await.unwrap_err();
        assert!(matches!(err, KnxError::Transport(ref e) if e.is_closed()));
    }

    #[tokio::test]
    async fn test_loopback_exchange() {
        let mut a = UdpTransport::new();
        let mut b = UdpTransport::new();
        a.bind(loopback()).unwrap();
        b.bind(loopback()).unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(&[0x06, 0x10], b_addr).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x06, 0x10]);
        assert_eq!(Some(from), a.local_addr());

        b.close();
        assert!(!b.is_ready());
    }
}
