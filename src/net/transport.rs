//! Network transport abstraction for KNXnet/IP communication.
//!
//! The async clients depend on [`AsyncTransport`] rather than on a socket
//! type, so the same driver runs over a tokio UDP socket
//! ([`UdpTransport`](super::udp::UdpTransport)) or a scripted
//! [`MockTransport`](super::mock_transport::MockTransport) in tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use core::net::{Ipv4Addr, SocketAddrV4};
//! use knx_ip_client::net::transport::AsyncTransport;
//! use knx_ip_client::net::udp::UdpTransport;
//!
//! # async fn run() -> knx_ip_client::Result<()> {
//! let mut transport = UdpTransport::new();
//! transport.bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
//! transport.send_to(&[0x06, 0x10], SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 10), 3671)).await?;
//! # Ok(())
//! # }
//! ```

use core::net::SocketAddrV4;

use crate::error::Result;

/// Asynchronous datagram transport.
///
/// Implementations can be real sockets, mocks for testing, or alternative
/// links. Only IPv4 endpoints are used: KNXnet/IP HPAIs carry IPv4 addresses.
#[allow(async_fn_in_trait, reason = "drivers await transports in place, futures are never sent across threads")]
pub trait AsyncTransport {
    /// Bind the transport to a local endpoint (port 0 = any free port).
    ///
    /// Construction failures surface here, synchronously.
    ///
    /// # Errors
    ///
    /// Returns `Transport/BindFailed` if the endpoint cannot be bound.
    ///
    /// # Default Implementation
    ///
    /// Does nothing. Override if your transport needs explicit binding.
    fn bind(&mut self, _local: SocketAddrV4) -> Result<()> {
        Ok(())
    }

    /// Send one datagram to `addr`.
    ///
    /// # Errors
    ///
    /// Returns `Transport/SendFailed` or `Transport/Closed`.
    async fn send_to(&mut self, data: &[u8], addr: SocketAddrV4) -> Result<()>;

    /// Wait for one datagram. Returns its length and sender.
    ///
    /// # Errors
    ///
    /// Returns `Transport/ReceiveFailed` or `Transport/Closed`.
    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)>;

    /// Check if the transport is bound and not closed.
    fn is_ready(&self) -> bool {
        true
    }

    /// Close the transport and release resources.
    fn close(&mut self) {}
}
