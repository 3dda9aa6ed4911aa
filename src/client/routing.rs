//! Async routing client.
//!
//! Mirrors the bus over the routing multicast group. Sending is fire and
//! forget; receiving yields every `L_Data` message seen on the group.
//!
//! ## Example
//!
//! ```rust,no_run
//! use core::ops::ControlFlow;
//! use knx_ip_client::client::RoutingClient;
//! use knx_ip_client::config::RoutingConfig;
//! use knx_ip_client::{ga, ia};
//!
//! # async fn run() -> knx_ip_client::Result<()> {
//! let mut client = RoutingClient::bind(RoutingConfig::default())?;
//! client.send(ia!(1, 1, 250), ga!(1/2/3), &[0x01]).await?;
//!
//! client
//!     .listen(|message| {
//!         println!("{message}");
//!         ControlFlow::Continue(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use core::ops::ControlFlow;

use crate::addressing::IndividualAddress;
use crate::config::RoutingConfig;
use crate::error::{KnxError, Result};
use crate::net::transport::AsyncTransport;
use crate::net::udp::UdpTransport;
use crate::protocol::cemi::{CemiMessage, Destination};
use crate::protocol::routing::Router;

const MAX_PACKET_SIZE: usize = 512;

/// Routing client over an [`AsyncTransport`]
#[derive(Debug)]
pub struct RoutingClient<T: AsyncTransport> {
    transport: T,
    router: Router,
    config: RoutingConfig,
    rx_buffer: [u8; MAX_PACKET_SIZE],
}

impl RoutingClient<UdpTransport> {
    /// Join the configured multicast group.
    ///
    /// # Errors
    ///
    /// `Transport/BindFailed` or `Transport/MulticastJoinFailed` when the
    /// socket cannot be set up.
    pub fn bind(config: RoutingConfig) -> Result<Self> {
        let transport = UdpTransport::bind_multicast(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: AsyncTransport> RoutingClient<T> {
    /// Wrap an already bound transport
    pub fn with_transport(transport: T, config: RoutingConfig) -> Self {
        Self {
            transport,
            router: Router::new(),
            config,
            rx_buffer: [0u8; MAX_PACKET_SIZE],
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a group write as an `L_Data.ind` routing indication.
    pub async fn send(
        &mut self,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        payload: &[u8],
    ) -> Result<()> {
        let datagram = self.router.build_indication(source, destination, payload)?;
        self.transport.send_to(&datagram, self.config.multicast_group).await
    }

    /// Send an arbitrary cEMI message as a routing indication.
    pub async fn send_message(&mut self, message: &CemiMessage) -> Result<()> {
        let datagram = self.router.build(message)?;
        self.transport.send_to(&datagram, self.config.multicast_group).await
    }

    /// Wait for the next accepted message.
    ///
    /// Datagrams that are not `L_Data` routing indications are skipped.
    pub async fn recv(&mut self) -> Result<CemiMessage> {
        loop {
            let (len, _from) = self.transport.recv_from(&mut self.rx_buffer).await?;
            if let Some(message) = self.router.accept(&self.rx_buffer[..len]) {
                return Ok(message);
            }
        }
    }

    /// Invoke `callback` once per accepted message.
    ///
    /// Runs until the callback breaks or the transport is closed, both of
    /// which return `Ok`. Other transport errors end the loop with `Err`.
    pub async fn listen<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(CemiMessage) -> ControlFlow<()>,
    {
        loop {
            let message = match self.recv().await {
                Ok(message) => message,
                Err(KnxError::Transport(ref e)) if e.is_closed() => return Ok(()),
                Err(e) => return Err(e),
            };
            if callback(message).is_break() {
                return Ok(());
            }
        }
    }

    /// Leave the group and release the socket.
    pub fn close(&mut self) {
        self.transport.close();
    }
}
