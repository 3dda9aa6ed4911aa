//! Async tunnelling client.
//!
//! [`TunnelClient`] owns a transport and a [`TunnelConnection`] and moves
//! bytes and time between them. Every operation flushes what the connection
//! produced before returning. Inbound datagrams and timers are only serviced
//! while [`next_event`](TunnelClient::next_event) is awaited, so keep
//! polling it for as long as the tunnel should stay alive.
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_ip_client::client::TunnelClient;
//! use knx_ip_client::config::TunnelConfig;
//! use knx_ip_client::net::udp::UdpTransport;
//! use knx_ip_client::protocol::tunnel::TunnelEvent;
//! use knx_ip_client::{ga, ia};
//!
//! # async fn run() -> knx_ip_client::Result<()> {
//! let mut client = TunnelClient::new(UdpTransport::new(), TunnelConfig::default());
//! let channel = client.connect_and_wait().await?;
//! println!("connected on channel {channel}");
//!
//! client.write(ia!(1, 1, 250), ga!(1/2/3), &[0x01]).await?;
//! loop {
//!     match client.next_event().await? {
//!         TunnelEvent::Indication(message) => println!("{message}"),
//!         TunnelEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use core::net::{Ipv4Addr, SocketAddrV4};

use embassy_time::Instant;
use tokio::time::Duration;

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::config::TunnelConfig;
use crate::dpt::DatapointValue;
use crate::error::{KnxError, Result};
use crate::knx_log;
use crate::net::transport::AsyncTransport;
use crate::protocol::cemi::{CemiMessage, Destination};
use crate::protocol::tunnel::{ConnectionState, TunnelConnection, TunnelEvent};

/// Receive buffer size; larger than any valid frame so oversized ones reach the decoder
const MAX_PACKET_SIZE: usize = 512;

/// Tunnelling client over an [`AsyncTransport`]
#[derive(Debug)]
pub struct TunnelClient<T: AsyncTransport> {
    transport: T,
    tunnel: TunnelConnection,
    epoch: tokio::time::Instant,
    rx_buffer: [u8; MAX_PACKET_SIZE],
}

impl<T: AsyncTransport> TunnelClient<T> {
    /// Create a disconnected client
    pub fn new(transport: T, config: TunnelConfig) -> Self {
        Self {
            transport,
            tunnel: TunnelConnection::new(config),
            epoch: tokio::time::Instant::now(),
            rx_buffer: [0u8; MAX_PACKET_SIZE],
        }
    }

    /// Lifecycle state of the tunnel
    pub fn state(&self) -> ConnectionState {
        self.tunnel.state()
    }

    /// The protocol state machine
    pub fn connection(&self) -> &TunnelConnection {
        &self.tunnel
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn now(&self) -> Instant {
        Instant::from_micros(self.epoch.elapsed().as_micros() as u64)
    }

    fn deadline(&self, at: Instant) -> tokio::time::Instant {
        self.epoch + Duration::from_micros(at.as_micros())
    }

    /// Send a `CONNECT_REQUEST`, binding the transport first if needed.
    ///
    /// The outcome arrives as a [`TunnelEvent`].
    pub async fn connect(&mut self) -> Result<()> {
        if !self.transport.is_ready() {
            self.transport.bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
        }
        let now = self.now();
        self.tunnel.connect(now)?;
        self.flush().await;
        Ok(())
    }

    /// Connect and wait until the gateway accepts or the attempt fails.
    ///
    /// Returns the channel id. Events other than the outcome are discarded.
    pub async fn connect_and_wait(&mut self) -> Result<u8> {
        self.connect().await?;
        loop {
            match self.next_event().await? {
                TunnelEvent::Connected { channel_id } => return Ok(channel_id),
                TunnelEvent::Error(failure) => return Err(failure.into()),
                _ => {}
            }
        }
    }

    /// Queue a cEMI message for delivery.
    pub async fn send(&mut self, message: CemiMessage) -> Result<()> {
        let now = self.now();
        self.tunnel.send(message, now)?;
        self.flush().await;
        Ok(())
    }

    /// Queue a group write carrying raw `payload`.
    pub async fn write(
        &mut self,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        payload: &[u8],
    ) -> Result<()> {
        let now = self.now();
        self.tunnel.write(source, destination, payload, now)?;
        self.flush().await;
        Ok(())
    }

    /// Queue a group write carrying an encoded datapoint value.
    pub async fn write_value(
        &mut self,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        value: &DatapointValue,
    ) -> Result<()> {
        let now = self.now();
        self.tunnel.write_value(source, destination, value, now)?;
        self.flush().await;
        Ok(())
    }

    /// Queue a group read; the answer arrives as an indication.
    pub async fn read(&mut self, source: IndividualAddress, destination: GroupAddress) -> Result<()> {
        let now = self.now();
        self.tunnel.read(source, destination, now)?;
        self.flush().await;
        Ok(())
    }

    /// Send `DISCONNECT_REQUEST` and release the transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.tunnel.disconnect()?;
        self.flush().await;
        Ok(())
    }

    /// Drop the tunnel and close the transport without telling the gateway.
    pub fn dispose(&mut self) {
        self.tunnel.dispose();
        if self.tunnel.poll_close() {
            self.transport.close();
        }
    }

    /// Wait for the next tunnel event.
    ///
    /// Buffered events are returned first. Otherwise the client receives
    /// datagrams and fires timers until the connection produces one.
    ///
    /// # Errors
    ///
    /// `Connection/NotConnected` once the tunnel is closed and every event
    /// has been drained, transport errors as they occur.
    pub async fn next_event(&mut self) -> Result<TunnelEvent> {
        loop {
            self.flush().await;
            if let Some(event) = self.tunnel.poll_event() {
                return Ok(event);
            }
            if self.tunnel.is_closed() {
                return Err(KnxError::not_connected());
            }

            let deadline = self.tunnel.poll_timeout().map(|at| self.deadline(at));
            let timer = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => core::future::pending().await,
                }
            };

            tokio::select! {
                received = self.transport.recv_from(&mut self.rx_buffer) => {
                    let (len, _from) = received?;
                    let now = self.now();
                    if let Err(e) = self.tunnel.handle_datagram(&self.rx_buffer[..len], now) {
                        knx_log!(debug, "datagram rejected: {}", e);
                    }
                }
                () = timer => {
                    let now = self.now();
                    self.tunnel.handle_timeout(now)?;
                }
            }
        }
    }

    /// Send every pending datagram, then close the transport if the tunnel let go of it.
    ///
    /// A failed send drops that datagram. Retransmission or the connection
    /// timers recover from it.
    async fn flush(&mut self) {
        while let Some(transmit) = self.tunnel.poll_transmit() {
            if let Err(e) = self.transport.send_to(&transmit.datagram, transmit.destination).await {
                knx_log!(warn, "dropping datagram, send failed: {}", e);
            }
        }
        if self.tunnel.poll_close() {
            knx_log!(debug, "closing tunnel transport");
            self.transport.close();
        }
    }
}
