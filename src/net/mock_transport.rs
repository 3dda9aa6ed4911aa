//! Mock transport for testing.
//!
//! [`MockTransport`] is a cloneable handle to shared state: hand one clone to
//! a client and keep another in the test to script inbound datagrams and
//! inspect what was sent. `recv_from` pends until a datagram is scripted, so
//! timer driven behaviour can be tested with a paused tokio clock.
//!
//! ## Example
//!
//! ```rust
//! use core::net::{Ipv4Addr, SocketAddrV4};
//! use knx_ip_client::net::mock_transport::MockTransport;
//! use knx_ip_client::net::transport::AsyncTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> knx_ip_client::Result<()> {
//! let mock = MockTransport::new();
//! let mut transport = mock.clone();
//!
//! mock.add_response(vec![0x06, 0x10, 0x02, 0x0A, 0x00, 0x08, 0x05, 0x00]);
//! let mut buf = [0u8; 64];
//! let (n, _from) = transport.recv_from(&mut buf).await?;
//! assert_eq!(n, 8);
//!
//! transport.send_to(&[0xAA], SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3671)).await?;
//! assert_eq!(mock.sent_packets()[0].0, vec![0xAA]);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::{KnxError, Result};
use crate::net::transport::AsyncTransport;
use crate::protocol::constants::KNXNETIP_DEFAULT_PORT;

/// Sender reported for responses scripted with [`MockTransport::add_response`]
pub const MOCK_GATEWAY: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 10), KNXNETIP_DEFAULT_PORT);

#[derive(Debug)]
struct MockState {
    responses: VecDeque<(Vec<u8>, SocketAddrV4)>,
    sent_packets: Vec<(Vec<u8>, SocketAddrV4)>,
    bound: Option<SocketAddrV4>,
    ready: bool,
    close_count: usize,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    arrived: Notify,
}

/// Mock transport for testing KNX communication without a network.
#[derive(Debug, Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a ready mock with nothing scripted.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState {
                    responses: VecDeque::new(),
                    sent_packets: Vec::new(),
                    bound: None,
                    ready: true,
                    close_count: 0,
                }),
                arrived: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script a datagram from [`MOCK_GATEWAY`].
    pub fn add_response(&self, data: impl Into<Vec<u8>>) {
        self.add_response_from(data, MOCK_GATEWAY);
    }

    /// Script a datagram from `from`.
    pub fn add_response_from(&self, data: impl Into<Vec<u8>>, from: SocketAddrV4) {
        self.state().responses.push_back((data.into(), from));
        self.shared.arrived.notify_one();
    }

    /// Every datagram sent so far, with its destination
    pub fn sent_packets(&self) -> Vec<(Vec<u8>, SocketAddrV4)> {
        self.state().sent_packets.clone()
    }

    /// The most recently sent datagram
    pub fn last_sent(&self) -> Option<(Vec<u8>, SocketAddrV4)> {
        self.state().sent_packets.last().cloned()
    }

    /// Forget the send history.
    pub fn clear_sent(&self) {
        self.state().sent_packets.clear();
    }

    /// Number of scripted datagrams not yet received
    pub fn pending_responses(&self) -> usize {
        self.state().responses.len()
    }

    /// Local endpoint passed to `bind`
    pub fn bound(&self) -> Option<SocketAddrV4> {
        self.state().bound
    }

    /// How many times `close` was called
    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    /// Simulate an unbound or failed socket.
    pub fn set_ready(&self, ready: bool) {
        self.state().ready = ready;
        self.shared.arrived.notify_one();
    }
}

impl AsyncTransport for MockTransport {
    fn bind(&mut self, local: SocketAddrV4) -> Result<()> {
        let mut state = self.state();
        state.bound = Some(local);
        state.ready = true;
        Ok(())
    }

    async fn send_to(&mut self, data: &[u8], addr: SocketAddrV4) -> Result<()> {
        let mut state = self.state();
        if !state.ready {
            return Err(KnxError::transport_closed());
        }
        state.sent_packets.push((data.to_vec(), addr));
        Ok(())
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddrV4)> {
        loop {
            // Register before checking so a response added in between is not missed
            let arrived = self.shared.arrived.notified();
            {
                let mut state = self.state();
                if !state.ready {
                    return Err(KnxError::transport_closed());
                }
                if let Some((data, from)) = state.responses.pop_front() {
                    let dst = buf.get_mut(..data.len()).ok_or_else(KnxError::buffer_too_small)?;
                    dst.copy_from_slice(&data);
                    return Ok((data.len(), from));
                }
            }
            arrived.await;
        }
    }

    fn is_ready(&self) -> bool {
        self.state().ready
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.ready = false;
        state.close_count += 1;
        state.responses.clear();
        drop(state);
        self.shared.arrived.notify_one();
    }
}
