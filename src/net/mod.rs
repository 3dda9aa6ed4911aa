//! Network transports.
//!
//! The protocol core is sans-IO; this module holds the socket side used by the
//! async clients.

pub mod transport;

#[cfg(feature = "std")]
pub mod mock_transport;
#[cfg(feature = "std")]
pub mod udp;

pub use transport::AsyncTransport;
