//! Error types for KNXnet/IP client operations.
//!
//! Errors are grouped by category. Every category wraps a small struct holding a
//! private kind and, when `std` is enabled, a backtrace. Callers inspect errors
//! through the predicate methods instead of matching on kinds.

use core::fmt;

#[cfg(feature = "std")]
use std::backtrace::Backtrace;

/// Result type alias for KNX operations.
pub type Result<T> = core::result::Result<T, KnxError>;

// =============================================================================
// Error Kind Enums (Internal)
// =============================================================================

/// Protocol error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ProtocolErrorKind {
    InvalidFrame,
    UnsupportedVersion,
    UnsupportedServiceType,
    PayloadTooLarge,
    InvalidMessageCode,
    InvalidTpdu,
}

/// Connection error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConnectionErrorKind {
    Refused,
    Timeout,
    Lost,
    ChannelMismatch,
    NotConnected,
    AlreadyConnected,
}

/// Tunneling error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TunnelingErrorKind {
    QueueFull,
    RetriesExhausted,
}

/// Transport error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TransportErrorKind {
    SendFailed,
    ReceiveFailed,
    BufferTooSmall,
    BindFailed,
    MulticastJoinFailed,
    Closed,
}

/// Addressing error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum AddressingErrorKind {
    InvalidIndividualAddress,
    InvalidGroupAddress,
    OutOfRange,
}

/// DPT error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DptErrorKind {
    MalformedPayload,
    ValueOutOfRange,
    TypeMismatch,
    NotDataFrame,
}

/// Configuration error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConfigErrorKind {
    InvalidValue,
}

// =============================================================================
// Main Error Type
// =============================================================================

/// KNX client error.
///
/// This is the error type returned by every fallible operation of the crate.
/// Asynchronous tunnel failures are reported as
/// [`TunnelEvent::Error`](crate::protocol::tunnel::TunnelEvent::Error) and can be
/// turned into a `KnxError` with `From`.
#[derive(Debug)]
pub enum KnxError {
    /// Frame and cEMI decoding errors
    Protocol(ProtocolError),
    /// Connection establishment and lifecycle errors
    Connection(ConnectionError),
    /// Outbound delivery errors (queue, retransmission)
    Tunneling(TunnelingError),
    /// Socket level errors
    Transport(TransportError),
    /// Address parsing errors
    Addressing(AddressingError),
    /// Datapoint encoding and decoding errors
    Dpt(DptError),
    /// Configuration parsing errors
    Config(ConfigError),
}

// =============================================================================
// Structured Error Types
// =============================================================================

/// Protocol error with optional backtrace
#[derive(Debug)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ProtocolError {
    /// Check if the frame was malformed (truncated, bad lengths, bad structure)
    pub fn is_invalid_frame(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::InvalidFrame)
    }

    /// Check if this is an unsupported version error
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnsupportedVersion)
    }

    /// Check if the service identifier is not one this client understands
    pub fn is_unsupported_service_type(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnsupportedServiceType)
    }

    /// Check if the cEMI message code is not an `L_Data` primitive
    pub fn is_invalid_message_code(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::InvalidMessageCode)
    }

    /// Check if the TPDU could not be decoded
    pub fn is_invalid_tpdu(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::InvalidTpdu)
    }
}

/// Connection error with optional backtrace
#[derive(Debug)]
pub struct ConnectionError {
    kind: ConnectionErrorKind,
    status: Option<u8>,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ConnectionError {
    pub(crate) fn new(kind: ConnectionErrorKind) -> Self {
        Self {
            kind,
            status: None,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Timeout)
    }

    /// Check if connection was refused
    pub fn is_refused(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Refused)
    }

    /// Check if connection was lost
    pub fn is_lost(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::Lost)
    }

    /// Check if the operation needs an established connection
    pub fn is_not_connected(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::NotConnected)
    }

    /// Check if a frame referenced a channel this client does not hold
    pub fn is_channel_mismatch(&self) -> bool {
        matches!(self.kind, ConnectionErrorKind::ChannelMismatch)
    }

    /// Status code reported by the gateway, if any
    pub fn status(&self) -> Option<u8> {
        self.status
    }
}

/// Tunneling error with optional backtrace
#[derive(Debug)]
pub struct TunnelingError {
    kind: TunnelingErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl TunnelingError {
    pub(crate) fn new(kind: TunnelingErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the outbound queue had no room left
    pub fn is_queue_full(&self) -> bool {
        matches!(self.kind, TunnelingErrorKind::QueueFull)
    }

    /// Check if a request was never acknowledged
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self.kind, TunnelingErrorKind::RetriesExhausted)
    }
}

/// Transport error with optional backtrace
#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if buffer is too small
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self.kind, TransportErrorKind::BufferTooSmall)
    }

    /// Check if the socket could not be bound
    pub fn is_bind_failed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::BindFailed)
    }

    /// Check if joining the multicast group failed
    pub fn is_multicast_join_failed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::MulticastJoinFailed)
    }

    /// Check if the transport was already closed
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Closed)
    }
}

/// Addressing error with optional backtrace
#[derive(Debug)]
pub struct AddressingError {
    kind: AddressingErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl AddressingError {
    pub(crate) fn new(kind: AddressingErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if address is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, AddressingErrorKind::OutOfRange)
    }
}

/// DPT error with optional backtrace
#[derive(Debug)]
pub struct DptError {
    kind: DptErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl DptError {
    pub(crate) fn new(kind: DptErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the payload width did not match the datapoint type
    pub fn is_malformed_payload(&self) -> bool {
        matches!(self.kind, DptErrorKind::MalformedPayload)
    }

    /// Check if value is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, DptErrorKind::ValueOutOfRange)
    }

    /// Check if a value was paired with the wrong datapoint type
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.kind, DptErrorKind::TypeMismatch)
    }

    /// Check if a control frame was asked for a datapoint value
    pub fn is_not_data_frame(&self) -> bool {
        matches!(self.kind, DptErrorKind::NotDataFrame)
    }
}

/// Configuration error with optional backtrace
#[derive(Debug)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    key: &'static str,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ConfigError {
    /// Configuration key whose value could not be parsed
    pub fn key(&self) -> &'static str {
        self.key
    }
}

// =============================================================================
// Convenience Constructors for KnxError
// =============================================================================

impl KnxError {
    // Protocol errors sit on the receive path, so they skip backtrace capture.
    #[inline]
    pub(crate) const fn protocol(kind: ProtocolErrorKind) -> Self {
        Self::Protocol(ProtocolError {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::disabled(),
        })
    }

    #[inline]
    pub(crate) const fn invalid_frame() -> Self {
        Self::protocol(ProtocolErrorKind::InvalidFrame)
    }

    #[inline]
    pub(crate) const fn unsupported_version() -> Self {
        Self::protocol(ProtocolErrorKind::UnsupportedVersion)
    }

    #[inline]
    pub(crate) const fn unsupported_service_type() -> Self {
        Self::protocol(ProtocolErrorKind::UnsupportedServiceType)
    }

    #[inline]
    pub(crate) const fn payload_too_large() -> Self {
        Self::protocol(ProtocolErrorKind::PayloadTooLarge)
    }

    #[inline]
    pub(crate) const fn invalid_message_code() -> Self {
        Self::protocol(ProtocolErrorKind::InvalidMessageCode)
    }

    #[inline]
    pub(crate) const fn invalid_tpdu() -> Self {
        Self::protocol(ProtocolErrorKind::InvalidTpdu)
    }

    // Connection errors
    pub(crate) fn connection_refused(status: u8) -> Self {
        let mut error = ConnectionError::new(ConnectionErrorKind::Refused);
        error.status = Some(status);
        Self::Connection(error)
    }

    pub(crate) fn connection_timeout() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::Timeout))
    }

    pub(crate) fn connection_lost() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::Lost))
    }

    pub(crate) fn not_connected() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::NotConnected))
    }

    pub(crate) fn already_connected() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::AlreadyConnected))
    }

    pub(crate) fn channel_mismatch() -> Self {
        Self::Connection(ConnectionError::new(ConnectionErrorKind::ChannelMismatch))
    }

    // Tunneling errors
    pub(crate) fn queue_full() -> Self {
        Self::Tunneling(TunnelingError::new(TunnelingErrorKind::QueueFull))
    }

    pub(crate) fn retries_exhausted() -> Self {
        Self::Tunneling(TunnelingError::new(TunnelingErrorKind::RetriesExhausted))
    }

    // Transport errors
    pub(crate) fn buffer_too_small() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::BufferTooSmall))
    }

    pub(crate) fn send_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::SendFailed))
    }

    pub(crate) fn receive_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::ReceiveFailed))
    }

    pub(crate) fn bind_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::BindFailed))
    }

    pub(crate) fn multicast_join_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::MulticastJoinFailed))
    }

    pub(crate) fn transport_closed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::Closed))
    }

    // Addressing errors
    pub(crate) fn invalid_group_address() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::InvalidGroupAddress))
    }

    pub(crate) fn invalid_individual_address() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::InvalidIndividualAddress))
    }

    pub(crate) fn address_out_of_range() -> Self {
        Self::Addressing(AddressingError::new(AddressingErrorKind::OutOfRange))
    }

    // DPT errors
    pub(crate) fn malformed_payload() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::MalformedPayload))
    }

    pub(crate) fn dpt_value_out_of_range() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::ValueOutOfRange))
    }

    pub(crate) fn dpt_type_mismatch() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::TypeMismatch))
    }

    pub(crate) fn not_data_frame() -> Self {
        Self::Dpt(DptError::new(DptErrorKind::NotDataFrame))
    }

    // Config errors
    pub(crate) fn invalid_config_value(key: &'static str) -> Self {
        Self::Config(ConfigError {
            kind: ConfigErrorKind::InvalidValue,
            key,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        })
    }

    /// Check if this error means the connection attempt timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, KnxError::Connection(e) if e.is_timeout())
    }

    /// Check if the gateway refused the connection
    pub fn is_refused(&self) -> bool {
        matches!(self, KnxError::Connection(e) if e.is_refused())
    }

    /// Check if a payload did not have the width its datapoint type requires
    pub fn is_malformed_payload(&self) -> bool {
        matches!(self, KnxError::Dpt(e) if e.is_malformed_payload())
    }

    /// Backtrace captured where the error was raised
    ///
    /// Protocol errors never capture one.
    #[cfg(feature = "std")]
    pub fn backtrace(&self) -> &Backtrace {
        match self {
            KnxError::Protocol(e) => &e.backtrace,
            KnxError::Connection(e) => &e.backtrace,
            KnxError::Tunneling(e) => &e.backtrace,
            KnxError::Transport(e) => &e.backtrace,
            KnxError::Addressing(e) => &e.backtrace,
            KnxError::Dpt(e) => &e.backtrace,
            KnxError::Config(e) => &e.backtrace,
        }
    }
}

// =============================================================================
// Asynchronous Tunnel Failures
// =============================================================================

/// Failure reported by a tunnel connection through its event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TunnelFailure {
    /// The gateway answered `CONNECT_REQUEST` with a non-zero status
    Refused {
        /// Status code from `CONNECT_RESPONSE`
        status: u8,
    },
    /// No `CONNECT_RESPONSE` arrived in time
    Timeout,
    /// A request was retransmitted the configured number of times without ack
    RetriesExhausted {
        /// Sequence number of the abandoned request
        sequence: u8,
    },
    /// The gateway stopped answering heartbeats or reported the channel dead
    ConnectionLost,
}

impl From<TunnelFailure> for KnxError {
    fn from(failure: TunnelFailure) -> Self {
        match failure {
            TunnelFailure::Refused { status } => KnxError::connection_refused(status),
            TunnelFailure::Timeout => KnxError::connection_timeout(),
            TunnelFailure::RetriesExhausted { .. } => KnxError::retries_exhausted(),
            TunnelFailure::ConnectionLost => KnxError::connection_lost(),
        }
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl fmt::Display for KnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnxError::Protocol(e) => write!(f, "Protocol error: {:?}", e.kind),
            KnxError::Connection(e) => match e.status {
                Some(status) => write!(f, "Connection error: {:?} (status 0x{status:02X})", e.kind),
                None => write!(f, "Connection error: {:?}", e.kind),
            },
            KnxError::Tunneling(e) => write!(f, "Tunneling error: {:?}", e.kind),
            KnxError::Transport(e) => write!(f, "Transport error: {:?}", e.kind),
            KnxError::Addressing(e) => write!(f, "Addressing error: {:?}", e.kind),
            KnxError::Dpt(e) => write!(f, "DPT error: {:?}", e.kind),
            KnxError::Config(e) => write!(f, "Config error: {:?} for {}", e.kind, e.key),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for KnxError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            KnxError::Protocol(e) => defmt::write!(f, "Protocol error: {}", e.kind),
            KnxError::Connection(e) => defmt::write!(f, "Connection error: {}", e.kind),
            KnxError::Tunneling(e) => defmt::write!(f, "Tunneling error: {}", e.kind),
            KnxError::Transport(e) => defmt::write!(f, "Transport error: {}", e.kind),
            KnxError::Addressing(e) => defmt::write!(f, "Addressing error: {}", e.kind),
            KnxError::Dpt(e) => defmt::write!(f, "DPT error: {}", e.kind),
            KnxError::Config(e) => defmt::write!(f, "Config error: {} for {=str}", e.kind, e.key),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KnxError {}
