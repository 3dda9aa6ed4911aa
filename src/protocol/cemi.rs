//! Common External Message Interface (cEMI) `L_Data` messages.
//!
//! A [`CemiMessage`] is an owned, immutable `L_Data` service primitive. It is
//! produced by [`CemiMessage::decode`] on receipt or built by the caller before a
//! send. Payload bytes are kept raw; typed values are decoded on demand with
//! [`CemiMessage::decode_value`].
//!
//! ## Frame Structure
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Message Code (1 byte)                    │
//! ├──────────────────────────────────────────┤
//! │ Additional Info Length (1 byte)          │
//! ├──────────────────────────────────────────┤
//! │ Additional Info (variable, skipped)      │
//! ├──────────────────────────────────────────┤
//! │ Service Information (L_Data)             │
//! │  ├─ Control Field 1 (1 byte)             │
//! │  ├─ Control Field 2 (1 byte)             │
//! │  ├─ Source Address (2 bytes)             │
//! │  ├─ Destination Address (2 bytes)        │
//! │  ├─ Length (1 byte, octets after TPCI)   │
//! │  ├─ TPCI (+ APCI high bits)              │
//! │  └─ APCI low bits + data                 │
//! └──────────────────────────────────────────┘
//! ```

use core::fmt;

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::dpt::{decode_datapoint, DatapointType, DatapointValue};
use crate::error::{KnxError, Result};
use crate::protocol::constants::{CemiService, Priority, MAX_CEMI_SIZE, MAX_PAYLOAD_SIZE};

/// Raw APDU payload. The first byte carries the 6-bit short data field.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_SIZE>;

/// Text produced by [`CemiMessage::describe`].
pub type Description = heapless::String<256>;

/// Control Field 1 of `L_Data` frame
///
/// ```text
/// Bit 7: Frame Type (0=extended, 1=standard)
/// Bit 6: Reserved
/// Bit 5: Repeat (0=repeat, 1=do not repeat)
/// Bit 4: System Broadcast (0=system, 1=broadcast)
/// Bit 3-2: Priority (00=system, 01=normal, 10=urgent, 11=low)
/// Bit 1: Acknowledge Request (0=no ack, 1=ack requested)
/// Bit 0: Confirm (0=no error, 1=error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField1 {
    raw: u8,
}

impl From<u8> for ControlField1 {
    fn from(raw: u8) -> Self {
        Self { raw }
    }
}

impl ControlField1 {
    /// Get raw byte value
    pub const fn raw(self) -> u8 {
        self.raw
    }

    /// Check if frame is standard (true) or extended (false)
    pub const fn is_standard_frame(self) -> bool {
        (self.raw & 0x80) != 0
    }

    /// Check if repetitions on the bus are suppressed
    pub const fn do_not_repeat(self) -> bool {
        (self.raw & 0x20) != 0
    }

    /// Check if this is a broadcast (as opposed to a system broadcast)
    pub const fn is_broadcast(self) -> bool {
        (self.raw & 0x10) != 0
    }

    /// Get priority
    pub const fn priority(self) -> Priority {
        Priority::from_bits(self.raw >> 2)
    }

    /// Check if a layer-2 acknowledge is requested
    pub const fn ack_requested(self) -> bool {
        (self.raw & 0x02) != 0
    }

    /// Check if the confirm flag reports an error
    pub const fn has_error(self) -> bool {
        (self.raw & 0x01) != 0
    }

    /// Same flags with another priority
    #[must_use]
    pub const fn with_priority(self, priority: Priority) -> Self {
        Self {
            raw: (self.raw & !0x0C) | ((priority.to_u8() & 0x03) << 2),
        }
    }
}

impl Default for ControlField1 {
    /// Standard frame, do not repeat, broadcast, low priority, no ack, no error (0xBC)
    fn default() -> Self {
        Self { raw: 0xBC }
    }
}

/// Control Field 2 of `L_Data` frame
///
/// ```text
/// Bit 7: Destination Address Type (0=individual, 1=group)
/// Bit 6-4: Hop Count (0-7)
/// Bit 3-0: Extended Frame Format (0000=standard)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlField2 {
    raw: u8,
}

impl ControlField2 {
    /// Create a new Control Field 2 for a standard frame
    pub const fn new(is_group: bool, hop_count: u8) -> Self {
        let group = if is_group { 0x80 } else { 0x00 };
        Self {
            raw: group | ((hop_count & 0x07) << 4),
        }
    }

    /// Get raw byte value
    pub const fn raw(self) -> u8 {
        self.raw
    }

    /// Check if destination is group address (true) or individual (false)
    pub const fn is_group_address(self) -> bool {
        (self.raw & 0x80) != 0
    }

    /// Get hop count (0-7)
    pub const fn hop_count(self) -> u8 {
        (self.raw >> 4) & 0x07
    }
}

impl From<u8> for ControlField2 {
    fn from(raw: u8) -> Self {
        Self { raw }
    }
}

/// Default hop count for frames originated by this client
pub const DEFAULT_HOP_COUNT: u8 = 6;

// =============================================================================
// Destination
// =============================================================================

/// Destination of an `L_Data` frame, tagged by address type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Destination {
    /// Point-to-point destination
    Individual(IndividualAddress),
    /// Group (multicast) destination
    Group(GroupAddress),
}

impl Destination {
    /// Raw 16-bit address
    pub const fn raw(self) -> u16 {
        match self {
            Self::Individual(a) => a.raw(),
            Self::Group(g) => g.raw(),
        }
    }

    /// Check if this is a group address
    pub const fn is_group(self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Group address, if any
    pub const fn as_group(self) -> Option<GroupAddress> {
        match self {
            Self::Group(g) => Some(g),
            Self::Individual(_) => None,
        }
    }
}

impl From<GroupAddress> for Destination {
    fn from(addr: GroupAddress) -> Self {
        Self::Group(addr)
    }
}

impl From<IndividualAddress> for Destination {
    fn from(addr: IndividualAddress) -> Self {
        Self::Individual(addr)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Individual(a) => fmt::Display::fmt(a, f),
            Self::Group(g) => fmt::Display::fmt(g, f),
        }
    }
}

// =============================================================================
// TPCI / APCI
// =============================================================================

/// TPCI (Transport Layer Protocol Control Information)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tpci {
    /// Unnumbered Data Packet
    UnnumberedData,
    /// Numbered Data Packet
    NumberedData,
    /// Unnumbered Control Packet
    UnnumberedControl,
    /// Numbered Control Packet
    NumberedControl,
}

impl Tpci {
    /// Check if this is a data packet
    pub const fn is_data(self) -> bool {
        matches!(self, Self::UnnumberedData | Self::NumberedData)
    }

    const fn bits(self) -> u8 {
        match self {
            Self::UnnumberedData => 0x00,
            Self::NumberedData => 0x40,
            Self::UnnumberedControl => 0x80,
            Self::NumberedControl => 0xC0,
        }
    }
}

/// APCI (Application Layer Protocol Control Information), 4-bit service code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Apci {
    /// `A_GroupValue_Read`
    GroupValueRead = 0x0,
    /// `A_GroupValue_Response`
    GroupValueResponse = 0x1,
    /// `A_GroupValue_Write`
    GroupValueWrite = 0x2,
    /// `A_IndividualAddress_Write`
    IndividualAddressWrite = 0x3,
    /// `A_IndividualAddress_Read`
    IndividualAddressRead = 0x4,
    /// `A_IndividualAddress_Response`
    IndividualAddressResponse = 0x5,
    /// `A_ADC_Read`
    AdcRead = 0x6,
    /// `A_ADC_Response`
    AdcResponse = 0x7,
    /// `A_Memory_Read`
    MemoryRead = 0x8,
    /// `A_Memory_Response`
    MemoryResponse = 0x9,
    /// `A_Memory_Write`
    MemoryWrite = 0xA,
    /// `A_UserMessage`
    UserMessage = 0xB,
    /// `A_DeviceDescriptor_Read` (mask version read)
    DeviceDescriptorRead = 0xC,
    /// `A_DeviceDescriptor_Response`
    DeviceDescriptorResponse = 0xD,
    /// `A_Restart`
    Restart = 0xE,
    /// Escape to extended APCI
    Escape = 0xF,
}

impl Apci {
    /// Convert a 4-bit code to `Apci`
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x0 => Self::GroupValueRead,
            0x1 => Self::GroupValueResponse,
            0x2 => Self::GroupValueWrite,
            0x3 => Self::IndividualAddressWrite,
            0x4 => Self::IndividualAddressRead,
            0x5 => Self::IndividualAddressResponse,
            0x6 => Self::AdcRead,
            0x7 => Self::AdcResponse,
            0x8 => Self::MemoryRead,
            0x9 => Self::MemoryResponse,
            0xA => Self::MemoryWrite,
            0xB => Self::UserMessage,
            0xC => Self::DeviceDescriptorRead,
            0xD => Self::DeviceDescriptorResponse,
            0xE => Self::Restart,
            0xF => Self::Escape,
            _ => return None,
        })
    }

    /// 4-bit service code
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Code in its 10-bit wire position (e.g. `GroupValueWrite` is 0x080)
    pub const fn to_u16(self) -> u16 {
        (self as u16) << 6
    }
}

/// Transport layer control code carried by control TPDUs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransportControl {
    /// `T_Connect` (unnumbered)
    Connect = 0b00,
    /// `T_Disconnect` (unnumbered)
    Disconnect = 0b01,
    /// `T_ACK` (numbered)
    Ack = 0b10,
    /// `T_NAK` (numbered)
    Nak = 0b11,
}

impl TransportControl {
    /// 2-bit control code
    pub const fn code(self) -> u8 {
        self as u8
    }

    const fn is_numbered(self) -> bool {
        matches!(self, Self::Ack | Self::Nak)
    }
}

// =============================================================================
// TPDU
// =============================================================================

/// Transport layer data unit.
///
/// Data variants carry an APCI and payload; control variants carry a transport
/// control code and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tpdu {
    /// Connectionless data (group communication, broadcasts)
    UnnumberedData { apci: Apci, payload: Payload },
    /// Connection-oriented data
    NumberedData { sequence: u8, apci: Apci, payload: Payload },
    /// `T_Connect` / `T_Disconnect`
    UnnumberedControl(TransportControl),
    /// `T_ACK` / `T_NAK`
    NumberedControl { sequence: u8, control: TransportControl },
}

impl Tpdu {
    /// Unnumbered data TPDU.
    ///
    /// An empty payload becomes the single zero short-data byte; the two APCI
    /// bits of the first byte are cleared.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the payload is longer than
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn data(apci: Apci, payload: &[u8]) -> Result<Self> {
        Ok(Self::UnnumberedData {
            apci,
            payload: normalize_payload(payload)?,
        })
    }

    /// TPCI of this TPDU
    pub const fn tpci(&self) -> Tpci {
        match self {
            Self::UnnumberedData { .. } => Tpci::UnnumberedData,
            Self::NumberedData { .. } => Tpci::NumberedData,
            Self::UnnumberedControl(_) => Tpci::UnnumberedControl,
            Self::NumberedControl { .. } => Tpci::NumberedControl,
        }
    }

    /// Check if this TPDU carries application data
    pub const fn is_data(&self) -> bool {
        self.tpci().is_data()
    }

    /// APCI of a data TPDU
    pub const fn apci(&self) -> Option<Apci> {
        match self {
            Self::UnnumberedData { apci, .. } | Self::NumberedData { apci, .. } => Some(*apci),
            _ => None,
        }
    }

    /// Payload of a data TPDU
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::UnnumberedData { payload, .. } | Self::NumberedData { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Control code of a control TPDU
    pub const fn control(&self) -> Option<TransportControl> {
        match self {
            Self::UnnumberedControl(control) | Self::NumberedControl { control, .. } => Some(*control),
            _ => None,
        }
    }

    /// Encode starting at the TPCI byte. Returns the byte count.
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::UnnumberedData { apci, payload } | Self::NumberedData { apci, payload, .. } => {
                let sequence = match self {
                    Self::NumberedData { sequence, .. } => *sequence,
                    _ => 0,
                };
                // an empty payload goes out as the zero short-data byte
                let first = payload.first().copied().unwrap_or(0);
                let rest = payload.get(1..).unwrap_or_default();
                let len = 2 + rest.len();
                let dst = buf.get_mut(..len).ok_or_else(KnxError::buffer_too_small)?;
                let code = apci.code();
                dst[0] = self.tpci().bits() | ((sequence & 0x0F) << 2) | (code >> 2);
                dst[1] = ((code & 0x03) << 6) | (first & 0x3F);
                dst[2..].copy_from_slice(rest);
                Ok(len)
            }
            Self::UnnumberedControl(control) => {
                let dst = buf.first_mut().ok_or_else(KnxError::buffer_too_small)?;
                *dst = Tpci::UnnumberedControl.bits() | control.code();
                Ok(1)
            }
            Self::NumberedControl { sequence, control } => {
                let dst = buf.first_mut().ok_or_else(KnxError::buffer_too_small)?;
                *dst = Tpci::NumberedControl.bits() | ((sequence & 0x0F) << 2) | control.code();
                Ok(1)
            }
        }
    }

    /// Decode from the TPCI byte through the end of the NPDU.
    fn decode(bytes: &[u8]) -> Result<Self> {
        let (&tpci, rest) = bytes.split_first().ok_or_else(KnxError::invalid_tpdu)?;
        let sequence = (tpci >> 2) & 0x0F;

        match tpci & 0xC0 {
            0x00 | 0x40 => {
                let (&apci_low, data) = rest.split_first().ok_or_else(KnxError::invalid_tpdu)?;
                let code = ((tpci & 0x03) << 2) | (apci_low >> 6);
                let apci = Apci::from_code(code).ok_or_else(KnxError::invalid_tpdu)?;

                let mut payload = Payload::new();
                payload.push(apci_low & 0x3F).map_err(|_| KnxError::payload_too_large())?;
                payload.extend_from_slice(data).map_err(|_| KnxError::payload_too_large())?;

                Ok(if tpci & 0x40 == 0 {
                    Self::UnnumberedData { apci, payload }
                } else {
                    Self::NumberedData {
                        sequence,
                        apci,
                        payload,
                    }
                })
            }
            0x80 => match tpci & 0x03 {
                0b00 => Ok(Self::UnnumberedControl(TransportControl::Connect)),
                0b01 => Ok(Self::UnnumberedControl(TransportControl::Disconnect)),
                _ => Err(KnxError::invalid_tpdu()),
            },
            _ => match tpci & 0x03 {
                0b10 => Ok(Self::NumberedControl {
                    sequence,
                    control: TransportControl::Ack,
                }),
                0b11 => Ok(Self::NumberedControl {
                    sequence,
                    control: TransportControl::Nak,
                }),
                _ => Err(KnxError::invalid_tpdu()),
            },
        }
    }
}

fn normalize_payload(payload: &[u8]) -> Result<Payload> {
    let mut out = Payload::from_slice(payload).map_err(|_| KnxError::payload_too_large())?;
    match out.first_mut() {
        Some(first) => *first &= 0x3F,
        None => {
            let _ = out.push(0);
        }
    }
    Ok(out)
}

// =============================================================================
// CemiMessage
// =============================================================================

/// One `L_Data` service primitive.
///
/// # Examples
///
/// ```
/// use knx_ip_client::protocol::cemi::{Apci, CemiMessage};
/// use knx_ip_client::protocol::constants::CemiService;
/// use knx_ip_client::{GroupAddress, IndividualAddress};
///
/// let msg = CemiMessage::group_write(
///     CemiService::Request,
///     IndividualAddress::from(0x1105),
///     GroupAddress::from(2563),
///     &[0x01],
/// )?;
/// assert!(msg.has_data());
/// assert_eq!(msg.apci(), Some(Apci::GroupValueWrite));
/// assert_eq!(msg.describe().as_str(), "1.1.5 -> 1/2/3: apci = 2, data = 01");
/// # Ok::<(), knx_ip_client::KnxError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CemiMessage {
    service: CemiService,
    control: ControlField1,
    hop_count: u8,
    source: IndividualAddress,
    destination: Destination,
    tpdu: Tpdu,
}

impl CemiMessage {
    /// Fixed part of the `L_Data` service information, up to and including
    /// the length octet.
    const LDATA_HEADER: usize = 7;

    /// Build a message with default control flags and hop count.
    pub fn new(
        service: CemiService,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        tpdu: Tpdu,
    ) -> Self {
        Self {
            service,
            control: ControlField1::default(),
            hop_count: DEFAULT_HOP_COUNT,
            source,
            destination: destination.into(),
            tpdu,
        }
    }

    /// `A_GroupValue_Write` carrying `payload`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the payload is too large.
    pub fn group_write(
        service: CemiService,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        payload: &[u8],
    ) -> Result<Self> {
        Ok(Self::new(service, source, destination, Tpdu::data(Apci::GroupValueWrite, payload)?))
    }

    /// `A_GroupValue_Read` request for a group address.
    pub fn group_read(service: CemiService, source: IndividualAddress, destination: GroupAddress) -> Self {
        let tpdu = Tpdu::UnnumberedData {
            apci: Apci::GroupValueRead,
            payload: Payload::from_iter([0]),
        };
        Self::new(service, source, destination, tpdu)
    }

    /// Same message with another priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.control = self.control.with_priority(priority);
        self
    }

    /// Same message with another hop count (masked to 3 bits).
    #[must_use]
    pub fn with_hop_count(mut self, hop_count: u8) -> Self {
        self.hop_count = hop_count & 0x07;
        self
    }

    /// Same message with other Control Field 1 flags.
    #[must_use]
    pub fn with_control(mut self, control: ControlField1) -> Self {
        self.control = control;
        self
    }

    /// Same message as another `L_Data` primitive.
    #[must_use]
    pub fn with_service(mut self, service: CemiService) -> Self {
        self.service = service;
        self
    }

    /// `L_Data` primitive
    pub const fn service(&self) -> CemiService {
        self.service
    }

    /// Control Field 1 flags
    pub const fn control(&self) -> ControlField1 {
        self.control
    }

    /// Frame priority
    pub const fn priority(&self) -> Priority {
        self.control.priority()
    }

    /// Hop count (0-7)
    pub const fn hop_count(&self) -> u8 {
        self.hop_count
    }

    /// Source address
    pub const fn source(&self) -> IndividualAddress {
        self.source
    }

    /// Destination address
    pub const fn destination(&self) -> Destination {
        self.destination
    }

    /// Transport layer data unit
    pub const fn tpdu(&self) -> &Tpdu {
        &self.tpdu
    }

    /// True iff the TPDU is a data TPDU
    pub const fn has_data(&self) -> bool {
        self.tpdu.is_data()
    }

    /// APCI of a data frame
    pub const fn apci(&self) -> Option<Apci> {
        self.tpdu.apci()
    }

    /// Raw payload of a data frame
    pub fn payload(&self) -> Option<&[u8]> {
        self.tpdu.payload()
    }

    /// Check if an `L_Data.con` reports a failed transmission
    pub const fn is_negative_confirmation(&self) -> bool {
        matches!(self.service, CemiService::Confirmation) && self.control.has_error()
    }

    /// Interpret the payload as datapoint type `kind`.
    ///
    /// # Errors
    ///
    /// Returns a DPT error for control frames and for payloads whose width
    /// does not match `kind`.
    pub fn decode_value(&self, kind: DatapointType) -> Result<DatapointValue> {
        let payload = self.payload().ok_or_else(KnxError::not_data_frame)?;
        decode_datapoint(kind, payload)
    }

    /// Human readable one-line summary.
    pub fn describe(&self) -> Description {
        use core::fmt::Write;
        let mut s = Description::new();
        // A full payload is 48 * 3 characters plus the prefix, well under 256
        let _ = write!(s, "{self}");
        s
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        let tpdu_len = match self.tpdu.payload() {
            Some(payload) => 1 + payload.len().max(1),
            None => 1,
        };
        2 + Self::LDATA_HEADER + tpdu_len
    }

    /// Encode the message into `buf`. Additional info is never emitted.
    ///
    /// # Errors
    ///
    /// Returns a transport error if `buf` is too small.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let total = self.encoded_len();
        if total > MAX_CEMI_SIZE {
            return Err(KnxError::payload_too_large());
        }
        let dst = buf.get_mut(..total).ok_or_else(KnxError::buffer_too_small)?;

        dst[0] = self.service.to_u8();
        dst[1] = 0;
        dst[2] = self.control.raw();
        dst[3] = ControlField2::new(self.destination.is_group(), self.hop_count).raw();
        self.source.encode(&mut dst[4..6])?;
        dst[6..8].copy_from_slice(&self.destination.raw().to_be_bytes());
        let tpdu_len = self.tpdu.encode(&mut dst[9..])?;
        dst[8] = (tpdu_len - 1) as u8;

        Ok(total)
    }

    /// Decode a cEMI `L_Data` frame.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for non `L_Data` message codes, truncated
    /// frames and undecodable TPDUs.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let &[code, additional_info_len, ..] = data else {
            return Err(KnxError::invalid_frame());
        };
        let service = CemiService::from_u8(code).ok_or_else(KnxError::invalid_message_code)?;

        let info = data
            .get(2 + usize::from(additional_info_len)..)
            .ok_or_else(KnxError::invalid_frame)?;
        let &[ctrl1, ctrl2, src_hi, src_lo, dst_hi, dst_lo, length, ..] = info else {
            return Err(KnxError::invalid_frame());
        };
        let tpdu_end = Self::LDATA_HEADER + 1 + usize::from(length);
        let tpdu_bytes = info
            .get(Self::LDATA_HEADER..tpdu_end)
            .ok_or_else(KnxError::invalid_frame)?;

        let ctrl2 = ControlField2::from(ctrl2);
        let raw_destination = u16::from_be_bytes([dst_hi, dst_lo]);
        let destination = if ctrl2.is_group_address() {
            Destination::Group(GroupAddress::from(raw_destination))
        } else {
            Destination::Individual(IndividualAddress::from(raw_destination))
        };

        Ok(Self {
            service,
            control: ControlField1::from(ctrl1),
            hop_count: ctrl2.hop_count(),
            source: IndividualAddress::from(u16::from_be_bytes([src_hi, src_lo])),
            destination,
            tpdu: Tpdu::decode(tpdu_bytes)?,
        })
    }
}

impl fmt::Display for CemiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: ", self.source, self.destination)?;
        match (&self.tpdu.apci(), self.tpdu.payload(), self.tpdu.control()) {
            (Some(apci), Some(payload), _) => {
                write!(f, "apci = {}, data =", apci.code())?;
                for byte in payload {
                    write!(f, " {byte:02x}")?;
                }
                Ok(())
            }
            (_, _, Some(control)) => write!(f, "control = {}", control.code()),
            _ => Ok(()),
        }
    }
}
