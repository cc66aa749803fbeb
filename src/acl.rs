//! ACL data packet framing.
//!
//! ACL data packets carry upper-layer payloads (L2CAP frames) over an
//! established connection. See the Bluetooth spec, Vol 4, Part E,
//! Section 5.4.2. The functions here are stateless: they translate between
//! the 4-byte ACL header plus payload and its typed description, and share
//! the codec's decode policy: truncated input produces `None`, never a read
//! past the supplied bytes.

use byteorder::{ByteOrder, LittleEndian};

use crate::{ConnectionHandle, PACKET_TYPE_ACL_DATA};

/// Length of the ACL data packet header, after the packet type indicator.
pub const HEADER_LENGTH: usize = 4;

/// Maximum ACL payload under the LE Data Length Extension.
pub const PAYLOAD_MAX_LENGTH: usize = 251;

/// Maximum length of an encoded ACL data packet, including the packet type
/// indicator.
pub const PACKET_MAX_LENGTH: usize = 1 + HEADER_LENGTH + PAYLOAD_MAX_LENGTH;

/// Fixed-size buffer large enough for any encoded ACL data packet.
pub type AclBuffer = [u8; PACKET_MAX_LENGTH];

/// Packet boundary flag: bits 12-13 of the handle field. Marks where the
/// packet sits in a fragmented upper-layer PDU.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketBoundaryFlag {
    /// First packet of a non-automatically-flushable PDU.
    FirstNonFlushable = 0b00,
    /// Continuing fragment of a PDU.
    Continuing = 0b01,
    /// First packet of an automatically-flushable PDU. The usual value for
    /// LE-U data from the host.
    FirstFlushable = 0b10,
    /// A complete, unfragmented automatically-flushable PDU.
    Complete = 0b11,
}

impl PacketBoundaryFlag {
    fn from_bits(bits: u16) -> PacketBoundaryFlag {
        match bits & 0b11 {
            0b00 => PacketBoundaryFlag::FirstNonFlushable,
            0b01 => PacketBoundaryFlag::Continuing,
            0b10 => PacketBoundaryFlag::FirstFlushable,
            _ => PacketBoundaryFlag::Complete,
        }
    }
}

/// Broadcast flag: bits 14-15 of the handle field. Always point-to-point for
/// LE; the other values exist only for BR/EDR.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BroadcastFlag {
    /// Point-to-point data.
    PointToPoint = 0b00,
    /// BR/EDR active broadcast.
    ActiveBroadcast = 0b01,
    /// Reserved value 0b10.
    Reserved10 = 0b10,
    /// Reserved value 0b11.
    Reserved11 = 0b11,
}

impl BroadcastFlag {
    fn from_bits(bits: u16) -> BroadcastFlag {
        match bits & 0b11 {
            0b00 => BroadcastFlag::PointToPoint,
            0b01 => BroadcastFlag::ActiveBroadcast,
            0b10 => BroadcastFlag::Reserved10,
            _ => BroadcastFlag::Reserved11,
        }
    }
}

/// Decoded ACL data packet header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AclHeader {
    /// Handle of the connection the data belongs to.
    pub conn_handle: ConnectionHandle,
    /// Position of this packet within its upper-layer PDU.
    pub packet_boundary_flag: PacketBoundaryFlag,
    /// Broadcast flag; point-to-point for LE.
    pub broadcast_flag: BroadcastFlag,
    /// Length of the payload following the header, in octets.
    pub data_len: u16,
}

/// Decodes the 4-byte ACL header at the start of `bytes` (packet type
/// indicator already stripped).
///
/// Returns `None` if fewer than [`HEADER_LENGTH`] bytes are present.
pub fn parse_header(bytes: &[u8]) -> Option<AclHeader> {
    if bytes.len() < HEADER_LENGTH {
        return None;
    }
    let handle_and_flags = LittleEndian::read_u16(&bytes[0..2]);
    Some(AclHeader {
        conn_handle: ConnectionHandle(handle_and_flags & 0x0FFF),
        packet_boundary_flag: PacketBoundaryFlag::from_bits(handle_and_flags >> 12),
        broadcast_flag: BroadcastFlag::from_bits(handle_and_flags >> 14),
        data_len: LittleEndian::read_u16(&bytes[2..4]),
    })
}

/// Returns the payload of the ACL packet beginning at `bytes` (packet type
/// indicator already stripped): exactly `data_len` bytes after the header.
///
/// Returns `None` if the header is truncated or if fewer than `data_len`
/// payload bytes were actually supplied, regardless of what the length field
/// claims.
pub fn payload(bytes: &[u8]) -> Option<&[u8]> {
    let header = parse_header(bytes)?;
    let end = HEADER_LENGTH + header.data_len as usize;
    if bytes.len() < end {
        return None;
    }
    Some(&bytes[HEADER_LENGTH..end])
}

/// Encodes a complete ACL data packet (indicator, header, payload) into
/// `buffer` and returns the used prefix.
///
/// The broadcast flag is always point-to-point.
///
/// The caller must pass `conn_handle.0 <= 0x0FFF`; higher bits would alias
/// into the flag fields.
///
/// # Panics
///
/// Panics if `data` is longer than [`PAYLOAD_MAX_LENGTH`].
pub fn encode<'a>(
    buffer: &'a mut AclBuffer,
    conn_handle: ConnectionHandle,
    packet_boundary_flag: PacketBoundaryFlag,
    data: &[u8],
) -> &'a [u8] {
    debug_assert!(conn_handle.0 <= 0x0FFF);

    buffer[0] = PACKET_TYPE_ACL_DATA;
    let handle_and_flags = (conn_handle.0 & 0x0FFF) | ((packet_boundary_flag as u16) << 12);
    LittleEndian::write_u16(&mut buffer[1..3], handle_and_flags);
    LittleEndian::write_u16(&mut buffer[3..5], data.len() as u16);
    buffer[5..5 + data.len()].copy_from_slice(data);
    &buffer[..1 + HEADER_LENGTH + data.len()]
}
