//! Host-side Bluetooth Low Energy control stack.
//!
//! This crate implements the host half of the [`Bluetooth`] Host Controller
//! Interface for LE-only controllers, together with the Generic Access Profile
//! state machine that drives it. It is written for resource-constrained
//! firmware: no allocation, no blocking, and a single owner per state machine.
//!
//! When the documentation refers to a specific section of "the" Bluetooth
//! specification, the reference is to the Core Specification, v5.0 or later.
//!
//! # Design
//!
//! The crate has three layers:
//!
//! - [`host`] and [`event`] form the HCI wire codec. Commands are encoded by
//!   pure functions into caller-supplied fixed buffers; raw event bytes are
//!   decoded into the closed [`event::Event`] type. Malformed or truncated
//!   controller bytes decode to `None` and are dropped, never propagated as
//!   hard errors.
//! - [`acl`] frames and deframes the ACL data packets that carry upper-layer
//!   payloads once a connection exists. It shares the codec's conventions but
//!   touches no connection state.
//! - [`gap`] is the only stateful layer. A [`gap::Gap`] owns the current mode,
//!   the single tracked connection, and two bounded queues: outbound encoded
//!   commands for the transport driver, and inbound [`gap::GapEvent`]s for the
//!   application.
//!
//! The transport itself (UART, SPI, USB, a vendor IPC mailbox) is out of
//! scope. A driver dequeues command packets with [`gap::Gap::next_command`],
//! writes them to the controller verbatim, reassembles inbound HCI packets,
//! decodes events with [`event::Event::parse`], and feeds them back through
//! [`gap::Gap::handle_event`].
//!
//! # Concurrency
//!
//! Nothing here locks. A [`gap::Gap`] must be owned by exactly one execution
//! context; if receive and transmit paths live on different tasks, the
//! integration layer serializes access. Every public call returns without
//! suspending.
//!
//! [`Bluetooth`]: https://www.bluetooth.com/specifications/bluetooth-core-specification

#![no_std]
#![deny(missing_docs)]

pub mod acl;
pub mod advertisement;
pub mod event;
pub mod gap;
pub mod host;
pub mod opcode;

/// HCI packet type indicator for command packets. See the Bluetooth spec,
/// Vol 4, Part A, Section 2.
pub const PACKET_TYPE_COMMAND: u8 = 0x01;

/// HCI packet type indicator for ACL data packets.
pub const PACKET_TYPE_ACL_DATA: u8 = 0x02;

/// HCI packet type indicator for event packets.
pub const PACKET_TYPE_EVENT: u8 = 0x04;

/// Newtype for a 6-byte BD ADDR, stored in little-endian byte order as it
/// appears on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

/// Kind of device address accompanying a [`BdAddr`].
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddrType {
    /// Public device address.
    Public = 0x00,
    /// Random device address.
    Random = 0x01,
}

impl AddrType {
    pub(crate) fn from_u8(value: u8) -> Option<AddrType> {
        match value {
            0x00 => Some(AddrType::Public),
            0x01 => Some(AddrType::Random),
            _ => None,
        }
    }
}

/// Handle used by the controller to identify an LE connection.
///
/// Connection handles are 12 bits; values above 0x0EFF are reserved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHandle(pub u16);

/// Role of the local device in an established connection, from the LE
/// Connection Complete event.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// The device initiated the connection (was scanning/initiating).
    Central = 0x00,
    /// The device accepted the connection (was advertising).
    Peripheral = 0x01,
}

impl Role {
    pub(crate) fn from_u8(value: u8) -> Option<Role> {
        match value {
            0x00 => Some(Role::Central),
            0x01 => Some(Role::Peripheral),
            _ => None,
        }
    }
}

/// Status byte reported by the controller in events. See the Bluetooth spec,
/// Vol 1, Part F for the list of controller error codes.
///
/// This is deliberately an open newtype rather than a closed enum: a status
/// the host does not recognize is still a valid failure reason and must not
/// cause the surrounding event to be dropped. The codes this stack routinely
/// meets are provided as associated constants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    /// The command or operation succeeded.
    pub const SUCCESS: Status = Status(0x00);
    /// Unknown Connection Identifier.
    pub const UNKNOWN_CONNECTION_ID: Status = Status(0x02);
    /// Authentication Failure.
    pub const AUTHENTICATION_FAILURE: Status = Status(0x05);
    /// Memory Capacity Exceeded.
    pub const MEMORY_CAPACITY_EXCEEDED: Status = Status(0x07);
    /// Connection Timeout.
    pub const CONNECTION_TIMEOUT: Status = Status(0x08);
    /// Command Disallowed.
    pub const COMMAND_DISALLOWED: Status = Status(0x0C);
    /// Invalid HCI Command Parameters.
    pub const INVALID_PARAMETERS: Status = Status(0x12);
    /// Remote User Terminated Connection.
    pub const REMOTE_USER_TERMINATED: Status = Status(0x13);
    /// Remote Device Terminated Connection due to Low Resources.
    pub const REMOTE_LOW_RESOURCES: Status = Status(0x14);
    /// Remote Device Terminated Connection due to Power Off.
    pub const REMOTE_POWER_OFF: Status = Status(0x15);
    /// Connection Terminated By Local Host.
    pub const TERMINATED_BY_HOST: Status = Status(0x16);
    /// Unacceptable Connection Parameters.
    pub const UNACCEPTABLE_CONNECTION_PARAMETERS: Status = Status(0x3B);
    /// Advertising Timeout.
    pub const ADVERTISING_TIMEOUT: Status = Status(0x3C);
    /// Connection Failed to be Established.
    pub const CONNECTION_FAILED_TO_ESTABLISH: Status = Status(0x3E);

    /// Returns true for the success status (0x00).
    pub fn is_success(&self) -> bool {
        self.0 == 0x00
    }
}
