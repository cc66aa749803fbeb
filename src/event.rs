//! Event-direction half of the HCI wire codec.
//!
//! [`Event::parse`] turns the raw bytes of one complete event packet into one
//! case of the closed [`Event`] type. The bytes start at the event code; the
//! transport driver consumes the 0x04 packet type indicator while
//! dispatching.
//!
//! Corrupt or truncated controller bytes decode to `None` and are dropped by
//! the caller; the codec never panics on input and never reads past the
//! supplied buffer. Every field read is preceded by a length check.

use byteorder::{ByteOrder, LittleEndian};

use crate::opcode::Opcode;
use crate::{AddrType, BdAddr, ConnectionHandle, Role, Status};

/// One complete event packet as received from the controller, starting at the
/// event code.
pub struct Packet<'a>(pub &'a [u8]);

/// Length of the event packet header: event code and parameter length.
pub const PACKET_HEADER_LENGTH: usize = 2;

mod code {
    pub const DISCONNECTION_COMPLETE: u8 = 0x05;
    pub const COMMAND_COMPLETE: u8 = 0x0E;
    pub const COMMAND_STATUS: u8 = 0x0F;
    pub const LE_META: u8 = 0x3E;
}

mod subevent {
    pub const CONNECTION_COMPLETE: u8 = 0x01;
    pub const ADVERTISING_REPORT: u8 = 0x02;
    pub const DATA_LENGTH_CHANGE: u8 = 0x07;
    pub const PHY_UPDATE_COMPLETE: u8 = 0x0C;
}

/// Events the controller reports to the host. See the Bluetooth spec, Vol 4,
/// Part E, Section 7.7.
///
/// The LE subevents arrive inside the LE Meta event (Section 7.7.65) and are
/// flattened into this type during parsing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event<'a> {
    /// A command has completed, with its return parameters.
    CommandComplete(CommandComplete<'a>),
    /// A command has been accepted (or rejected) but has not yet completed.
    CommandStatus(CommandStatus),
    /// A connection has been terminated.
    DisconnectionComplete(DisconnectionComplete),
    /// A new connection has been established, or a connection attempt failed.
    LeConnectionComplete(LeConnectionComplete),
    /// One or more advertising packets were received while scanning.
    LeAdvertisingReport(AdvertisingReports<'a>),
    /// The data channel PDU payload limits of a connection changed.
    LeDataLengthChange(LeDataLengthChange),
    /// A PHY update procedure finished.
    LePhyUpdateComplete(LePhyUpdateComplete),
}

impl<'a> Event<'a> {
    /// Decodes one event packet.
    ///
    /// Returns `None` if the packet is truncated, if a field holds a value
    /// outside its defined range, or if the event code is not one this stack
    /// consumes.
    pub fn parse(packet: Packet<'a>) -> Option<Event<'a>> {
        let bytes = packet.0;
        if bytes.len() < PACKET_HEADER_LENGTH {
            return None;
        }
        let param_len = bytes[1] as usize;
        if bytes.len() < PACKET_HEADER_LENGTH + param_len {
            return None;
        }
        let params = &bytes[PACKET_HEADER_LENGTH..PACKET_HEADER_LENGTH + param_len];

        match bytes[0] {
            code::DISCONNECTION_COMPLETE => {
                DisconnectionComplete::parse(params).map(Event::DisconnectionComplete)
            }
            code::COMMAND_COMPLETE => CommandComplete::parse(params).map(Event::CommandComplete),
            code::COMMAND_STATUS => CommandStatus::parse(params).map(Event::CommandStatus),
            code::LE_META => parse_le_meta(params),
            _ => None,
        }
    }
}

fn parse_le_meta(params: &[u8]) -> Option<Event<'_>> {
    let (&subevent_code, params) = params.split_first()?;
    match subevent_code {
        subevent::CONNECTION_COMPLETE => {
            LeConnectionComplete::parse(params).map(Event::LeConnectionComplete)
        }
        subevent::ADVERTISING_REPORT => {
            AdvertisingReports::parse(params).map(Event::LeAdvertisingReport)
        }
        subevent::DATA_LENGTH_CHANGE => {
            LeDataLengthChange::parse(params).map(Event::LeDataLengthChange)
        }
        subevent::PHY_UPDATE_COMPLETE => {
            LePhyUpdateComplete::parse(params).map(Event::LePhyUpdateComplete)
        }
        _ => None,
    }
}

/// Payload of the Command Complete event (Vol 4, Part E, Section 7.7.14).
///
/// The return parameters are kept as raw bytes; their layout depends on the
/// completed command. For the commands this stack issues, the return
/// parameters are a single status byte, exposed by [`status`](Self::status).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandComplete<'a> {
    /// Number of HCI command packets the host may send to the controller.
    pub num_hci_command_packets: u8,
    /// Opcode of the completed command, or 0x0000 for a spontaneous event.
    pub opcode: Opcode,
    /// Raw return parameters of the completed command.
    pub return_params: &'a [u8],
}

impl<'a> CommandComplete<'a> {
    fn parse(params: &'a [u8]) -> Option<CommandComplete<'a>> {
        if params.len() < 3 {
            return None;
        }
        Some(CommandComplete {
            num_hci_command_packets: params[0],
            opcode: Opcode(LittleEndian::read_u16(&params[1..3])),
            return_params: &params[3..],
        })
    }

    /// The leading status byte of the return parameters, when present.
    pub fn status(&self) -> Option<Status> {
        self.return_params.first().map(|&b| Status(b))
    }
}

/// Payload of the Command Status event (Vol 4, Part E, Section 7.7.15).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandStatus {
    /// Outcome of the command so far. Success means the command is now in
    /// progress; its completion is reported by a later event.
    pub status: Status,
    /// Number of HCI command packets the host may send to the controller.
    pub num_hci_command_packets: u8,
    /// Opcode of the command the status refers to.
    pub opcode: Opcode,
}

impl CommandStatus {
    const LENGTH: usize = 4;

    fn parse(params: &[u8]) -> Option<CommandStatus> {
        if params.len() != Self::LENGTH {
            return None;
        }
        Some(CommandStatus {
            status: Status(params[0]),
            num_hci_command_packets: params[1],
            opcode: Opcode(LittleEndian::read_u16(&params[2..4])),
        })
    }
}

/// Payload of the Disconnection Complete event (Vol 4, Part E,
/// Section 7.7.5).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisconnectionComplete {
    /// Whether the disconnection procedure itself succeeded.
    pub status: Status,
    /// Handle of the connection that was disconnected.
    pub conn_handle: ConnectionHandle,
    /// Reason for the disconnection, as a controller error code.
    pub reason: Status,
}

impl DisconnectionComplete {
    const LENGTH: usize = 4;

    fn parse(params: &[u8]) -> Option<DisconnectionComplete> {
        if params.len() != Self::LENGTH {
            return None;
        }
        Some(DisconnectionComplete {
            status: Status(params[0]),
            conn_handle: ConnectionHandle(LittleEndian::read_u16(&params[1..3])),
            reason: Status(params[3]),
        })
    }
}

/// Payload of the LE Connection Complete subevent (Vol 4, Part E,
/// Section 7.7.65.1), without the subevent code.
///
/// When `status` is a failure, the remaining fields are reported by the
/// controller as zero and carry no information.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeConnectionComplete {
    /// Whether the connection was established.
    pub status: Status,
    /// Handle the controller assigned to the new connection.
    pub conn_handle: ConnectionHandle,
    /// Role of the local device in the connection.
    pub role: Role,
    /// Kind of the peer device address.
    pub peer_address_type: AddrType,
    /// Address of the peer device.
    pub peer_address: BdAddr,
    /// Negotiated connection interval, 1.25 ms units.
    pub conn_interval: u16,
    /// Negotiated peripheral latency, in connection events.
    pub conn_latency: u16,
    /// Negotiated supervision timeout, 10 ms units.
    pub supervision_timeout: u16,
    /// Accuracy of the central's sleep clock, as the raw code from the event.
    pub central_clock_accuracy: u8,
}

impl LeConnectionComplete {
    const LENGTH: usize = 18;

    fn parse(params: &[u8]) -> Option<LeConnectionComplete> {
        if params.len() != Self::LENGTH {
            return None;
        }
        let mut peer_address = [0; 6];
        peer_address.copy_from_slice(&params[5..11]);
        Some(LeConnectionComplete {
            status: Status(params[0]),
            conn_handle: ConnectionHandle(LittleEndian::read_u16(&params[1..3])),
            role: Role::from_u8(params[3])?,
            peer_address_type: AddrType::from_u8(params[4])?,
            peer_address: BdAddr(peer_address),
            conn_interval: LittleEndian::read_u16(&params[11..13]),
            conn_latency: LittleEndian::read_u16(&params[13..15]),
            supervision_timeout: LittleEndian::read_u16(&params[15..17]),
            central_clock_accuracy: params[17],
        })
    }
}

/// Payload of the LE Advertising Report subevent (Vol 4, Part E,
/// Section 7.7.65.2), without the subevent code.
///
/// One event batches up to `num_reports` sub-reports. The sub-report bytes
/// are kept raw and walked by [`iter`](Self::iter), so the borrow only lives
/// as long as the receive buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingReports<'a> {
    /// Number of sub-reports the controller claims to have batched.
    pub num_reports: u8,
    reports: &'a [u8],
}

impl<'a> AdvertisingReports<'a> {
    fn parse(params: &'a [u8]) -> Option<AdvertisingReports<'a>> {
        let (&num_reports, reports) = params.split_first()?;
        Some(AdvertisingReports {
            num_reports,
            reports,
        })
    }

    /// Iterates over the well-formed sub-reports of the batch.
    ///
    /// Iteration stops the moment the remaining bytes cannot satisfy one full
    /// sub-report, so a batch whose tail is truncated yields its intact
    /// prefix. Sub-reports with an unrecognized address type are skipped.
    pub fn iter(&self) -> AdvertisingReportIter<'a> {
        AdvertisingReportIter {
            bytes: self.reports,
        }
    }
}

/// One sub-report of an LE Advertising Report batch.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingReport<'a> {
    /// Kind of advertising PDU received, as the raw event type code
    /// (0x00 = ADV_IND .. 0x04 = SCAN_RSP).
    pub event_type: u8,
    /// Kind of the advertiser's address.
    pub address_type: AddrType,
    /// Address of the advertiser.
    pub address: BdAddr,
    /// Advertising data or scan response data carried by the PDU.
    pub data: &'a [u8],
    /// Received signal strength in dBm, or 127 if unavailable.
    pub rssi: i8,
}

/// Iterator over the sub-reports of an [`AdvertisingReports`] batch.
pub struct AdvertisingReportIter<'a> {
    bytes: &'a [u8],
}

impl<'a> Iterator for AdvertisingReportIter<'a> {
    type Item = AdvertisingReport<'a>;

    fn next(&mut self) -> Option<AdvertisingReport<'a>> {
        // event_type(1) + addr_type(1) + addr(6) + data_len(1), then data and
        // a trailing rssi byte.
        const FIXED: usize = 9;
        loop {
            if self.bytes.len() < FIXED {
                self.bytes = &[];
                return None;
            }
            let data_len = self.bytes[8] as usize;
            let total = FIXED + data_len + 1;
            if self.bytes.len() < total {
                self.bytes = &[];
                return None;
            }

            let event_type = self.bytes[0];
            let address_type = AddrType::from_u8(self.bytes[1]);
            let mut address = [0; 6];
            address.copy_from_slice(&self.bytes[2..8]);
            let data = &self.bytes[FIXED..FIXED + data_len];
            let rssi = self.bytes[FIXED + data_len] as i8;
            self.bytes = &self.bytes[total..];

            if let Some(address_type) = address_type {
                return Some(AdvertisingReport {
                    event_type,
                    address_type,
                    address: BdAddr(address),
                    data,
                    rssi,
                });
            }
        }
    }
}

/// Payload of the LE Data Length Change subevent (Vol 4, Part E,
/// Section 7.7.65.7), without the subevent code.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeDataLengthChange {
    /// Handle of the connection whose limits changed.
    pub conn_handle: ConnectionHandle,
    /// Maximum transmit payload, in octets.
    pub max_tx_octets: u16,
    /// Maximum time to transmit one PDU, in microseconds.
    pub max_tx_time: u16,
    /// Maximum receive payload, in octets.
    pub max_rx_octets: u16,
    /// Maximum time to receive one PDU, in microseconds.
    pub max_rx_time: u16,
}

impl LeDataLengthChange {
    const LENGTH: usize = 10;

    fn parse(params: &[u8]) -> Option<LeDataLengthChange> {
        if params.len() != Self::LENGTH {
            return None;
        }
        Some(LeDataLengthChange {
            conn_handle: ConnectionHandle(LittleEndian::read_u16(&params[0..2])),
            max_tx_octets: LittleEndian::read_u16(&params[2..4]),
            max_tx_time: LittleEndian::read_u16(&params[4..6]),
            max_rx_octets: LittleEndian::read_u16(&params[6..8]),
            max_rx_time: LittleEndian::read_u16(&params[8..10]),
        })
    }
}

/// PHY in use on a connection, as reported by the controller.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phy {
    /// The LE 1M PHY.
    Le1M = 0x01,
    /// The LE 2M PHY.
    Le2M = 0x02,
    /// The LE Coded PHY.
    LeCoded = 0x03,
}

impl Phy {
    fn from_u8(value: u8) -> Option<Phy> {
        match value {
            0x01 => Some(Phy::Le1M),
            0x02 => Some(Phy::Le2M),
            0x03 => Some(Phy::LeCoded),
            _ => None,
        }
    }
}

/// Payload of the LE PHY Update Complete subevent (Vol 4, Part E,
/// Section 7.7.65.12), without the subevent code.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LePhyUpdateComplete {
    /// Whether the PHY update procedure succeeded.
    pub status: Status,
    /// Handle of the connection whose PHY changed.
    pub conn_handle: ConnectionHandle,
    /// PHY now in use in the transmit direction.
    pub tx_phy: Phy,
    /// PHY now in use in the receive direction.
    pub rx_phy: Phy,
}

impl LePhyUpdateComplete {
    const LENGTH: usize = 5;

    fn parse(params: &[u8]) -> Option<LePhyUpdateComplete> {
        if params.len() != Self::LENGTH {
            return None;
        }
        Some(LePhyUpdateComplete {
            status: Status(params[0]),
            conn_handle: ConnectionHandle(LittleEndian::read_u16(&params[1..3])),
            tx_phy: Phy::from_u8(params[3])?,
            rx_phy: Phy::from_u8(params[4])?,
        })
    }
}
