//! Command-direction half of the HCI wire codec.
//!
//! Each command defined in the Bluetooth spec, Vol 4, Part E, Sections 7.1 and
//! 7.8 that this stack issues has one pure encode function here. The functions
//! write the complete packet (packet type indicator, opcode, parameter
//! length, parameters) into a caller-supplied [`CommandBuffer`] and return
//! the used prefix. Nothing is allocated and no buffer grows; the caller
//! decides when the bytes actually move to the controller.
//!
//! All multi-byte fields are little-endian, per the Bluetooth byte order.

use byteorder::{ByteOrder, LittleEndian};

use crate::opcode::{self, Opcode};
use crate::{AddrType, BdAddr, ConnectionHandle, Status, PACKET_TYPE_COMMAND};

/// Length of the command packet header: packet type indicator, 2-byte opcode,
/// 1-byte parameter length.
pub const PACKET_HEADER_LENGTH: usize = 4;

/// Maximum length of an encoded command packet. HCI allows up to 255 bytes of
/// command parameters.
pub const COMMAND_PACKET_MAX_LENGTH: usize = PACKET_HEADER_LENGTH + 255;

/// Fixed-size buffer large enough for any encoded command packet.
pub type CommandBuffer = [u8; COMMAND_PACKET_MAX_LENGTH];

/// Maximum length of legacy advertising data and scan response data.
pub const ADVERTISING_DATA_MAX_LENGTH: usize = 31;

/// Largest value the controller accepts for suggested/requested transmit
/// octets (LE Data Length Extension).
pub const TX_OCTETS_MAX: u16 = 0x00FB;

/// Largest value the controller accepts for suggested/requested transmit
/// time, in microseconds (LE Data Length Extension).
pub const TX_TIME_MAX: u16 = 0x0848;

fn write_header(buffer: &mut [u8], opcode: Opcode, param_len: usize) {
    buffer[0] = PACKET_TYPE_COMMAND;
    LittleEndian::write_u16(&mut buffer[1..3], opcode.0);
    buffer[3] = param_len as u8;
}

/// The advertising type determines the packet type used while advertising is
/// enabled. See the Bluetooth spec, Vol 4, Part E, Section 7.8.5.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingType {
    /// Connectable undirected advertising
    ConnectableUndirected = 0x00,
    /// Connectable high duty cycle directed advertising
    ConnectableDirectedHighDutyCycle = 0x01,
    /// Scannable undirected advertising
    ScannableUndirected = 0x02,
    /// Non connectable undirected advertising
    NonConnectableUndirected = 0x03,
    /// Connectable low duty cycle directed advertising
    ConnectableDirectedLowDutyCycle = 0x04,
}

/// Policy deciding which scan and connection requests the advertiser accepts.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingFilterPolicy {
    /// Process scan and connection requests from all devices.
    AllowConnectionAndScan = 0x00,
    /// Process connection requests from all devices, scan requests only from
    /// the white list.
    WhiteListScan = 0x01,
    /// Process scan requests from all devices, connection requests only from
    /// the white list.
    WhiteListConnection = 0x02,
    /// Process scan and connection requests only from the white list.
    WhiteListAll = 0x03,
}

/// Scanning type for LE Set Scan Parameters.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanType {
    /// Passive scanning: no scan request PDUs are sent.
    Passive = 0x00,
    /// Active scanning: scan request PDUs may be sent.
    Active = 0x01,
}

/// Policy deciding which advertising packets the scanner reports.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanFilterPolicy {
    /// Accept all advertising packets except directed advertising to another
    /// device.
    AcceptAll = 0x00,
    /// Accept only advertising packets from devices on the white list.
    WhiteList = 0x01,
}

bitflags::bitflags! {
    /// The advertising channels an advertiser uses.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Channels: u8 {
        /// Channel 37 (2402 MHz)
        const CH_37 = 0b0000_0001;
        /// Channel 38 (2426 MHz)
        const CH_38 = 0b0000_0010;
        /// Channel 39 (2480 MHz)
        const CH_39 = 0b0000_0100;
    }
}

bitflags::bitflags! {
    /// PHY preference mask for LE Set PHY.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Phys: u8 {
        /// The LE 1M PHY.
        const LE_1M = 0b0000_0001;
        /// The LE 2M PHY.
        const LE_2M = 0b0000_0010;
        /// The LE Coded PHY.
        const LE_CODED = 0b0000_0100;
    }
}

/// Parameters for LE Set Advertising Parameters.
///
/// Intervals are in units of 0.625 ms. The interval fields are ignored by the
/// controller for high duty cycle directed advertising.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParameters {
    /// Minimum advertising interval, 0.625 ms units (range 0x0020..=0x4000).
    pub interval_min: u16,
    /// Maximum advertising interval, 0.625 ms units (range 0x0020..=0x4000).
    pub interval_max: u16,
    /// Advertising packet type.
    pub advertising_type: AdvertisingType,
    /// Kind of local address used in advertising packets.
    pub own_address_type: AddrType,
    /// Kind of the peer address, used only for directed advertising.
    pub peer_address_type: AddrType,
    /// Peer address, used only for directed advertising.
    pub peer_address: BdAddr,
    /// Advertising channels to use.
    pub channel_map: Channels,
    /// Scan/connection request filter policy.
    pub filter_policy: AdvertisingFilterPolicy,
}

impl Default for AdvertisingParameters {
    fn default() -> AdvertisingParameters {
        AdvertisingParameters {
            interval_min: 160, // 100 ms
            interval_max: 320, // 200 ms
            advertising_type: AdvertisingType::ConnectableUndirected,
            own_address_type: AddrType::Public,
            peer_address_type: AddrType::Public,
            peer_address: BdAddr([0; 6]),
            channel_map: Channels::all(),
            filter_policy: AdvertisingFilterPolicy::AllowConnectionAndScan,
        }
    }
}

/// Parameters for LE Set Scan Parameters.
///
/// The scan window must be less than or equal to the scan interval. Both are
/// in units of 0.625 ms.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParameters {
    /// Scanning type.
    pub scan_type: ScanType,
    /// Time between the starts of consecutive scan windows, 0.625 ms units.
    pub interval: u16,
    /// Duration of one scan window, 0.625 ms units.
    pub window: u16,
    /// Kind of local address used in scan request PDUs.
    pub own_address_type: AddrType,
    /// Advertising packet filter policy.
    pub filter_policy: ScanFilterPolicy,
}

impl Default for ScanParameters {
    fn default() -> ScanParameters {
        ScanParameters {
            scan_type: ScanType::Active,
            interval: 160, // 100 ms
            window: 80,    // 50 ms
            own_address_type: AddrType::Public,
            filter_policy: ScanFilterPolicy::AcceptAll,
        }
    }
}

/// Parameters for LE Create Connection, excluding the peer address, which the
/// caller supplies separately.
///
/// Connection intervals are in units of 1.25 ms; the supervision timeout is
/// in units of 10 ms; scan interval/window and connection event lengths are in
/// units of 0.625 ms.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionParameters {
    /// Time between the starts of consecutive scan windows while initiating,
    /// 0.625 ms units.
    pub scan_interval: u16,
    /// Duration of one scan window while initiating, 0.625 ms units.
    pub scan_window: u16,
    /// Kind of local address used in the connection request.
    pub own_address_type: AddrType,
    /// Minimum connection interval, 1.25 ms units (range 0x0006..=0x0C80).
    pub conn_interval_min: u16,
    /// Maximum connection interval, 1.25 ms units (range 0x0006..=0x0C80).
    pub conn_interval_max: u16,
    /// Peripheral latency, in connection events.
    pub conn_latency: u16,
    /// Supervision timeout, 10 ms units (range 0x000A..=0x0C80).
    pub supervision_timeout: u16,
    /// Minimum expected connection event length, 0.625 ms units.
    pub min_ce_length: u16,
    /// Maximum expected connection event length, 0.625 ms units.
    pub max_ce_length: u16,
}

impl Default for ConnectionParameters {
    fn default() -> ConnectionParameters {
        ConnectionParameters {
            scan_interval: 96, // 60 ms
            scan_window: 48,   // 30 ms
            own_address_type: AddrType::Public,
            conn_interval_min: 24, // 30 ms
            conn_interval_max: 40, // 50 ms
            conn_latency: 0,
            supervision_timeout: 400, // 4 s
            min_ce_length: 0,
            max_ce_length: 0,
        }
    }
}

/// Encodes LE Set Advertising Parameters. See the Bluetooth spec, Vol 4,
/// Part E, Section 7.8.5.
pub fn le_set_advertising_parameters<'a>(
    buffer: &'a mut CommandBuffer,
    params: &AdvertisingParameters,
) -> &'a [u8] {
    const PARAM_LEN: usize = 15;
    write_header(buffer, opcode::LE_SET_ADVERTISING_PARAMETERS, PARAM_LEN);
    let p = &mut buffer[PACKET_HEADER_LENGTH..];
    LittleEndian::write_u16(&mut p[0..2], params.interval_min);
    LittleEndian::write_u16(&mut p[2..4], params.interval_max);
    p[4] = params.advertising_type as u8;
    p[5] = params.own_address_type as u8;
    p[6] = params.peer_address_type as u8;
    p[7..13].copy_from_slice(&params.peer_address.0);
    p[13] = params.channel_map.bits();
    p[14] = params.filter_policy as u8;
    &buffer[..PACKET_HEADER_LENGTH + PARAM_LEN]
}

// Advertising data and scan response data share the same 32-byte parameter
// block: significant length, then a fixed 31-byte field zero-padded past the
// significant part.
fn data_block(buffer: &mut CommandBuffer, opcode: Opcode, data: &[u8]) -> usize {
    const PARAM_LEN: usize = 1 + ADVERTISING_DATA_MAX_LENGTH;
    write_header(buffer, opcode, PARAM_LEN);
    let p = &mut buffer[PACKET_HEADER_LENGTH..PACKET_HEADER_LENGTH + PARAM_LEN];
    p[0] = data.len() as u8;
    p[1..1 + data.len()].copy_from_slice(data);
    p[1 + data.len()..].fill(0);
    PACKET_HEADER_LENGTH + PARAM_LEN
}

/// Encodes LE Set Advertising Data. See the Bluetooth spec, Vol 4, Part E,
/// Section 7.8.7.
///
/// The parameter block always carries the full 31-byte data field; bytes past
/// `data` are zeroed.
///
/// # Panics
///
/// Panics if `data` is longer than [`ADVERTISING_DATA_MAX_LENGTH`].
pub fn le_set_advertising_data<'a>(buffer: &'a mut CommandBuffer, data: &[u8]) -> &'a [u8] {
    let len = data_block(buffer, opcode::LE_SET_ADVERTISING_DATA, data);
    &buffer[..len]
}

/// Encodes LE Set Scan Response Data. See the Bluetooth spec, Vol 4, Part E,
/// Section 7.8.8.
///
/// # Panics
///
/// Panics if `data` is longer than [`ADVERTISING_DATA_MAX_LENGTH`].
pub fn le_set_scan_response_data<'a>(buffer: &'a mut CommandBuffer, data: &[u8]) -> &'a [u8] {
    let len = data_block(buffer, opcode::LE_SET_SCAN_RESPONSE_DATA, data);
    &buffer[..len]
}

/// Encodes LE Set Advertising Enable. See the Bluetooth spec, Vol 4, Part E,
/// Section 7.8.9.
pub fn le_set_advertising_enable(buffer: &mut CommandBuffer, enable: bool) -> &[u8] {
    write_header(buffer, opcode::LE_SET_ADVERTISING_ENABLE, 1);
    buffer[PACKET_HEADER_LENGTH] = enable as u8;
    &buffer[..PACKET_HEADER_LENGTH + 1]
}

/// Encodes LE Set Scan Parameters. See the Bluetooth spec, Vol 4, Part E,
/// Section 7.8.10.
pub fn le_set_scan_parameters<'a>(
    buffer: &'a mut CommandBuffer,
    params: &ScanParameters,
) -> &'a [u8] {
    const PARAM_LEN: usize = 7;
    write_header(buffer, opcode::LE_SET_SCAN_PARAMETERS, PARAM_LEN);
    let p = &mut buffer[PACKET_HEADER_LENGTH..];
    p[0] = params.scan_type as u8;
    LittleEndian::write_u16(&mut p[1..3], params.interval);
    LittleEndian::write_u16(&mut p[3..5], params.window);
    p[5] = params.own_address_type as u8;
    p[6] = params.filter_policy as u8;
    &buffer[..PACKET_HEADER_LENGTH + PARAM_LEN]
}

/// Encodes LE Set Scan Enable. See the Bluetooth spec, Vol 4, Part E,
/// Section 7.8.11.
pub fn le_set_scan_enable(
    buffer: &mut CommandBuffer,
    enable: bool,
    filter_duplicates: bool,
) -> &[u8] {
    write_header(buffer, opcode::LE_SET_SCAN_ENABLE, 2);
    buffer[PACKET_HEADER_LENGTH] = enable as u8;
    buffer[PACKET_HEADER_LENGTH + 1] = filter_duplicates as u8;
    &buffer[..PACKET_HEADER_LENGTH + 2]
}

/// Encodes LE Create Connection. See the Bluetooth spec, Vol 4, Part E,
/// Section 7.8.12.
///
/// The initiator filter policy is fixed to "use the peer address"; the white
/// list is not used by this stack.
pub fn le_create_connection<'a>(
    buffer: &'a mut CommandBuffer,
    peer_address_type: AddrType,
    peer_address: BdAddr,
    params: &ConnectionParameters,
) -> &'a [u8] {
    const PARAM_LEN: usize = 25;
    write_header(buffer, opcode::LE_CREATE_CONNECTION, PARAM_LEN);
    let p = &mut buffer[PACKET_HEADER_LENGTH..];
    LittleEndian::write_u16(&mut p[0..2], params.scan_interval);
    LittleEndian::write_u16(&mut p[2..4], params.scan_window);
    p[4] = 0x00; // initiator filter policy: peer address below
    p[5] = peer_address_type as u8;
    p[6..12].copy_from_slice(&peer_address.0);
    p[12] = params.own_address_type as u8;
    LittleEndian::write_u16(&mut p[13..15], params.conn_interval_min);
    LittleEndian::write_u16(&mut p[15..17], params.conn_interval_max);
    LittleEndian::write_u16(&mut p[17..19], params.conn_latency);
    LittleEndian::write_u16(&mut p[19..21], params.supervision_timeout);
    LittleEndian::write_u16(&mut p[21..23], params.min_ce_length);
    LittleEndian::write_u16(&mut p[23..25], params.max_ce_length);
    &buffer[..PACKET_HEADER_LENGTH + PARAM_LEN]
}

/// Encodes Disconnect. See the Bluetooth spec, Vol 4, Part E, Section 7.1.6.
///
/// `reason` is carried to the remote controller in its Disconnection Complete
/// event; the spec restricts it to a handful of termination codes, which this
/// function does not police.
pub fn disconnect(
    buffer: &mut CommandBuffer,
    conn_handle: ConnectionHandle,
    reason: Status,
) -> &[u8] {
    const PARAM_LEN: usize = 3;
    write_header(buffer, opcode::DISCONNECT, PARAM_LEN);
    let p = &mut buffer[PACKET_HEADER_LENGTH..];
    LittleEndian::write_u16(&mut p[0..2], conn_handle.0);
    p[2] = reason.0;
    &buffer[..PACKET_HEADER_LENGTH + PARAM_LEN]
}

/// Encodes LE Set Data Length. See the Bluetooth spec, Vol 4, Part E,
/// Section 7.8.33.
///
/// The controller caps `tx_octets` at [`TX_OCTETS_MAX`] and `tx_time` at
/// [`TX_TIME_MAX`]; out-of-range values are rejected by the controller, not
/// clamped here.
pub fn le_set_data_length(
    buffer: &mut CommandBuffer,
    conn_handle: ConnectionHandle,
    tx_octets: u16,
    tx_time: u16,
) -> &[u8] {
    const PARAM_LEN: usize = 6;
    write_header(buffer, opcode::LE_SET_DATA_LENGTH, PARAM_LEN);
    let p = &mut buffer[PACKET_HEADER_LENGTH..];
    LittleEndian::write_u16(&mut p[0..2], conn_handle.0);
    LittleEndian::write_u16(&mut p[2..4], tx_octets);
    LittleEndian::write_u16(&mut p[4..6], tx_time);
    &buffer[..PACKET_HEADER_LENGTH + PARAM_LEN]
}

/// Encodes LE Set PHY. See the Bluetooth spec, Vol 4, Part E, Section 7.8.49.
///
/// Both preference masks are always sent (the all-PHYs field is zero) and no
/// coded PHY options are requested.
pub fn le_set_phy(
    buffer: &mut CommandBuffer,
    conn_handle: ConnectionHandle,
    tx_phys: Phys,
    rx_phys: Phys,
) -> &[u8] {
    const PARAM_LEN: usize = 7;
    write_header(buffer, opcode::LE_SET_PHY, PARAM_LEN);
    let p = &mut buffer[PACKET_HEADER_LENGTH..];
    LittleEndian::write_u16(&mut p[0..2], conn_handle.0);
    p[2] = 0x00; // all_phys: honor both masks
    p[3] = tx_phys.bits();
    p[4] = rx_phys.bits();
    LittleEndian::write_u16(&mut p[5..7], 0x0000); // phy_options: no coded preference
    &buffer[..PACKET_HEADER_LENGTH + PARAM_LEN]
}
