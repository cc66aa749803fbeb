extern crate ble_host as hci;

use hci::host::*;
use hci::opcode;
use hci::{AddrType, BdAddr, ConnectionHandle, Status};

fn buffer() -> CommandBuffer {
    [0; COMMAND_PACKET_MAX_LENGTH]
}

#[test]
fn opcode_fields() {
    assert_eq!(opcode::DISCONNECT.0, 0x0406);
    assert_eq!(opcode::DISCONNECT.ogf(), 0x0001);
    assert_eq!(opcode::DISCONNECT.ocf(), 0x0006);
    assert_eq!(opcode::LE_CREATE_CONNECTION.0, 0x200D);
    assert_eq!(opcode::LE_CREATE_CONNECTION.ogf(), 0x0008);
    assert_eq!(opcode::LE_CREATE_CONNECTION.ocf(), 0x000D);
    assert_eq!(opcode::LE_SET_DATA_LENGTH.0, 0x2022);
    assert_eq!(opcode::LE_SET_PHY.0, 0x2032);
}

#[test]
fn set_advertising_parameters() {
    let mut buffer = buffer();
    let packet = le_set_advertising_parameters(
        &mut buffer,
        &AdvertisingParameters {
            interval_min: 0x0021,
            interval_max: 0x0640,
            advertising_type: AdvertisingType::ConnectableUndirected,
            own_address_type: AddrType::Public,
            peer_address_type: AddrType::Random,
            peer_address: BdAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]),
            channel_map: Channels::CH_37 | Channels::CH_39,
            filter_policy: AdvertisingFilterPolicy::AllowConnectionAndScan,
        },
    );
    assert_eq!(
        packet,
        [
            1,
            0x06,
            0x20,
            15,
            0x21,
            0x00,
            0x40,
            0x06,
            0x00,
            0x00,
            0x01,
            0x01,
            0x02,
            0x03,
            0x04,
            0x05,
            0x06,
            0b0000_0101,
            0x00
        ]
    );
}

#[test]
fn set_advertising_data_empty() {
    let mut buffer = buffer();
    let packet = le_set_advertising_data(&mut buffer, &[]);
    assert_eq!(
        packet,
        [
            1, 0x08, 0x20, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]
    );
}

#[test]
fn set_advertising_data_partial() {
    let mut buffer = buffer();
    let packet = le_set_advertising_data(&mut buffer, &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(
        packet,
        [
            1, 0x08, 0x20, 32, 8, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]
    );
}

#[test]
fn set_advertising_data_full() {
    let mut buffer = buffer();
    let packet = le_set_advertising_data(
        &mut buffer,
        &[
            1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
            25, 26, 27, 28, 29, 30, 31,
        ],
    );
    assert_eq!(
        packet,
        [
            1, 0x08, 0x20, 32, 31, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18,
            19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
        ]
    );
}

#[test]
fn set_scan_response_data_partial() {
    let mut buffer = buffer();
    let packet = le_set_scan_response_data(&mut buffer, &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(
        packet,
        [
            1, 0x09, 0x20, 32, 8, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]
    );
}

#[test]
fn set_advertising_enable() {
    let mut buffer = buffer();
    let packet = le_set_advertising_enable(&mut buffer, true);
    assert_eq!(packet, [1, 0x0A, 0x20, 1, 1]);

    let mut buffer = self::buffer();
    let packet = le_set_advertising_enable(&mut buffer, false);
    assert_eq!(packet, [1, 0x0A, 0x20, 1, 0]);
}

#[test]
fn set_scan_parameters() {
    let mut buffer = buffer();
    let packet = le_set_scan_parameters(
        &mut buffer,
        &ScanParameters {
            scan_type: ScanType::Passive,
            interval: 0x0021,
            window: 0x0010,
            own_address_type: AddrType::Public,
            filter_policy: ScanFilterPolicy::AcceptAll,
        },
    );
    assert_eq!(packet, [1, 0x0B, 0x20, 7, 0x00, 0x21, 0x00, 0x10, 0x00, 0x00, 0x00]);
}

#[test]
fn set_scan_enable() {
    let mut buffer = buffer();
    let packet = le_set_scan_enable(&mut buffer, true, false);
    assert_eq!(packet, [1, 0x0C, 0x20, 2, 1, 0]);

    let mut buffer = self::buffer();
    let packet = le_set_scan_enable(&mut buffer, false, false);
    assert_eq!(packet, [1, 0x0C, 0x20, 2, 0, 0]);
}

#[test]
fn create_connection() {
    let mut buffer = buffer();
    let packet = le_create_connection(
        &mut buffer,
        AddrType::Public,
        BdAddr([1, 2, 3, 4, 5, 6]),
        &ConnectionParameters {
            scan_interval: 0x0050,
            scan_window: 0x0028,
            own_address_type: AddrType::Public,
            conn_interval_min: 0x0028,
            conn_interval_max: 0x0190,
            conn_latency: 0x000A,
            supervision_timeout: 0x05DC,
            min_ce_length: 0x0140,
            max_ce_length: 0x0320,
        },
    );
    assert_eq!(
        packet,
        [
            1, 0x0D, 0x20, 25, 0x50, 0x00, 0x28, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05,
            0x06, 0x00, 0x28, 0x00, 0x90, 0x01, 0x0A, 0x00, 0xDC, 0x05, 0x40, 0x01, 0x20, 0x03,
        ]
    );
}

#[test]
fn disconnect_remote_user_terminated() {
    let mut buffer = buffer();
    let packet = disconnect(
        &mut buffer,
        ConnectionHandle(0x0201),
        Status::REMOTE_USER_TERMINATED,
    );
    assert_eq!(packet, [1, 0x06, 0x04, 3, 0x01, 0x02, 0x13]);
}

#[test]
fn set_data_length() {
    let mut buffer = buffer();
    let packet = le_set_data_length(
        &mut buffer,
        ConnectionHandle(0x0201),
        TX_OCTETS_MAX,
        TX_TIME_MAX,
    );
    assert_eq!(packet, [1, 0x22, 0x20, 6, 0x01, 0x02, 0xFB, 0x00, 0x48, 0x08]);
}

#[test]
fn set_phy() {
    let mut buffer = buffer();
    let packet = le_set_phy(
        &mut buffer,
        ConnectionHandle(0x0201),
        Phys::LE_2M,
        Phys::LE_1M | Phys::LE_2M,
    );
    assert_eq!(
        packet,
        [1, 0x32, 0x20, 7, 0x01, 0x02, 0x00, 0x02, 0x03, 0x00, 0x00]
    );
}
