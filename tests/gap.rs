extern crate ble_host as hci;

use hci::event::{Event, Packet};
use hci::gap::*;
use hci::host::{ConnectionParameters, Phys};
use hci::opcode;
use hci::{AddrType, BdAddr, ConnectionHandle, Role, Status};

const PEER: BdAddr = BdAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

fn feed(gap: &mut Gap, bytes: &[u8]) {
    let event = Event::parse(Packet(bytes)).unwrap();
    gap.handle_event(&event);
}

fn connection_complete(status: u8, handle: u16, role: u8) -> [u8; 21] {
    [
        0x3E,
        19,
        0x01,
        status,
        (handle & 0xFF) as u8,
        (handle >> 8) as u8,
        role,
        0x00,
        0x01,
        0x02,
        0x03,
        0x04,
        0x05,
        0x06,
        0x28,
        0x00,
        0x00,
        0x00,
        0x90,
        0x01,
        0x05,
    ]
}

fn disconnection_complete(status: u8, handle: u16, reason: u8) -> [u8; 6] {
    [
        0x05,
        4,
        status,
        (handle & 0xFF) as u8,
        (handle >> 8) as u8,
        reason,
    ]
}

fn command_status(status: u8, opcode: u16) -> [u8; 6] {
    [0x0F, 4, status, 1, (opcode & 0xFF) as u8, (opcode >> 8) as u8]
}

fn drain(gap: &mut Gap) {
    while gap.next_command().is_some() {}
    while gap.poll_event().is_some() {}
}

fn advertising() -> Gap {
    let mut gap = Gap::new();
    gap.start_advertising(&AdvertisingConfig::default()).unwrap();
    drain(&mut gap);
    gap
}

fn scanning() -> Gap {
    let mut gap = Gap::new();
    gap.start_scanning(&ScanConfig::default()).unwrap();
    drain(&mut gap);
    gap
}

fn connecting() -> Gap {
    let mut gap = Gap::new();
    gap.connect(PEER, AddrType::Public, &ConnectionParameters::default())
        .unwrap();
    drain(&mut gap);
    gap
}

fn connected() -> Gap {
    let mut gap = advertising();
    feed(&mut gap, &connection_complete(0x00, 0x0040, 0x01));
    assert_eq!(gap.mode(), Mode::Connected);
    drain(&mut gap);
    gap
}

#[test]
fn new_gap_is_idle_and_empty() {
    let mut gap = Gap::new();
    assert_eq!(gap.mode(), Mode::Idle);
    assert!(gap.connection().is_none());
    assert!(gap.next_command().is_none());
    assert!(gap.poll_event().is_none());
}

#[test]
fn start_advertising_queues_commands_in_order() {
    let mut gap = Gap::new();
    gap.start_advertising(&AdvertisingConfig {
        adv_data: &[1, 2, 3, 4, 5, 6, 7, 8],
        ..AdvertisingConfig::default()
    })
    .unwrap();
    assert_eq!(gap.mode(), Mode::Advertising);

    let opcodes = [
        gap.next_command().unwrap().opcode(),
        gap.next_command().unwrap().opcode(),
        gap.next_command().unwrap().opcode(),
    ];
    assert_eq!(
        opcodes,
        [
            opcode::LE_SET_ADVERTISING_PARAMETERS,
            opcode::LE_SET_ADVERTISING_DATA,
            opcode::LE_SET_ADVERTISING_ENABLE,
        ]
    );
    assert!(gap.next_command().is_none());
    assert_eq!(gap.poll_event(), Some(GapEvent::AdvertisingStarted));
}

#[test]
fn start_advertising_with_scan_response_queues_four_commands() {
    let mut gap = Gap::new();
    gap.start_advertising(&AdvertisingConfig {
        adv_data: &[2, 0x01, 0x06],
        scan_rsp_data: &[5, 0x09, b'n', b'o', b'd', b'e'],
        ..AdvertisingConfig::default()
    })
    .unwrap();

    let opcodes = [
        gap.next_command().unwrap().opcode(),
        gap.next_command().unwrap().opcode(),
        gap.next_command().unwrap().opcode(),
        gap.next_command().unwrap().opcode(),
    ];
    assert_eq!(
        opcodes,
        [
            opcode::LE_SET_ADVERTISING_PARAMETERS,
            opcode::LE_SET_ADVERTISING_DATA,
            opcode::LE_SET_SCAN_RESPONSE_DATA,
            opcode::LE_SET_ADVERTISING_ENABLE,
        ]
    );
    assert!(gap.next_command().is_none());
}

#[test]
fn start_advertising_without_data_skips_data_commands() {
    let mut gap = Gap::new();
    gap.start_advertising(&AdvertisingConfig::default()).unwrap();

    assert_eq!(
        gap.next_command().unwrap().opcode(),
        opcode::LE_SET_ADVERTISING_PARAMETERS
    );
    let enable = gap.next_command().unwrap();
    assert_eq!(enable.opcode(), opcode::LE_SET_ADVERTISING_ENABLE);
    assert_eq!(enable.as_bytes(), [1, 0x0A, 0x20, 1, 1]);
    assert!(gap.next_command().is_none());
}

#[test]
fn stop_advertising_returns_to_idle() {
    let mut gap = advertising();
    gap.stop_advertising().unwrap();
    assert_eq!(gap.mode(), Mode::Idle);

    let disable = gap.next_command().unwrap();
    assert_eq!(disable.as_bytes(), [1, 0x0A, 0x20, 1, 0]);
    assert!(gap.next_command().is_none());
    assert_eq!(gap.poll_event(), Some(GapEvent::AdvertisingStopped));
}

#[test]
fn start_scanning_queues_two_commands() {
    let mut gap = Gap::new();
    gap.start_scanning(&ScanConfig::default()).unwrap();
    assert_eq!(gap.mode(), Mode::Scanning);

    let params = gap.next_command().unwrap();
    assert_eq!(params.as_bytes()[1], 0x0B);
    assert_eq!(params.opcode(), opcode::LE_SET_SCAN_PARAMETERS);

    let enable = gap.next_command().unwrap();
    assert_eq!(enable.as_bytes()[1], 0x0C);
    assert_eq!(enable.as_bytes(), [1, 0x0C, 0x20, 2, 1, 0]);

    assert!(gap.next_command().is_none());
}

#[test]
fn start_scanning_filter_duplicates() {
    let mut gap = Gap::new();
    gap.start_scanning(&ScanConfig {
        filter_duplicates: true,
        ..ScanConfig::default()
    })
    .unwrap();

    gap.next_command().unwrap();
    assert_eq!(gap.next_command().unwrap().as_bytes(), [1, 0x0C, 0x20, 2, 1, 1]);
}

#[test]
fn stop_scanning_returns_to_idle() {
    let mut gap = scanning();
    gap.stop_scanning().unwrap();
    assert_eq!(gap.mode(), Mode::Idle);
    assert_eq!(gap.next_command().unwrap().as_bytes(), [1, 0x0C, 0x20, 2, 0, 0]);
    assert!(gap.next_command().is_none());
}

#[test]
fn connect_from_scanning_stops_scanning_first() {
    let mut gap = scanning();
    gap.connect(PEER, AddrType::Public, &ConnectionParameters::default())
        .unwrap();
    assert_eq!(gap.mode(), Mode::Connecting);

    let disable = gap.next_command().unwrap();
    assert_eq!(disable.as_bytes(), [1, 0x0C, 0x20, 2, 0, 0]);

    let create = gap.next_command().unwrap();
    assert_eq!(create.opcode(), opcode::LE_CREATE_CONNECTION);
    // Peer address and type land in the Create Connection parameters.
    assert_eq!(create.as_bytes()[9], 0x00);
    assert_eq!(&create.as_bytes()[10..16], &PEER.0);

    assert!(gap.next_command().is_none());
}

#[test]
fn connect_from_idle_queues_one_command() {
    let mut gap = Gap::new();
    gap.connect(PEER, AddrType::Random, &ConnectionParameters::default())
        .unwrap();
    assert_eq!(gap.mode(), Mode::Connecting);

    let create = gap.next_command().unwrap();
    assert_eq!(create.opcode(), opcode::LE_CREATE_CONNECTION);
    assert_eq!(create.as_bytes()[9], 0x01);
    assert!(gap.next_command().is_none());
}

#[test]
fn connection_complete_while_advertising() {
    let mut gap = advertising();
    feed(&mut gap, &connection_complete(0x00, 0x0040, 0x01));

    assert_eq!(gap.mode(), Mode::Connected);
    assert_eq!(gap.connection().unwrap().conn_handle, ConnectionHandle(0x0040));

    assert_eq!(gap.poll_event(), Some(GapEvent::AdvertisingStopped));
    match gap.poll_event() {
        Some(GapEvent::Connected(info)) => {
            assert_eq!(info.conn_handle, ConnectionHandle(0x0040));
            assert_eq!(info.role, Role::Peripheral);
            assert_eq!(info.peer_address_type, AddrType::Public);
            assert_eq!(info.peer_address, PEER);
            assert_eq!(info.conn_interval, 0x0028);
            assert_eq!(info.conn_latency, 0x0000);
            assert_eq!(info.supervision_timeout, 0x0190);
        }
        other => panic!("Did not get connected event: {:?}", other),
    }
    assert!(gap.poll_event().is_none());
}

#[test]
fn connection_complete_while_connecting() {
    let mut gap = connecting();
    feed(&mut gap, &connection_complete(0x00, 0x0041, 0x00));

    assert_eq!(gap.mode(), Mode::Connected);
    assert_eq!(gap.connection().unwrap().role, Role::Central);
    match gap.poll_event() {
        Some(GapEvent::Connected(info)) => {
            assert_eq!(info.conn_handle, ConnectionHandle(0x0041));
        }
        other => panic!("Did not get connected event: {:?}", other),
    }
    assert!(gap.poll_event().is_none());
}

#[test]
fn connection_complete_failure_while_connecting() {
    let mut gap = connecting();
    feed(&mut gap, &connection_complete(0x3E, 0x0000, 0x00));

    assert_eq!(gap.mode(), Mode::Idle);
    assert!(gap.connection().is_none());
    assert_eq!(
        gap.poll_event(),
        Some(GapEvent::ConnectionFailed(Status::CONNECTION_FAILED_TO_ESTABLISH))
    );
}

#[test]
fn connection_complete_failure_while_advertising() {
    let mut gap = advertising();
    feed(&mut gap, &connection_complete(0x3C, 0x0000, 0x01));

    assert_eq!(gap.mode(), Mode::Idle);
    assert_eq!(
        gap.poll_event(),
        Some(GapEvent::ConnectionFailed(Status::ADVERTISING_TIMEOUT))
    );
}

#[test]
fn connection_complete_failure_while_scanning_is_ignored() {
    let mut gap = scanning();
    feed(&mut gap, &connection_complete(0x3E, 0x0000, 0x00));

    assert_eq!(gap.mode(), Mode::Scanning);
    assert!(gap.poll_event().is_none());
}

#[test]
fn command_status_failure_aborts_connection_attempt() {
    let mut gap = connecting();
    feed(&mut gap, &command_status(0x0C, 0x200D));

    assert_eq!(gap.mode(), Mode::Idle);
    assert_eq!(
        gap.poll_event(),
        Some(GapEvent::ConnectionFailed(Status::COMMAND_DISALLOWED))
    );
}

#[test]
fn command_status_success_changes_nothing() {
    let mut gap = connecting();
    feed(&mut gap, &command_status(0x00, 0x200D));

    assert_eq!(gap.mode(), Mode::Connecting);
    assert!(gap.poll_event().is_none());
}

#[test]
fn command_status_failure_for_other_opcode_is_ignored() {
    let mut gap = connecting();
    // A failed Set Scan Enable status must not abort the attempt.
    feed(&mut gap, &command_status(0x0C, 0x200C));

    assert_eq!(gap.mode(), Mode::Connecting);
    assert!(gap.poll_event().is_none());
}

#[test]
fn disconnect_does_not_change_mode_synchronously() {
    let mut gap = connected();
    gap.disconnect(ConnectionHandle(0x0040), Status::REMOTE_USER_TERMINATED)
        .unwrap();

    assert_eq!(gap.mode(), Mode::Connected);
    assert!(gap.connection().is_some());

    let cmd = gap.next_command().unwrap();
    assert_eq!(cmd.opcode(), opcode::DISCONNECT);
    assert_eq!(cmd.as_bytes(), [1, 0x06, 0x04, 3, 0x40, 0x00, 0x13]);
}

#[test]
fn disconnection_complete_clears_connection() {
    let mut gap = connected();
    feed(&mut gap, &disconnection_complete(0x00, 0x0040, 0x13));

    assert_eq!(gap.mode(), Mode::Idle);
    assert!(gap.connection().is_none());
    assert_eq!(
        gap.poll_event(),
        Some(GapEvent::Disconnected {
            conn_handle: ConnectionHandle(0x0040),
            reason: Status::REMOTE_USER_TERMINATED,
        })
    );
}

#[test]
fn disconnection_complete_mismatched_handle_is_ignored() {
    let mut gap = connected();
    feed(&mut gap, &disconnection_complete(0x00, 0x0041, 0x13));

    assert_eq!(gap.mode(), Mode::Connected);
    assert_eq!(gap.connection().unwrap().conn_handle, ConnectionHandle(0x0040));
    assert!(gap.poll_event().is_none());
}

#[test]
fn disconnection_complete_failure_status_is_ignored() {
    let mut gap = connected();
    feed(&mut gap, &disconnection_complete(0x02, 0x0040, 0x13));

    assert_eq!(gap.mode(), Mode::Connected);
    assert!(gap.connection().is_some());
    assert!(gap.poll_event().is_none());
}

#[test]
fn advertising_report_emits_device_found_per_sub_report() {
    let mut gap = scanning();
    let report = [
        0x3E, 24, 0x02, 2, //
        0x00, 0x01, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 1, 0xFF, 0xC8, //
        0x04, 0x00, 1, 2, 3, 4, 5, 6, 1, 0xEE, 0xE2,
    ];
    feed(&mut gap, &report);

    match gap.poll_event() {
        Some(GapEvent::DeviceFound(found)) => {
            assert_eq!(found.address_type, AddrType::Random);
            assert_eq!(found.address, BdAddr([0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]));
            assert_eq!(found.rssi, -56);
            assert_eq!(&found.data[..], [0xFF]);
        }
        other => panic!("Did not get device found event: {:?}", other),
    }
    match gap.poll_event() {
        Some(GapEvent::DeviceFound(found)) => {
            assert_eq!(found.address, PEER);
            assert_eq!(found.rssi, -30);
            assert_eq!(&found.data[..], [0xEE]);
        }
        other => panic!("Did not get device found event: {:?}", other),
    }
    assert!(gap.poll_event().is_none());
}

#[test]
fn advertising_report_ignored_unless_scanning() {
    let mut gap = Gap::new();
    let report = [
        0x3E, 12, 0x02, 1, //
        0x00, 0x00, 1, 2, 3, 4, 5, 6, 0, 0xC8,
    ];
    feed(&mut gap, &report);
    assert!(gap.poll_event().is_none());

    let mut gap = advertising();
    feed(&mut gap, &report);
    assert!(gap.poll_event().is_none());
}

#[test]
fn data_length_change_is_emitted_unconditionally() {
    let mut gap = Gap::new();
    let change = [
        0x3E, 11, 0x07, 0x40, 0x00, 0xFB, 0x00, 0x48, 0x08, 0xFB, 0x00, 0x48, 0x08,
    ];
    feed(&mut gap, &change);

    match gap.poll_event() {
        Some(GapEvent::DataLengthChanged(info)) => {
            assert_eq!(info.conn_handle, ConnectionHandle(0x0040));
            assert_eq!(info.max_tx_octets, 0x00FB);
        }
        other => panic!("Did not get data length changed event: {:?}", other),
    }
}

#[test]
fn phy_update_is_emitted_unconditionally() {
    let mut gap = Gap::new();
    let update = [0x3E, 6, 0x0C, 0x00, 0x40, 0x00, 0x02, 0x02];
    feed(&mut gap, &update);

    match gap.poll_event() {
        Some(GapEvent::PhyUpdated(info)) => {
            assert_eq!(info.conn_handle, ConnectionHandle(0x0040));
            assert!(info.status.is_success());
        }
        other => panic!("Did not get phy updated event: {:?}", other),
    }
}

#[test]
fn request_data_length_queues_command() {
    let mut gap = connected();
    gap.request_data_length(ConnectionHandle(0x0040), 0x00FB, 0x0848)
        .unwrap();
    assert_eq!(
        gap.next_command().unwrap().as_bytes(),
        [1, 0x22, 0x20, 6, 0x40, 0x00, 0xFB, 0x00, 0x48, 0x08]
    );
}

#[test]
fn request_phy_update_queues_command() {
    let mut gap = connected();
    gap.request_phy_update(ConnectionHandle(0x0040), Phys::LE_2M, Phys::LE_2M)
        .unwrap();
    assert_eq!(
        gap.next_command().unwrap().as_bytes(),
        [1, 0x32, 0x20, 7, 0x40, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00]
    );
}

#[test]
fn operations_fail_outside_their_modes() {
    let config = AdvertisingConfig::default();
    let scan = ScanConfig::default();
    let params = ConnectionParameters::default();
    let handle = ConnectionHandle(0x0040);

    for (mut gap, mode) in [
        (advertising(), Mode::Advertising),
        (scanning(), Mode::Scanning),
        (connecting(), Mode::Connecting),
        (connected(), Mode::Connected),
    ] {
        assert_eq!(
            gap.start_advertising(&config),
            Err(Error::InvalidState(mode))
        );
        assert_eq!(gap.start_scanning(&scan), Err(Error::InvalidState(mode)));
        if mode != Mode::Scanning {
            assert_eq!(
                gap.connect(PEER, AddrType::Public, &params),
                Err(Error::InvalidState(mode))
            );
        }
        if mode != Mode::Advertising {
            assert_eq!(gap.stop_advertising(), Err(Error::InvalidState(mode)));
        }
        if mode != Mode::Scanning {
            assert_eq!(gap.stop_scanning(), Err(Error::InvalidState(mode)));
        }
        if mode != Mode::Connected {
            assert_eq!(
                gap.disconnect(handle, Status::REMOTE_USER_TERMINATED),
                Err(Error::InvalidState(mode))
            );
            assert_eq!(
                gap.request_data_length(handle, 0x00FB, 0x0848),
                Err(Error::InvalidState(mode))
            );
            assert_eq!(
                gap.request_phy_update(handle, Phys::LE_1M, Phys::LE_1M),
                Err(Error::InvalidState(mode))
            );
        }
    }

    let mut gap = Gap::new();
    assert_eq!(gap.stop_advertising(), Err(Error::InvalidState(Mode::Idle)));
    assert_eq!(gap.stop_scanning(), Err(Error::InvalidState(Mode::Idle)));
    assert_eq!(
        gap.disconnect(handle, Status::REMOTE_USER_TERMINATED),
        Err(Error::InvalidState(Mode::Idle))
    );
    assert_eq!(
        gap.request_data_length(handle, 0x00FB, 0x0848),
        Err(Error::InvalidState(Mode::Idle))
    );
    assert_eq!(
        gap.request_phy_update(handle, Phys::LE_1M, Phys::LE_1M),
        Err(Error::InvalidState(Mode::Idle))
    );
}

#[test]
fn seventeenth_command_fails_until_drained() {
    let mut gap = connected();
    for _ in 0..COMMAND_QUEUE_DEPTH {
        gap.request_data_length(ConnectionHandle(0x0040), 0x00FB, 0x0848)
            .unwrap();
    }
    assert_eq!(
        gap.request_data_length(ConnectionHandle(0x0040), 0x00FB, 0x0848),
        Err(Error::CommandQueueFull)
    );

    gap.next_command().unwrap();
    gap.request_data_length(ConnectionHandle(0x0040), 0x00FB, 0x0848)
        .unwrap();
}

#[test]
fn full_queue_leaves_operation_without_effect() {
    let mut gap = Gap::new();
    // 5 start/stop cycles leave 15 queued commands and an idle mode.
    for _ in 0..5 {
        gap.start_advertising(&AdvertisingConfig::default()).unwrap();
        gap.stop_advertising().unwrap();
    }

    // Starting again needs 2 slots but only 1 remains; nothing may change.
    assert_eq!(
        gap.start_advertising(&AdvertisingConfig::default()),
        Err(Error::CommandQueueFull)
    );
    assert_eq!(gap.mode(), Mode::Idle);

    let mut queued = 0;
    while gap.next_command().is_some() {
        queued += 1;
    }
    assert_eq!(queued, 15);
}

#[test]
fn full_event_queue_drops_new_events() {
    let mut gap = Gap::new();
    let change = [
        0x3E, 11, 0x07, 0x40, 0x00, 0xFB, 0x00, 0x48, 0x08, 0xFB, 0x00, 0x48, 0x08,
    ];
    for _ in 0..EVENT_QUEUE_DEPTH + 4 {
        feed(&mut gap, &change);
    }

    let mut seen = 0;
    while gap.poll_event().is_some() {
        seen += 1;
    }
    assert_eq!(seen, EVENT_QUEUE_DEPTH);
}

#[test]
fn oversized_report_data_is_discarded() {
    let mut gap = scanning();
    // data_len 32 exceeds the 31-byte legacy advertising data bound.
    let mut report = [0u8; 2 + 2 + 9 + 32 + 1];
    report[0] = 0x3E;
    report[1] = (report.len() - 2) as u8;
    report[2] = 0x02;
    report[3] = 1;
    report[12] = 32;
    feed(&mut gap, &report);

    assert!(gap.poll_event().is_none());
}
