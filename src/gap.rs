//! Generic Access Profile state machine.
//!
//! [`Gap`] sequences the HCI commands behind the GAP peripheral and central
//! roles (Vol 3, Part C, Section 9): advertising, scanning, initiating, and
//! the lifecycle of the single tracked connection. It owns no transport.
//! Operations encode commands into a bounded outbound queue for an external
//! driver to drain with [`next_command`](Gap::next_command); controller
//! events decoded by the driver are fed back through
//! [`handle_event`](Gap::handle_event) and become [`GapEvent`]s on a bounded
//! inbound queue the application drains with [`poll_event`](Gap::poll_event).
//!
//! Every operation returns without blocking, and nothing here locks: a `Gap`
//! has exactly one owner, and an integration layer that splits receive and
//! transmit across tasks must serialize access itself.
//!
//! Mode changes are optimistic. `start_advertising` and `start_scanning`
//! flip the mode when they enqueue the enabling command, before the
//! controller confirms it, and a later command failure does not roll the
//! mode back. `disconnect` is the exception: the mode returns to idle only
//! when the matching Disconnection Complete event arrives.

use byteorder::{ByteOrder, LittleEndian};
use heapless::{Deque, Vec};

use crate::event::{
    AdvertisingReports, CommandStatus, DisconnectionComplete, Event, LeConnectionComplete,
    LeDataLengthChange, LePhyUpdateComplete,
};
use crate::host::{
    self, AdvertisingParameters, CommandBuffer, ConnectionParameters, Phys, ScanParameters,
    ADVERTISING_DATA_MAX_LENGTH, COMMAND_PACKET_MAX_LENGTH,
};
use crate::opcode::{self, Opcode};
use crate::{AddrType, BdAddr, ConnectionHandle, Role, Status};

/// Capacity of the outbound command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 16;

/// Capacity of the inbound event queue.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Errors returned synchronously by GAP operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The operation is not permitted in the current mode. Includes the mode
    /// the state machine was in.
    InvalidState(Mode),
    /// The outbound command queue cannot take the commands the operation
    /// would enqueue. The integration layer must drain the queue before
    /// retrying; the operation left the state machine untouched.
    CommandQueueFull,
}

/// Lifecycle phase of the state machine. Exactly one is active at all times.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Neither advertising, scanning, nor connected.
    Idle,
    /// Advertising as a peripheral.
    Advertising,
    /// Scanning for advertisers.
    Scanning,
    /// A connection attempt is in flight.
    Connecting,
    /// A connection is established and tracked.
    Connected,
}

/// One encoded command packet waiting for the transport driver.
///
/// The packet bytes are complete, leading type indicator included, and are
/// written to the controller verbatim.
#[derive(Clone)]
pub struct PendingCommand {
    buffer: [u8; COMMAND_PACKET_MAX_LENGTH],
    len: usize,
}

impl PendingCommand {
    fn from_packet(packet: &[u8]) -> PendingCommand {
        let mut buffer = [0; COMMAND_PACKET_MAX_LENGTH];
        buffer[..packet.len()].copy_from_slice(packet);
        PendingCommand {
            buffer,
            len: packet.len(),
        }
    }

    /// The encoded packet.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// The opcode of the queued command.
    pub fn opcode(&self) -> Opcode {
        Opcode(LittleEndian::read_u16(&self.buffer[1..3]))
    }
}

impl core::fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.as_bytes())
    }
}

/// Negotiated parameters of the tracked connection, built from the LE
/// Connection Complete event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionInfo {
    /// Handle the controller assigned to the connection.
    pub conn_handle: ConnectionHandle,
    /// Role of the local device.
    pub role: Role,
    /// Kind of the peer device address.
    pub peer_address_type: AddrType,
    /// Address of the peer device.
    pub peer_address: BdAddr,
    /// Connection interval, 1.25 ms units.
    pub conn_interval: u16,
    /// Peripheral latency, in connection events.
    pub conn_latency: u16,
    /// Supervision timeout, 10 ms units.
    pub supervision_timeout: u16,
}

/// A device discovered while scanning. One is produced per sub-report of an
/// LE Advertising Report batch.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceFound {
    /// Kind of the advertiser's address.
    pub address_type: AddrType,
    /// Address of the advertiser.
    pub address: BdAddr,
    /// Received signal strength in dBm, or 127 if unavailable.
    pub rssi: i8,
    /// Advertising or scan response data, copied out of the receive buffer.
    pub data: Vec<u8, ADVERTISING_DATA_MAX_LENGTH>,
}

/// Outcomes delivered to the application through
/// [`poll_event`](Gap::poll_event).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GapEvent {
    /// Advertising was started by [`start_advertising`](Gap::start_advertising).
    AdvertisingStarted,
    /// Advertising ended, either by [`stop_advertising`](Gap::stop_advertising)
    /// or because a central connected.
    AdvertisingStopped,
    /// A connection was established and is now tracked.
    Connected(ConnectionInfo),
    /// The tracked connection was terminated.
    Disconnected {
        /// Handle of the connection that was terminated.
        conn_handle: ConnectionHandle,
        /// Reason reported by the controller.
        reason: Status,
    },
    /// A connection attempt failed, with the controller's status code.
    ConnectionFailed(Status),
    /// An advertiser was heard while scanning.
    DeviceFound(DeviceFound),
    /// The data channel PDU payload limits of a connection changed.
    DataLengthChanged(LeDataLengthChange),
    /// A PHY update procedure finished.
    PhyUpdated(LePhyUpdateComplete),
}

/// Configuration for [`start_advertising`](Gap::start_advertising).
#[derive(Copy, Clone, Debug, Default)]
pub struct AdvertisingConfig<'a> {
    /// Parameters for LE Set Advertising Parameters.
    pub params: AdvertisingParameters,
    /// Advertising data. When empty, no LE Set Advertising Data command is
    /// issued and the controller keeps its current data.
    pub adv_data: &'a [u8],
    /// Scan response data. When empty, no LE Set Scan Response Data command
    /// is issued.
    pub scan_rsp_data: &'a [u8],
}

/// Configuration for [`start_scanning`](Gap::start_scanning).
#[derive(Copy, Clone, Debug, Default)]
pub struct ScanConfig {
    /// Parameters for LE Set Scan Parameters.
    pub params: ScanParameters,
    /// Whether the controller should filter out duplicate advertising
    /// reports.
    pub filter_duplicates: bool,
}

/// The GAP state machine.
///
/// Create one per radio with [`new`](Gap::new) and keep it for the life of
/// the firmware; it is an explicit caller-owned value, so tests can hold as
/// many independent instances as they like.
pub struct Gap {
    mode: Mode,
    connection: Option<ConnectionInfo>,
    commands: Deque<PendingCommand, COMMAND_QUEUE_DEPTH>,
    events: Deque<GapEvent, EVENT_QUEUE_DEPTH>,
}

impl Gap {
    /// Creates an idle state machine with empty queues.
    pub const fn new() -> Gap {
        Gap {
            mode: Mode::Idle,
            connection: None,
            commands: Deque::new(),
            events: Deque::new(),
        }
    }

    /// The current lifecycle phase.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The tracked connection. `Some` exactly while the mode is
    /// [`Connected`](Mode::Connected).
    pub fn connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    /// Dequeues the oldest outbound command packet, or `None` when the queue
    /// is empty. The transport driver calls this and writes the bytes to the
    /// controller unchanged.
    pub fn next_command(&mut self) -> Option<PendingCommand> {
        self.commands.pop_front()
    }

    /// Dequeues the oldest event for the application, or `None` when the
    /// queue is empty.
    pub fn poll_event(&mut self) -> Option<GapEvent> {
        self.events.pop_front()
    }

    /// Starts advertising. Valid from [`Idle`](Mode::Idle) only.
    ///
    /// Enqueues, in order: LE Set Advertising Parameters; LE Set Advertising
    /// Data (only if `adv_data` is non-empty); LE Set Scan Response Data
    /// (only if `scan_rsp_data` is non-empty); LE Set Advertising
    /// Enable(true). The mode becomes [`Advertising`](Mode::Advertising)
    /// immediately, before the controller confirms anything.
    ///
    /// # Panics
    ///
    /// Panics if `adv_data` or `scan_rsp_data` is longer than
    /// [`ADVERTISING_DATA_MAX_LENGTH`].
    pub fn start_advertising(&mut self, config: &AdvertisingConfig<'_>) -> Result<(), Error> {
        self.require_mode(Mode::Idle)?;
        let count =
            2 + usize::from(!config.adv_data.is_empty()) + usize::from(!config.scan_rsp_data.is_empty());
        self.require_capacity(count)?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        self.queue_command(host::le_set_advertising_parameters(&mut buffer, &config.params));
        if !config.adv_data.is_empty() {
            self.queue_command(host::le_set_advertising_data(&mut buffer, config.adv_data));
        }
        if !config.scan_rsp_data.is_empty() {
            self.queue_command(host::le_set_scan_response_data(&mut buffer, config.scan_rsp_data));
        }
        self.queue_command(host::le_set_advertising_enable(&mut buffer, true));

        self.mode = Mode::Advertising;
        self.emit(GapEvent::AdvertisingStarted);
        Ok(())
    }

    /// Stops advertising. Valid from [`Advertising`](Mode::Advertising) only.
    ///
    /// Enqueues LE Set Advertising Enable(false) and returns the mode to
    /// [`Idle`](Mode::Idle) immediately.
    pub fn stop_advertising(&mut self) -> Result<(), Error> {
        self.require_mode(Mode::Advertising)?;
        self.require_capacity(1)?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        self.queue_command(host::le_set_advertising_enable(&mut buffer, false));

        self.mode = Mode::Idle;
        self.emit(GapEvent::AdvertisingStopped);
        Ok(())
    }

    /// Starts scanning. Valid from [`Idle`](Mode::Idle) only.
    ///
    /// Enqueues LE Set Scan Parameters, then LE Set Scan Enable(true). The
    /// mode becomes [`Scanning`](Mode::Scanning) immediately.
    pub fn start_scanning(&mut self, config: &ScanConfig) -> Result<(), Error> {
        self.require_mode(Mode::Idle)?;
        self.require_capacity(2)?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        self.queue_command(host::le_set_scan_parameters(&mut buffer, &config.params));
        self.queue_command(host::le_set_scan_enable(&mut buffer, true, config.filter_duplicates));

        self.mode = Mode::Scanning;
        Ok(())
    }

    /// Stops scanning. Valid from [`Scanning`](Mode::Scanning) only.
    ///
    /// Enqueues LE Set Scan Enable(false) and returns the mode to
    /// [`Idle`](Mode::Idle) immediately.
    pub fn stop_scanning(&mut self) -> Result<(), Error> {
        self.require_mode(Mode::Scanning)?;
        self.require_capacity(1)?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        self.queue_command(host::le_set_scan_enable(&mut buffer, false, false));

        self.mode = Mode::Idle;
        Ok(())
    }

    /// Initiates a connection to `peer_address`. Valid from
    /// [`Idle`](Mode::Idle) or [`Scanning`](Mode::Scanning); scanning is
    /// stopped first when active.
    ///
    /// Enqueues LE Set Scan Enable(false) when currently scanning, then LE
    /// Create Connection. The mode becomes [`Connecting`](Mode::Connecting)
    /// and stays there until the controller reports LE Connection Complete.
    /// There is no timeout here; connection-attempt deadlines are the
    /// caller's policy.
    pub fn connect(
        &mut self,
        peer_address: BdAddr,
        peer_address_type: AddrType,
        params: &ConnectionParameters,
    ) -> Result<(), Error> {
        let stop_scan = match self.mode {
            Mode::Idle => false,
            Mode::Scanning => true,
            mode => return Err(Error::InvalidState(mode)),
        };
        self.require_capacity(1 + usize::from(stop_scan))?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        if stop_scan {
            self.queue_command(host::le_set_scan_enable(&mut buffer, false, false));
        }
        self.queue_command(host::le_create_connection(
            &mut buffer,
            peer_address_type,
            peer_address,
            params,
        ));

        self.mode = Mode::Connecting;
        Ok(())
    }

    /// Requests termination of the tracked connection. Valid from
    /// [`Connected`](Mode::Connected) only.
    ///
    /// Enqueues the Disconnect command. The mode does not change here; it
    /// returns to [`Idle`](Mode::Idle) when the matching Disconnection
    /// Complete event arrives.
    pub fn disconnect(&mut self, conn_handle: ConnectionHandle, reason: Status) -> Result<(), Error> {
        self.require_mode(Mode::Connected)?;
        self.require_capacity(1)?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        self.queue_command(host::disconnect(&mut buffer, conn_handle, reason));
        Ok(())
    }

    /// Requests new data channel PDU payload limits for the connection.
    /// Valid from [`Connected`](Mode::Connected) only.
    ///
    /// `tx_octets` and `tx_time` must respect the protocol caps
    /// ([`host::TX_OCTETS_MAX`], [`host::TX_TIME_MAX`]); the codec does not
    /// clamp, and the controller rejects out-of-range values. The outcome
    /// arrives later as [`GapEvent::DataLengthChanged`].
    pub fn request_data_length(
        &mut self,
        conn_handle: ConnectionHandle,
        tx_octets: u16,
        tx_time: u16,
    ) -> Result<(), Error> {
        self.require_mode(Mode::Connected)?;
        self.require_capacity(1)?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        self.queue_command(host::le_set_data_length(&mut buffer, conn_handle, tx_octets, tx_time));
        Ok(())
    }

    /// Requests a PHY change for the connection. Valid from
    /// [`Connected`](Mode::Connected) only.
    ///
    /// The outcome arrives later as [`GapEvent::PhyUpdated`].
    pub fn request_phy_update(
        &mut self,
        conn_handle: ConnectionHandle,
        tx_phys: Phys,
        rx_phys: Phys,
    ) -> Result<(), Error> {
        self.require_mode(Mode::Connected)?;
        self.require_capacity(1)?;

        let mut buffer: CommandBuffer = [0; COMMAND_PACKET_MAX_LENGTH];
        self.queue_command(host::le_set_phy(&mut buffer, conn_handle, tx_phys, rx_phys));
        Ok(())
    }

    /// Feeds one decoded controller event into the state machine.
    ///
    /// The transport driver calls this for every event it decodes. The state
    /// machine ends every event in a well-defined mode; failures reported by
    /// the controller surface as [`GapEvent`]s, never as errors here.
    pub fn handle_event(&mut self, event: &Event<'_>) {
        match event {
            Event::CommandComplete(_) => {
                // Informational; completion failures are the integration
                // layer's to log.
            }
            Event::CommandStatus(status) => self.on_command_status(status),
            Event::DisconnectionComplete(ev) => self.on_disconnection_complete(ev),
            Event::LeConnectionComplete(ev) => self.on_connection_complete(ev),
            Event::LeAdvertisingReport(reports) => self.on_advertising_report(reports),
            Event::LeDataLengthChange(ev) => self.emit(GapEvent::DataLengthChanged(*ev)),
            Event::LePhyUpdateComplete(ev) => self.emit(GapEvent::PhyUpdated(*ev)),
        }
    }

    fn on_command_status(&mut self, status: &CommandStatus) {
        // A failed Create Connection is the one command whose Command Status
        // ends an attempt; everything else completes via its own event.
        if !status.status.is_success()
            && status.opcode == opcode::LE_CREATE_CONNECTION
            && self.mode == Mode::Connecting
        {
            self.mode = Mode::Idle;
            self.emit(GapEvent::ConnectionFailed(status.status));
        }
    }

    fn on_connection_complete(&mut self, ev: &LeConnectionComplete) {
        if !ev.status.is_success() {
            if matches!(self.mode, Mode::Connecting | Mode::Advertising) {
                self.mode = Mode::Idle;
                self.emit(GapEvent::ConnectionFailed(ev.status));
            }
            return;
        }

        let info = ConnectionInfo {
            conn_handle: ev.conn_handle,
            role: ev.role,
            peer_address_type: ev.peer_address_type,
            peer_address: ev.peer_address,
            conn_interval: ev.conn_interval,
            conn_latency: ev.conn_latency,
            supervision_timeout: ev.supervision_timeout,
        };
        if self.mode == Mode::Advertising {
            self.emit(GapEvent::AdvertisingStopped);
        }
        self.mode = Mode::Connected;
        self.connection = Some(info);
        self.emit(GapEvent::Connected(info));
    }

    fn on_advertising_report(&mut self, reports: &AdvertisingReports<'_>) {
        if self.mode != Mode::Scanning {
            return;
        }
        for report in reports.iter() {
            // Legacy advertising data never exceeds the queue entry's
            // capacity; a sub-report that claims more is discarded.
            if let Ok(data) = Vec::from_slice(report.data) {
                self.emit(GapEvent::DeviceFound(DeviceFound {
                    address_type: report.address_type,
                    address: report.address,
                    rssi: report.rssi,
                    data,
                }));
            }
        }
    }

    fn on_disconnection_complete(&mut self, ev: &DisconnectionComplete) {
        if !ev.status.is_success() {
            return;
        }
        match self.connection {
            Some(info) if info.conn_handle == ev.conn_handle => {
                self.connection = None;
                self.mode = Mode::Idle;
                self.emit(GapEvent::Disconnected {
                    conn_handle: ev.conn_handle,
                    reason: ev.reason,
                });
            }
            // A handle this machine is not tracking is not ours to act on.
            _ => {}
        }
    }

    fn require_mode(&self, mode: Mode) -> Result<(), Error> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(Error::InvalidState(self.mode))
        }
    }

    // Checked before an operation encodes anything, so a full queue leaves
    // the queue contents and the mode exactly as they were.
    fn require_capacity(&self, count: usize) -> Result<(), Error> {
        if COMMAND_QUEUE_DEPTH - self.commands.len() >= count {
            Ok(())
        } else {
            Err(Error::CommandQueueFull)
        }
    }

    fn queue_command(&mut self, packet: &[u8]) {
        // Capacity was established by require_capacity.
        let _ = self.commands.push_back(PendingCommand::from_packet(packet));
    }

    fn emit(&mut self, event: GapEvent) {
        // A full inbound queue drops the new event; the application must
        // drain promptly.
        let _ = self.events.push_back(event);
    }
}

impl Default for Gap {
    fn default() -> Gap {
        Gap::new()
    }
}
