//! Command queue engine.
//!
//! Management commands travel over a request/response ring pair that
//! shares one scratch buffer each, so only one command is ever active.
//! Everything else waits in the pending set; when the active command
//! completes, the highest-numbered pending opcode is sent next. The
//! order is fixed priority, not arrival order.

use crate::constants::{
    ADDRESS_FILTER_SLOTS, COMMAND_ALIGNMENT, COMMAND_RESPONSE_SIZE, COMMAND_RING_SIZE,
    MULTICAST_SLOTS,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::internal::dma::{DescriptorRing, TxDescriptor, VolatileCell};
use crate::internal::register::Csr;
use crate::platform::{DmaRegion, Platform, RingKind, SyncOp};

use super::config::AdapterFlags;
use super::pdq::Pdq;
use super::station::StationChars;

// =============================================================================
// Command Codes
// =============================================================================

/// Command opcodes understood by the adapter firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandCode {
    /// Bring the link up
    Start = 0,
    /// Set the frame filters
    FilterSet = 1,
    /// Read the frame filters
    FilterGet = 2,
    /// Set station characteristics
    CharsSet = 3,
    /// Read status and characteristics
    StatusCharsGet = 4,
    /// Read counters
    CountersGet = 5,
    /// Set counters
    CountersSet = 6,
    /// Load the address filter table
    AddrFilterSet = 7,
    /// Read the address filter table
    AddrFilterGet = 8,
    /// Clear the error log
    ErrorLogClear = 9,
    /// Write the error log
    ErrorLogSet = 10,
    /// Read the FDDI MIB
    FddiMibGet = 11,
    /// Read the DEC extended MIB
    DecExtMibGet = 12,
    /// Read DEC specific data
    DecSpecificGet = 13,
    /// Set SNMP items
    SnmpSet = 14,
    /// Read the SMT MIB
    SmtMibGet = 16,
    /// Set the SMT MIB
    SmtMibSet = 17,
}

impl CommandCode {
    /// Decode an opcode
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => CommandCode::Start,
            1 => CommandCode::FilterSet,
            2 => CommandCode::FilterGet,
            3 => CommandCode::CharsSet,
            4 => CommandCode::StatusCharsGet,
            5 => CommandCode::CountersGet,
            6 => CommandCode::CountersSet,
            7 => CommandCode::AddrFilterSet,
            8 => CommandCode::AddrFilterGet,
            9 => CommandCode::ErrorLogClear,
            10 => CommandCode::ErrorLogSet,
            11 => CommandCode::FddiMibGet,
            12 => CommandCode::DecExtMibGet,
            13 => CommandCode::DecSpecificGet,
            14 => CommandCode::SnmpSet,
            16 => CommandCode::SmtMibGet,
            17 => CommandCode::SmtMibSet,
            _ => return None,
        })
    }

    /// Raw opcode
    pub const fn to_raw(self) -> u8 {
        self as u8
    }

    /// Human-readable command name
    pub const fn name(self) -> &'static str {
        match self {
            CommandCode::Start => "Start",
            CommandCode::FilterSet => "Filter Set",
            CommandCode::FilterGet => "Filter Get",
            CommandCode::CharsSet => "Chars Set",
            CommandCode::StatusCharsGet => "Status Chars Get",
            CommandCode::CountersGet => "Counters Get",
            CommandCode::CountersSet => "Counters Set",
            CommandCode::AddrFilterSet => "Addr Filter Set",
            CommandCode::AddrFilterGet => "Addr Filter Get",
            CommandCode::ErrorLogClear => "Error Log Clear",
            CommandCode::ErrorLogSet => "Error Log Set",
            CommandCode::FddiMibGet => "FDDI MIB Get",
            CommandCode::DecExtMibGet => "DEC Ext MIB Get",
            CommandCode::DecSpecificGet => "DEC Specific Get",
            CommandCode::SnmpSet => "SNMP Set",
            CommandCode::SmtMibGet => "SMT MIB Get",
            CommandCode::SmtMibSet => "SMT MIB Set",
        }
    }

    /// Unpadded request and response sizes in bytes
    const fn raw_lengths(self) -> (usize, usize) {
        match self {
            CommandCode::FilterSet => (132, GENERIC_RESPONSE),
            CommandCode::FilterGet => (GENERIC_REQUEST, 140),
            CommandCode::CharsSet | CommandCode::SnmpSet => (100, GENERIC_RESPONSE),
            CommandCode::StatusCharsGet => (GENERIC_REQUEST, 372),
            CommandCode::AddrFilterSet => (500, GENERIC_RESPONSE),
            CommandCode::AddrFilterGet => (GENERIC_REQUEST, 508),
            CommandCode::DecExtMibGet => (GENERIC_REQUEST, 128),
            _ => (GENERIC_REQUEST, GENERIC_RESPONSE),
        }
    }

    /// Request and response lengths as sent to the adapter
    ///
    /// Both are rounded up to the command alignment and the request is
    /// never shorter than the response.
    pub const fn lengths(self) -> (usize, usize) {
        let (cmd, rsp) = self.raw_lengths();
        let cmd = cmd.next_multiple_of(COMMAND_ALIGNMENT);
        let rsp = rsp.next_multiple_of(COMMAND_ALIGNMENT);
        (if cmd < rsp { rsp } else { cmd }, rsp)
    }
}

impl core::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

const GENERIC_REQUEST: usize = 4;
const GENERIC_RESPONSE: usize = 12;

/// Response longword holding the opcode
const RESPONSE_OP_WORD: usize = 1;
/// Response longword holding the status
const RESPONSE_STATUS_WORD: usize = 2;
/// DEC extended MIB longword reporting full duplex operation
const FDX_OPERATIONAL_WORD: usize = 20;

/// Command completed successfully
const RESPONSE_SUCCESS: u32 = 0;

/// Filter item codes
mod item {
    pub const EOL: u32 = 0;
    pub const IND_GROUP_PROM: u32 = 1;
    pub const GROUP_PROM: u32 = 2;
    pub const SMT_PROM: u32 = 4;
    pub const SMT_USER: u32 = 5;

    pub const FILTER_BLOCK: u32 = 0;
    pub const FILTER_PASS: u32 = 1;

    pub const SNMP_EOL: u32 = 0;
    pub const SNMP_FULL_DUPLEX_ENABLE: u32 = 0x2F11;
    pub const SNMP_TRUE: u32 = 1;
    pub const SNMP_FALSE: u32 = 2;
}

// =============================================================================
// Pending Set
// =============================================================================

/// Set of command opcodes waiting to be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandSet(u32);

impl CommandSet {
    /// Empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether nothing is pending
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `cmd` is pending
    pub const fn contains(self, cmd: CommandCode) -> bool {
        self.0 & (1 << cmd as u32) != 0
    }

    /// Add `cmd`
    pub fn insert(&mut self, cmd: CommandCode) {
        self.0 |= 1 << cmd as u32;
    }

    /// Remove `cmd`
    pub fn remove(&mut self, cmd: CommandCode) {
        self.0 &= !(1 << cmd as u32);
    }

    /// Highest-numbered pending opcode
    pub fn highest(self) -> Option<CommandCode> {
        if self.is_empty() {
            return None;
        }
        CommandCode::from_raw(31 - self.0.leading_zeros())
    }
}

impl<const K: usize> From<[CommandCode; K]> for CommandSet {
    fn from(cmds: [CommandCode; K]) -> Self {
        let mut set = Self::empty();
        for cmd in cmds {
            set.insert(cmd);
        }
        set
    }
}

// =============================================================================
// Queue State
// =============================================================================

type CommandRing = DescriptorRing<TxDescriptor, COMMAND_RING_SIZE>;

/// Host-side state of the command request/response rings
#[derive(Debug, Clone)]
pub struct CommandQueue {
    pending: CommandSet,
    active: bool,
    request_producer: usize,
    request_completion: usize,
    response_producer: usize,
    response_completion: usize,
    queued: [u8; COMMAND_RING_SIZE],
}

impl CommandQueue {
    /// Empty queue
    pub const fn new() -> Self {
        Self {
            pending: CommandSet::empty(),
            active: false,
            request_producer: 0,
            request_completion: 0,
            response_producer: 0,
            response_completion: 0,
            queued: [0; COMMAND_RING_SIZE],
        }
    }

    /// Rewind the ring indices; pending commands are kept
    pub fn reset(&mut self) {
        *self = Self {
            pending: self.pending,
            ..Self::new()
        };
    }

    /// Commands waiting to be sent
    pub fn pending(&self) -> CommandSet {
        self.pending
    }

    /// Mutable access to the pending set
    pub fn pending_mut(&mut self) -> &mut CommandSet {
        &mut self.pending
    }

    /// Whether a command is waiting for its response
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether every queued response has been processed
    pub fn is_drained(&self) -> bool {
        CommandRing::is_drained(self.response_producer, self.response_completion)
    }

    /// Opcode to send next, if the channel is idle
    pub fn select(&self) -> Option<CommandCode> {
        if self.active {
            return None;
        }
        self.pending.highest()
    }

    fn request_doorbell(&self) -> u32 {
        (self.request_producer | (self.request_completion << 8)) as u32
    }

    fn response_doorbell(&self) -> u32 {
        (self.response_producer | (self.response_completion << 8)) as u32
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a 6-byte address into address filter slot `slot`
fn write_address(buf: &[VolatileCell<u32>], slot: usize, addr: &[u8; 6]) {
    let word = 1 + slot * 2;
    buf[word].set_le(u32::from_le_bytes([addr[0], addr[1], addr[2], addr[3]]));
    buf[word + 1].set_le(u32::from_le_bytes([addr[4], addr[5], 0, 0]));
}

// =============================================================================
// Adapter Operations
// =============================================================================

impl<P: Platform> Pdq<'_, P> {
    /// Send the highest pending command if the channel is idle
    pub(super) fn queue_commands(&mut self) {
        let Some(op) = self.commands.select() else {
            return;
        };

        let mem = self.mem;
        let block = &mem.block;
        let (cmdlen, _) = op.lengths();
        let slot = self.commands.request_producer;

        block
            .command_requests
            .get(slot)
            .set_control(TxDescriptor::control(true, true, cmdlen));

        self.commands.queued[slot] = op.to_raw();
        self.commands.pending.remove(op);

        let buf = &block.cmd_request_buf;
        for word in &buf[..cmdlen / 4] {
            word.set(0);
        }
        buf[0].set_le(u32::from(op.to_raw()));
        self.fill_request(op, buf);

        self.sync(DmaRegion::CommandRequest { len: cmdlen }, SyncOp::PreWrite);
        self.sync(
            DmaRegion::Descriptors {
                ring: RingKind::CommandRequest,
                index: slot,
                count: 1,
            },
            SyncOp::PreWrite,
        );
        self.commands.request_producer = CommandRing::advance(slot, 1);

        self.sync(
            DmaRegion::CommandResponse {
                len: COMMAND_RESPONSE_SIZE,
            },
            SyncOp::PreRead,
        );
        self.commands.response_producer = CommandRing::advance(self.commands.response_producer, 1);

        log::trace!("command {op} queued");
        self.commands.active = true;
        self.command_doorbells();
    }

    /// Build the opcode-specific request payload
    fn fill_request(&mut self, op: CommandCode, buf: &[VolatileCell<u32>]) {
        let pass = |on: bool| if on { item::FILTER_PASS } else { item::FILTER_BLOCK };
        match op {
            CommandCode::FilterSet => {
                let flags = self.flags;
                let items = [
                    (item::IND_GROUP_PROM, pass(flags.contains(AdapterFlags::PROMISC))),
                    (item::GROUP_PROM, pass(flags.contains(AdapterFlags::ALLMULTI))),
                    (
                        item::SMT_PROM,
                        pass(flags.contains(AdapterFlags::PROMISC | AdapterFlags::PASS_SMT)),
                    ),
                    (item::SMT_USER, pass(flags.contains(AdapterFlags::PASS_SMT))),
                ];
                for (idx, (code, state)) in items.iter().enumerate() {
                    buf[1 + idx * 2].set_le(*code);
                    buf[2 + idx * 2].set_le(*state);
                }
                buf[1 + items.len() * 2].set_le(item::EOL);
            }
            CommandCode::AddrFilterSet => {
                write_address(buf, 0, &[0xFF; 6]);
                let mut table = [[0u8; 6]; MULTICAST_SLOTS];
                let count = self.platform.fill_multicast(&mut table).min(MULTICAST_SLOTS);
                for (idx, addr) in table[..count].iter().enumerate() {
                    write_address(buf, 1 + idx, addr);
                }
                debug_assert!(1 + count <= ADDRESS_FILTER_SLOTS);
            }
            CommandCode::SnmpSet => {
                let fdx = if self.flags.contains(AdapterFlags::WANT_FDX) {
                    item::SNMP_TRUE
                } else {
                    item::SNMP_FALSE
                };
                buf[1].set_le(item::SNMP_FULL_DUPLEX_ENABLE);
                buf[2].set_le(fdx);
                buf[3].set_le(0);
                buf[4].set_le(item::SNMP_EOL);
            }
            _ => {}
        }
    }

    /// Handle the response to the active command, if it arrived
    pub(super) fn process_command_responses(&mut self) -> ProtocolResult<()> {
        let mem = self.mem;
        let block = &mem.block;
        if block.consumer.command_response() & CommandRing::MASK
            == self.commands.response_completion
        {
            return Ok(());
        }

        self.sync(
            DmaRegion::CommandResponse {
                len: COMMAND_RESPONSE_SIZE,
            },
            SyncOp::PostRead,
        );
        let rsp = &block.cmd_response_buf;
        let op = rsp[RESPONSE_OP_WORD].get_le();
        let status = rsp[RESPONSE_STATUS_WORD].get_le();
        let expected = self.commands.queued[self.commands.request_completion];

        if op != u32::from(expected) {
            log::error!("command response {op} does not match queued command {expected}");
            return Err(ProtocolError::UnexpectedResponse {
                expected,
                actual: op,
            });
        }
        if status != RESPONSE_SUCCESS {
            log::error!("command {op} failed with status {status}");
            return Err(ProtocolError::CommandFailed {
                opcode: expected,
                status,
            });
        }

        match CommandCode::from_raw(op) {
            Some(CommandCode::StatusCharsGet) if self.flags.contains(AdapterFlags::PRINTCHARS) => {
                self.flags.remove(AdapterFlags::PRINTCHARS);
                let chars = StationChars::from_response(rsp);
                self.report_characteristics(&chars);
                self.platform.update_link_status(&chars);
                self.chars = Some(chars);
            }
            Some(CommandCode::DecExtMibGet) => {
                let fdx = rsp[FDX_OPERATIONAL_WORD].get_le() != 0;
                self.flags.set(AdapterFlags::IS_FDX, fdx);
                log::debug!("full duplex operational: {fdx}");
            }
            Some(cmd) => log::trace!("command {cmd} completed"),
            None => {}
        }

        self.commands.request_completion = CommandRing::advance(self.commands.request_completion, 1);
        self.commands.response_completion =
            CommandRing::advance(self.commands.response_completion, 1);
        self.commands.active = false;

        if self.commands.pending.is_empty() {
            self.command_doorbells();
        } else {
            self.queue_commands();
        }
        Ok(())
    }

    fn command_doorbells(&mut self) {
        self.write_csr(Csr::CmdResponseProducer, self.commands.response_doorbell());
        self.write_csr(Csr::CmdRequestProducer, self.commands.request_doorbell());
    }

    fn report_characteristics(&self, chars: &StationChars) {
        let a = self.hwaddr;
        let f = self.fwrev;
        log::info!(
            "DEC {} FDDI {} Controller",
            self.config.kind.description(),
            chars.station_type
        );
        log::info!(
            "FDDI address {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}, FW={}{}{}{}, HW={}, SMT {}",
            a[0],
            a[1],
            a[2],
            a[3],
            a[4],
            a[5],
            char::from(f[0]),
            char::from(f[1]),
            char::from(f[2]),
            char::from(f[3]),
            chars.hardware_rev(),
            chars.smt_version().unwrap_or("?")
        );
        let ports: &[&str] = if chars.is_dual_attach() {
            &["[A]", "[B]"]
        } else {
            &[""]
        };
        for (port, label) in ports.iter().enumerate() {
            log::info!(
                "FDDI Port{label} = {} (PMD = {})",
                chars.phy_type(port).unwrap_or('?'),
                chars.pmd_type(port).unwrap_or("?")
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
