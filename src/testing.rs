//! Test doubles for the driver core.
//!
//! [`MockPlatform`] models just enough of the adapter firmware to walk
//! the driver through its state machine: port-control commands, reset,
//! DMA init, automatic command responses and the pending bits of the
//! port status register. It also records every CSR write, DMA sync and
//! upper-layer callback for assertions.

#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use std::boxed::Box;
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::constants::DATABUF_SIZE;
use crate::driver::config::{AdapterKind, AdapterState, PdqConfig};
use crate::driver::pdq::Pdq;
use crate::driver::station::{StationChars, StationType};
use crate::internal::dma::PdqMemory;
use crate::internal::register::port::{host_int, pctl, psts, sub_cmd};
use crate::internal::register::{Csr, CsrMap};
use crate::platform::{
    BufferPool, CsrBus, DmaRegion, DmaSync, PacketBuffer, SyncOp, UpperLayer,
};

const ALL_CSRS: [Csr; 15] = [
    Csr::PortReset,
    Csr::HostData,
    Csr::PortControl,
    Csr::PortDataA,
    Csr::PortDataB,
    Csr::PortStatus,
    Csr::HostIntType0,
    Csr::HostIntEnable,
    Csr::Type2Producer,
    Csr::CmdResponseProducer,
    Csr::CmdRequestProducer,
    Csr::HostSmtProducer,
    Csr::UnsolicitedProducer,
    Csr::PfiModeControl,
    Csr::PfiStatus,
];

/// Halt code the mock reports when DMA init fails
const DMA_INIT_HALT_CODE: u8 = 6;

// =============================================================================
// Mock Packet Buffer
// =============================================================================

/// Heap-backed packet buffer
///
/// Buffers built with [`MockBuf::at`] report a made-up virtual address so
/// page arithmetic can be tested without real page-aligned memory.
#[derive(Debug)]
pub struct MockBuf {
    pub id: u32,
    data: Vec<u8>,
    start: usize,
    len: usize,
    va: Option<usize>,
    next: Option<Box<MockBuf>>,
}

impl MockBuf {
    /// Receive-sized buffer
    pub fn new(id: u32) -> Self {
        Self {
            id,
            data: vec![0; DATABUF_SIZE],
            start: 0,
            len: DATABUF_SIZE,
            va: None,
            next: None,
        }
    }

    /// `len` bytes that claim to live at virtual address `va`
    pub fn at(va: usize, len: usize) -> Self {
        Self {
            id: 0,
            data: vec![0; len],
            start: 0,
            len,
            va: Some(va),
            next: None,
        }
    }

    /// Link `parts` into one chain, first element at the head
    pub fn chain(parts: Vec<MockBuf>) -> Self {
        let mut head: Option<MockBuf> = None;
        for mut part in parts.into_iter().rev() {
            part.next = head.map(Box::new);
            head = Some(part);
        }
        head.unwrap_or_else(|| MockBuf::at(0, 0))
    }

    /// Writable view from the current start to the end of the storage
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.start..]
    }

    /// Segments in the chain starting here
    pub fn segments(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |next| next.segments())
    }
}

impl PacketBuffer for MockBuf {
    fn len(&self) -> usize {
        self.len
    }

    fn set_len(&mut self, len: usize) {
        self.len = len;
    }

    fn as_slice(&self) -> &[u8] {
        let end = (self.start + self.len).min(self.data.len());
        &self.data[self.start.min(end)..end]
    }

    fn data_ptr(&self) -> *const u8 {
        match self.va {
            Some(va) => core::ptr::without_provenance(va + self.start),
            None => self.data.as_ptr().wrapping_add(self.start),
        }
    }

    fn bus_addr(&self) -> u32 {
        self.data_ptr() as usize as u32
    }

    fn trim_front(&mut self, count: usize) {
        self.start += count;
        self.len = self.len.saturating_sub(count);
    }

    fn next(&self) -> Option<&Self> {
        self.next.as_deref()
    }

    fn take_next(&mut self) -> Option<Self> {
        self.next.take().map(|next| *next)
    }

    fn set_next(&mut self, next: Option<Self>) {
        self.next = next.map(Box::new);
    }
}

// =============================================================================
// Mock Platform
// =============================================================================

/// Simulated adapter plus host environment
pub struct MockPlatform {
    pub csrs: CsrMap,
    pub memory: Option<&'static PdqMemory>,

    // Adapter model
    pub state: AdapterState,
    pub halt_code: u8,
    /// Pending bits returned (and cleared) by the next port status read
    pub pending: u32,
    /// Type-0 status, write 1 to clear
    pub type0: u32,
    pub regs: [u32; 18],
    pub host_data: u32,
    pub port_control: u32,
    pub mla: [u8; 6],
    pub fwrev: [u8; 4],
    pub chip_rev: u32,
    pub cmd_hang: bool,
    pub error_log: Vec<u32>,
    error_pos: usize,
    pub reset_hang: bool,
    pub halt_on_dma_init: u32,
    pub burst: Option<u32>,

    // Command responder
    pub cmd_auto: bool,
    pub cmd_status: u32,
    pub fdx_operational: u32,
    pub commands_seen: Vec<u32>,

    // Recorders
    pub writes: Vec<(Csr, u32)>,
    pub port_commands: Vec<u32>,
    pub resets: u32,
    pub reset_args: Vec<u32>,
    pub dma_init_args: Vec<u32>,
    pub syncs: Vec<(DmaRegion, SyncOp)>,
    pub delayed_ns: u64,

    // Buffer pool and upper layer
    pub alloc_limit: Option<usize>,
    pub alloc_count: usize,
    pub free_count: usize,
    next_id: u32,
    pub received: Vec<(MockBuf, usize, bool)>,
    pub tx_done: Vec<MockBuf>,
    pub restarts: u32,
    pub multicast: Vec<[u8; 6]>,
    pub link_updates: Vec<StationChars>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Station type reported in Status Chars Get responses
    pub const STATION_TYPE: StationType = StationType::Das;

    /// DEFPA fresh out of power-on, no shared memory attached
    pub fn new() -> Self {
        Self {
            csrs: CsrMap::new(AdapterKind::Defpa),
            memory: None,
            state: AdapterState::DmaUnavailable,
            halt_code: 0,
            pending: 0,
            type0: 0,
            regs: [0; 18],
            host_data: 0,
            port_control: 0,
            mla: [0x08, 0x00, 0x2B, 0x00, 0x00, 0x01],
            fwrev: *b"PC20",
            chip_rev: 0,
            cmd_hang: false,
            error_log: Vec::new(),
            error_pos: 0,
            reset_hang: false,
            halt_on_dma_init: 0,
            burst: None,
            cmd_auto: true,
            cmd_status: 0,
            fdx_operational: 0,
            commands_seen: Vec::new(),
            writes: Vec::new(),
            port_commands: Vec::new(),
            resets: 0,
            reset_args: Vec::new(),
            dma_init_args: Vec::new(),
            syncs: Vec::new(),
            delayed_ns: 0,
            alloc_limit: None,
            alloc_count: 0,
            free_count: 0,
            next_id: 0,
            received: Vec::new(),
            tx_done: Vec::new(),
            restarts: 0,
            multicast: Vec::new(),
            link_updates: Vec::new(),
        }
    }

    /// Mock that answers commands through `memory`
    pub fn with_memory(memory: &'static PdqMemory) -> Self {
        Self {
            memory: Some(memory),
            ..Self::new()
        }
    }

    /// Most recent value written to `csr`
    pub fn last_write(&self, csr: Csr) -> Option<u32> {
        self.writes
            .iter()
            .rev()
            .find(|(written, _)| *written == csr)
            .map(|(_, value)| *value)
    }

    /// Set pending bits for the next port status read
    pub fn raise(&mut self, bits: u32) {
        self.pending |= bits;
    }

    /// Move to `state` and raise a state change
    pub fn change_state(&mut self, state: AdapterState) {
        self.state = state;
        self.type0 |= host_int::STATE_CHANGE;
    }

    /// Halt with `code` and raise a state change
    pub fn halt(&mut self, code: u8) {
        self.halt_code = code;
        self.change_state(AdapterState::Halted);
    }

    /// Raise fatal error bits
    pub fn fatal(&mut self, bits: u32) {
        self.type0 |= bits & host_int::FATAL_ERROR;
    }

    /// Ask the host to flush its transmit ring
    pub fn flush_request(&mut self) {
        self.type0 |= host_int::XMT_DATA_FLUSH;
    }

    fn decode(&self, offset: usize) -> Option<Csr> {
        ALL_CSRS
            .into_iter()
            .filter(|csr| !csr.is_pfi() || self.csrs.has_pfi())
            .find(|csr| self.csrs.offset(*csr) == offset)
    }

    fn port_status(&mut self) -> u32 {
        let type0_pending = if self.type0
            & (host_int::STATE_CHANGE | host_int::XMT_DATA_FLUSH | host_int::FATAL_ERROR)
            != 0
        {
            psts::TYPE_0_PENDING
        } else {
            0
        };
        let status = (self.state.to_raw() << psts::STATE_SHIFT)
            | u32::from(self.halt_code)
            | self.pending
            | type0_pending;
        self.pending = 0;
        status
    }

    /// Run a port-control command, returning whether it succeeded
    fn execute(&mut self, cmd: u32) -> bool {
        let data_a = self.regs[Csr::PortDataA.index()];
        let data_b = self.regs[Csr::PortDataB.index()];
        match cmd {
            pctl::MLA_READ => {
                let m = self.mla;
                self.host_data = if data_a == 0 {
                    u32::from_le_bytes([m[0], m[1], m[2], m[3]])
                } else {
                    u32::from_le_bytes([m[4], m[5], 0, 0])
                };
            }
            pctl::FW_REV_READ => self.host_data = u32::from_be_bytes(self.fwrev),
            pctl::SUB_CMD => match data_a {
                sub_cmd::PDQ_REV_GET => self.host_data = self.chip_rev,
                sub_cmd::DMA_BURST_SIZE_SET => self.burst = Some(data_b),
                _ => return false,
            },
            pctl::ERROR_LOG_START => self.error_pos = 0,
            pctl::ERROR_LOG_READ => match self.error_log.get(self.error_pos) {
                Some(word) => {
                    self.host_data = *word;
                    self.error_pos += 1;
                }
                None => return false,
            },
            pctl::DMA_INIT => {
                self.dma_init_args.push(data_a);
                if self.halt_on_dma_init > 0 {
                    self.halt_on_dma_init -= 1;
                    self.halt_code = DMA_INIT_HALT_CODE;
                    self.state = AdapterState::Halted;
                } else {
                    self.state = AdapterState::DmaAvailable;
                }
            }
            pctl::CONSUMER_BLOCK | pctl::XMT_DATA_FLUSH_DONE => {}
            _ => return false,
        }
        true
    }

    /// Answer the command in the request buffer, like the firmware would
    fn respond(&mut self, doorbell: u32) {
        let Some(memory) = self.memory else {
            return;
        };
        let consumer = &memory.block.consumer;
        let producer = (doorbell & 0xFF) as usize;
        if !self.cmd_auto || producer == consumer.command_request() {
            return;
        }

        let request = &memory.block.cmd_request_buf;
        let response = &memory.block.cmd_response_buf;
        let op = request[0].get_le();
        self.commands_seen.push(op);

        for word in response {
            word.set(0);
        }
        response[1].set_le(op);
        response[2].set_le(self.cmd_status);
        match op {
            // Status Chars Get
            4 => {
                response[5].set_le(4);
                response[6].set_le(2);
                response[9].set_le(u32::from_le_bytes(*b"F1.0"));
                response[40].set_le(0);
                response[41].set_le(1);
                response[42].set_le(0);
                response[43].set_le(0);
            }
            // DEC Ext MIB Get
            12 => response[20].set_le(self.fdx_operational),
            // Start
            0 => self.change_state(AdapterState::LinkUnavailable),
            _ => {}
        }

        consumer.set_command_request(producer);
        consumer.set_command_response(producer);
        self.pending |= psts::CMD_RSP_PENDING;
    }
}

impl CsrBus for MockPlatform {
    fn read32(&mut self, offset: usize) -> u32 {
        match self.decode(offset) {
            Some(Csr::PortStatus) => self.port_status(),
            Some(Csr::HostIntType0) => self.type0,
            Some(Csr::PortControl) => self.port_control,
            Some(Csr::HostData) => self.host_data,
            Some(csr) => self.regs[csr.index()],
            None => 0,
        }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        let Some(csr) = self.decode(offset) else {
            return;
        };
        self.writes.push((csr, value));
        match csr {
            Csr::HostIntType0 => self.type0 &= !value,
            Csr::PortControl => {
                if self.cmd_hang {
                    self.port_control = value;
                    return;
                }
                let cmd = value & !pctl::CMD_ERROR;
                self.port_commands.push(cmd);
                self.port_control = if self.execute(cmd) { cmd } else { value };
                self.type0 |= host_int::CSR_CMD_DONE;
            }
            Csr::PortReset => {
                if value != 0 {
                    self.resets += 1;
                    self.reset_args.push(self.regs[Csr::PortDataA.index()]);
                } else if !self.reset_hang {
                    self.state = AdapterState::DmaUnavailable;
                    self.halt_code = 0;
                }
            }
            Csr::CmdRequestProducer => self.respond(value),
            _ => self.regs[csr.index()] = value,
        }
    }
}

impl DmaSync for MockPlatform {
    fn sync(&mut self, region: DmaRegion, op: SyncOp) {
        self.syncs.push((region, op));
    }

    fn virt_to_bus(&self, ptr: *const u8) -> u32 {
        ptr as usize as u32
    }
}

impl BufferPool for MockPlatform {
    type Buffer = MockBuf;

    fn alloc(&mut self) -> Option<MockBuf> {
        if self.alloc_limit.is_some_and(|limit| self.alloc_count >= limit) {
            return None;
        }
        self.alloc_count += 1;
        self.next_id += 1;
        Some(MockBuf::new(self.next_id))
    }

    fn free(&mut self, buffer: MockBuf) {
        self.free_count += buffer.segments();
    }

    fn sync_buffer(&mut self, _buffer: &MockBuf, _offset: usize, _len: usize, _op: SyncOp) {}
}

impl UpperLayer for MockPlatform {
    fn receive(&mut self, frame: MockBuf, len: usize, promiscuous: bool) {
        self.received.push((frame, len, promiscuous));
    }

    fn transmit_done(&mut self, frame: MockBuf) {
        self.tx_done.push(frame);
    }

    fn restart_transmitter(&mut self) {
        self.restarts += 1;
    }

    fn fill_multicast(&mut self, table: &mut [[u8; 6]]) -> usize {
        let count = self.multicast.len().min(table.len());
        table[..count].copy_from_slice(&self.multicast[..count]);
        count
    }

    fn update_link_status(&mut self, chars: &StationChars) {
        self.link_updates.push(*chars);
    }
}

impl DelayNs for MockPlatform {
    fn delay_ns(&mut self, ns: u32) {
        self.delayed_ns += u64::from(ns);
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Configuration with tight wait bounds and no characteristics report
pub fn test_config() -> PdqConfig {
    PdqConfig::new()
        .with_report_characteristics(false)
        .with_port_control_spins(64)
        .with_poll_bounds(10, 10)
        .with_status_chars_polls(10)
}

/// Shared memory that lives for the rest of the test
pub fn test_memory() -> &'static PdqMemory {
    Box::leak(Box::new(PdqMemory::new()))
}

/// Attached driver sitting in DMA Available
pub fn initialized_pdq(config: PdqConfig) -> (Pdq<'static, MockPlatform>, &'static PdqMemory) {
    let memory = test_memory();
    let mut platform = MockPlatform::with_memory(memory);
    platform.csrs = CsrMap::new(config.kind);
    let pdq = Pdq::initialize(platform, memory, config).expect("attach");
    (pdq, memory)
}

/// Attached driver that has been told to run; startup commands in flight
pub fn running_pdq(config: PdqConfig) -> (Pdq<'static, MockPlatform>, &'static PdqMemory) {
    let (mut pdq, memory) = initialized_pdq(config);
    pdq.run().expect("run");
    (pdq, memory)
}
