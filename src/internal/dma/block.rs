//! Host memory shared with the adapter.
//!
//! [`PdqMemory`] holds the 8 KiB descriptor block (all six rings, the
//! command scratch buffers, the consumer block and the transmit packet
//! header) followed by the unsolicited event records. The adapter reads
//! and writes it by DMA, so every field is a [`VolatileCell`].

use core::mem::{offset_of, size_of};

use super::descriptor::{RxDescriptor, TxDescriptor, VolatileCell};
use super::ring::DescriptorRing;
use crate::constants::{
    COMMAND_BUFFER_SIZE, COMMAND_RING_SIZE, CONSUMER_BLOCK_SIZE, DESCRIPTOR_BLOCK_SIZE,
    HOST_SMT_RING_SIZE, RECEIVE_RING_SIZE, TRANSMIT_RING_SIZE, UNSOLICITED_EVENT_SIZE,
    UNSOLICITED_RING_SIZE,
};

/// Longwords in each command scratch buffer
const COMMAND_BUFFER_WORDS: usize = COMMAND_BUFFER_SIZE / 4;

/// Longwords in one unsolicited event record
const EVENT_WORDS: usize = UNSOLICITED_EVENT_SIZE / 4;

// =============================================================================
// Consumer Block
// =============================================================================

/// Completion indices published by the adapter
///
/// The adapter writes how far it has consumed each ring; the host reads
/// these after a `PostRead` sync. Values are raw and must be masked with
/// the ring size by the reader.
#[repr(C)]
pub struct ConsumerBlock {
    receives: VolatileCell<u16>,
    transmits: VolatileCell<u16>,
    _filler0: VolatileCell<u32>,
    host_smt: VolatileCell<u32>,
    _filler1: VolatileCell<u32>,
    unsolicited: VolatileCell<u32>,
    _filler2: VolatileCell<u32>,
    command_response: VolatileCell<u32>,
    _filler3: VolatileCell<u32>,
    command_request: VolatileCell<u32>,
    _filler4: [VolatileCell<u32>; 7],
}

impl ConsumerBlock {
    const fn new() -> Self {
        Self {
            receives: VolatileCell::new(0),
            transmits: VolatileCell::new(0),
            _filler0: VolatileCell::new(0),
            host_smt: VolatileCell::new(0),
            _filler1: VolatileCell::new(0),
            unsolicited: VolatileCell::new(0),
            _filler2: VolatileCell::new(0),
            command_response: VolatileCell::new(0),
            _filler3: VolatileCell::new(0),
            command_request: VolatileCell::new(0),
            _filler4: [const { VolatileCell::new(0) }; 7],
        }
    }

    /// Receive ring consumer index
    pub fn receives(&self) -> usize {
        usize::from(self.receives.get_le())
    }

    /// Transmit ring consumer index
    pub fn transmits(&self) -> usize {
        usize::from(self.transmits.get_le())
    }

    /// Host SMT ring consumer index
    pub fn host_smt(&self) -> usize {
        self.host_smt.get_le() as usize
    }

    /// Unsolicited event ring consumer index
    pub fn unsolicited(&self) -> usize {
        self.unsolicited.get_le() as usize
    }

    /// Command response ring consumer index
    pub fn command_response(&self) -> usize {
        self.command_response.get_le() as usize
    }

    /// Command request ring consumer index
    pub fn command_request(&self) -> usize {
        self.command_request.get_le() as usize
    }

    /// Rewind the transmit consumer (after a transmit flush)
    pub fn set_transmits(&self, index: usize) {
        self.transmits.set_le(index as u16);
    }

    #[cfg(test)]
    pub(crate) fn set_receives(&self, index: usize) {
        self.receives.set_le(index as u16);
    }

    #[cfg(test)]
    pub(crate) fn set_host_smt(&self, index: usize) {
        self.host_smt.set_le(index as u32);
    }

    #[cfg(test)]
    pub(crate) fn set_unsolicited(&self, index: usize) {
        self.unsolicited.set_le(index as u32);
    }

    #[cfg(test)]
    pub(crate) fn set_command_response(&self, index: usize) {
        self.command_response.set_le(index as u32);
    }

    #[cfg(test)]
    pub(crate) fn set_command_request(&self, index: usize) {
        self.command_request.set_le(index as u32);
    }

    /// Zero every index
    pub fn clear(&self) {
        self.receives.set(0);
        self.transmits.set(0);
        self._filler0.set(0);
        self.host_smt.set(0);
        self._filler1.set(0);
        self.unsolicited.set(0);
        self._filler2.set(0);
        self.command_response.set(0);
        self._filler3.set(0);
        self.command_request.set(0);
        for word in &self._filler4 {
            word.set(0);
        }
    }
}

// =============================================================================
// Descriptor Block
// =============================================================================

/// The 8 KiB block whose bus address is handed to the adapter at DMA init
#[repr(C, align(8192))]
pub struct DescriptorBlock {
    /// Receive data ring
    pub receives: DescriptorRing<RxDescriptor, RECEIVE_RING_SIZE>,
    /// Transmit data ring
    pub transmits: DescriptorRing<TxDescriptor, TRANSMIT_RING_SIZE>,
    /// Host station-management receive ring
    pub host_smt: DescriptorRing<RxDescriptor, HOST_SMT_RING_SIZE>,
    /// Command response ring
    pub command_responses: DescriptorRing<RxDescriptor, COMMAND_RING_SIZE>,
    /// Command request ring
    pub command_requests: DescriptorRing<TxDescriptor, COMMAND_RING_SIZE>,
    /// Unsolicited event ring
    pub unsolicited: DescriptorRing<RxDescriptor, UNSOLICITED_RING_SIZE>,
    /// Command request scratch buffer
    pub cmd_request_buf: [VolatileCell<u32>; COMMAND_BUFFER_WORDS],
    /// Command response scratch buffer
    pub cmd_response_buf: [VolatileCell<u32>; COMMAND_BUFFER_WORDS],
    /// Consumer indices written by the adapter
    pub consumer: ConsumerBlock,
    /// Packet header prepended to transmitted frames
    pub tx_hdr: VolatileCell<[u8; 4]>,
    _reserved: [u8; 1084],
}

const _: () = {
    assert!(size_of::<ConsumerBlock>() == CONSUMER_BLOCK_SIZE);
    assert!(size_of::<DescriptorBlock>() == DESCRIPTOR_BLOCK_SIZE);
    assert!(offset_of!(DescriptorBlock, transmits) == 2048);
    assert!(offset_of!(DescriptorBlock, host_smt) == 4096);
    assert!(offset_of!(DescriptorBlock, command_responses) == 4608);
    assert!(offset_of!(DescriptorBlock, command_requests) == 4736);
    assert!(offset_of!(DescriptorBlock, unsolicited) == 4864);
    assert!(offset_of!(DescriptorBlock, cmd_request_buf) == 4992);
    assert!(offset_of!(DescriptorBlock, cmd_response_buf) == 6016);
    assert!(offset_of!(DescriptorBlock, consumer) == 7040);
    assert!(offset_of!(DescriptorBlock, tx_hdr) == 7104);
};

impl DescriptorBlock {
    const fn new() -> Self {
        Self {
            receives: DescriptorRing::from_array([const { RxDescriptor::new() }; RECEIVE_RING_SIZE]),
            transmits: DescriptorRing::from_array(
                [const { TxDescriptor::new() }; TRANSMIT_RING_SIZE],
            ),
            host_smt: DescriptorRing::from_array([const { RxDescriptor::new() }; HOST_SMT_RING_SIZE]),
            command_responses: DescriptorRing::from_array(
                [const { RxDescriptor::new() }; COMMAND_RING_SIZE],
            ),
            command_requests: DescriptorRing::from_array(
                [const { TxDescriptor::new() }; COMMAND_RING_SIZE],
            ),
            unsolicited: DescriptorRing::from_array(
                [const { RxDescriptor::new() }; UNSOLICITED_RING_SIZE],
            ),
            cmd_request_buf: [const { VolatileCell::new(0) }; COMMAND_BUFFER_WORDS],
            cmd_response_buf: [const { VolatileCell::new(0) }; COMMAND_BUFFER_WORDS],
            consumer: ConsumerBlock::new(),
            tx_hdr: VolatileCell::new([0; 4]),
            _reserved: [0; 1084],
        }
    }
}

// =============================================================================
// Unsolicited Event Records
// =============================================================================

/// One 512-byte unsolicited event record
#[repr(C)]
pub struct UnsolicitedEvent {
    words: [VolatileCell<u32>; EVENT_WORDS],
}

impl UnsolicitedEvent {
    const fn new() -> Self {
        Self {
            words: [const { VolatileCell::new(0) }; EVENT_WORDS],
        }
    }

    /// Little-endian longword `index` of the record (0 past the end)
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).map_or(0, |word| word.get_le())
    }

    #[cfg(test)]
    pub(crate) fn set_word(&self, index: usize, value: u32) {
        if let Some(word) = self.words.get(index) {
            word.set_le(value);
        }
    }

    /// Pointer to the start of the record
    pub fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }

    fn clear(&self) {
        for word in &self.words {
            word.set(0);
        }
    }
}

// =============================================================================
// Shared Memory
// =============================================================================

/// All host memory the adapter accesses by DMA
///
/// Must live at an 8 KiB aligned bus address for the whole lifetime of
/// the driver; place it in a `static` or another DMA-capable region.
///
/// ```ignore
/// static MEMORY: PdqMemory = PdqMemory::new();
/// let pdq = Pdq::initialize(platform, &MEMORY, PdqConfig::new())?;
/// ```
#[repr(C)]
pub struct PdqMemory {
    /// Descriptor block
    pub block: DescriptorBlock,
    /// Unsolicited event records, one per unsolicited descriptor
    pub events: [UnsolicitedEvent; UNSOLICITED_RING_SIZE],
}

impl PdqMemory {
    /// Total size in bytes
    pub const SIZE: usize = size_of::<Self>();

    /// Create zeroed shared memory
    #[must_use]
    pub const fn new() -> Self {
        Self {
            block: DescriptorBlock::new(),
            events: [const { UnsolicitedEvent::new() }; UNSOLICITED_RING_SIZE],
        }
    }

    /// Zero everything
    pub fn clear(&self) {
        let block = &self.block;
        block.receives.iter().for_each(RxDescriptor::clear);
        block.transmits.iter().for_each(TxDescriptor::clear);
        block.host_smt.iter().for_each(RxDescriptor::clear);
        block.command_responses.iter().for_each(RxDescriptor::clear);
        block.command_requests.iter().for_each(TxDescriptor::clear);
        block.unsolicited.iter().for_each(RxDescriptor::clear);
        for word in block.cmd_request_buf.iter().chain(&block.cmd_response_buf) {
            word.set(0);
        }
        block.consumer.clear();
        block.tx_hdr.set([0; 4]);
        self.events.iter().for_each(UnsolicitedEvent::clear);
    }

    /// Pointer to the descriptor block
    pub fn block_ptr(&self) -> *const u8 {
        (&raw const self.block).cast()
    }

    /// Pointer to the consumer block
    pub fn consumer_ptr(&self) -> *const u8 {
        (&raw const self.block.consumer).cast()
    }

    /// Pointer to the transmit packet header
    pub fn tx_hdr_ptr(&self) -> *const u8 {
        self.block.tx_hdr.as_ptr().cast()
    }

    /// Pointer to the command request buffer
    pub fn cmd_request_ptr(&self) -> *const u8 {
        self.block.cmd_request_buf.as_ptr().cast()
    }

    /// Pointer to the command response buffer
    pub fn cmd_response_ptr(&self) -> *const u8 {
        self.block.cmd_response_buf.as_ptr().cast()
    }
}

impl Default for PdqMemory {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: every field is a VolatileCell or plain padding, and the driver
// is the only host-side writer.
unsafe impl Sync for PdqMemory {}
