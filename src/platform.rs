//! Host capabilities consumed by the driver core
//!
//! The core never touches hardware or host memory management directly.
//! Everything it needs from the surrounding environment is expressed by
//! the traits in this module and bundled by [`Platform`]:
//!
//! - [`CsrBus`]: 32-bit CSR reads and writes at a byte offset
//! - [`DmaSync`]: cache/DMA synchronization and address translation
//! - [`BufferPool`] / [`PacketBuffer`]: packet buffer allocation and chaining
//! - [`UpperLayer`]: hooks into the network stack
//! - [`DelayNs`]: busy-wait pacing for reset and state polling
//!
//! One implementation exists per host environment; the core is generic
//! over it.

use embedded_hal::delay::DelayNs;

use crate::driver::station::StationChars;

// =============================================================================
// CSR Access
// =============================================================================

/// 32-bit control/status register access
///
/// Offsets are byte offsets from the CSR base. The bus-kind stride is
/// already applied by the core.
pub trait CsrBus {
    /// Read the register at `offset`
    fn read32(&mut self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`
    fn write32(&mut self, offset: usize, value: u32);
}

// =============================================================================
// DMA Synchronization
// =============================================================================

/// Descriptor ring identifiers used when synchronizing descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingKind {
    /// Receive data ring
    Receive,
    /// Transmit data ring
    Transmit,
    /// Host station-management receive ring
    HostSmt,
    /// Command response ring
    CommandResponse,
    /// Command request ring
    CommandRequest,
    /// Unsolicited event ring
    Unsolicited,
}

/// Region of shared memory to synchronize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaRegion {
    /// `count` descriptors starting at `index` of a ring
    Descriptors {
        /// Ring the descriptors belong to
        ring: RingKind,
        /// First descriptor index
        index: usize,
        /// Number of descriptors
        count: usize,
    },
    /// The consumer block
    ConsumerBlock,
    /// The first `len` bytes of the command request buffer
    CommandRequest {
        /// Bytes to synchronize
        len: usize,
    },
    /// The first `len` bytes of the command response buffer
    CommandResponse {
        /// Bytes to synchronize
        len: usize,
    },
    /// One unsolicited event record
    UnsolicitedEvent {
        /// Record index
        index: usize,
    },
}

/// Direction of a synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncOp {
    /// Before the adapter writes memory the host will read
    PreRead,
    /// Before the adapter reads memory the host wrote
    PreWrite,
    /// After the adapter wrote memory, before the host reads it
    PostRead,
    /// After the adapter read memory the host wrote
    PostWrite,
}

/// Cache coherency and address translation for shared memory
pub trait DmaSync {
    /// Synchronize a region of the shared descriptor memory
    fn sync(&mut self, region: DmaRegion, op: SyncOp);

    /// Translate a host virtual address into a 32-bit bus address
    ///
    /// The pointer is never dereferenced by the core.
    fn virt_to_bus(&self, ptr: *const u8) -> u32;
}

// =============================================================================
// Packet Buffers
// =============================================================================

/// A host packet buffer, possibly the head of a chain
///
/// Receive buffers are handed to the adapter with [`DATABUF_SIZE`] bytes
/// of room; transmit frames are chains of fragments of arbitrary length.
///
/// [`DATABUF_SIZE`]: crate::constants::DATABUF_SIZE
pub trait PacketBuffer: Sized {
    /// Valid data length of this segment
    fn len(&self) -> usize;

    /// Whether this segment holds no data
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set the valid data length of this segment
    fn set_len(&mut self, len: usize);

    /// Segment data
    fn as_slice(&self) -> &[u8];

    /// Virtual address of the first data byte
    ///
    /// Used for page arithmetic and [`DmaSync::virt_to_bus`]; never
    /// dereferenced by the core.
    fn data_ptr(&self) -> *const u8;

    /// Bus address of the first data byte
    fn bus_addr(&self) -> u32;

    /// Drop `count` bytes from the front of the segment
    fn trim_front(&mut self, count: usize);

    /// Next segment in the chain
    fn next(&self) -> Option<&Self>;

    /// Detach and return the rest of the chain
    fn take_next(&mut self) -> Option<Self>;

    /// Replace the rest of the chain
    fn set_next(&mut self, next: Option<Self>);
}

/// Packet buffer allocator
pub trait BufferPool {
    /// Buffer type handed out by this pool
    type Buffer: PacketBuffer;

    /// Allocate one receive buffer of [`DATABUF_SIZE`] bytes
    ///
    /// [`DATABUF_SIZE`]: crate::constants::DATABUF_SIZE
    fn alloc(&mut self) -> Option<Self::Buffer>;

    /// Return a buffer (and its whole chain) to the pool
    fn free(&mut self, buffer: Self::Buffer);

    /// Synchronize `len` bytes of a buffer starting at `offset`
    fn sync_buffer(&mut self, buffer: &Self::Buffer, offset: usize, len: usize, op: SyncOp);
}

// =============================================================================
// Upper Layer Hooks
// =============================================================================

/// Network stack hooks
pub trait UpperLayer: BufferPool {
    /// A frame was received
    ///
    /// `len` is the PDU length; `promiscuous` is set when the frame did
    /// not match the adapter's address filter.
    fn receive(&mut self, frame: Self::Buffer, len: usize, promiscuous: bool);

    /// A queued frame was transmitted; ownership returns to the host
    fn transmit_done(&mut self, frame: Self::Buffer);

    /// Transmit descriptors became available or the link came up
    fn restart_transmitter(&mut self);

    /// Fill `table` with multicast addresses, returning how many were written
    fn fill_multicast(&mut self, table: &mut [[u8; 6]]) -> usize;

    /// Station characteristics were read from the adapter
    fn update_link_status(&mut self, chars: &StationChars);
}

// =============================================================================
// Platform Bundle
// =============================================================================

/// Everything the driver core needs from its host environment
pub trait Platform: CsrBus + DmaSync + UpperLayer + DelayNs {}

impl<T> Platform for T where T: CsrBus + DmaSync + UpperLayer + DelayNs {}

/// Frame type used by a platform
pub type Frame<P> = <P as BufferPool>::Buffer;
