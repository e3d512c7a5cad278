//! Centralized Constants
//!
//! Single source of truth for the sizes, frame bounds and busy-wait limits
//! used throughout the PDQ driver core.
//!
//! # Organization
//!
//! - **Shared memory**: ring sizes and block layout
//! - **Receive path**: segment grouping and header offsets
//! - **FDDI frames**: frame-control classes and length bounds
//! - **Timing**: iteration bounds for every busy-wait
//!
//! # Note
//!
//! Register bit definitions live in `internal::register` next to the CSR
//! map they describe.

// =============================================================================
// Shared Memory Layout
// =============================================================================

/// Descriptors in the receive ring
pub const RECEIVE_RING_SIZE: usize = 256;

/// Descriptors in the transmit ring
pub const TRANSMIT_RING_SIZE: usize = 256;

/// Descriptors in the host-SMT receive ring
pub const HOST_SMT_RING_SIZE: usize = 64;

/// Descriptors in each of the command request and response rings
pub const COMMAND_RING_SIZE: usize = 16;

/// Descriptors (and event records) in the unsolicited-event ring
pub const UNSOLICITED_RING_SIZE: usize = 16;

/// Size of the descriptor block; it must also be its bus alignment
pub const DESCRIPTOR_BLOCK_SIZE: usize = 8192;

/// Size of the consumer block inside the descriptor block
pub const CONSUMER_BLOCK_SIZE: usize = 64;

/// Size of one unsolicited event record
pub const UNSOLICITED_EVENT_SIZE: usize = 512;

/// Size of each command scratch buffer (request and response)
pub const COMMAND_BUFFER_SIZE: usize = 1024;

/// Segment length programmed into command response descriptors
pub const COMMAND_RESPONSE_SIZE: usize = 512;

/// Command request/response lengths are rounded up to this
pub const COMMAND_ALIGNMENT: usize = 16;

/// Entries in the address filter table (broadcast plus multicast)
pub const ADDRESS_FILTER_SLOTS: usize = 62;

/// Multicast entries the upper layer may supply to the address filter
pub const MULTICAST_SLOTS: usize = ADDRESS_FILTER_SLOTS - 1;

// =============================================================================
// Receive Path
// =============================================================================

/// Size of every receive data buffer handed to the adapter
pub const DATABUF_SIZE: usize = 2048;

/// Descriptors per receive segment group
pub const RX_SEGCNT: usize = 3;

/// Offset of the frame-control byte in the first receive segment
/// (4-byte status word followed by 3 packet-header bytes)
pub const RX_FC_OFFSET: usize = 7;

/// Length of the receive status word at the start of the first segment
pub const RX_STATUS_SIZE: usize = 4;

/// FDDI frame check sequence length
pub const CRC_SIZE: usize = 4;

/// Default receive groups kept posted on the data ring
pub const DEFAULT_RX_TARGET_GROUPS: usize = 8;

/// Default receive groups kept posted on the host-SMT ring
pub const DEFAULT_SMT_TARGET_GROUPS: usize = 3;

// =============================================================================
// FDDI Frames
// =============================================================================

/// Frame-control class bits (C, L and F fields)
pub const FDDI_FC_CLASS_MASK: u8 = 0x80 | 0x40 | 0x30;

/// Asynchronous LLC frame class
pub const FDDI_FC_LLC_ASYNC: u8 = 0x50;

/// Synchronous LLC frame class
pub const FDDI_FC_LLC_SYNC: u8 = 0xD0;

/// Asynchronous implementor frame class
pub const FDDI_FC_IMP_ASYNC: u8 = 0x60;

/// Synchronous implementor frame class
pub const FDDI_FC_IMP_SYNC: u8 = 0xE0;

/// Station management frame class
pub const FDDI_FC_SMT: u8 = 0x40;

/// Largest accepted received length
pub const FDDI_MAX: usize = 4495;

/// Smallest accepted LLC or implementor frame
pub const FDDI_LLC_MIN: usize = 20;

/// Smallest accepted SMT frame
pub const FDDI_SMT_MIN: usize = 37;

/// Packet header bytes prepended to transmitted frames
pub const FDDI_PACKET_HEADER: [u8; 3] = [0x20, 0x38, 0x00];

/// Default page size for the transmit scatter rule
pub const DEFAULT_PAGE_SIZE: usize = 4096;

// =============================================================================
// Timing
// =============================================================================

/// Port-control completion spins (no delay between reads)
pub const PORT_CONTROL_SPINS: u32 = 33_000_000;

/// Polls waiting for DMA Unavailable after a reset pulse
pub const RESET_POLLS: u32 = 100_000;

/// Reset line hold time in microseconds
pub const RESET_PULSE_US: u32 = 100;

/// Settle time after the reset poll in microseconds
pub const RESET_SETTLE_US: u32 = 10_000;

/// Polls waiting for DMA Available after DMA init
pub const DMA_AVAILABLE_POLLS: u32 = 1000;

/// Polls waiting for the characteristics response during stop
pub const STATUS_CHARS_POLLS: u32 = 1000;

/// Interval between polls of the adapter state in microseconds
pub const POLL_INTERVAL_US: u32 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_sizes_are_powers_of_two() {
        for size in [
            RECEIVE_RING_SIZE,
            TRANSMIT_RING_SIZE,
            HOST_SMT_RING_SIZE,
            COMMAND_RING_SIZE,
            UNSOLICITED_RING_SIZE,
        ] {
            assert!(size.is_power_of_two());
        }
    }

    #[test]
    fn largest_frame_fits_one_segment_group() {
        let pdulen = FDDI_MAX - CRC_SIZE;
        let segcnt = (pdulen + RX_FC_OFFSET).div_ceil(DATABUF_SIZE);
        assert!(segcnt <= RX_SEGCNT);
    }

    #[test]
    fn default_targets_fit_rings() {
        assert!(DEFAULT_RX_TARGET_GROUPS * RX_SEGCNT < RECEIVE_RING_SIZE);
        assert!(DEFAULT_SMT_TARGET_GROUPS * RX_SEGCNT < HOST_SMT_RING_SIZE);
    }
}
