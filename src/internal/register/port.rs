//! PDQ register bit definitions
//!
//! Grouped by register: port status, port control, host interrupt
//! type-0/enable, port-control sub-commands and the DEFPA PFI registers.

// Full register map; the core does not use every bit.
#![allow(dead_code)]

// =============================================================================
// Port Status (PSTS)
// =============================================================================

/// Port status register bits
pub mod psts {
    /// Receive data ring has completions
    pub const RCV_DATA_PENDING: u32 = 1 << 31;
    /// Transmit data ring has completions
    pub const XMT_DATA_PENDING: u32 = 1 << 30;
    /// Host SMT ring has completions
    pub const HOST_SMT_PENDING: u32 = 1 << 29;
    /// Unsolicited events are waiting
    pub const UNSOL_PENDING: u32 = 1 << 28;
    /// Command response is waiting
    pub const CMD_RSP_PENDING: u32 = 1 << 27;
    /// Command request was consumed
    pub const CMD_REQ_PENDING: u32 = 1 << 26;
    /// Type-0 interrupt (state change, fatal error, flush) is pending
    pub const TYPE_0_PENDING: u32 = 1 << 15;
    /// Any of the above
    pub const INTR_PENDING: u32 = 0xFC00_8000;

    /// Shift of the 3-bit adapter state field
    pub const STATE_SHIFT: u32 = 8;
    /// Mask of the halt identifier
    pub const HALT_ID_MASK: u32 = 0xFF;
}

// =============================================================================
// Port Control (PCTL)
// =============================================================================

/// Port control commands and flags
pub mod pctl {
    /// Error flag; written set, cleared by the adapter on success
    pub const CMD_ERROR: u32 = 0x80;
    /// Flash blast
    pub const FLASH_BLAST: u32 = 0x40;
    /// Halt the adapter
    pub const HALT: u32 = 0x20;
    /// Copy data
    pub const COPY_DATA: u32 = 0x10;
    /// Rewind the error log
    pub const ERROR_LOG_START: u32 = 0x08;
    /// Read the next error log word into host data
    pub const ERROR_LOG_READ: u32 = 0x04;
    /// Acknowledge a transmit flush
    pub const XMT_DATA_FLUSH_DONE: u32 = 0x02;
    /// Initialize DMA with the descriptor block address in data A
    pub const DMA_INIT: u32 = 0x01;
    /// Uninitialize DMA
    pub const DMA_UNINIT: u32 = 0x1_0000;
    /// Ring member
    pub const RING_MEMBER: u32 = 0x2_0000;
    /// Read half of the hardware address selected by data A
    pub const MLA_READ: u32 = 0x4_0000;
    /// Read the firmware revision
    pub const FW_REV_READ: u32 = 0x8_0000;
    /// Device-specific command
    pub const DEVICE_SPECIFIC: u32 = 0x10_0000;
    /// Sub-command selected by data A
    pub const SUB_CMD: u32 = 0x20_0000;
    /// Program the consumer block address from data A
    pub const CONSUMER_BLOCK: u32 = 0x40_0000;

    /// DMA init flag: longword byte-swap data
    pub const DMA_INIT_LW_BSWAP_DATA: u32 = 0x02;
}

// =============================================================================
// Port Control Sub-commands
// =============================================================================

/// Sub-commands issued through [`pctl::SUB_CMD`]
pub mod sub_cmd {
    /// Take the link down
    pub const LINK_UNINIT: u32 = 1;
    /// Set the DMA burst size from data B
    pub const DMA_BURST_SIZE_SET: u32 = 2;
    /// Read the chip revision into host data
    pub const PDQ_REV_GET: u32 = 4;

    /// 4 longword DMA bursts
    pub const DMA_BURST_4LW: u32 = 0;
    /// 8 longword DMA bursts
    pub const DMA_BURST_8LW: u32 = 1;
    /// 16 longword DMA bursts
    pub const DMA_BURST_16LW: u32 = 2;

    /// Reset argument: skip the power-on self test
    pub const PRESET_SKIP_SELFTEST: u32 = 1;
}

// =============================================================================
// Host Interrupt Type-0 / Enable
// =============================================================================

/// Host interrupt type-0 status bits and enable mask bits
pub mod host_int {
    /// Transmit ring interrupt enable
    pub const TX_ENABLE: u32 = 1 << 31;
    /// Receive ring interrupt enable
    pub const RX_ENABLE: u32 = 1 << 30;
    /// Unsolicited event interrupt enable
    pub const UNSOL_ENABLE: u32 = 1 << 29;
    /// Host SMT interrupt enable
    pub const HOST_SMT_ENABLE: u32 = 1 << 28;
    /// Command response interrupt enable
    pub const CMD_RSP_ENABLE: u32 = 1 << 27;
    /// Command request interrupt enable
    pub const CMD_RQST_ENABLE: u32 = 1 << 26;

    /// Port-control command completed
    pub const CSR_CMD_DONE: u32 = 0x20;
    /// Adapter state changed
    pub const STATE_CHANGE: u32 = 0x10;
    /// Adapter requests a transmit flush
    pub const XMT_DATA_FLUSH: u32 = 0x08;
    /// Fatal error (any of the three bits)
    pub const FATAL_ERROR: u32 = 0x07;
    /// Every type-0 bit
    pub const TYPE_0_ALL: u32 = 0xFF;

    /// Enable mask while running
    pub const RUN_MASK: u32 = STATE_CHANGE
        | XMT_DATA_FLUSH
        | FATAL_ERROR
        | CMD_RSP_ENABLE
        | UNSOL_ENABLE
        | RX_ENABLE
        | HOST_SMT_ENABLE;
}

// =============================================================================
// PCI Interface (DEFPA)
// =============================================================================

/// PFI mode control and status values
pub mod pfi {
    /// Allow the PDQ to master the PCI bus
    pub const DMA_ENABLE: u32 = 0x01;
    /// Route PFI interrupts to PCI
    pub const PFI_PCI_INTR: u32 = 0x02;
    /// Route PDQ interrupts to PCI
    pub const PDQ_PCI_INTR: u32 = 0x04;

    /// Status acknowledge written while stopping
    pub const STATUS_ACK_STOP: u32 = 0x10;
    /// Status acknowledge written around interrupt servicing
    pub const STATUS_ACK_INTR: u32 = 0x18;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_mask_covers_every_pending_bit() {
        let all = psts::RCV_DATA_PENDING
            | psts::XMT_DATA_PENDING
            | psts::HOST_SMT_PENDING
            | psts::UNSOL_PENDING
            | psts::CMD_RSP_PENDING
            | psts::CMD_REQ_PENDING
            | psts::TYPE_0_PENDING;
        assert_eq!(all, psts::INTR_PENDING);
    }

    #[test]
    fn run_mask_excludes_transmit_backpressure() {
        assert_eq!(host_int::RUN_MASK & host_int::TX_ENABLE, 0);
        assert_ne!(host_int::RUN_MASK & host_int::FATAL_ERROR, 0);
    }
}
