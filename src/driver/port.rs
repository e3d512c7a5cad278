//! Port-control command channel.
//!
//! Port-control commands are the synchronous, register-level side channel
//! to the adapter firmware: write the command with the error bit set, spin
//! until the firmware raises `CSR_CMD_DONE`, then read the result from the
//! host data register. Everything before DMA is up (MAC address, firmware
//! revision, consumer block address, DMA init) goes through here.

use crate::error::{ProtocolError, ProtocolResult};
use crate::internal::register::port::{host_int, pctl, sub_cmd};
use crate::internal::register::{Csr, CsrMap};
use crate::platform::CsrBus;

use super::config::ChipRev;

/// Longwords in one error log entry
pub const ERROR_LOG_WORDS: usize = 8;

// =============================================================================
// Error Log
// =============================================================================

/// One adapter error log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorLogEntry {
    /// Entry status
    pub status: u32,
    /// Event status
    pub event_status: u32,
    /// Firmware routine that logged the entry
    pub caller_id: u32,
    /// Timestamp, low longword
    pub timestamp_lo: u32,
    /// Timestamp, high longword
    pub timestamp_hi: u32,
    /// Times this entry was written
    pub write_count: u32,
    /// Field replaceable unit mask
    pub fru_mask: u32,
    /// Self-test id
    pub test_id: u32,
}

impl ErrorLogEntry {
    /// Build from the longwords read out of the adapter (missing words are 0)
    pub fn from_words(words: &[u32]) -> Self {
        let word = |index: usize| words.get(index).copied().unwrap_or(0);
        Self {
            status: word(0),
            event_status: word(1),
            caller_id: word(2),
            timestamp_lo: word(3),
            timestamp_hi: word(4),
            write_count: word(5),
            fru_mask: word(6),
            test_id: word(7),
        }
    }
}

// =============================================================================
// Port Control
// =============================================================================

/// Port-control access to one adapter
pub struct Port<'b, B: CsrBus> {
    bus: &'b mut B,
    csrs: CsrMap,
    spins: u32,
}

impl<'b, B: CsrBus> Port<'b, B> {
    /// Wrap a bus; `spins` bounds every completion wait
    pub fn new(bus: &'b mut B, csrs: CsrMap, spins: u32) -> Self {
        Self { bus, csrs, spins }
    }

    #[inline(always)]
    fn read(&mut self, csr: Csr) -> u32 {
        self.bus.read32(self.csrs.offset(csr))
    }

    #[inline(always)]
    fn write(&mut self, csr: Csr, value: u32) {
        self.bus.write32(self.csrs.offset(csr), value);
    }

    /// Issue `cmd` and wait for completion
    ///
    /// Returns whether the firmware accepted the command. Exhausting the
    /// spin bound means the adapter is gone.
    pub fn command(&mut self, cmd: u32) -> ProtocolResult<bool> {
        self.write(Csr::HostIntType0, host_int::CSR_CMD_DONE);
        self.write(Csr::PortControl, pctl::CMD_ERROR | cmd);

        let mut spins = 0;
        while self.read(Csr::HostIntType0) & host_int::CSR_CMD_DONE == 0 {
            spins += 1;
            if spins >= self.spins {
                log::error!("port control command {cmd:#x} timed out");
                return Err(ProtocolError::PortControlTimeout);
            }
        }
        log::trace!("port control command {cmd:#x} spun {spins} times");

        self.write(Csr::HostIntType0, host_int::CSR_CMD_DONE);
        Ok(self.read(Csr::PortControl) & pctl::CMD_ERROR == 0)
    }

    /// Issue `cmd` with argument A
    pub fn command_with(&mut self, cmd: u32, data_a: u32) -> ProtocolResult<bool> {
        self.write(Csr::PortDataA, data_a);
        self.command(cmd)
    }

    /// Read the 6-byte hardware address
    pub fn read_mla(&mut self) -> ProtocolResult<[u8; 6]> {
        self.command_with(pctl::MLA_READ, 0)?;
        let low = self.read(Csr::HostData).to_le_bytes();
        self.command_with(pctl::MLA_READ, 1)?;
        let high = self.read(Csr::HostData).to_le_bytes();

        Ok([low[0], low[1], low[2], low[3], high[0], high[1]])
    }

    /// Read the 4-character firmware revision
    pub fn read_fwrev(&mut self) -> ProtocolResult<[u8; 4]> {
        self.command(pctl::FW_REV_READ)?;
        Ok(self.read(Csr::HostData).to_be_bytes())
    }

    /// Read the PDQ chip revision
    pub fn read_chip_rev(&mut self) -> ProtocolResult<ChipRev> {
        self.command_with(pctl::SUB_CMD, sub_cmd::PDQ_REV_GET)?;
        Ok(ChipRev::from_raw(self.read(Csr::HostData)))
    }

    /// Program the DMA burst size
    pub fn set_burst_size(&mut self, burst: u32) -> ProtocolResult<bool> {
        self.write(Csr::PortDataB, burst);
        self.command_with(pctl::SUB_CMD, sub_cmd::DMA_BURST_SIZE_SET)
    }

    /// Program the bus address of the consumer block
    pub fn set_consumer_block(&mut self, bus_addr: u32) -> ProtocolResult<bool> {
        self.write(Csr::PortDataB, 0);
        self.command_with(pctl::CONSUMER_BLOCK, bus_addr)
    }

    /// Hand the descriptor block to the adapter and start DMA
    pub fn dma_init(&mut self, bus_addr: u32) -> ProtocolResult<bool> {
        self.write(Csr::PortDataB, 0);
        self.command_with(pctl::DMA_INIT, bus_addr | pctl::DMA_INIT_LW_BSWAP_DATA)
    }

    /// Acknowledge a transmit flush request
    pub fn flush_done(&mut self) -> ProtocolResult<bool> {
        self.command(pctl::XMT_DATA_FLUSH_DONE)
    }

    /// Read the most recent error log entry
    ///
    /// Returns `None` if the firmware refused the first read.
    pub fn read_error_log(&mut self) -> ProtocolResult<Option<ErrorLogEntry>> {
        self.command(pctl::ERROR_LOG_START)?;

        let mut words = [0u32; ERROR_LOG_WORDS];
        let mut count = 0;
        while count < ERROR_LOG_WORDS && self.command(pctl::ERROR_LOG_READ)? {
            words[count] = self.read(Csr::HostData);
            count += 1;
        }

        if count == 0 {
            Ok(None)
        } else {
            Ok(Some(ErrorLogEntry::from_words(&words[..count])))
        }
    }
}
