//! CSR map for the PDQ register file
//!
//! The PDQ exposes a bank of 32-bit CSRs. Their index is fixed; the byte
//! offset depends on the bus flavour because the DEFAA (Futurebus+) skips a
//! longword between registers. The DEFPA adds PCI interface (PFI) registers
//! that always use a stride of one.

pub mod port;

use crate::driver::config::AdapterKind;

/// Registers the core accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Csr {
    /// Port reset line
    PortReset,
    /// Host data returned by port-control commands
    HostData,
    /// Port control command register
    PortControl,
    /// Port control argument A
    PortDataA,
    /// Port control argument B
    PortDataB,
    /// Port status (adapter state, halt id, pending interrupts)
    PortStatus,
    /// Type-0 interrupt status (write 1 to clear)
    HostIntType0,
    /// Host interrupt enable mask
    HostIntEnable,
    /// Receive/transmit producer doorbell
    Type2Producer,
    /// Command response producer doorbell
    CmdResponseProducer,
    /// Command request producer doorbell
    CmdRequestProducer,
    /// Host SMT producer doorbell
    HostSmtProducer,
    /// Unsolicited event producer doorbell
    UnsolicitedProducer,
    /// PFI mode control (DEFPA only)
    PfiModeControl,
    /// PFI status (DEFPA only)
    PfiStatus,
}

impl Csr {
    /// Longword index of the register in the CSR bank
    pub const fn index(self) -> usize {
        match self {
            Csr::PortReset => 0,
            Csr::HostData => 1,
            Csr::PortControl => 2,
            Csr::PortDataA => 3,
            Csr::PortDataB => 4,
            Csr::PortStatus => 5,
            Csr::HostIntType0 => 6,
            Csr::HostIntEnable => 7,
            Csr::Type2Producer => 8,
            Csr::CmdResponseProducer => 10,
            Csr::CmdRequestProducer => 11,
            Csr::HostSmtProducer => 12,
            Csr::UnsolicitedProducer => 13,
            Csr::PfiModeControl => 16,
            Csr::PfiStatus => 17,
        }
    }

    /// Whether this is a PCI interface register
    pub const fn is_pfi(self) -> bool {
        matches!(self, Csr::PfiModeControl | Csr::PfiStatus)
    }
}

/// Byte offsets of the CSRs for one adapter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrMap {
    stride: usize,
    has_pfi: bool,
}

impl CsrMap {
    /// Build the map for a bus flavour
    pub const fn new(kind: AdapterKind) -> Self {
        Self {
            stride: kind.csr_stride(),
            has_pfi: kind.has_pfi(),
        }
    }

    /// Byte offset of `csr` from the CSR base
    #[inline(always)]
    pub const fn offset(&self, csr: Csr) -> usize {
        if csr.is_pfi() {
            csr.index() * 4
        } else {
            csr.index() * 4 * self.stride
        }
    }

    /// Whether the PFI registers exist
    #[inline(always)]
    pub const fn has_pfi(&self) -> bool {
        self.has_pfi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_for_unit_stride() {
        let map = CsrMap::new(AdapterKind::Defpa);
        assert_eq!(map.offset(Csr::PortReset), 0x00);
        assert_eq!(map.offset(Csr::PortStatus), 0x14);
        assert_eq!(map.offset(Csr::Type2Producer), 0x20);
        assert_eq!(map.offset(Csr::UnsolicitedProducer), 0x34);
        assert_eq!(map.offset(Csr::PfiStatus), 0x44);
        assert!(map.has_pfi());
    }

    #[test]
    fn defaa_skips_a_longword() {
        let map = CsrMap::new(AdapterKind::Defaa);
        assert_eq!(map.offset(Csr::HostData), 0x08);
        assert_eq!(map.offset(Csr::PortStatus), 0x28);
        assert_eq!(map.offset(Csr::CmdRequestProducer), 0x58);
        assert!(!map.has_pfi());
    }
}
