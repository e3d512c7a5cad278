//! Transmit descriptor.

use super::VolatileCell;

/// Transmit descriptor control word bits
pub mod txd {
    /// Start of packet
    pub const SOP: u32 = 1 << 31;
    /// End of packet
    pub const EOP: u32 = 1 << 30;
    /// Shift of the segment length field
    pub const SEG_LEN_SHIFT: u32 = 16;
    /// Segment length field mask
    pub const SEG_LEN_MASK: u32 = 0x1FFF << SEG_LEN_SHIFT;
}

/// Transmit descriptor (8 bytes)
#[repr(C)]
pub struct TxDescriptor {
    /// Segment bus address
    pa_lo: VolatileCell<u32>,
    /// Control word
    pa_hi: VolatileCell<u32>,
}

impl TxDescriptor {
    /// Size of the descriptor in bytes
    pub const SIZE: usize = 8;

    /// Create a zeroed descriptor
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pa_lo: VolatileCell::new(0),
            pa_hi: VolatileCell::new(0),
        }
    }

    /// Build a control word
    #[inline]
    pub const fn control(sop: bool, eop: bool, seg_len: usize) -> u32 {
        let mut word = ((seg_len as u32) << txd::SEG_LEN_SHIFT) & txd::SEG_LEN_MASK;
        if sop {
            word |= txd::SOP;
        }
        if eop {
            word |= txd::EOP;
        }
        word
    }

    /// Program the descriptor
    #[inline]
    pub fn set(&self, bus_addr: u32, control: u32) {
        self.pa_lo.set_le(bus_addr);
        self.pa_hi.set_le(control);
    }

    /// Replace only the control word
    #[inline]
    pub fn set_control(&self, control: u32) {
        self.pa_hi.set_le(control);
    }

    /// Clear the descriptor
    pub fn clear(&self) {
        self.set(0, 0);
    }

    /// Segment bus address
    #[inline]
    pub fn bus_addr(&self) -> u32 {
        self.pa_lo.get_le()
    }

    /// Control word
    #[inline]
    pub fn control_word(&self) -> u32 {
        self.pa_hi.get_le()
    }

    /// Whether the start-of-packet flag is set
    pub fn is_sop(&self) -> bool {
        self.control_word() & txd::SOP != 0
    }

    /// Whether the end-of-packet flag is set
    pub fn is_eop(&self) -> bool {
        self.control_word() & txd::EOP != 0
    }

    /// Segment length in bytes
    pub fn seg_len(&self) -> usize {
        ((self.control_word() & txd::SEG_LEN_MASK) >> txd::SEG_LEN_SHIFT) as usize
    }
}

impl Default for TxDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_word_fields() {
        let desc = TxDescriptor::new();
        desc.set(0xABCD_0000, TxDescriptor::control(true, false, 4096));
        assert!(desc.is_sop());
        assert!(!desc.is_eop());
        assert_eq!(desc.seg_len(), 4096);
        assert_eq!(desc.bus_addr(), 0xABCD_0000);

        desc.set_control(TxDescriptor::control(false, true, 3));
        assert!(!desc.is_sop());
        assert!(desc.is_eop());
        assert_eq!(desc.seg_len(), 3);
        assert_eq!(desc.bus_addr(), 0xABCD_0000);
    }

    #[test]
    fn stored_little_endian() {
        let desc = TxDescriptor::new();
        desc.set(1, 0);
        assert_eq!(desc.pa_lo.get(), 1u32.to_le());
    }
}
