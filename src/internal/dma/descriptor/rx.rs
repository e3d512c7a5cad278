//! Receive descriptor and receive status word.

use super::VolatileCell;

/// Receive descriptor control word bits
pub mod rxd {
    /// Start of packet
    pub const SOP: u32 = 1 << 31;
    /// Shift of the segment-count field (segments after this one)
    pub const SEG_CNT_SHIFT: u32 = 24;
    /// Segment-count field mask
    pub const SEG_CNT_MASK: u32 = 0xF << SEG_CNT_SHIFT;
    /// Shift of the segment length field
    pub const SEG_LEN_SHIFT: u32 = 8;
    /// Segment length field mask
    pub const SEG_LEN_MASK: u32 = 0x3FFF << SEG_LEN_SHIFT;
}

/// Receive descriptor (8 bytes)
#[repr(C)]
pub struct RxDescriptor {
    /// Segment bus address
    pa_lo: VolatileCell<u32>,
    /// Control word
    pa_hi: VolatileCell<u32>,
}

impl RxDescriptor {
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
    pub const fn control(sop: bool, seg_cnt: usize, seg_len: usize) -> u32 {
        let mut word = ((seg_cnt as u32) << rxd::SEG_CNT_SHIFT) & rxd::SEG_CNT_MASK;
        word |= ((seg_len as u32) << rxd::SEG_LEN_SHIFT) & rxd::SEG_LEN_MASK;
        if sop {
            word |= rxd::SOP;
        }
        word
    }

    /// Program the descriptor
    #[inline]
    pub fn set(&self, bus_addr: u32, control: u32) {
        self.pa_lo.set_le(bus_addr);
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
        self.control_word() & rxd::SOP != 0
    }

    /// Segments following this one in the group
    pub fn seg_cnt(&self) -> usize {
        ((self.control_word() & rxd::SEG_CNT_MASK) >> rxd::SEG_CNT_SHIFT) as usize
    }

    /// Segment length in bytes
    pub fn seg_len(&self) -> usize {
        ((self.control_word() & rxd::SEG_LEN_MASK) >> rxd::SEG_LEN_SHIFT) as usize
    }
}

impl Default for RxDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Receive Status
// =============================================================================

/// Receive status word bits (first longword of every received frame)
#[allow(dead_code)]
pub mod rxs {
    /// Received length mask (includes FC and CRC)
    pub const LEN_MASK: u32 = 0x1FFF;
    /// Source-routing/station-select field shift
    pub const RCC_SS_SHIFT: u32 = 13;
    /// Destination address match field shift
    pub const RCC_DD_SHIFT: u32 = 15;
    /// Destination address match field mask (after shift)
    pub const RCC_DD_MASK: u32 = 0x3;
    /// DD value for a CAM (address filter) match
    pub const RCC_DD_CAM_MATCH: u32 = 2;
    /// Error reason field shift
    pub const RCC_REASON_SHIFT: u32 = 17;
    /// Error reason field mask (after shift)
    pub const RCC_REASON_MASK: u32 = 0x7;
    /// Reason code for a silently discarded frame
    pub const RCC_REASON_SILENT: u32 = 7;
    /// CRC error
    pub const RCC_BADCRC: u32 = 1 << 20;
    /// Bad PDU
    pub const RCC_BADPDU: u32 = 1 << 21;
    /// Frame status bits field shift
    pub const FSB_SHIFT: u32 = 22;
    /// Frame status E (error) indicator
    pub const FSB_E: u32 = 1 << 22;
    /// Frame status count field shift
    pub const FSC_SHIFT: u32 = 27;
    /// Frame status count field mask (after shift)
    pub const FSC_MASK: u32 = 0x7;
}

/// Decoded receive status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStatus(u32);

impl RxStatus {
    /// Wrap a raw (host-order) status word
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw status word
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Received length, including frame control and CRC
    pub const fn len(self) -> usize {
        (self.0 & rxs::LEN_MASK) as usize
    }

    /// Whether the length field is zero
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Destination address match code
    pub const fn dd(self) -> u32 {
        (self.0 >> rxs::RCC_DD_SHIFT) & rxs::RCC_DD_MASK
    }

    /// Whether the frame only got through because of promiscuous mode
    pub const fn is_promiscuous(self) -> bool {
        self.dd() < rxs::RCC_DD_CAM_MATCH
    }

    /// Error reason code
    pub const fn reason(self) -> u32 {
        (self.0 >> rxs::RCC_REASON_SHIFT) & rxs::RCC_REASON_MASK
    }

    /// Whether the adapter flagged the frame as a bad PDU
    pub const fn is_bad_pdu(self) -> bool {
        self.0 & rxs::RCC_BADPDU != 0
    }

    /// Whether the frame failed its CRC
    pub const fn is_bad_crc(self) -> bool {
        self.0 & rxs::RCC_BADCRC != 0
    }

    /// Frame status E indicator
    pub const fn fsb_e(self) -> bool {
        self.0 & rxs::FSB_E != 0
    }

    /// Frame status count
    pub const fn fsc(self) -> u32 {
        (self.0 >> rxs::FSC_SHIFT) & rxs::FSC_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_word_fields() {
        let desc = RxDescriptor::new();
        desc.set(0x0010_0000, RxDescriptor::control(true, 2, 2048));
        assert!(desc.is_sop());
        assert_eq!(desc.seg_cnt(), 2);
        assert_eq!(desc.seg_len(), 2048);
        assert_eq!(desc.bus_addr(), 0x0010_0000);

        desc.set(0, RxDescriptor::control(false, 0, 512));
        assert!(!desc.is_sop());
        assert_eq!(desc.seg_len(), 512);
    }

    #[test]
    fn status_decoding() {
        let status = RxStatus::from_raw(
            100 | (rxs::RCC_DD_CAM_MATCH << rxs::RCC_DD_SHIFT) | (3 << rxs::FSC_SHIFT),
        );
        assert_eq!(status.len(), 100);
        assert!(!status.is_promiscuous());
        assert!(!status.is_bad_pdu());
        assert_eq!(status.fsc(), 3);

        let status = RxStatus::from_raw(
            rxs::RCC_BADPDU | rxs::RCC_BADCRC | (rxs::RCC_REASON_SILENT << rxs::RCC_REASON_SHIFT),
        );
        assert!(status.is_bad_pdu());
        assert!(status.is_bad_crc());
        assert_eq!(status.reason(), rxs::RCC_REASON_SILENT);
        assert!(status.is_promiscuous());
    }
}
