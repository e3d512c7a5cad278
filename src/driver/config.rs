//! Adapter configuration and state types.
//!
//! [`PdqConfig`] is a `const` builder; the remaining types describe what
//! the adapter reports about itself (state, halt code, chip revision) and
//! which board flavour it is.

use bitflags::bitflags;

use crate::constants::{
    DEFAULT_PAGE_SIZE, DEFAULT_RX_TARGET_GROUPS, DEFAULT_SMT_TARGET_GROUPS, DMA_AVAILABLE_POLLS,
    HOST_SMT_RING_SIZE, PORT_CONTROL_SPINS, RECEIVE_RING_SIZE, RESET_POLLS, RX_FC_OFFSET,
    RX_SEGCNT, RX_STATUS_SIZE, STATUS_CHARS_POLLS,
};
use crate::error::{SetupError, SetupResult};

// =============================================================================
// Adapter Kind
// =============================================================================

/// Board flavour of the PDQ chip
///
/// The bus kind decides the CSR stride, whether the PCI interface (PFI)
/// registers exist, the self-test policy on reset and the DMA burst size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterKind {
    /// DEFPA, PCI
    #[default]
    Defpa,
    /// DEFEA, EISA
    Defea,
    /// DEFTA, TURBOchannel
    Defta,
    /// DEFAA, Futurebus+
    Defaa,
    /// DEFQA, Q-bus
    Defqa,
}

impl AdapterKind {
    /// Longwords between consecutive CSRs
    ///
    /// The DEFAA skips a longword between registers.
    pub const fn csr_stride(self) -> usize {
        match self {
            AdapterKind::Defaa => 2,
            _ => 1,
        }
    }

    /// Whether the PCI interface registers (PFI mode/status) are present
    pub const fn has_pfi(self) -> bool {
        matches!(self, AdapterKind::Defpa)
    }

    /// Human-readable board description
    pub const fn description(self) -> &'static str {
        match self {
            AdapterKind::Defpa => "DEFPA PCI",
            AdapterKind::Defea => "DEFEA EISA",
            AdapterKind::Defta => "DEFTA TC",
            AdapterKind::Defaa => "DEFAA Futurebus",
            AdapterKind::Defqa => "DEFQA Q-bus",
        }
    }
}

impl core::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.description())
    }
}

// =============================================================================
// Adapter State
// =============================================================================

/// Adapter state reported in bits 8..=10 of the port status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterState {
    /// Held in reset
    Reset,
    /// Firmware upgrade in progress
    Upgrade,
    /// Reset complete, DMA not yet initialized
    DmaUnavailable,
    /// DMA initialized, link not started
    DmaAvailable,
    /// Link up
    LinkAvailable,
    /// Link started but down
    LinkUnavailable,
    /// Adapter halted with a halt code
    Halted,
    /// Ring member (reported by the firmware, never requested)
    RingMember,
}

impl AdapterState {
    /// Decode from a raw 3-bit state value
    pub const fn from_raw(raw: u32) -> Self {
        match raw & 0x7 {
            0 => AdapterState::Reset,
            1 => AdapterState::Upgrade,
            2 => AdapterState::DmaUnavailable,
            3 => AdapterState::DmaAvailable,
            4 => AdapterState::LinkAvailable,
            5 => AdapterState::LinkUnavailable,
            6 => AdapterState::Halted,
            _ => AdapterState::RingMember,
        }
    }

    /// Raw 3-bit state value
    pub const fn to_raw(self) -> u32 {
        self as u32
    }

    /// Extract the state from a port status register value
    pub const fn from_port_status(status: u32) -> Self {
        Self::from_raw(status >> 8)
    }

    /// Human-readable state name
    pub const fn name(self) -> &'static str {
        match self {
            AdapterState::Reset => "Reset",
            AdapterState::Upgrade => "Upgrade",
            AdapterState::DmaUnavailable => "DMA Unavailable",
            AdapterState::DmaAvailable => "DMA Available",
            AdapterState::LinkAvailable => "Link Available",
            AdapterState::LinkUnavailable => "Link Unavailable",
            AdapterState::Halted => "Halted",
            AdapterState::RingMember => "Ring Member",
        }
    }
}

impl core::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Halt Code
// =============================================================================

/// Reason the adapter entered the Halted state (low byte of port status)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HaltCode {
    /// Self-test did not complete
    SelftestTimeout,
    /// Parity error on the host bus
    HostBusParityError,
    /// Host requested the halt
    HostDirectedFault,
    /// Firmware fault
    SoftwareFault,
    /// Hardware fault
    HardwareFault,
    /// PC trace path test
    PcTracePathTest,
    /// DMA error
    DmaError,
    /// Firmware image CRC mismatch
    ImageCrcError,
    /// Adapter processor error
    AdapterProcessorError,
    /// Code outside the documented range
    Unknown(u8),
}

impl HaltCode {
    /// Decode from the raw halt identifier
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => HaltCode::SelftestTimeout,
            1 => HaltCode::HostBusParityError,
            2 => HaltCode::HostDirectedFault,
            3 => HaltCode::SoftwareFault,
            4 => HaltCode::HardwareFault,
            5 => HaltCode::PcTracePathTest,
            6 => HaltCode::DmaError,
            7 => HaltCode::ImageCrcError,
            8 => HaltCode::AdapterProcessorError,
            other => HaltCode::Unknown(other),
        }
    }

    /// Extract the halt code from a port status register value
    pub const fn from_port_status(status: u32) -> Self {
        Self::from_raw((status & 0xFF) as u8)
    }

    /// Human-readable halt reason
    pub const fn name(self) -> &'static str {
        match self {
            HaltCode::SelftestTimeout => "Selftest Timeout",
            HaltCode::HostBusParityError => "Host Bus Parity Error",
            HaltCode::HostDirectedFault => "Host Directed Fault",
            HaltCode::SoftwareFault => "Software Fault",
            HaltCode::HardwareFault => "Hardware Fault",
            HaltCode::PcTracePathTest => "PC Trace Path Test",
            HaltCode::DmaError => "DMA Error",
            HaltCode::ImageCrcError => "Image CRC Error",
            HaltCode::AdapterProcessorError => "Adapter Processor Error",
            HaltCode::Unknown(_) => "Unknown Halt Code",
        }
    }
}

impl core::fmt::Display for HaltCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HaltCode::Unknown(raw) => write!(f, "{} {raw}", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

// =============================================================================
// Chip Revision
// =============================================================================

/// PDQ chip revision reported by the `PDQ_REV_GET` sub-command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipRev {
    /// Revision A, B or C
    #[default]
    AbOrC,
    /// Revision D
    D,
    /// Revision E
    E,
    /// Unrecognized revision value
    Unknown(u32),
}

impl ChipRev {
    /// Decode from the host data register
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ChipRev::AbOrC,
            2 => ChipRev::D,
            4 => ChipRev::E,
            other => ChipRev::Unknown(other),
        }
    }
}

impl core::fmt::Display for ChipRev {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChipRev::AbOrC => f.write_str("Rev C or below"),
            ChipRev::D => f.write_str("Rev D"),
            ChipRev::E => f.write_str("Rev E"),
            ChipRev::Unknown(raw) => write!(f, "Unknown Rev {raw}"),
        }
    }
}

// =============================================================================
// Frame Layout
// =============================================================================

/// Where host frame buffers start relative to the FDDI frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameLayout {
    /// Host frames start at the frame-control byte; the core prepends the
    /// packet header on transmit and strips it on receive
    #[default]
    FrameControlFirst,
    /// Host frames carry the 3 packet-header bytes before frame control
    WithPacketHeader,
}

impl FrameLayout {
    /// Bytes trimmed from the front of a received first segment
    pub const fn rx_header_offset(self) -> usize {
        match self {
            FrameLayout::FrameControlFirst => RX_FC_OFFSET,
            FrameLayout::WithPacketHeader => RX_STATUS_SIZE,
        }
    }

    /// Whether the header descriptor is prepended on transmit
    pub const fn prepends_header(self) -> bool {
        matches!(self, FrameLayout::FrameControlFirst)
    }
}

// =============================================================================
// Adapter Flags
// =============================================================================

bitflags! {
    /// Adapter behaviour and status flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AdapterFlags: u32 {
        /// Pass all frames (individual and group promiscuous)
        const PROMISC = 1 << 0;
        /// Pass all multicast frames
        const ALLMULTI = 1 << 1;
        /// Deliver station management frames to the host
        const PASS_SMT = 1 << 2;
        /// Full duplex requested
        const WANT_FDX = 1 << 3;
        /// Full duplex operational
        const IS_FDX = 1 << 4;
        /// Station is on the ring
        const IS_ONRING = 1 << 5;
        /// Transmit path usable
        const TXOK = 1 << 6;
        /// Interface should be running; recovery restarts it
        const RUNNING = 1 << 7;
        /// Report station characteristics on the next stop
        const PRINTCHARS = 1 << 8;
    }
}

// =============================================================================
// Driver Configuration
// =============================================================================

/// Driver configuration
///
/// # Example
///
/// ```ignore
/// let config = PdqConfig::new()
///     .with_kind(AdapterKind::Defta)
///     .with_pass_smt(true)
///     .with_full_duplex(true);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdqConfig {
    /// Board flavour
    pub kind: AdapterKind,
    /// Host frame layout
    pub frame_layout: FrameLayout,
    /// Flags applied at attach time
    pub flags: AdapterFlags,
    /// Receive groups kept posted on the data ring
    pub rx_target_groups: usize,
    /// Receive groups kept posted on the host-SMT ring
    pub smt_target_groups: usize,
    /// Page size used by the transmit scatter rule
    pub page_size: usize,
    /// Port-control completion spin bound
    pub port_control_spins: u32,
    /// Reset completion poll bound
    pub reset_polls: u32,
    /// DMA Available poll bound
    pub dma_available_polls: u32,
    /// Characteristics response poll bound
    pub status_chars_polls: u32,
}

impl Default for PdqConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PdqConfig {
    /// Default configuration: DEFPA, frame-control-first layout,
    /// characteristics reported once.
    pub const fn new() -> Self {
        Self {
            kind: AdapterKind::Defpa,
            frame_layout: FrameLayout::FrameControlFirst,
            flags: AdapterFlags::PRINTCHARS,
            rx_target_groups: DEFAULT_RX_TARGET_GROUPS,
            smt_target_groups: DEFAULT_SMT_TARGET_GROUPS,
            page_size: DEFAULT_PAGE_SIZE,
            port_control_spins: PORT_CONTROL_SPINS,
            reset_polls: RESET_POLLS,
            dma_available_polls: DMA_AVAILABLE_POLLS,
            status_chars_polls: STATUS_CHARS_POLLS,
        }
    }

    /// Set the board flavour
    #[must_use]
    pub const fn with_kind(mut self, kind: AdapterKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the host frame layout
    #[must_use]
    pub const fn with_frame_layout(mut self, layout: FrameLayout) -> Self {
        self.frame_layout = layout;
        self
    }

    /// Enable or disable promiscuous reception
    #[must_use]
    pub const fn with_promiscuous(self, enabled: bool) -> Self {
        self.with_flag(AdapterFlags::PROMISC, enabled)
    }

    /// Enable or disable all-multicast reception
    #[must_use]
    pub const fn with_all_multicast(self, enabled: bool) -> Self {
        self.with_flag(AdapterFlags::ALLMULTI, enabled)
    }

    /// Enable or disable delivery of SMT frames
    #[must_use]
    pub const fn with_pass_smt(self, enabled: bool) -> Self {
        self.with_flag(AdapterFlags::PASS_SMT, enabled)
    }

    /// Request full duplex operation
    #[must_use]
    pub const fn with_full_duplex(self, enabled: bool) -> Self {
        self.with_flag(AdapterFlags::WANT_FDX, enabled)
    }

    /// Report station characteristics on the first stop
    #[must_use]
    pub const fn with_report_characteristics(self, enabled: bool) -> Self {
        self.with_flag(AdapterFlags::PRINTCHARS, enabled)
    }

    /// Set the posted receive group targets for the data and SMT rings
    #[must_use]
    pub const fn with_rx_targets(mut self, data_groups: usize, smt_groups: usize) -> Self {
        self.rx_target_groups = data_groups;
        self.smt_target_groups = smt_groups;
        self
    }

    /// Set the page size for the transmit scatter rule
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the port-control spin bound
    #[must_use]
    pub const fn with_port_control_spins(mut self, spins: u32) -> Self {
        self.port_control_spins = spins;
        self
    }

    /// Set the reset and DMA Available poll bounds
    #[must_use]
    pub const fn with_poll_bounds(mut self, reset_polls: u32, dma_available_polls: u32) -> Self {
        self.reset_polls = reset_polls;
        self.dma_available_polls = dma_available_polls;
        self
    }

    /// Set the characteristics response poll bound
    #[must_use]
    pub const fn with_status_chars_polls(mut self, polls: u32) -> Self {
        self.status_chars_polls = polls;
        self
    }

    const fn with_flag(mut self, flag: AdapterFlags, enabled: bool) -> Self {
        self.flags = if enabled {
            self.flags.union(flag)
        } else {
            self.flags.difference(flag)
        };
        self
    }

    /// Check the configuration for impossible settings
    pub fn validate(&self) -> SetupResult<()> {
        let page_ok = self.page_size.is_power_of_two() && (256..=4096).contains(&self.page_size);
        let bounds_ok = self.port_control_spins > 0
            && self.reset_polls > 0
            && self.dma_available_polls > 0
            && self.status_chars_polls > 0;
        let rx_ok = self.rx_target_groups > 0
            && self.rx_target_groups * RX_SEGCNT <= RECEIVE_RING_SIZE - 1 - RX_SEGCNT;
        let smt_ok = self.smt_target_groups > 0
            && self.smt_target_groups * RX_SEGCNT <= HOST_SMT_RING_SIZE - 1 - RX_SEGCNT;

        if page_ok && bounds_ok && rx_ok && smt_ok {
            Ok(())
        } else {
            Err(SetupError::InvalidConfig)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    #[test]
    fn adapter_state_decodes_port_status() {
        assert_eq!(
            AdapterState::from_port_status(0x0000_0300),
            AdapterState::DmaAvailable
        );
        assert_eq!(
            AdapterState::from_port_status(0x8000_0606),
            AdapterState::Halted
        );
        for raw in 0..8 {
            assert_eq!(AdapterState::from_raw(raw).to_raw(), raw);
        }
    }

    #[test]
    fn halt_code_names() {
        assert_eq!(HaltCode::from_port_status(0x0000_0606), HaltCode::DmaError);
        assert_eq!(format!("{}", HaltCode::from_raw(0)), "Selftest Timeout");
        assert_eq!(format!("{}", HaltCode::from_raw(42)), "Unknown Halt Code 42");
    }

    #[test]
    fn chip_rev_display() {
        assert_eq!(ChipRev::from_raw(4), ChipRev::E);
        assert_eq!(format!("{}", ChipRev::from_raw(9)), "Unknown Rev 9");
    }

    #[test]
    fn adapter_kind_quirks() {
        assert_eq!(AdapterKind::Defaa.csr_stride(), 2);
        assert_eq!(AdapterKind::Defea.csr_stride(), 1);
        assert!(AdapterKind::Defpa.has_pfi());
        assert!(!AdapterKind::Defta.has_pfi());
        assert_eq!(format!("{}", AdapterKind::Defqa), "DEFQA Q-bus");
    }

    #[test]
    fn frame_layout_offsets() {
        assert_eq!(FrameLayout::FrameControlFirst.rx_header_offset(), 7);
        assert!(FrameLayout::FrameControlFirst.prepends_header());
        assert_eq!(FrameLayout::WithPacketHeader.rx_header_offset(), 4);
        assert!(!FrameLayout::WithPacketHeader.prepends_header());
    }

    #[test]
    fn config_builder_sets_flags() {
        let config = PdqConfig::new()
            .with_promiscuous(true)
            .with_pass_smt(true)
            .with_report_characteristics(false);

        assert!(config.flags.contains(AdapterFlags::PROMISC | AdapterFlags::PASS_SMT));
        assert!(!config.flags.contains(AdapterFlags::PRINTCHARS));

        let config = config.with_promiscuous(false);
        assert!(!config.flags.contains(AdapterFlags::PROMISC));
    }

    #[test]
    fn config_default_is_valid() {
        assert!(PdqConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_values() {
        assert_eq!(
            PdqConfig::new().with_page_size(3000).validate(),
            Err(SetupError::InvalidConfig)
        );
        assert_eq!(
            PdqConfig::new().with_port_control_spins(0).validate(),
            Err(SetupError::InvalidConfig)
        );
        assert_eq!(
            PdqConfig::new().with_rx_targets(100, 3).validate(),
            Err(SetupError::InvalidConfig)
        );
        assert_eq!(
            PdqConfig::new().with_rx_targets(8, 0).validate(),
            Err(SetupError::InvalidConfig)
        );
    }
}
