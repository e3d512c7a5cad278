//! Adapter lifecycle.
//!
//! [`Pdq`] owns the host-side state of every ring and drives the adapter
//! through its state machine:
//!
//! ```text
//! initialize ──► stop ──► DMA Available ──run──► Link Unavailable ◄──► Link Available
//!                  ▲                                      │
//!                  └──────────── halt / fatal error ──────┘
//! ```
//!
//! The stop sequence is the single entry point into a known state. It
//! resets the adapter unless it is already waiting for DMA init, discards
//! all in-flight work, reprograms the consumer block and descriptor block
//! addresses and waits for DMA Available.

use crate::constants::{
    COMMAND_RESPONSE_SIZE, FDDI_PACKET_HEADER, HOST_SMT_RING_SIZE, POLL_INTERVAL_US,
    RECEIVE_RING_SIZE, RESET_PULSE_US, RESET_SETTLE_US, RX_SEGCNT, TRANSMIT_RING_SIZE,
    UNSOLICITED_EVENT_SIZE,
};
use crate::error::{ProtocolError, Result, SetupError};
use crate::internal::dma::{PdqMemory, RxDescriptor, TxDescriptor};
use crate::internal::register::port::{host_int, pfi, sub_cmd};
use crate::internal::register::{Csr, CsrMap};
use crate::platform::{DmaRegion, Frame, Platform, RingKind, SyncOp};

use super::command::{CommandCode, CommandQueue, CommandSet};
use super::config::{AdapterFlags, AdapterKind, AdapterState, ChipRev, HaltCode, PdqConfig};
use super::port::{ErrorLogEntry, Port};
use super::rx::ReceiveRing;
use super::station::StationChars;
use super::tx::TransmitRing;
use super::unsolicited::UnsolicitedQueue;

/// Mask of the bus address bits that must be zero for the descriptor block
const BLOCK_ALIGN_MASK: u32 = 0x1FFF;

/// Driver core for one PDQ adapter
///
/// # Example
///
/// ```ignore
/// static MEMORY: PdqMemory = PdqMemory::new();
///
/// let mut pdq = Pdq::initialize(platform, &MEMORY, PdqConfig::new())?;
/// pdq.run()?;
///
/// // From the interrupt handler:
/// pdq.interrupt()?;
/// ```
pub struct Pdq<'a, P: Platform> {
    pub(super) platform: P,
    pub(super) mem: &'a PdqMemory,
    pub(super) config: PdqConfig,
    pub(super) csrs: CsrMap,
    pub(super) flags: AdapterFlags,
    pub(super) intr_mask: u32,
    pub(super) hwaddr: [u8; 6],
    pub(super) fwrev: [u8; 4],
    pub(super) chip_rev: ChipRev,
    pub(super) chars: Option<StationChars>,
    pub(super) commands: CommandQueue,
    pub(super) events: UnsolicitedQueue,
    pub(super) rx: ReceiveRing<Frame<P>, RECEIVE_RING_SIZE, RX_SEGCNT>,
    pub(super) smt: ReceiveRing<Frame<P>, HOST_SMT_RING_SIZE, RX_SEGCNT>,
    pub(super) tx: TransmitRing<Frame<P>, TRANSMIT_RING_SIZE>,
    pub(super) block_pa: u32,
    pub(super) consumer_pa: u32,
    pub(super) tx_hdr_pa: u32,
    pub(super) last_halt: Option<HaltCode>,
    pub(super) last_error_log: Option<ErrorLogEntry>,
}

// =============================================================================
// Attach
// =============================================================================

impl<'a, P: Platform> Pdq<'a, P> {
    /// Attach to an adapter and stop it
    ///
    /// Clears `memory`, lays out the command and unsolicited rings, then
    /// runs the stop sequence. On success the adapter sits in DMA
    /// Available (or Link Available/Unavailable if it came up on its own)
    /// with the hardware address and revisions read out.
    ///
    /// # Errors
    ///
    /// - [`SetupError::InvalidConfig`] if `config` fails validation
    /// - [`SetupError::MisalignedBlock`] if the descriptor block bus
    ///   address is not 8 KiB aligned
    /// - [`SetupError::AdapterHalted`] if the adapter halted twice
    /// - [`SetupError::AdapterNotReady`] if it stayed in Reset or Upgrade
    /// - any protocol error raised by the stop sequence
    pub fn initialize(platform: P, memory: &'a PdqMemory, config: PdqConfig) -> Result<Self> {
        config.validate()?;
        memory.clear();

        let block_pa = platform.virt_to_bus(memory.block_ptr());
        if block_pa & BLOCK_ALIGN_MASK != 0 {
            log::error!("descriptor block at {block_pa:#010x} is not 8 KiB aligned");
            return Err(SetupError::MisalignedBlock.into());
        }
        let consumer_pa = platform.virt_to_bus(memory.consumer_ptr());
        let tx_hdr_pa = platform.virt_to_bus(memory.tx_hdr_ptr());
        let request_pa = platform.virt_to_bus(memory.cmd_request_ptr());
        let response_pa = platform.virt_to_bus(memory.cmd_response_ptr());

        let block = &memory.block;
        let [h0, h1, h2] = FDDI_PACKET_HEADER;
        block.tx_hdr.set([h0, h1, h2, 0]);

        let hdr = config.frame_layout.rx_header_offset();
        let mut pdq = Self {
            platform,
            mem: memory,
            config,
            csrs: CsrMap::new(config.kind),
            flags: config.flags,
            intr_mask: 0,
            hwaddr: [0; 6],
            fwrev: [0; 4],
            chip_rev: ChipRev::default(),
            chars: None,
            commands: CommandQueue::new(),
            events: UnsolicitedQueue::new(),
            rx: ReceiveRing::new(config.rx_target_groups, hdr),
            smt: ReceiveRing::new(config.smt_target_groups, hdr),
            tx: TransmitRing::new(),
            block_pa,
            consumer_pa,
            tx_hdr_pa,
            last_halt: None,
            last_error_log: None,
        };

        // Command rings share one scratch buffer each; only the lengths vary.
        for desc in block.command_requests.iter() {
            desc.set(request_pa, TxDescriptor::control(true, true, 0));
        }
        pdq.sync_ring(RingKind::CommandRequest, block.command_requests.len());
        for desc in block.command_responses.iter() {
            desc.set(
                response_pa,
                RxDescriptor::control(true, 0, COMMAND_RESPONSE_SIZE),
            );
        }
        pdq.sync_ring(RingKind::CommandResponse, block.command_responses.len());

        for (index, (desc, event)) in block.unsolicited.iter().zip(&memory.events).enumerate() {
            let event_pa = pdq.platform.virt_to_bus(event.as_ptr());
            desc.set(
                event_pa,
                RxDescriptor::control(true, 0, UNSOLICITED_EVENT_SIZE),
            );
            pdq.sync(DmaRegion::UnsolicitedEvent { index }, SyncOp::PreRead);
        }
        pdq.sync_ring(RingKind::Unsolicited, block.unsolicited.len());

        match pdq.stop_adapter()? {
            AdapterState::Halted => {
                let code = HaltCode::from_port_status(pdq.read_csr(Csr::PortStatus));
                log::error!("adapter halted during attach: {code}");
                return Err(SetupError::AdapterHalted(code).into());
            }
            state @ (AdapterState::Reset | AdapterState::Upgrade) => {
                log::error!("adapter not ready after stop: {state}");
                return Err(SetupError::AdapterNotReady(state).into());
            }
            _ => {}
        }

        let a = pdq.hwaddr;
        log::info!(
            "{}: hardware address {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}, firmware {}{}{}{}, {}",
            pdq.config.kind,
            a[0],
            a[1],
            a[2],
            a[3],
            a[4],
            a[5],
            char::from(pdq.fwrev[0]),
            char::from(pdq.fwrev[1]),
            char::from(pdq.fwrev[2]),
            char::from(pdq.fwrev[3]),
            pdq.chip_rev
        );
        Ok(pdq)
    }
}

// =============================================================================
// State Machine
// =============================================================================

impl<P: Platform> Pdq<'_, P> {
    /// Stop the adapter and leave it waiting to be run
    ///
    /// In-flight transmits are freed, posted receive buffers are returned
    /// to the pool and pending commands other than Start survive. The
    /// interface stays down until [`run`](Self::run).
    pub fn stop(&mut self) -> Result<AdapterState> {
        self.flags.remove(AdapterFlags::RUNNING);
        self.stop_adapter()
    }

    /// Bring the link up from DMA Available, or refresh filters and
    /// management settings on a live link
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnexpectedState`] from any other adapter state.
    pub fn run(&mut self) -> Result<()> {
        let state = self.adapter_state();
        match state {
            AdapterState::DmaAvailable => {
                self.write_csr(Csr::HostIntType0, host_int::TYPE_0_ALL);
                self.intr_mask = host_int::RUN_MASK;
                self.write_csr(Csr::HostIntEnable, self.intr_mask);

                self.process_unsolicited_events();
                self.process_receives();
                self.type2_doorbell();
                if self.flags.contains(AdapterFlags::PASS_SMT) {
                    self.process_host_smt();
                }
                *self.commands.pending_mut() = CommandSet::from([
                    CommandCode::FilterSet,
                    CommandCode::AddrFilterSet,
                    CommandCode::SnmpSet,
                    CommandCode::Start,
                ]);
            }
            AdapterState::LinkUnavailable | AdapterState::LinkAvailable => {
                *self.commands.pending_mut() = CommandSet::from([
                    CommandCode::FilterSet,
                    CommandCode::AddrFilterSet,
                    CommandCode::SnmpSet,
                ]);
                if self.flags.contains(AdapterFlags::PASS_SMT) {
                    self.process_host_smt();
                }
                self.process_unsolicited_events();
            }
            other => {
                log::error!("cannot run adapter from {other}");
                return Err(ProtocolError::UnexpectedState(other).into());
            }
        }

        if self.flags.contains(AdapterFlags::PRINTCHARS) {
            self.commands.pending_mut().insert(CommandCode::StatusCharsGet);
        }
        self.flags.insert(AdapterFlags::RUNNING);
        self.queue_commands();
        log::info!("adapter running from {state}");
        Ok(())
    }

    /// Stop sequence shared by [`stop`](Self::stop) and error recovery
    ///
    /// Returns the adapter state it ended in. A first halt during DMA
    /// init restarts the whole sequence once; a second one is returned
    /// as [`AdapterState::Halted`] for the caller to report.
    pub(super) fn stop_adapter(&mut self) -> Result<AdapterState> {
        let has_pfi = self.csrs.has_pfi();
        let mut pass = 0;

        'restart: loop {
            if self.adapter_state() != AdapterState::DmaUnavailable {
                self.hw_reset()?;
            }

            let mut port = self.port();
            let hwaddr = port.read_mla()?;
            let fwrev = port.read_fwrev()?;
            let chip_rev = port.read_chip_rev()?;
            self.hwaddr = hwaddr;
            self.fwrev = fwrev;
            self.chip_rev = chip_rev;

            if has_pfi {
                self.write_csr(Csr::PfiModeControl, 0);
                self.write_csr(Csr::PfiStatus, pfi::STATUS_ACK_STOP);
            }

            self.tx.reset(&mut self.platform);
            self.flags
                .remove(AdapterFlags::TXOK | AdapterFlags::IS_ONRING | AdapterFlags::IS_FDX);
            self.rx.flush(&mut self.platform);
            self.smt.flush(&mut self.platform);

            self.mem.block.consumer.clear();
            self.sync(DmaRegion::ConsumerBlock, SyncOp::PreWrite);

            self.commands.reset();
            self.events = UnsolicitedQueue::new();

            if has_pfi {
                self.write_csr(Csr::PfiModeControl, pfi::DMA_ENABLE | pfi::PDQ_PCI_INTR);
            }

            self.process_unsolicited_events();

            let burst = match (self.config.kind, self.chip_rev) {
                (AdapterKind::Defta, _) | (AdapterKind::Defea, ChipRev::E) => {
                    sub_cmd::DMA_BURST_16LW
                }
                _ => sub_cmd::DMA_BURST_8LW,
            };
            if !self.port().set_burst_size(burst)? {
                log::warn!("adapter refused DMA burst size {burst}");
            }

            self.sync(DmaRegion::ConsumerBlock, SyncOp::PreWrite);
            let (consumer_pa, block_pa) = (self.consumer_pa, self.block_pa);
            let mut port = self.port();
            port.set_consumer_block(consumer_pa)?;
            port.dma_init(block_pa)?;

            let mut polls = 0;
            loop {
                match self.adapter_state() {
                    AdapterState::DmaAvailable => break,
                    AdapterState::Halted if pass > 0 => {
                        log::error!("adapter halted again during DMA init");
                        return Ok(AdapterState::Halted);
                    }
                    AdapterState::Halted => {
                        log::warn!("adapter halted during DMA init, restarting");
                        pass += 1;
                        continue 'restart;
                    }
                    _ => {}
                }
                polls += 1;
                if polls >= self.config.dma_available_polls {
                    log::error!("adapter never reached DMA available");
                    return Err(ProtocolError::DmaInitTimeout.into());
                }
                self.platform.delay_us(POLL_INTERVAL_US);
            }
            break;
        }

        self.write_csr(Csr::HostIntType0, host_int::TYPE_0_ALL);
        self.intr_mask = 0;
        self.write_csr(Csr::HostIntEnable, self.intr_mask);

        // Start is implied by run(); a leftover one must not bring the link up.
        self.commands.pending_mut().remove(CommandCode::Start);
        if self.flags.contains(AdapterFlags::PRINTCHARS) {
            self.commands.pending_mut().insert(CommandCode::StatusCharsGet);
        }
        self.queue_commands();

        if self.flags.contains(AdapterFlags::PRINTCHARS) {
            // Interrupts are masked; poll for the characteristics response.
            for _ in 0..self.config.status_chars_polls {
                self.sync(DmaRegion::ConsumerBlock, SyncOp::PostRead);
                self.process_command_responses()?;
                if self.commands.is_drained() {
                    break;
                }
                self.platform.delay_us(POLL_INTERVAL_US);
            }
        }

        let state = self.adapter_state();
        log::debug!("adapter stopped in {state}");
        Ok(state)
    }

    /// Pulse the reset line and wait for DMA Unavailable
    fn hw_reset(&mut self) -> Result<()> {
        let state = self.adapter_state();
        if state == AdapterState::DmaUnavailable {
            return Ok(());
        }

        // A halted adapter gets its self test; the DEFTA never does.
        let data_a = if state == AdapterState::Halted && self.config.kind != AdapterKind::Defta {
            0
        } else {
            sub_cmd::PRESET_SKIP_SELFTEST
        };
        log::debug!("resetting adapter from {state} (data A {data_a})");
        self.write_csr(Csr::PortDataA, data_a);
        self.write_csr(Csr::PortReset, 1);
        self.platform.delay_us(RESET_PULSE_US);
        self.write_csr(Csr::PortReset, 0);

        let mut polls = 0;
        while self.adapter_state() != AdapterState::DmaUnavailable {
            polls += 1;
            if polls >= self.config.reset_polls {
                log::error!("adapter reset timed out in {}", self.adapter_state());
                return Err(ProtocolError::ResetTimeout.into());
            }
            self.platform.delay_us(POLL_INTERVAL_US);
        }
        self.platform.delay_us(RESET_SETTLE_US);
        Ok(())
    }
}

// =============================================================================
// Runtime Settings
// =============================================================================

impl<P: Platform> Pdq<'_, P> {
    /// Pass every frame regardless of destination
    ///
    /// Takes effect with the next [`request_filter_update`](Self::request_filter_update).
    pub fn set_promiscuous(&mut self, enabled: bool) {
        self.flags.set(AdapterFlags::PROMISC, enabled);
    }

    /// Pass every multicast frame
    pub fn set_all_multicast(&mut self, enabled: bool) {
        self.flags.set(AdapterFlags::ALLMULTI, enabled);
    }

    /// Deliver station management frames to the host
    pub fn set_pass_smt(&mut self, enabled: bool) {
        self.flags.set(AdapterFlags::PASS_SMT, enabled);
    }

    /// Request full duplex; applied by the next SNMP Set
    pub fn set_full_duplex(&mut self, enabled: bool) {
        self.flags.set(AdapterFlags::WANT_FDX, enabled);
    }

    /// Reload the frame filters and the multicast address table
    pub fn request_filter_update(&mut self) {
        let pending = self.commands.pending_mut();
        pending.insert(CommandCode::FilterSet);
        pending.insert(CommandCode::AddrFilterSet);
        self.queue_commands();
    }
}

// =============================================================================
// Accessors
// =============================================================================

impl<'a, P: Platform> Pdq<'a, P> {
    /// Current adapter state
    pub fn state(&mut self) -> AdapterState {
        self.adapter_state()
    }

    /// Hardware (MAC) address read at the last stop
    pub fn hardware_address(&self) -> [u8; 6] {
        self.hwaddr
    }

    /// Firmware revision read at the last stop
    pub fn firmware_revision(&self) -> [u8; 4] {
        self.fwrev
    }

    /// Chip revision read at the last stop
    pub fn chip_revision(&self) -> ChipRev {
        self.chip_rev
    }

    /// Station characteristics, once reported
    pub fn characteristics(&self) -> Option<&StationChars> {
        self.chars.as_ref()
    }

    /// Behaviour and status flags
    pub fn flags(&self) -> AdapterFlags {
        self.flags
    }

    /// Whether the interface should be running
    pub fn is_running(&self) -> bool {
        self.flags.contains(AdapterFlags::RUNNING)
    }

    /// Board flavour
    pub fn kind(&self) -> AdapterKind {
        self.config.kind
    }

    /// Configuration the driver was attached with
    pub fn config(&self) -> &PdqConfig {
        &self.config
    }

    /// Halt code of the last halt, if any
    pub fn last_halt(&self) -> Option<HaltCode> {
        self.last_halt
    }

    /// Error log entry read after the last halt
    pub fn last_error_log(&self) -> Option<&ErrorLogEntry> {
        self.last_error_log.as_ref()
    }

    /// Host environment
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable host environment
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Shared memory
    pub fn memory(&self) -> &'a PdqMemory {
        self.mem
    }
}

// =============================================================================
// Internal Helpers
// =============================================================================

impl<P: Platform> Pdq<'_, P> {
    #[inline(always)]
    pub(super) fn read_csr(&mut self, csr: Csr) -> u32 {
        self.platform.read32(self.csrs.offset(csr))
    }

    #[inline(always)]
    pub(super) fn write_csr(&mut self, csr: Csr, value: u32) {
        self.platform.write32(self.csrs.offset(csr), value);
    }

    #[inline(always)]
    pub(super) fn sync(&mut self, region: DmaRegion, op: SyncOp) {
        self.platform.sync(region, op);
    }

    pub(super) fn port(&mut self) -> Port<'_, P> {
        Port::new(&mut self.platform, self.csrs, self.config.port_control_spins)
    }

    pub(super) fn adapter_state(&mut self) -> AdapterState {
        AdapterState::from_port_status(self.read_csr(Csr::PortStatus))
    }

    fn sync_ring(&mut self, ring: RingKind, count: usize) {
        self.sync(
            DmaRegion::Descriptors {
                ring,
                index: 0,
                count,
            },
            SyncOp::PreWrite,
        );
    }

    /// Ring the receive/transmit doorbell
    pub(super) fn type2_doorbell(&mut self) {
        let value = self.rx.doorbell()
            | ((self.tx.producer() as u32) << 16)
            | ((self.tx.completion() as u32) << 24);
        self.write_csr(Csr::Type2Producer, value);
    }

    pub(super) fn process_receives(&mut self) {
        let mem = self.mem;
        let goal = mem.block.consumer.receives();
        self.rx
            .process(&mem.block.receives, RingKind::Receive, &mut self.platform, goal);
    }

    /// Service the host-SMT ring and ring its doorbell
    pub(super) fn process_host_smt(&mut self) {
        let mem = self.mem;
        let goal = mem.block.consumer.host_smt();
        self.smt
            .process(&mem.block.host_smt, RingKind::HostSmt, &mut self.platform, goal);
        let doorbell = self.smt.doorbell();
        self.write_csr(Csr::HostSmtProducer, doorbell);
    }
}

// =============================================================================
// Tests
// =============================================================================
