//! Interrupt dispatch for the PDQ.
//!
//! [`PortStatus`] and [`Type0Status`] decode the two registers the
//! handler looks at; [`Pdq::interrupt`] routes each pending condition to
//! the ring processors and handles link state changes, fatal errors and
//! transmit flush requests.

use crate::error::{ProtocolError, Result};
use crate::internal::register::port::{host_int, pfi, psts};
use crate::internal::register::Csr;
use crate::platform::{DmaRegion, Platform, SyncOp};

use super::command::CommandCode;
use super::config::{AdapterFlags, AdapterKind, AdapterState, HaltCode};
use super::pdq::Pdq;

// =============================================================================
// Port Status
// =============================================================================

/// Pending conditions and adapter state from the port status register
///
/// # Example
///
/// ```ignore
/// let status = PortStatus::from_raw(raw);
/// if status.rx_pending {
///     // receive ring has completions
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortStatus {
    /// Receive ring has completions
    pub rx_pending: bool,
    /// Transmit ring has completions
    pub tx_pending: bool,
    /// Host SMT ring has completions
    pub host_smt_pending: bool,
    /// Unsolicited events are waiting
    pub unsolicited_pending: bool,
    /// A command response arrived
    pub cmd_response_pending: bool,
    /// A command request was consumed
    pub cmd_request_pending: bool,
    /// A type-0 condition is pending
    pub type0_pending: bool,
    /// Adapter state
    pub state: AdapterState,
    /// Halt code (meaningful only when halted)
    pub halt_code: HaltCode,
}

impl PortStatus {
    /// Decode a raw port status value
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            rx_pending: status & psts::RCV_DATA_PENDING != 0,
            tx_pending: status & psts::XMT_DATA_PENDING != 0,
            host_smt_pending: status & psts::HOST_SMT_PENDING != 0,
            unsolicited_pending: status & psts::UNSOL_PENDING != 0,
            cmd_response_pending: status & psts::CMD_RSP_PENDING != 0,
            cmd_request_pending: status & psts::CMD_REQ_PENDING != 0,
            type0_pending: status & psts::TYPE_0_PENDING != 0,
            state: AdapterState::from_port_status(status),
            halt_code: HaltCode::from_port_status(status),
        }
    }

    /// Whether anything needs servicing
    #[inline]
    pub fn any_pending(&self) -> bool {
        self.rx_pending
            || self.tx_pending
            || self.host_smt_pending
            || self.unsolicited_pending
            || self.cmd_response_pending
            || self.cmd_request_pending
            || self.type0_pending
    }
}

// =============================================================================
// Type-0 Status
// =============================================================================

/// Type-0 interrupt conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Type0Status {
    /// Adapter state changed
    pub state_change: bool,
    /// Adapter asks the host to flush the transmit ring
    pub xmt_flush: bool,
    /// Raw fatal error bits (zero if none)
    pub fatal_error: u32,
    /// Port-control command completed
    pub cmd_done: bool,
}

impl Type0Status {
    /// Decode a raw type-0 register value
    #[inline]
    pub fn from_raw(value: u32) -> Self {
        Self {
            state_change: value & host_int::STATE_CHANGE != 0,
            xmt_flush: value & host_int::XMT_DATA_FLUSH != 0,
            fatal_error: value & host_int::FATAL_ERROR,
            cmd_done: value & host_int::CSR_CMD_DONE != 0,
        }
    }

    /// Value to write back to clear these conditions
    #[inline]
    pub fn to_raw(&self) -> u32 {
        let mut value = self.fatal_error & host_int::FATAL_ERROR;
        if self.state_change {
            value |= host_int::STATE_CHANGE;
        }
        if self.xmt_flush {
            value |= host_int::XMT_DATA_FLUSH;
        }
        if self.cmd_done {
            value |= host_int::CSR_CMD_DONE;
        }
        value
    }
}

// =============================================================================
// Dispatch
// =============================================================================

impl<P: Platform> Pdq<'_, P> {
    /// Service every pending adapter condition
    ///
    /// Returns whether anything was pending. After a halt or fatal error
    /// the adapter is stopped (and restarted if it was running) and the
    /// handler returns at once; the status it read is stale by then.
    pub fn interrupt(&mut self) -> Result<bool> {
        let has_pfi = self.csrs.has_pfi();
        if has_pfi {
            self.write_csr(Csr::PfiStatus, pfi::STATUS_ACK_INTR);
        }

        let mut progress = false;
        loop {
            let status = PortStatus::from_raw(self.read_csr(Csr::PortStatus));
            if !status.any_pending() {
                break;
            }
            progress = true;
            log::trace!("interrupt: {status:?}");

            self.sync(DmaRegion::ConsumerBlock, SyncOp::PostRead);
            if status.rx_pending {
                self.process_receives();
                self.type2_doorbell();
            }
            if status.host_smt_pending {
                self.process_host_smt();
            }
            // Completions are cheap to check and the pending bit is unreliable.
            self.process_transmitted_data();
            if status.unsolicited_pending {
                self.process_unsolicited_events();
            }
            if status.cmd_response_pending {
                self.process_command_responses()?;
            }

            if status.type0_pending {
                let type0 = Type0Status::from_raw(self.read_csr(Csr::HostIntType0));
                if type0.state_change {
                    let state = self.adapter_state();
                    log::info!("adapter state: {state}");
                    match state {
                        AdapterState::LinkUnavailable => {
                            self.flags.remove(
                                AdapterFlags::TXOK | AdapterFlags::IS_ONRING | AdapterFlags::IS_FDX,
                            );
                        }
                        AdapterState::LinkAvailable => {
                            if self.flags.contains(AdapterFlags::WANT_FDX) {
                                self.commands.pending_mut().insert(CommandCode::DecExtMibGet);
                                self.queue_commands();
                            }
                            self.flags.insert(AdapterFlags::TXOK | AdapterFlags::IS_ONRING);
                            self.platform.restart_transmitter();
                        }
                        AdapterState::Halted => {
                            self.diagnose_halt(type0)?;
                            self.recover()?;
                            return Ok(true);
                        }
                        _ => {}
                    }
                    self.write_csr(Csr::HostIntType0, host_int::STATE_CHANGE);
                }
                if type0.fatal_error != 0 {
                    log::error!("fatal error interrupt ({:#x})", type0.fatal_error);
                    self.recover()?;
                    return Ok(true);
                }
                if type0.xmt_flush {
                    log::warn!("flushing transmit queue");
                    self.flags.remove(AdapterFlags::TXOK);
                    self.flush_transmitter();
                    self.port().flush_done()?;
                    self.write_csr(Csr::HostIntType0, host_int::XMT_DATA_FLUSH);
                }
            }

            if has_pfi {
                self.write_csr(Csr::PfiStatus, pfi::STATUS_ACK_INTR);
            }
        }
        Ok(progress)
    }

    /// Log why the adapter halted and read its error log
    fn diagnose_halt(&mut self, type0: Type0Status) -> Result<()> {
        let raw = self.read_csr(Csr::PortStatus);
        let code = HaltCode::from_port_status(raw);
        log::error!(
            "adapter halted: halt code = {} ({code})",
            raw & psts::HALT_ID_MASK
        );
        if code == HaltCode::DmaError && self.config.kind == AdapterKind::Defpa {
            let pfi_status = self.read_csr(Csr::PfiStatus);
            log::error!(
                "PFI status = {pfi_status:#x}, host 0 fatal interrupt = {:#x}",
                type0.fatal_error
            );
        }

        let entry = self.port().read_error_log()?;
        if let Some(entry) = &entry {
            log::debug!("error log entry:");
            log::debug!("  CMD status           = {0} ({0:#x})", entry.status);
            log::debug!("  event status         = {0} ({0:#x})", entry.event_status);
            log::debug!("  caller id            = {0} ({0:#x})", entry.caller_id);
            log::debug!("  write count          = {0} ({0:#x})", entry.write_count);
            log::debug!("  FRU implication mask = {0} ({0:#x})", entry.fru_mask);
            log::debug!("  test id              = {0} ({0:#x})", entry.test_id);
        }

        self.last_halt = Some(code);
        self.last_error_log = entry;
        Ok(())
    }

    /// Stop the adapter and bring it back up if it should be running
    fn recover(&mut self) -> Result<()> {
        let state = self.stop_adapter()?;
        if !self.flags.contains(AdapterFlags::RUNNING) {
            return Ok(());
        }
        match state {
            AdapterState::DmaAvailable
            | AdapterState::LinkAvailable
            | AdapterState::LinkUnavailable => self.run(),
            other => {
                log::error!("cannot restart adapter from {other}");
                Err(ProtocolError::UnexpectedState(other).into())
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::constants::{DATABUF_SIZE, FDDI_FC_LLC_ASYNC, FDDI_FC_SMT, RX_FC_OFFSET};
    use crate::driver::config::FrameLayout;
    use crate::internal::dma::descriptor::rx::rxs;
    use crate::internal::register::port::pctl;
    use crate::platform::PacketBuffer;
    use crate::testing::{MockBuf, MockPlatform, initialized_pdq, running_pdq, test_config};

    #[test]
    fn port_status_decodes_pending_bits_and_state() {
        let status = PortStatus::from_raw(
            psts::RCV_DATA_PENDING | psts::TYPE_0_PENDING | (6 << psts::STATE_SHIFT) | 6,
        );
        assert!(status.rx_pending);
        assert!(status.type0_pending);
        assert!(!status.tx_pending);
        assert_eq!(status.state, AdapterState::Halted);
        assert_eq!(status.halt_code, HaltCode::DmaError);
        assert!(status.any_pending());

        assert!(!PortStatus::from_raw(3 << psts::STATE_SHIFT).any_pending());
    }

    #[test]
    fn type0_status_clears_what_it_read() {
        let raw = host_int::STATE_CHANGE | host_int::FATAL_ERROR;
        let status = Type0Status::from_raw(raw);
        assert!(status.state_change);
        assert_eq!(status.fatal_error, host_int::FATAL_ERROR);
        assert!(!status.xmt_flush);
        assert_eq!(status.to_raw(), raw);
        assert_eq!(Type0Status::default().to_raw(), 0);
    }

    #[test]
    fn nothing_pending_reports_no_progress() {
        let (mut pdq, _memory) = running_pdq(test_config());
        pdq.interrupt().unwrap();

        assert_eq!(pdq.interrupt(), Ok(false));
    }

    #[test]
    fn startup_commands_complete_through_interrupts() {
        let (mut pdq, _memory) = initialized_pdq(test_config());
        pdq.run().unwrap();

        assert_eq!(pdq.interrupt(), Ok(true));

        // Highest opcode first: SNMP Set, Addr Filter Set, Filter Set, Start
        let sent = &pdq.platform().commands_seen;
        assert_eq!(&sent[sent.len() - 4..], &[14, 7, 1, 0]);
        assert!(pdq.commands.is_drained());
        assert_eq!(pdq.adapter_state(), AdapterState::LinkUnavailable);
    }

    #[test]
    fn link_up_enables_transmit_and_requests_duplex() {
        let (mut pdq, _memory) = running_pdq(test_config().with_full_duplex(true));
        pdq.interrupt().unwrap();
        let restarts = pdq.platform().restarts;
        pdq.platform_mut().fdx_operational = 1;

        pdq.platform_mut().change_state(AdapterState::LinkAvailable);
        assert_eq!(pdq.interrupt(), Ok(true));

        assert!(pdq.flags().contains(AdapterFlags::TXOK | AdapterFlags::IS_ONRING));
        assert!(pdq.flags().contains(AdapterFlags::IS_FDX));
        assert_eq!(pdq.platform().restarts, restarts + 1);
        assert_eq!(pdq.platform().commands_seen.last(), Some(&12));

        pdq.platform_mut().change_state(AdapterState::LinkUnavailable);
        assert_eq!(pdq.interrupt(), Ok(true));
        assert!(!pdq.flags().intersects(
            AdapterFlags::TXOK | AdapterFlags::IS_ONRING | AdapterFlags::IS_FDX
        ));
    }

    #[test]
    fn halt_is_diagnosed_and_recovered() {
        let (mut pdq, _memory) = running_pdq(test_config());
        pdq.interrupt().unwrap();
        pdq.platform_mut().error_log = (1..=8).collect();
        let resets = pdq.platform().resets;

        pdq.platform_mut().halt(6);
        pdq.platform_mut().raise(psts::RCV_DATA_PENDING);
        assert_eq!(pdq.interrupt(), Ok(true));

        assert_eq!(pdq.last_halt(), Some(HaltCode::DmaError));
        assert_eq!(pdq.last_error_log().map(|e| e.test_id), Some(8));
        assert_eq!(pdq.platform().resets, resets + 1);
        // Recovering from a halt runs the self test
        assert_eq!(pdq.platform().reset_args.last(), Some(&0));
        // Restarted: the startup commands are on their way again
        assert!(pdq.commands.is_active());
        assert!(pdq.commands.pending().contains(CommandCode::Start));
        assert!(pdq.is_running());
    }

    #[test]
    fn halt_ignores_the_rest_of_the_stale_status() {
        let (mut pdq, _memory) = running_pdq(test_config());
        pdq.interrupt().unwrap();
        let resets = pdq.platform().resets;
        let flush_acks = |platform: &MockPlatform| {
            platform
                .port_commands
                .iter()
                .filter(|&&cmd| cmd == pctl::XMT_DATA_FLUSH_DONE)
                .count()
        };
        let acks = flush_acks(pdq.platform());

        pdq.platform_mut().halt(6);
        pdq.platform_mut().flush_request();
        pdq.platform_mut().fatal(0x04);
        assert_eq!(pdq.interrupt(), Ok(true));

        assert_eq!(pdq.platform().resets, resets + 1);
        assert_eq!(flush_acks(pdq.platform()), acks);
        assert!(pdq.is_running());
    }

    #[test]
    fn halt_without_running_only_stops() {
        let (mut pdq, _memory) = running_pdq(test_config());
        pdq.interrupt().unwrap();
        pdq.flags.remove(AdapterFlags::RUNNING);
        let seen = pdq.platform().commands_seen.len();

        pdq.platform_mut().halt(3);
        assert_eq!(pdq.interrupt(), Ok(true));

        assert_eq!(pdq.adapter_state(), AdapterState::DmaAvailable);
        assert_eq!(pdq.platform().commands_seen.len(), seen);
        assert_eq!(pdq.platform().last_write(Csr::HostIntEnable), Some(0));
    }

    #[test]
    fn fatal_error_restarts_adapter() {
        let (mut pdq, _memory) = running_pdq(test_config());
        pdq.interrupt().unwrap();
        let resets = pdq.platform().resets;

        pdq.platform_mut().fatal(0x04);
        assert_eq!(pdq.interrupt(), Ok(true));

        assert_eq!(pdq.platform().resets, resets + 1);
        assert!(pdq.is_running());
    }

    #[test]
    fn flush_request_is_acknowledged() {
        let (mut pdq, _memory) = running_pdq(test_config());
        pdq.interrupt().unwrap();
        pdq.platform_mut().change_state(AdapterState::LinkAvailable);
        pdq.interrupt().unwrap();
        assert!(pdq.queue_transmit(MockBuf::at(0x1000_0000, 64)).is_ok());
        let frees = pdq.platform().free_count;

        pdq.platform_mut().flush_request();
        assert_eq!(pdq.interrupt(), Ok(true));

        assert!(!pdq.can_transmit());
        assert!(pdq.platform().tx_done.is_empty());
        assert_eq!(pdq.platform().free_count, frees + 1);
        assert!(pdq
            .platform()
            .port_commands
            .contains(&pctl::XMT_DATA_FLUSH_DONE));
    }

    #[test]
    fn received_frame_reaches_upper_layer() {
        let (mut pdq, memory) = running_pdq(test_config());
        pdq.interrupt().unwrap();

        let buffer = pdq.rx.buffer_mut(0).unwrap();
        let data = buffer.data_mut();
        data[..4].copy_from_slice(&(64 | (rxs::RCC_DD_CAM_MATCH << rxs::RCC_DD_SHIFT)).to_le_bytes());
        data[RX_FC_OFFSET] = FDDI_FC_LLC_ASYNC;
        memory.block.consumer.set_receives(3);
        pdq.platform_mut().raise(psts::RCV_DATA_PENDING);

        assert_eq!(pdq.interrupt(), Ok(true));

        let received = &pdq.platform().received;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].1, 60);
        assert!(!received[0].2);
        let doorbell = pdq.platform().last_write(Csr::Type2Producer).unwrap();
        assert_eq!((doorbell >> 8) & 0xFF, 3);
    }

    #[test]
    fn host_smt_ring_serviced_when_passing_smt() {
        let config = test_config()
            .with_pass_smt(true)
            .with_frame_layout(FrameLayout::WithPacketHeader);
        let (mut pdq, memory) = running_pdq(config);
        pdq.interrupt().unwrap();
        assert!(pdq.smt.producer() > 0);

        let buffer = pdq.smt.buffer_mut(0).unwrap();
        let data = buffer.data_mut();
        data[..4].copy_from_slice(&100u32.to_le_bytes());
        data[RX_FC_OFFSET] = FDDI_FC_SMT | 0x01;
        memory.block.consumer.set_host_smt(3);
        pdq.platform_mut().raise(psts::HOST_SMT_PENDING);

        assert_eq!(pdq.interrupt(), Ok(true));

        let (frame, len, _) = &pdq.platform().received[0];
        assert_eq!(*len, 99);
        assert!(frame.len() < DATABUF_SIZE);
        assert_eq!(
            pdq.platform().last_write(Csr::HostSmtProducer),
            Some(pdq.smt.doorbell())
        );
    }

    #[test]
    fn host_smt_ring_drains_after_pass_smt_is_cleared() {
        let config = test_config()
            .with_pass_smt(true)
            .with_frame_layout(FrameLayout::WithPacketHeader);
        let (mut pdq, memory) = running_pdq(config);
        pdq.interrupt().unwrap();
        pdq.set_pass_smt(false);
        pdq.request_filter_update();

        let buffer = pdq.smt.buffer_mut(0).unwrap();
        let data = buffer.data_mut();
        data[..4].copy_from_slice(&100u32.to_le_bytes());
        data[RX_FC_OFFSET] = FDDI_FC_SMT | 0x01;
        memory.block.consumer.set_host_smt(3);
        pdq.platform_mut().raise(psts::HOST_SMT_PENDING);

        assert_eq!(pdq.interrupt(), Ok(true));

        assert_eq!(pdq.platform().received.len(), 1);
        assert_eq!(pdq.smt.completion(), 3);
        assert_eq!(
            pdq.platform().last_write(Csr::HostSmtProducer),
            Some(pdq.smt.doorbell())
        );
    }
}
