//! Transmit ring producer and completion processing.
//!
//! Outbound frames are scattered across transmit descriptors one page
//! piece at a time: a fragment's first descriptor covers the rest of the
//! page its data starts in, every following one up to a full page. In
//! frame-control-first layout a shared header descriptor carrying the
//! three packet-header bytes is prepended to every frame.

use core::array;

use crate::constants::TRANSMIT_RING_SIZE;
use crate::internal::dma::{DescriptorRing, TxDescriptor};
use crate::internal::register::port::host_int;
use crate::internal::register::Csr;
use crate::platform::{DmaRegion, Frame, PacketBuffer, Platform, RingKind, SyncOp, UpperLayer};

use super::config::AdapterFlags;
use super::pdq::Pdq;

/// Call `f(address, len)` for every descriptor-sized piece of a frame chain
fn for_each_segment<B, F>(frame: &B, page_size: usize, mut f: F)
where
    B: PacketBuffer,
    F: FnMut(*const u8, usize),
{
    let mut fragment = Some(frame);
    while let Some(buffer) = fragment {
        let base = buffer.data_ptr();
        let mut remaining = buffer.len();
        let mut offset = 0;
        let mut room = page_size - (base as usize & (page_size - 1));
        while remaining > 0 {
            let seglen = room.min(remaining);
            f(base.wrapping_add(offset), seglen);
            offset += seglen;
            remaining -= seglen;
            room = page_size;
        }
        fragment = buffer.next();
    }
}

/// Descriptors needed for the data of a frame chain (header excluded)
pub fn data_descriptors<B: PacketBuffer>(frame: &B, page_size: usize) -> usize {
    let mut count = 0;
    for_each_segment(frame, page_size, |_, _| count += 1);
    count
}

/// Host-side state of the transmit ring
pub struct TransmitRing<B, const N: usize> {
    /// Queued frames, keyed by the index of their first descriptor
    frames: [Option<B>; N],
    /// Descriptors used by the frame starting at each index
    counts: [u16; N],
    producer: usize,
    completion: usize,
    free: usize,
}

impl<B: PacketBuffer, const N: usize> TransmitRing<B, N> {
    /// Create an empty ring
    pub fn new() -> Self {
        Self {
            frames: array::from_fn(|_| None),
            counts: [0; N],
            producer: 0,
            completion: 0,
            free: DescriptorRing::<TxDescriptor, N>::CAPACITY,
        }
    }

    /// Next descriptor the host will fill
    pub fn producer(&self) -> usize {
        self.producer
    }

    /// First descriptor of the oldest queued frame
    pub fn completion(&self) -> usize {
        self.completion
    }

    /// Descriptors available for new frames
    pub fn free(&self) -> usize {
        self.free
    }

    /// Frames waiting for transmit completion
    pub fn queued(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_some()).count()
    }

    /// Record a frame occupying `count` descriptors from the producer on
    fn push(&mut self, frame: B, count: usize) {
        self.frames[self.producer] = Some(frame);
        self.counts[self.producer] = count as u16;
        self.producer = DescriptorRing::<TxDescriptor, N>::advance(self.producer, count);
        self.free -= count;
    }

    /// Hand completed frames back up to the adapter's consumer index
    ///
    /// Returns whether anything was reclaimed.
    fn reclaim<P>(&mut self, consumer: usize, host: &mut P) -> bool
    where
        P: UpperLayer<Buffer = B>,
    {
        let consumer = consumer & DescriptorRing::<TxDescriptor, N>::MASK;
        let start = self.completion;

        while self.completion != consumer {
            let count = usize::from(self.counts[self.completion]);
            let outstanding =
                DescriptorRing::<TxDescriptor, N>::distance(self.completion, consumer);
            if count == 0 || count > outstanding {
                break;
            }
            self.counts[self.completion] = 0;
            if let Some(frame) = self.frames[self.completion].take() {
                host.transmit_done(frame);
            }
            self.free += count;
            self.completion = DescriptorRing::<TxDescriptor, N>::advance(self.completion, count);
        }

        self.completion != start
    }

    /// Drop every queued frame without completing it and empty the ring
    fn flush<P>(&mut self, host: &mut P)
    where
        P: UpperLayer<Buffer = B>,
    {
        for slot in self.frames.iter_mut() {
            if let Some(frame) = slot.take() {
                host.free(frame);
            }
        }
        self.counts = [0; N];
        self.completion = self.producer;
        self.free = DescriptorRing::<TxDescriptor, N>::CAPACITY;
    }

    /// Reset to the initial empty state, freeing queued frames
    pub fn reset<P>(&mut self, host: &mut P)
    where
        P: UpperLayer<Buffer = B>,
    {
        self.flush(host);
        self.producer = 0;
        self.completion = 0;
    }
}

impl<B: PacketBuffer, const N: usize> Default for TransmitRing<B, N> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Adapter Operations
// =============================================================================

impl<P: Platform> Pdq<'_, P> {
    /// Queue a frame for transmission
    ///
    /// If the ring cannot take the frame even after reclaiming completed
    /// descriptors, the transmit-available interrupt is enabled and the
    /// frame is handed back untouched; try again after
    /// [`UpperLayer::restart_transmitter`].
    pub fn queue_transmit(&mut self, frame: Frame<P>) -> Result<(), Frame<P>> {
        let page_size = self.config.page_size;
        let header = self.config.frame_layout.prepends_header();
        let data = data_descriptors(&frame, page_size);

        if data == 0 {
            log::trace!("dropping empty transmit frame");
            self.platform.free(frame);
            return Ok(());
        }

        let needed = data + usize::from(header);
        if needed > self.tx.free() {
            self.sync(DmaRegion::ConsumerBlock, SyncOp::PostRead);
            self.process_transmitted_data();
            if needed > self.tx.free() {
                log::trace!("transmit ring full ({needed} needed, {} free)", self.tx.free());
                self.intr_mask |= host_int::TX_ENABLE;
                self.write_csr(Csr::HostIntEnable, self.intr_mask);
                return Err(frame);
            }
        }

        let mem = self.mem;
        let ring = &mem.block.transmits;
        let start = self.tx.producer();
        let mut index = start;
        let mut written = 0;

        if header {
            ring.get(index)
                .set(self.tx_hdr_pa, TxDescriptor::control(true, false, 3));
            self.sync_tx_descriptor(index);
            index = DescriptorRing::<TxDescriptor, TRANSMIT_RING_SIZE>::advance(index, 1);
            written += 1;
        }

        let platform = &mut self.platform;
        for_each_segment(&frame, page_size, |ptr, len| {
            let sop = written == 0;
            let eop = written + 1 == needed;
            ring.get(index)
                .set(platform.virt_to_bus(ptr), TxDescriptor::control(sop, eop, len));
            platform.sync(
                DmaRegion::Descriptors {
                    ring: RingKind::Transmit,
                    index,
                    count: 1,
                },
                SyncOp::PreWrite,
            );
            index = DescriptorRing::<TxDescriptor, TRANSMIT_RING_SIZE>::advance(index, 1);
            written += 1;
        });

        self.tx.push(frame, needed);
        log::trace!("queued transmit frame at {start} ({needed} descriptors)");
        self.type2_doorbell();
        Ok(())
    }

    /// Reclaim descriptors of frames the adapter has transmitted
    pub(super) fn process_transmitted_data(&mut self) {
        let consumer = self.mem.block.consumer.transmits();
        if self.tx.reclaim(consumer, &mut self.platform) {
            self.intr_mask &= !host_int::TX_ENABLE;
            self.write_csr(Csr::HostIntEnable, self.intr_mask);
            self.platform.restart_transmitter();
            self.type2_doorbell();
        }
    }

    /// Discard every queued transmit frame
    ///
    /// The frames are freed without [`UpperLayer::transmit_done`]; they
    /// never reached the wire.
    pub fn flush_transmitter(&mut self) {
        self.tx.flush(&mut self.platform);
        self.mem.block.consumer.set_transmits(self.tx.completion());
        self.sync(DmaRegion::ConsumerBlock, SyncOp::PreWrite);
        self.type2_doorbell();
    }

    /// Whether the transmit path is usable
    pub fn can_transmit(&self) -> bool {
        self.flags.contains(AdapterFlags::TXOK)
    }

    fn sync_tx_descriptor(&mut self, index: usize) {
        self.sync(
            DmaRegion::Descriptors {
                ring: RingKind::Transmit,
                index,
                count: 1,
            },
            SyncOp::PreWrite,
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
