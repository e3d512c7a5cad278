//! Receive ring processing.
//!
//! Receive descriptors are posted in groups of `SEGCNT`, one buffer of
//! [`DATABUF_SIZE`] bytes each; a group holds exactly one received frame.
//! [`ReceiveRing`] tracks which host buffer sits behind each descriptor,
//! validates completed frames, hands good ones to the upper layer and
//! keeps enough groups posted to meet its target.
//!
//! The same processor serves the data ring and the host-SMT ring.

use core::array;

use crate::constants::{
    CRC_SIZE, DATABUF_SIZE, FDDI_FC_CLASS_MASK, FDDI_FC_IMP_ASYNC, FDDI_FC_IMP_SYNC,
    FDDI_FC_LLC_ASYNC, FDDI_FC_LLC_SYNC, FDDI_FC_SMT, FDDI_LLC_MIN, FDDI_MAX, FDDI_SMT_MIN,
    RX_FC_OFFSET, RX_STATUS_SIZE,
};
use crate::internal::dma::descriptor::rx::rxs;
use crate::internal::dma::{DescriptorRing, RxDescriptor, RxStatus};
use crate::platform::{DmaRegion, DmaSync, PacketBuffer, RingKind, SyncOp, UpperLayer};

/// Why a completed frame was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Discard {
    /// Adapter flagged the frame as a bad PDU
    BadPdu(RxStatus),
    /// Length outside the bounds of its frame class
    BadLength(usize),
    /// Frame control byte is not LLC, implementor or SMT
    BadFrameControl(u8),
    /// Frame needs more segments than a group holds
    TooManySegments(usize),
    /// No replacement buffers available
    NoBuffers,
}

/// Host-side state of one receive ring
pub struct ReceiveRing<B, const N: usize, const SEGCNT: usize> {
    buffers: [Option<B>; N],
    producer: usize,
    completion: usize,
    free: usize,
    target: usize,
    hdr_offset: usize,
}

impl<B: PacketBuffer, const N: usize, const SEGCNT: usize> ReceiveRing<B, N, SEGCNT> {
    /// Create an empty ring that keeps `target_groups` groups posted
    ///
    /// `hdr_offset` bytes are trimmed from the front of every delivered
    /// frame's first segment.
    pub fn new(target_groups: usize, hdr_offset: usize) -> Self {
        let free = DescriptorRing::<RxDescriptor, N>::CAPACITY;
        Self {
            buffers: array::from_fn(|_| None),
            producer: 0,
            completion: 0,
            free,
            target: free.saturating_sub(target_groups * SEGCNT),
            hdr_offset,
        }
    }

    /// Next descriptor the host will post
    pub fn producer(&self) -> usize {
        self.producer
    }

    /// Next descriptor the host expects the adapter to complete
    pub fn completion(&self) -> usize {
        self.completion
    }

    /// Descriptors not currently posted
    pub fn free(&self) -> usize {
        self.free
    }

    /// Free count above which the ring is refilled
    pub fn target(&self) -> usize {
        self.target
    }

    /// Buffer held for descriptor `index`
    pub fn buffer(&self, index: usize) -> Option<&B> {
        self.buffers[index & DescriptorRing::<RxDescriptor, N>::MASK].as_ref()
    }

    #[cfg(test)]
    pub(crate) fn buffer_mut(&mut self, index: usize) -> Option<&mut B> {
        self.buffers[index & DescriptorRing::<RxDescriptor, N>::MASK].as_mut()
    }

    /// Producer doorbell value (`producer | completion << 8`)
    pub fn doorbell(&self) -> u32 {
        (self.producer as u32) | ((self.completion as u32) << 8)
    }

    #[inline(always)]
    fn slot(index: usize) -> usize {
        index & DescriptorRing::<RxDescriptor, N>::MASK
    }

    #[inline(always)]
    fn advance(index: usize, n: usize) -> usize {
        DescriptorRing::<RxDescriptor, N>::advance(index, n)
    }

    /// Free every buffer and rewind all indices
    pub fn flush<P>(&mut self, host: &mut P)
    where
        P: UpperLayer<Buffer = B>,
    {
        for slot in self.buffers.iter_mut() {
            if let Some(buffer) = slot.take() {
                host.free(buffer);
            }
        }
        self.producer = 0;
        self.completion = 0;
        self.free = DescriptorRing::<RxDescriptor, N>::CAPACITY;
    }

    /// Consume completed groups up to `goal`, then refill
    ///
    /// `goal` is the adapter's consumer index for this ring. Good frames
    /// go to [`UpperLayer::receive`]; everything else is recycled onto
    /// the ring without allocating.
    pub fn process<P>(
        &mut self,
        descriptors: &DescriptorRing<RxDescriptor, N>,
        ring: RingKind,
        host: &mut P,
        goal: usize,
    ) where
        P: DmaSync + UpperLayer<Buffer = B>,
    {
        let goal = Self::slot(goal);
        // Consumed buffers are stashed starting here until they are reposted.
        let mut stash = self.producer;

        while DescriptorRing::<RxDescriptor, N>::distance(self.completion, goal) >= SEGCNT {
            match self.deliver(host, stash) {
                Ok(()) => {
                    stash = Self::advance(stash, SEGCNT);
                }
                Err(reason) => {
                    log::debug!("{ring:?}: discarding frame at {}: {reason:?}", self.completion);
                    self.recycle(descriptors, ring, host, &mut stash);
                }
            }
        }

        self.refill(descriptors, ring, host);
    }

    /// Validate the group at `completion` and hand it upstream
    fn deliver<P>(&mut self, host: &mut P, stash: usize) -> Result<(), Discard>
    where
        P: DmaSync + UpperLayer<Buffer = B>,
    {
        let c = self.completion;
        let Some(first) = self.buffers[c].as_ref() else {
            return Err(Discard::NoBuffers);
        };

        host.sync_buffer(first, 0, RX_STATUS_SIZE, SyncOp::PostRead);
        let data = first.as_slice();
        let status = data
            .get(..RX_STATUS_SIZE)
            .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
            .map_or(rxs::RCC_BADPDU, u32::from_le_bytes);
        let status = RxStatus::from_raw(status);

        if status.is_bad_pdu() {
            report_bad_pdu(status, data);
            return Err(Discard::BadPdu(status));
        }

        host.sync_buffer(
            first,
            RX_STATUS_SIZE,
            RX_FC_OFFSET + 1 - RX_STATUS_SIZE,
            SyncOp::PostRead,
        );
        let fc = first.as_slice().get(RX_FC_OFFSET).copied().unwrap_or(0);
        check_length(fc, status.len())?;

        let hdr = self.hdr_offset;
        let pdulen = status.len() + (RX_FC_OFFSET - hdr) - CRC_SIZE;
        let segcnt = (pdulen + hdr).div_ceil(DATABUF_SIZE);
        if segcnt > SEGCNT {
            return Err(Discard::TooManySegments(segcnt));
        }

        // Replacements first, so a failure leaves the group untouched.
        let mut fresh: [Option<B>; SEGCNT] = array::from_fn(|_| None);
        let mut short = false;
        for slot in fresh.iter_mut().take(segcnt) {
            *slot = host.alloc();
            if slot.is_none() {
                short = true;
                break;
            }
        }
        if short {
            for buffer in fresh.into_iter().flatten() {
                host.free(buffer);
            }
            return Err(Discard::NoBuffers);
        }

        let mut segments: [Option<B>; SEGCNT] = array::from_fn(|_| None);
        for (idx, replacement) in fresh.iter_mut().enumerate().take(segcnt) {
            let slot = Self::advance(c, idx);
            segments[idx] = core::mem::replace(&mut self.buffers[slot], replacement.take());
        }

        let mut chain: Option<B> = None;
        for idx in (0..segcnt).rev() {
            let Some(mut segment) = segments[idx].take() else {
                continue;
            };
            segment.set_len(DATABUF_SIZE);
            if idx == 0 {
                segment.trim_front(hdr);
            }
            if idx == segcnt - 1 {
                if segcnt == 1 {
                    segment.set_len(pdulen);
                } else {
                    segment.set_len(pdulen + hdr - (segcnt - 1) * DATABUF_SIZE);
                }
            }
            segment.set_next(chain);
            chain = Some(segment);
        }

        for idx in 0..SEGCNT {
            self.buffers
                .swap(Self::advance(c, idx), Self::advance(stash, idx));
        }
        self.completion = Self::advance(c, SEGCNT);
        self.free += SEGCNT;

        if let Some(frame) = chain {
            host.receive(frame, pdulen, status.is_promiscuous());
        }
        Ok(())
    }

    /// Put the group at `completion` straight back on the ring
    fn recycle<P>(
        &mut self,
        descriptors: &DescriptorRing<RxDescriptor, N>,
        ring: RingKind,
        host: &mut P,
        stash: &mut usize,
    ) where
        P: DmaSync + UpperLayer<Buffer = B>,
    {
        for idx in 0..SEGCNT {
            self.buffers.swap(self.completion, *stash);

            let producer = self.producer;
            if self.buffers[producer].is_none() {
                self.buffers[producer] = host.alloc();
            }
            if self.post(descriptors, ring, host, producer, idx == 0) {
                self.producer = Self::advance(producer, 1);
            } else {
                self.free += 1;
            }
            *stash = Self::advance(*stash, 1);
            self.completion = Self::advance(self.completion, 1);
        }
    }

    /// Post groups until the free count is down to the target
    fn refill<P>(
        &mut self,
        descriptors: &DescriptorRing<RxDescriptor, N>,
        ring: RingKind,
        host: &mut P,
    ) where
        P: DmaSync + UpperLayer<Buffer = B>,
    {
        while self.free > SEGCNT && self.free > self.target {
            let mut posted = 0;
            for idx in 0..SEGCNT {
                let slot = Self::advance(self.producer, idx);
                if self.buffers[slot].is_none() {
                    match host.alloc() {
                        Some(buffer) => self.buffers[slot] = Some(buffer),
                        None => break,
                    }
                }
                self.post(descriptors, ring, host, slot, idx == 0);
                posted += 1;
            }
            if posted < SEGCNT {
                // Keep what we got; the rest is retried on the next pass.
                break;
            }
            self.producer = Self::advance(self.producer, SEGCNT);
            self.free -= SEGCNT;
        }
    }

    /// Program descriptor `slot` with the buffer held there
    fn post<P>(
        &self,
        descriptors: &DescriptorRing<RxDescriptor, N>,
        ring: RingKind,
        host: &mut P,
        slot: usize,
        first: bool,
    ) -> bool
    where
        P: DmaSync + UpperLayer<Buffer = B>,
    {
        let Some(buffer) = self.buffers[slot].as_ref() else {
            return false;
        };
        let control = if first {
            RxDescriptor::control(true, SEGCNT - 1, DATABUF_SIZE)
        } else {
            RxDescriptor::control(false, 0, DATABUF_SIZE)
        };
        descriptors.get(slot).set(buffer.bus_addr(), control);
        host.sync_buffer(buffer, 0, DATABUF_SIZE, SyncOp::PreRead);
        host.sync(
            DmaRegion::Descriptors {
                ring,
                index: slot,
                count: 1,
            },
            SyncOp::PreWrite,
        );
        true
    }
}

/// Check a received length against the bounds of its frame class
fn check_length(fc: u8, len: usize) -> Result<(), Discard> {
    let min = match fc & FDDI_FC_CLASS_MASK {
        FDDI_FC_LLC_ASYNC | FDDI_FC_LLC_SYNC | FDDI_FC_IMP_ASYNC | FDDI_FC_IMP_SYNC => {
            FDDI_LLC_MIN
        }
        FDDI_FC_SMT => FDDI_SMT_MIN,
        _ => return Err(Discard::BadFrameControl(fc)),
    };
    if (min..=FDDI_MAX).contains(&len) {
        Ok(())
    } else {
        Err(Discard::BadLength(len))
    }
}

fn report_bad_pdu(status: RxStatus, data: &[u8]) {
    match status.reason() {
        0 | rxs::RCC_REASON_SILENT => {}
        _ if status.is_bad_crc() => {
            let mut source = [0u8; 6];
            if let Some(bytes) = data.get(RX_FC_OFFSET + 1..RX_FC_OFFSET + 7) {
                source.copy_from_slice(bytes);
            }
            log::warn!(
                "MAC CRC error (source={:x}-{:x}-{:x}-{:x}-{:x}-{:x})",
                source[0],
                source[1],
                source[2],
                source[3],
                source[4],
                source[5]
            );
        }
        _ if status.fsc() == 0 || status.fsb_e() => {
            log::debug!("frame status error (status {:#010x})", status.raw());
        }
        _ => {
            log::debug!("receive hardware fault (status {:#010x})", status.raw());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
