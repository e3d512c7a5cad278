//! Unsolicited event processing.
//!
//! The adapter reports station, link and PHY events by filling 512-byte
//! event records posted on the unsolicited ring. Records are handed back
//! as soon as they are read; there is nothing to correlate.

use crate::constants::UNSOLICITED_RING_SIZE;
use crate::internal::dma::{DescriptorRing, RxDescriptor, UnsolicitedEvent};
use crate::internal::register::Csr;
use crate::platform::{DmaRegion, Platform, SyncOp};

use super::pdq::Pdq;

type EventRing = DescriptorRing<RxDescriptor, UNSOLICITED_RING_SIZE>;

/// Record longwords
const TYPE_WORD: usize = 0;
const ENTITY_WORD: usize = 1;
const INDEX_WORD: usize = 2;
const CODE_WORD: usize = 3;

/// Record type: data event
const EVENT_TYPE_EVENT: u32 = 0;
/// Record type: counters snapshot
const EVENT_TYPE_COUNTERS: u32 = 1;

const STATION_EVENTS: [Option<&str>; 2] = [Some("Unknown Event #0"), Some("Trace Received")];

const LINK_EVENTS: [Option<&str>; 19] = [
    Some("Transmit Underrun"),
    Some("Transmit Failed"),
    Some("Block Check Error (CRC)"),
    Some("Frame Status Error"),
    Some("PDU Length Error"),
    None,
    None,
    Some("Receive Data Overrun"),
    None,
    Some("No User Buffer"),
    Some("Ring Initialization Initiated"),
    Some("Ring Initialization Received"),
    Some("Ring Beacon Initiated"),
    Some("Duplicate Address Failure"),
    Some("Duplicate Token Detected"),
    Some("Ring Purger Error"),
    Some("FCI Strip Error"),
    Some("Trace Initiated"),
    Some("Directed Beacon Received"),
];

const PHY_EVENTS: [Option<&str>; 3] = [
    Some("LEM Error Monitor Reject"),
    Some("Elasticy Buffer Error"),
    Some("Link Confidence Test Reject"),
];

/// Source of an unsolicited event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Entity {
    /// The station as a whole
    Station,
    /// The MAC
    Link,
    /// One PHY port
    PhyPort,
}

impl Entity {
    /// Decode a raw entity value
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Entity::Station),
            1 => Some(Entity::Link),
            2 => Some(Entity::PhyPort),
            _ => None,
        }
    }

    /// Entity name
    pub const fn name(self) -> &'static str {
        match self {
            Entity::Station => "Station",
            Entity::Link => "Link",
            Entity::PhyPort => "Phy Port",
        }
    }

    fn events(self) -> &'static [Option<&'static str>] {
        match self {
            Entity::Station => &STATION_EVENTS,
            Entity::Link => &LINK_EVENTS,
            Entity::PhyPort => &PHY_EVENTS,
        }
    }
}

/// A decoded unsolicited data event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    /// Reporting entity
    pub entity: Entity,
    /// Port index (PHY events only)
    pub index: u32,
    /// Event code
    pub code: u32,
    /// Event name
    pub name: &'static str,
}

impl Event {
    /// Decode a record, `None` for counters records and unknown events
    pub fn decode(record: &UnsolicitedEvent) -> Option<Self> {
        match record.word(TYPE_WORD) {
            EVENT_TYPE_EVENT => {}
            EVENT_TYPE_COUNTERS => return None,
            other => {
                log::trace!("ignoring unsolicited record type {other}");
                return None;
            }
        }
        let entity = Entity::from_raw(record.word(ENTITY_WORD))?;
        let code = record.word(CODE_WORD);
        let name = entity.events().get(code as usize).copied().flatten()?;
        Some(Self {
            entity,
            index: record.word(INDEX_WORD),
            code,
            name,
        })
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.entity.name(), self.name)?;
        if self.entity == Entity::PhyPort {
            write!(f, "[{}]", self.index)?;
        }
        Ok(())
    }
}

/// Host-side state of the unsolicited ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsolicitedQueue {
    producer: usize,
    completion: usize,
    free: usize,
}

impl UnsolicitedQueue {
    /// Ring with every usable slot waiting to be posted
    pub const fn new() -> Self {
        Self {
            producer: 0,
            completion: 0,
            free: EventRing::CAPACITY,
        }
    }

    /// Next slot handed to the adapter
    pub fn producer(&self) -> usize {
        self.producer
    }

    /// Next slot the host will read
    pub fn completion(&self) -> usize {
        self.completion
    }

    fn doorbell(&self) -> u32 {
        (self.producer | (self.completion << 8)) as u32
    }
}

impl Default for UnsolicitedQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> Pdq<'_, P> {
    /// Drain completed event records and repost every free slot
    ///
    /// Also primes the ring after a stop.
    pub(super) fn process_unsolicited_events(&mut self) {
        let mem = self.mem;
        let consumer = mem.block.consumer.unsolicited() & EventRing::MASK;

        while self.events.completion != consumer {
            let index = self.events.completion;
            let region = DmaRegion::UnsolicitedEvent { index };
            self.sync(region, SyncOp::PostRead);

            match Event::decode(&mem.events[index]) {
                Some(event) => log::info!("Unsolicited Event: {event}"),
                None => log::trace!("unsolicited record {index} skipped"),
            }

            self.sync(region, SyncOp::PreRead);
            self.events.completion = EventRing::advance(index, 1);
            self.events.free += 1;
        }

        self.events.producer = EventRing::advance(self.events.producer, self.events.free);
        self.events.free = 0;
        self.write_csr(Csr::UnsolicitedProducer, self.events.doorbell());
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::internal::dma::PdqMemory;
    use crate::testing::{initialized_pdq, test_config};

    fn record(memory: &PdqMemory, index: usize, words: [u32; 4]) {
        for (i, word) in words.into_iter().enumerate() {
            memory.events[index].set_word(i, word);
        }
    }

    #[test]
    fn decodes_link_and_phy_events() {
        let memory = PdqMemory::new();
        record(&memory, 0, [EVENT_TYPE_EVENT, 1, 0, 13]);
        record(&memory, 1, [EVENT_TYPE_EVENT, 2, 1, 2]);

        let link = Event::decode(&memory.events[0]).unwrap();
        assert_eq!(link.entity, Entity::Link);
        assert_eq!(std::format!("{link}"), "Link: Duplicate Address Failure");

        let phy = Event::decode(&memory.events[1]).unwrap();
        assert_eq!(std::format!("{phy}"), "Phy Port: Link Confidence Test Reject[1]");
    }

    #[test]
    fn invalid_events_are_dropped() {
        let memory = PdqMemory::new();
        record(&memory, 0, [EVENT_TYPE_EVENT, 1, 0, 5]);
        record(&memory, 1, [EVENT_TYPE_EVENT, 1, 0, 19]);
        record(&memory, 2, [EVENT_TYPE_EVENT, 7, 0, 0]);
        record(&memory, 3, [EVENT_TYPE_COUNTERS, 0, 0, 0]);
        record(&memory, 4, [EVENT_TYPE_EVENT, 0, 0, 2]);

        for index in 0..5 {
            assert_eq!(Event::decode(&memory.events[index]), None);
        }
    }

    #[test]
    fn stop_primes_every_usable_slot() {
        let (pdq, memory) = initialized_pdq(test_config());

        assert_eq!(pdq.events.producer(), 15);
        assert_eq!(pdq.events.completion(), 0);
        assert_eq!(pdq.platform().last_write(Csr::UnsolicitedProducer), Some(15));

        let desc = memory.block.unsolicited.get(3);
        assert!(desc.is_sop());
        assert_eq!(desc.seg_len(), 512);
        assert_eq!(desc.bus_addr(), memory.events[3].as_ptr() as usize as u32);
    }

    #[test]
    fn drained_events_are_reposted() {
        let (mut pdq, memory) = initialized_pdq(test_config());
        record(memory, 0, [EVENT_TYPE_EVENT, 1, 0, 10]);
        record(memory, 1, [EVENT_TYPE_COUNTERS, 0, 0, 0]);
        record(memory, 2, [EVENT_TYPE_EVENT, 9, 0, 0]);
        memory.block.consumer.set_unsolicited(3);

        pdq.process_unsolicited_events();

        assert_eq!(pdq.events.completion(), 3);
        assert_eq!(pdq.events.producer(), 2);
        assert_eq!(
            pdq.platform().last_write(Csr::UnsolicitedProducer),
            Some(2 | (3 << 8))
        );
        let syncs = pdq
            .platform()
            .syncs
            .iter()
            .filter(|(region, _)| *region == DmaRegion::UnsolicitedEvent { index: 1 })
            .count();
        assert!(syncs >= 2);
    }

    #[test]
    fn wraps_around_the_ring() {
        let (mut pdq, memory) = initialized_pdq(test_config());
        memory.block.consumer.set_unsolicited(15);
        pdq.process_unsolicited_events();
        memory.block.consumer.set_unsolicited(2);
        pdq.process_unsolicited_events();

        assert_eq!(pdq.events.completion(), 2);
        assert_eq!(pdq.events.producer(), 1);
    }
}
