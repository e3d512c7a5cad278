//! Shared-memory DMA structures
//!
//! Everything the adapter reaches by DMA lives here:
//! - [`PdqMemory`]: the descriptor block plus unsolicited event records
//! - [`DescriptorRing`]: power-of-two ring with index arithmetic
//! - Receive and transmit descriptor layouts
//!
//! # Note
//!
//! The ring index state (producer, completion) is owned by the driver
//! side of each ring, not by the rings stored in shared memory.

pub mod block;
pub mod descriptor;
pub mod ring;

pub use block::{ConsumerBlock, DescriptorBlock, PdqMemory, UnsolicitedEvent};
pub use descriptor::{RxDescriptor, RxStatus, TxDescriptor, VolatileCell};
pub use ring::DescriptorRing;
