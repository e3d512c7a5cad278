//! Core driver components for the DEC PDQ FDDI controller.
//!
//! - [`pdq`] - The adapter handle and its state machine
//! - [`config`] - Configuration, adapter kinds, states and flags
//! - [`port`] - Port-control command channel
//! - [`command`] - Command queue engine
//! - [`rx`], [`tx`] - Data rings
//! - [`unsolicited`] - Unsolicited event decoding
//! - [`interrupt`] - Interrupt dispatch
//! - [`station`] - Station characteristics
//!
//! # Example
//!
//! ```ignore
//! use pdq_fddi::driver::{AdapterKind, Pdq, PdqConfig};
//!
//! let config = PdqConfig::new().with_kind(AdapterKind::Defea);
//! let mut pdq = Pdq::initialize(platform, &MEMORY, config)?;
//! pdq.run()?;
//! ```

pub mod command;
pub mod config;
pub mod interrupt;
pub mod pdq;
pub mod port;
pub mod rx;
pub mod station;
pub mod tx;
pub mod unsolicited;

pub use command::{CommandCode, CommandSet};
pub use config::{
    AdapterFlags, AdapterKind, AdapterState, ChipRev, FrameLayout, HaltCode, PdqConfig,
};
pub use interrupt::{PortStatus, Type0Status};
pub use pdq::Pdq;
pub use port::ErrorLogEntry;
pub use rx::Discard;
pub use station::{StationChars, StationType};
pub use unsolicited::{Entity, Event};
