//! DEC PDQ FDDI Driver Core
//!
//! A `no_std`, `no_alloc` driver core for the DEC PDQ FDDI controller as
//! found on the DEFPA (PCI), DEFEA (EISA), DEFTA (TURBOchannel), DEFAA
//! (Futurebus+) and DEFQA (Q-bus) boards.
//!
//! The core speaks the PDQ host/firmware protocol: port-control commands
//! over the CSRs, six descriptor rings in one 8 KiB shared block, a
//! consumer block the adapter writes back, and the adapter state machine
//! with its halt and recovery paths. Everything host specific (register
//! access, DMA synchronization, packet buffers, the network stack) comes
//! in through the [`platform`] traits.
//!
//! # Architecture
//!
//! 1. **Adapter** ([`driver::pdq`]): attach, stop, run, runtime settings
//! 2. **Rings** ([`driver::rx`], [`driver::tx`], [`driver::command`],
//!    [`driver::unsolicited`]): host side of each descriptor ring
//! 3. **Interrupts** ([`driver::interrupt`]): dispatch, halt diagnosis and
//!    recovery
//! 4. **Platform** ([`platform`]): what the host must provide
//!
//! # Features
//!
//! - `defmt`: Enable defmt formatting for error and status types
//! - `critical-section`: Enable the ISR-safe [`SharedPdq`] wrapper
//!
//! # Example
//!
//! ```ignore
//! use pdq_fddi::{AdapterKind, Pdq, PdqConfig, PdqMemory};
//!
//! static MEMORY: PdqMemory = PdqMemory::new();
//!
//! let config = PdqConfig::new()
//!     .with_kind(AdapterKind::Defpa)
//!     .with_full_duplex(true);
//!
//! let mut pdq = Pdq::initialize(platform, &MEMORY, config)?;
//! pdq.run()?;
//!
//! // Interrupt handler
//! pdq.interrupt()?;
//!
//! // Transmit path
//! if let Err(frame) = pdq.queue_transmit(frame) {
//!     // Ring full; retry after restart_transmitter()
//! }
//! ```
//!
//! # Memory Requirements
//!
//! [`PdqMemory`] is 16 KiB: the 8 KiB descriptor block plus sixteen
//! 512-byte unsolicited event records. It must sit at an 8 KiB aligned
//! bus address.

#![no_std]
#![warn(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here as well as in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

// =============================================================================
// Modules
// =============================================================================

pub mod constants;
pub mod driver;
pub mod error;
pub mod platform;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "critical-section")]
#[cfg_attr(docsrs, doc(cfg(feature = "critical-section")))]
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{
    AdapterFlags, AdapterKind, AdapterState, ChipRev, FrameLayout, HaltCode, PdqConfig,
};
pub use driver::pdq::Pdq;
pub use driver::port::ErrorLogEntry;
pub use driver::station::{StationChars, StationType};
pub use error::{Error, ProtocolError, ProtocolResult, Result, SetupError, SetupResult};
pub use internal::dma::{ConsumerBlock, DescriptorBlock, PdqMemory, UnsolicitedEvent};
pub use platform::{
    BufferPool, CsrBus, DmaRegion, DmaSync, Frame, PacketBuffer, Platform, RingKind, SyncOp,
    UpperLayer,
};

// Re-export sync types when critical-section is enabled
#[cfg(feature = "critical-section")]
pub use sync::SharedPdq;

// =============================================================================
// Macro Helpers
// =============================================================================

/// Declare the shared memory and an ISR-safe adapter holder as statics.
///
/// # Examples
///
/// ```ignore
/// pdq_fddi::pdq_statics!(MEMORY, PDQ, HostPlatform);
///
/// let pdq = Pdq::initialize(platform, &MEMORY, PdqConfig::new()).unwrap();
/// PDQ.install(pdq);
/// ```
#[cfg(feature = "critical-section")]
#[macro_export]
macro_rules! pdq_statics {
    ($memory:ident, $pdq:ident, $platform:ty) => {
        static $memory: $crate::PdqMemory = $crate::PdqMemory::new();
        static $pdq: $crate::sync::SharedPdq<'static, $platform> =
            $crate::sync::SharedPdq::new();
    };
}
