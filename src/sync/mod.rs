//! Synchronization and Concurrency Support
//!
//! The driver core is single-owner; this module lets that owner be
//! shared between thread context and the adapter interrupt handler.
//!
//! - **Primitives** (`primitives`): [`CriticalSectionCell`], ISR-safe
//!   interior mutability
//! - **Shared Wrapper** (`shared`): [`SharedPdq`], a static-friendly
//!   holder for an attached adapter
//!
//! # Feature Flags
//!
//! - `critical-section`: Enables this module
//!
//! # Example
//!
//! ```ignore
//! use pdq_fddi::sync::SharedPdq;
//!
//! static PDQ: SharedPdq<'static, HostPlatform> = SharedPdq::new();
//!
//! fn main() {
//!     let pdq = Pdq::initialize(platform, &MEMORY, PdqConfig::new()).unwrap();
//!     PDQ.install(pdq);
//!     PDQ.with(|pdq| pdq.run());
//! }
//!
//! #[interrupt]
//! fn FDDI_IRQ() {
//!     if let Err(e) = PDQ.interrupt() {
//!         log::error!("{e}");
//!     }
//! }
//! ```

mod primitives;

pub use primitives::CriticalSectionCell;

mod shared;

pub use shared::SharedPdq;
