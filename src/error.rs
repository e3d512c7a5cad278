//! Error types for the PDQ driver core
//!
//! Errors are organized by domain:
//! - [`ProtocolError`]: the adapter or shared memory is in an impossible
//!   state (bounded wait exhausted, response mismatch, invalid transition)
//! - [`SetupError`]: attach-time failures
//!
//! Resource exhaustion and malformed received frames are never errors;
//! they are absorbed by discard-and-recycle on receive and by handing the
//! frame back on transmit.
//!
//! The unified [`Error`] enum wraps both domains and is returned by the
//! adapter operations.

use crate::driver::config::{AdapterState, HaltCode};

// =============================================================================
// Protocol Errors
// =============================================================================

/// Fatal protocol invariant violations
///
/// Any of these means the adapter stopped following the host/firmware
/// protocol. The only recovery is a full `stop` + `run` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Port-control command never reported completion
    PortControlTimeout,
    /// Adapter never reached DMA Unavailable after a reset pulse
    ResetTimeout,
    /// Adapter never reached DMA Available after DMA init
    DmaInitTimeout,
    /// Command response opcode differs from the queued command
    UnexpectedResponse {
        /// Opcode the host queued
        expected: u8,
        /// Opcode found in the response buffer
        actual: u32,
    },
    /// Command response carried a non-success status
    CommandFailed {
        /// Opcode of the failed command
        opcode: u8,
        /// Raw response status
        status: u32,
    },
    /// Operation invoked from an adapter state that does not allow it
    UnexpectedState(AdapterState),
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::UnexpectedResponse { expected, actual } => {
                write!(f, "{} (expected {expected}, got {actual})", self.as_str())
            }
            ProtocolError::CommandFailed { opcode, status } => {
                write!(f, "{} (opcode {opcode}, status {status})", self.as_str())
            }
            ProtocolError::UnexpectedState(state) => write!(f, "{}: {state}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl ProtocolError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProtocolError::PortControlTimeout => "port control command timed out",
            ProtocolError::ResetTimeout => "adapter reset timed out",
            ProtocolError::DmaInitTimeout => "adapter did not reach DMA available",
            ProtocolError::UnexpectedResponse { .. } => "unexpected command response",
            ProtocolError::CommandFailed { .. } => "command failed",
            ProtocolError::UnexpectedState(_) => "invalid adapter state",
        }
    }
}

// =============================================================================
// Setup Errors
// =============================================================================

/// Attach-time failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupError {
    /// Adapter halted twice while being brought to DMA Available
    AdapterHalted(HaltCode),
    /// Adapter left in Reset or Upgrade after the stop sequence
    AdapterNotReady(AdapterState),
    /// Descriptor block bus address is not 8 KiB aligned
    MisalignedBlock,
    /// Invalid configuration parameter
    InvalidConfig,
}

impl core::fmt::Display for SetupError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SetupError::AdapterHalted(code) => write!(f, "{}: {code}", self.as_str()),
            SetupError::AdapterNotReady(state) => write!(f, "{}: {state}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl SetupError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SetupError::AdapterHalted(_) => "adapter halted",
            SetupError::AdapterNotReady(_) => "adapter not ready",
            SetupError::MisalignedBlock => "descriptor block not 8 KiB aligned",
            SetupError::InvalidConfig => "invalid configuration",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// ```ignore
/// match pdq.interrupt() {
///     Err(Error::Protocol(ProtocolError::PortControlTimeout)) => { /* adapter gone */ }
///     Err(e) => { /* ... */ }
///     Ok(_) => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Protocol invariant violation
    Protocol(ProtocolError),
    /// Setup failure
    Setup(SetupError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Protocol(e) => write!(f, "protocol: {e}"),
            Error::Setup(e) => write!(f, "setup: {e}"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<SetupError> for Error {
    fn from(e: SetupError) -> Self {
        Error::Setup(e)
    }
}

/// Result type alias for adapter operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for protocol-level operations
pub type ProtocolResult<T> = core::result::Result<T, ProtocolError>;

/// Result type alias for setup operations
pub type SetupResult<T> = core::result::Result<T, SetupError>;

// =============================================================================
// Unit Tests
// =============================================================================
