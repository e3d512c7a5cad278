//! ISR-safe adapter wrapper using critical sections.

use super::primitives::CriticalSectionCell;
use crate::driver::pdq::Pdq;
use crate::error::Result;
use crate::platform::Platform;

/// ISR-safe holder for an attached [`Pdq`].
///
/// The wrapper starts empty so it can live in a `static`; the adapter is
/// installed once [`Pdq::initialize`] succeeds. All access goes through
/// `critical_section::with()`, disabling interrupts for the duration of
/// the closure.
///
/// # Example
///
/// ```ignore
/// static PDQ: SharedPdq<'static, HostPlatform> = SharedPdq::new();
///
/// let pdq = Pdq::initialize(platform, &MEMORY, PdqConfig::new())?;
/// PDQ.install(pdq);
/// PDQ.with(|pdq| pdq.run());
///
/// #[interrupt]
/// fn FDDI_IRQ() {
///     let _ = PDQ.interrupt();
/// }
/// ```
pub struct SharedPdq<'a, P: Platform> {
    inner: CriticalSectionCell<Option<Pdq<'a, P>>>,
}

impl<'a, P: Platform> SharedPdq<'a, P> {
    /// Create an empty holder (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            inner: CriticalSectionCell::new(None),
        }
    }

    /// Install an attached adapter, returning the one it replaces
    pub fn install(&self, pdq: Pdq<'a, P>) -> Option<Pdq<'a, P>> {
        self.inner.with(|slot| slot.replace(pdq))
    }

    /// Remove the adapter
    pub fn take(&self) -> Option<Pdq<'a, P>> {
        self.inner.with(Option::take)
    }

    /// Whether an adapter is installed
    pub fn is_installed(&self) -> bool {
        self.inner.with(|slot| slot.is_some())
    }

    /// Execute a closure with exclusive access to the adapter.
    ///
    /// Returns `None` if nothing is installed.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Pdq<'a, P>) -> R,
    {
        self.inner.with(|slot| slot.as_mut().map(f))
    }

    /// Try to execute a closure, returning `None` if the adapter is
    /// already borrowed or not installed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Pdq<'a, P>) -> R,
    {
        self.inner.try_with(|slot| slot.as_mut().map(f)).flatten()
    }

    /// Service the adapter interrupt
    ///
    /// Returns `Ok(false)` when nothing is installed, so a shared
    /// interrupt line can be polled safely before attach.
    pub fn interrupt(&self) -> Result<bool> {
        self.with(Pdq::interrupt).unwrap_or(Ok(false))
    }
}

impl<P: Platform> Default for SharedPdq<'_, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::driver::config::AdapterState;
    use crate::testing::{MockPlatform, initialized_pdq, test_config};

    #[test]
    fn empty_holder_does_nothing() {
        let shared: SharedPdq<'static, MockPlatform> = SharedPdq::new();
        assert!(!shared.is_installed());
        assert_eq!(shared.with(|_pdq| 1), None);
        assert_eq!(shared.interrupt(), Ok(false));
    }

    #[test]
    fn installed_adapter_is_reachable() {
        let shared = SharedPdq::default();
        let (pdq, _memory) = initialized_pdq(test_config());
        assert!(shared.install(pdq).is_none());

        assert_eq!(shared.with(|pdq| pdq.state()), Some(AdapterState::DmaAvailable));
        assert_eq!(shared.try_with(|pdq| pdq.run()), Some(Ok(())));
        assert_eq!(shared.interrupt(), Ok(true));
        assert!(shared.take().is_some());
        assert!(!shared.is_installed());
    }

    #[test]
    fn try_with_fails_when_reentered() {
        let shared = SharedPdq::new();
        let (pdq, _memory) = initialized_pdq(test_config());
        shared.install(pdq);

        let inner = shared.with(|_pdq| shared.try_with(|pdq| pdq.is_running()));
        assert_eq!(inner, Some(None));
    }

    #[test]
    fn static_holder() {
        crate::pdq_statics!(MEMORY, PDQ, MockPlatform);
        let platform = MockPlatform::with_memory(&MEMORY);
        let pdq = Pdq::initialize(platform, &MEMORY, test_config()).unwrap();
        PDQ.install(pdq);

        assert_eq!(PDQ.with(|pdq| pdq.is_running()), Some(false));
        assert!(PDQ.take().is_some());
    }
}
