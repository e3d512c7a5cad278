//! Receive and transmit descriptor structures.
//!
//! Every PDQ descriptor is two little-endian longwords: the bus address of
//! a segment (`pa_lo`) and a control word (`pa_hi`) carrying the segment
//! length and start/end-of-packet flags.

pub mod rx;
pub mod tx;

pub use rx::{RxDescriptor, RxStatus};
pub use tx::TxDescriptor;

/// Volatile cell wrapper for shared memory fields
///
/// Ensures all accesses are volatile to prevent compiler optimization
/// from reordering or caching fields the adapter also reads or writes.
#[repr(transparent)]
pub struct VolatileCell<T: Copy> {
    value: core::cell::UnsafeCell<T>,
}

// Safety: all access is through volatile reads and writes of `Copy` values;
// exclusive use per adapter is guaranteed by the driver owning the memory.
unsafe impl<T: Copy> Sync for VolatileCell<T> {}

impl<T: Copy> VolatileCell<T> {
    /// Create a new volatile cell with the given initial value
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self {
            value: core::cell::UnsafeCell::new(value),
        }
    }

    /// Read the value (volatile read)
    #[inline(always)]
    pub fn get(&self) -> T {
        // SAFETY: the pointer comes from a live UnsafeCell and T is Copy
        unsafe { core::ptr::read_volatile(self.value.get()) }
    }

    /// Write a value (volatile write)
    #[inline(always)]
    pub fn set(&self, value: T) {
        // SAFETY: the pointer comes from a live UnsafeCell and T is Copy
        unsafe { core::ptr::write_volatile(self.value.get(), value) }
    }

    /// Update the value using a function (read-modify-write)
    #[inline(always)]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        let old = self.get();
        self.set(f(old));
    }

    /// Raw pointer to the cell contents, for bus address translation
    #[inline(always)]
    pub const fn as_ptr(&self) -> *const T {
        self.value.get()
    }
}

impl VolatileCell<u32> {
    /// Read a little-endian longword
    #[inline(always)]
    pub fn get_le(&self) -> u32 {
        u32::from_le(self.get())
    }

    /// Write a little-endian longword
    #[inline(always)]
    pub fn set_le(&self, value: u32) {
        self.set(value.to_le());
    }
}

impl VolatileCell<u16> {
    /// Read a little-endian half-word
    #[inline(always)]
    pub fn get_le(&self) -> u16 {
        u16::from_le(self.get())
    }

    /// Write a little-endian half-word
    #[inline(always)]
    pub fn set_le(&self, value: u16) {
        self.set(value.to_le());
    }
}

impl<T: Copy + Default> Default for VolatileCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_round_trip() {
        let cell = VolatileCell::new(0u32);
        cell.set_le(0x1234_5678);
        assert_eq!(cell.get(), 0x1234_5678u32.to_le());
        assert_eq!(cell.get_le(), 0x1234_5678);
    }

    #[test]
    fn update_applies_closure() {
        let cell = VolatileCell::new(5u16);
        cell.update(|v| v * 3);
        assert_eq!(cell.get(), 15);
    }
}
