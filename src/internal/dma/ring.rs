//! Power-of-two descriptor ring with producer/completion index arithmetic.
//!
//! The ring itself only stores descriptors. Indices live with whoever
//! owns that side of the protocol (the host-side ring state or the
//! adapter's consumer block) and are combined through the associated
//! functions, which all reduce modulo `N`.

/// Circular descriptor ring of `N` entries (`N` a power of two)
///
/// One slot always stays empty so that equal indices mean "empty".
#[repr(transparent)]
pub struct DescriptorRing<D, const N: usize> {
    descriptors: [D; N],
}

impl<D, const N: usize> DescriptorRing<D, N> {
    /// Index mask
    pub const MASK: usize = {
        assert!(N.is_power_of_two());
        N - 1
    };

    /// Descriptors that can be outstanding at once
    pub const CAPACITY: usize = N - 1;

    /// Create a ring from an existing array
    #[must_use]
    pub const fn from_array(descriptors: [D; N]) -> Self {
        Self { descriptors }
    }

    /// Number of descriptors in the ring
    #[inline(always)]
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    /// Always false for a fixed-size ring
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// `index` advanced by `n`, wrapping around
    #[inline(always)]
    #[must_use]
    pub const fn advance(index: usize, n: usize) -> usize {
        index.wrapping_add(n) & Self::MASK
    }

    /// Entries from `from` up to (not including) `to`
    #[inline(always)]
    #[must_use]
    pub const fn distance(from: usize, to: usize) -> usize {
        to.wrapping_sub(from) & Self::MASK
    }

    /// Whether nothing is outstanding between completion and producer
    #[inline(always)]
    #[must_use]
    pub const fn is_drained(producer: usize, completion: usize) -> bool {
        producer & Self::MASK == completion & Self::MASK
    }

    /// Whether producing one more entry would collide with completion
    #[inline(always)]
    #[must_use]
    pub const fn is_full(producer: usize, completion: usize) -> bool {
        Self::distance(completion, producer) == Self::CAPACITY
    }

    /// Descriptor at `index` (reduced modulo `N`)
    #[inline(always)]
    pub fn get(&self, index: usize) -> &D {
        &self.descriptors[index & Self::MASK]
    }

    /// Pointer to the first descriptor
    #[inline(always)]
    pub fn base_ptr(&self) -> *const D {
        self.descriptors.as_ptr()
    }

    /// Iterate over all descriptors
    pub fn iter(&self) -> impl Iterator<Item = &D> {
        self.descriptors.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
