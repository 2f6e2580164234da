//! Fixed-capacity transfer buffers with a trailing guard byte
//!
//! Both transfer directions use a statically sized buffer whose last byte
//! holds [`GUARD_BYTE`]. The usable area is one byte shorter than the
//! storage; any overrun of the usable area clobbers the guard, which the
//! transport checks after every transfer.

/// Value stored in the final byte of every guarded buffer
pub const GUARD_BYTE: u8 = 0xDE;

/// A byte buffer of `N` bytes whose last byte is a guard
#[derive(Clone)]
pub struct GuardedBuffer<const N: usize> {
    storage: [u8; N],
}

impl<const N: usize> GuardedBuffer<N> {
    /// Usable capacity in bytes (storage minus the guard byte)
    pub const CAPACITY: usize = N - 1;

    /// Create a zeroed buffer with the guard stamped
    pub fn new() -> Self {
        let mut storage = [0u8; N];
        storage[N - 1] = GUARD_BYTE;
        Self { storage }
    }

    /// Zero the usable area and restamp the guard
    pub fn reset(&mut self) {
        self.storage.fill(0);
        self.storage[N - 1] = GUARD_BYTE;
    }

    /// True while the guard byte still holds [`GUARD_BYTE`]
    pub fn is_intact(&self) -> bool {
        self.storage[N - 1] == GUARD_BYTE
    }

    /// Usable capacity in bytes
    pub fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    /// The usable area, excluding the guard
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..Self::CAPACITY]
    }

    /// The usable area, excluding the guard
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[..Self::CAPACITY]
    }

    /// The whole storage including the guard byte
    ///
    /// Writes through this slice can clobber the guard; callers are expected
    /// to check [`is_intact`](Self::is_intact) afterwards.
    pub fn storage_mut(&mut self) -> &mut [u8; N] {
        &mut self.storage
    }
}

impl<const N: usize> Default for GuardedBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for GuardedBuffer<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuardedBuffer")
            .field("capacity", &Self::CAPACITY)
            .field("intact", &self.is_intact())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_intact() {
        let buf = GuardedBuffer::<16>::new();
        assert!(buf.is_intact());
        assert_eq!(buf.capacity(), 15);
        assert_eq!(buf.as_slice().len(), 15);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_filling_usable_area_keeps_guard() {
        let mut buf = GuardedBuffer::<16>::new();
        buf.as_mut_slice().fill(0xFF);
        assert!(buf.is_intact());
    }

    #[test]
    fn test_overrun_detected() {
        let mut buf = GuardedBuffer::<16>::new();
        buf.storage_mut()[15] = 0x00;
        assert!(!buf.is_intact());
    }

    #[test]
    fn test_reset_restores_guard() {
        let mut buf = GuardedBuffer::<8>::new();
        buf.storage_mut().fill(0x55);
        assert!(!buf.is_intact());
        buf.reset();
        assert!(buf.is_intact());
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }
}
