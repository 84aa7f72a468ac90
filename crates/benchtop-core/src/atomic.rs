//! Bit-cast atomic floats.
//!
//! Rust has no native atomic float, so both types store the IEEE-754 bit
//! pattern in an unsigned atomic word of the same width. Loads and stores are
//! single instructions on every 64-bit target: readers never observe a torn
//! value and the audio thread never waits.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Lock-free `f64` cell.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// Create a new cell holding `value`.
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    /// Read the current value.
    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Overwrite the current value.
    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Lock-free `f32` cell.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    /// Create a new cell holding `value`.
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    /// Read the current value.
    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Overwrite the current value.
    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_roundtrip_preserves_bits() {
        let cell = AtomicF64::new(0.25);
        assert_eq!(cell.load(), 0.25);
        cell.store(-1.0e100);
        assert_eq!(cell.load(), -1.0e100);
        cell.store(f64::INFINITY);
        assert!(cell.load().is_infinite());
    }

    #[test]
    fn test_f32_default_is_zero() {
        let cell = AtomicF32::default();
        assert_eq!(cell.load(), 0.0);
        cell.store(0.5);
        assert_eq!(cell.load(), 0.5);
    }
}
