//! Per-slot routing flags.

use std::sync::atomic::{AtomicBool, Ordering};

/// Routing of one processor slot, as a plain value.
///
/// The flags are independent; every combination is valid, including a slot
/// connected to neither source (it then processes silence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingFlags {
    /// Source A feeds this slot.
    pub source_a: bool,
    /// Source B feeds this slot.
    pub source_b: bool,
    /// The slot is processed and contributes to the output.
    pub enabled: bool,
    /// The slot output is multiplied by -1 after processing.
    pub inverted: bool,
    /// The slot is processed but its contribution is silenced.
    pub muted: bool,
}

impl Default for RoutingFlags {
    fn default() -> Self {
        Self {
            source_a: true,
            source_b: false,
            enabled: true,
            inverted: false,
            muted: false,
        }
    }
}

impl RoutingFlags {
    /// Flags for a disabled slot.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Routing flags shared between the UI and the audio thread.
///
/// Each flag is its own atomic; the router reads a [`RoutingFlags`] copy once
/// per block.
#[derive(Debug)]
pub struct SlotRouting {
    source_a: AtomicBool,
    source_b: AtomicBool,
    enabled: AtomicBool,
    inverted: AtomicBool,
    muted: AtomicBool,
}

impl Default for SlotRouting {
    fn default() -> Self {
        Self::new(RoutingFlags::default())
    }
}

impl SlotRouting {
    /// Create shared flags initialised from `flags`.
    pub fn new(flags: RoutingFlags) -> Self {
        Self {
            source_a: AtomicBool::new(flags.source_a),
            source_b: AtomicBool::new(flags.source_b),
            enabled: AtomicBool::new(flags.enabled),
            inverted: AtomicBool::new(flags.inverted),
            muted: AtomicBool::new(flags.muted),
        }
    }

    /// Copy out the current flags.
    #[inline]
    pub fn load(&self) -> RoutingFlags {
        RoutingFlags {
            source_a: self.source_a.load(Ordering::Relaxed),
            source_b: self.source_b.load(Ordering::Relaxed),
            enabled: self.enabled.load(Ordering::Relaxed),
            inverted: self.inverted.load(Ordering::Relaxed),
            muted: self.muted.load(Ordering::Relaxed),
        }
    }

    /// Overwrite every flag.
    pub fn store(&self, flags: RoutingFlags) {
        self.source_a.store(flags.source_a, Ordering::Relaxed);
        self.source_b.store(flags.source_b, Ordering::Relaxed);
        self.enabled.store(flags.enabled, Ordering::Relaxed);
        self.inverted.store(flags.inverted, Ordering::Relaxed);
        self.muted.store(flags.muted, Ordering::Relaxed);
    }

    /// Connect or disconnect source A.
    pub fn set_source_a(&self, connected: bool) {
        self.source_a.store(connected, Ordering::Relaxed);
    }

    /// Connect or disconnect source B.
    pub fn set_source_b(&self, connected: bool) {
        self.source_b.store(connected, Ordering::Relaxed);
    }

    /// Enable or disable the slot.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Invert the slot output.
    pub fn set_inverted(&self, inverted: bool) {
        self.inverted.store(inverted, Ordering::Relaxed);
    }

    /// Mute the slot contribution.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routing() {
        let flags = RoutingFlags::default();
        assert!(flags.source_a && !flags.source_b);
        assert!(flags.enabled && !flags.inverted && !flags.muted);
        assert!(!RoutingFlags::disabled().enabled);
    }

    #[test]
    fn test_store_and_setters() {
        let routing = SlotRouting::default();
        routing.set_source_b(true);
        routing.set_inverted(true);
        let flags = routing.load();
        assert!(flags.source_a && flags.source_b && flags.inverted);

        routing.store(RoutingFlags::disabled());
        assert_eq!(routing.load(), RoutingFlags::disabled());
    }
}
