//! Normalized, lock-free processor controls.
//!
//! Every control of a processor-under-test is a normalized value in
//! `[0, 1]` stored in a [`ControlValue`]. The UI thread writes it, the audio
//! thread reads it once per block; both sides only ever touch a single atomic
//! word. Mapping the normalized value onto a real-world unit (Hz, dB, ...)
//! is the processor's own job; [`ControlRange`] provides the two mappings
//! most processors need.

use crate::atomic::AtomicF64;

/// Real-world span a normalized control maps onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRange {
    /// Value at normalized 0.0.
    pub low: f64,
    /// Value at normalized 1.0.
    pub high: f64,
}

impl ControlRange {
    /// The identity range `[0, 1]`.
    pub const UNIT: Self = Self::new(0.0, 1.0);

    /// Create a range.
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Map a normalized value linearly onto the range.
    #[inline]
    pub fn map_linear(&self, normalized: f64) -> f64 {
        self.low + (self.high - self.low) * normalized
    }

    /// Inverse of [`map_linear`](Self::map_linear).
    pub fn normalize_linear(&self, value: f64) -> f64 {
        let span = self.high - self.low;
        if span == 0.0 {
            0.0
        } else {
            ((value - self.low) / span).clamp(0.0, 1.0)
        }
    }

    /// Map a normalized value logarithmically onto the range.
    ///
    /// Requires `low > 0`. Suited to frequency controls.
    #[inline]
    pub fn map_log(&self, normalized: f64) -> f64 {
        debug_assert!(self.low > 0.0, "logarithmic range needs a positive lower bound");
        self.low * (self.high / self.low).powf(normalized)
    }

    /// Inverse of [`map_log`](Self::map_log).
    pub fn normalize_log(&self, value: f64) -> f64 {
        debug_assert!(self.low > 0.0, "logarithmic range needs a positive lower bound");
        let ratio = (self.high / self.low).ln();
        if ratio == 0.0 || value <= 0.0 {
            0.0
        } else {
            ((value / self.low).ln() / ratio).clamp(0.0, 1.0)
        }
    }
}

/// Static description of one control, declared by a processor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSpec {
    /// Display name.
    pub name: &'static str,
    /// Default normalized value in `[0, 1]`.
    pub default: f64,
    /// Real-world range the normalized value maps onto.
    pub range: ControlRange,
}

impl ControlSpec {
    /// Create a control description.
    pub const fn new(name: &'static str, default: f64, range: ControlRange) -> Self {
        Self {
            name,
            default,
            range,
        }
    }
}

/// Owned copy of a [`ControlSpec`] for non-realtime consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlInfo {
    /// Display name.
    pub name: String,
    /// Default normalized value.
    pub default: f64,
    /// Real-world range.
    pub range: ControlRange,
}

impl From<&ControlSpec> for ControlInfo {
    fn from(spec: &ControlSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            default: spec.default,
            range: spec.range,
        }
    }
}

/// One normalized control value, shared between threads.
#[derive(Debug)]
pub struct ControlValue {
    value: AtomicF64,
    default: f64,
}

impl ControlValue {
    /// Create a control initialised to `default`.
    pub fn new(default: f64) -> Self {
        let default = default.clamp(0.0, 1.0);
        Self {
            value: AtomicF64::new(default),
            default,
        }
    }

    /// Current normalized value.
    #[inline]
    pub fn get(&self) -> f64 {
        self.value.load()
    }

    /// Store a normalized value, clamped to `[0, 1]`.
    #[inline]
    pub fn set(&self, value: f64) {
        self.value.store(value.clamp(0.0, 1.0));
    }

    /// Default normalized value.
    pub fn default_value(&self) -> f64 {
        self.default
    }

    /// Restore the default.
    pub fn reset(&self) {
        self.value.store(self.default);
    }
}

/// All control values of one processor.
///
/// Indexing past [`len`](Self::len) is a contract violation and panics.
#[derive(Debug)]
pub struct ControlBank {
    values: Box<[ControlValue]>,
}

impl ControlBank {
    /// Build a bank initialised to each control's default.
    pub fn from_specs(specs: &[ControlSpec]) -> Self {
        Self {
            values: specs.iter().map(|s| ControlValue::new(s.default)).collect(),
        }
    }

    /// An empty bank for processors without controls.
    pub fn empty() -> Self {
        Self::from_specs(&[])
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the bank holds no controls.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalized value of control `index`.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        debug_assert!(index < self.values.len(), "control index {index} out of range");
        self.values[index].get()
    }

    /// Normalized value of control `index` as `f32`.
    #[inline]
    pub fn get_f32(&self, index: usize) -> f32 {
        self.get(index) as f32
    }

    /// Store a normalized value for control `index`.
    #[inline]
    pub fn set(&self, index: usize, value: f64) {
        debug_assert!(index < self.values.len(), "control index {index} out of range");
        self.values[index].set(value);
    }

    /// Restore every control to its default.
    pub fn reset_to_defaults(&self) {
        for value in self.values.iter() {
            value.reset();
        }
    }

    /// Copy out every current value.
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().map(ControlValue::get).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: [ControlSpec; 2] = [
        ControlSpec::new("Frequency", 0.5, ControlRange::new(20.0, 20000.0)),
        ControlSpec::new("Gain", 0.25, ControlRange::new(-36.0, 36.0)),
    ];

    #[test]
    fn test_bank_starts_at_defaults() {
        let bank = ControlBank::from_specs(&SPECS);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.get(0), 0.5);
        assert_eq!(bank.get(1), 0.25);
    }

    #[test]
    fn test_set_clamps_to_unit_interval() {
        let bank = ControlBank::from_specs(&SPECS);
        bank.set(0, 1.5);
        assert_eq!(bank.get(0), 1.0);
        bank.set(0, -0.1);
        assert_eq!(bank.get(0), 0.0);
        bank.reset_to_defaults();
        assert_eq!(bank.values(), vec![0.5, 0.25]);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_index_panics() {
        let bank = ControlBank::from_specs(&SPECS);
        bank.set(2, 0.5);
    }

    #[test]
    fn test_linear_mapping() {
        let range = ControlRange::new(-36.0, 36.0);
        assert_eq!(range.map_linear(0.5), 0.0);
        assert_eq!(range.normalize_linear(36.0), 1.0);
        assert_eq!(ControlRange::new(1.0, 1.0).normalize_linear(1.0), 0.0);
    }

    #[test]
    fn test_log_mapping_roundtrip() {
        let range = ControlRange::new(20.0, 20000.0);
        assert!((range.map_log(0.0) - 20.0).abs() < 1e-9);
        assert!((range.map_log(1.0) - 20000.0).abs() < 1e-6);
        let n = range.normalize_log(440.0);
        assert!((range.map_log(n) - 440.0).abs() < 1e-6);
    }
}
