//! Second-order IIR section for the EQ processors.
//!
//! Coefficient calculation uses the RBJ Audio EQ Cookbook formulas.

use core::f32::consts::PI;
use libm::{cosf, powf, sinf};

/// Direct Form I biquad:
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Creates a pass-through section (`y[n] = x[n]`).
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Sets the coefficients, normalizing by `a0`.
    pub fn set_coefficients(&mut self, coefficients: Coefficients) {
        let Coefficients { b0, b1, b2, a0, a1, a2 } = coefficients;
        let a0_inv = 1.0 / a0;
        self.b0 = b0 * a0_inv;
        self.b1 = b1 * a0_inv;
        self.b2 = b2 * a0_inv;
        self.a1 = a1 * a0_inv;
        self.a2 = a2 * a0_inv;
    }

    /// Processes one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Processes a slice in place.
    #[inline]
    pub fn process_slice(&mut self, samples: &mut [f32]) {
        for sample in samples {
            *sample = self.process(*sample);
        }
    }

    /// Clears the delay lines, keeping the coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

/// Unnormalized biquad coefficients as produced by the cookbook formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct Coefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a0: f32,
    pub a1: f32,
    pub a2: f32,
}

/// Peaking EQ coefficients.
///
/// * `frequency` - Center frequency in Hz
/// * `q` - Q factor (bandwidth)
/// * `gain_db` - Boost or cut at the center, in dB
/// * `sample_rate` - Sample rate in Hz
pub fn peaking_eq_coefficients(frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Coefficients {
    let a = powf(10.0, gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    let alpha = sin_omega / (2.0 * q);

    Coefficients {
        b0: 1.0 + alpha * a,
        b1: -2.0 * cos_omega,
        b2: 1.0 - alpha * a,
        a0: 1.0 + alpha / a,
        a1: -2.0 * cos_omega,
        a2: 1.0 - alpha / a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biquad_passthrough() {
        let mut biquad = Biquad::new();
        for &x in &[1.0, -0.5, 0.25, 0.0] {
            assert_eq!(biquad.process(x), x);
        }
    }

    #[test]
    fn test_zero_gain_peak_is_transparent() {
        let mut biquad = Biquad::new();
        biquad.set_coefficients(peaking_eq_coefficients(1000.0, 0.707, 0.0, 48000.0));
        for i in 0..256 {
            let x = libm::sinf(i as f32 * 0.1);
            assert!((biquad.process(x) - x).abs() < 1e-5);
        }
    }

    #[test]
    fn test_clear_keeps_coefficients() {
        let mut biquad = Biquad::new();
        biquad.set_coefficients(peaking_eq_coefficients(1000.0, 0.707, 12.0, 48000.0));
        let first = biquad.process(1.0);
        biquad.process(0.5);
        biquad.clear();
        assert_eq!(biquad.process(1.0), first);
    }
}
