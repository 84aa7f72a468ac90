//! Session-wide processing parameters.

/// Parameters every stage is prepared with.
///
/// A spec is immutable for the lifetime of a prepared session. Changing any
/// field (new device, new buffer size) means calling `prepare` on every
/// stage again; buffers are sized from `block_size` and `channel_count` at
/// that point and never resized while streaming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Maximum number of frames per block.
    pub block_size: u32,
    /// Number of channels in every block.
    pub channel_count: u32,
}

impl ProcessSpec {
    /// Create a new spec.
    pub const fn new(sample_rate: f64, block_size: u32, channel_count: u32) -> Self {
        Self {
            sample_rate,
            block_size,
            channel_count,
        }
    }

    /// Block capacity in frames, as a buffer length.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_size as usize
    }

    /// Channel count, as a buffer dimension.
    #[inline]
    pub fn channels(&self) -> usize {
        self.channel_count as usize
    }

    /// Duration of one full block in milliseconds.
    pub fn block_duration_ms(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.block_size as f64 * 1000.0 / self.sample_rate
        } else {
            0.0
        }
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self::new(48000.0, 512, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_duration() {
        let spec = ProcessSpec::new(48000.0, 480, 2);
        assert!((spec.block_duration_ms() - 10.0).abs() < 1e-12);
        assert_eq!(ProcessSpec::new(0.0, 480, 2).block_duration_ms(), 0.0);
    }

    #[test]
    fn test_dimensions() {
        let spec = ProcessSpec::default();
        assert_eq!(spec.block_len(), 512);
        assert_eq!(spec.channels(), 2);
    }
}
