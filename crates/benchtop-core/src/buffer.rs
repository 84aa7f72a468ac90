//! Planar sample storage and non-owning block views.
//!
//! [`AudioBuffer`] owns `channels × capacity` contiguous samples, one lane
//! per channel. It is allocated when a session is prepared and only its
//! active length changes afterwards. [`AudioBlock`] is the view every stage
//! processes in place.
//!
//! Passing more frames than a buffer's capacity is a contract violation:
//! it trips a `debug_assert!` and, in release builds, the next lane access
//! panics on its slice bounds. Nothing is truncated or resized to make it fit.

/// Planar multichannel sample storage.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: usize,
    capacity: usize,
    len: usize,
}

impl AudioBuffer {
    /// Allocate a zeroed buffer of `channels` lanes holding `capacity` frames.
    ///
    /// The active length starts at `capacity`.
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; channels * capacity],
            channels,
            capacity,
            len: capacity,
        }
    }

    /// Allocate a buffer sized for `spec`.
    pub fn for_spec(spec: &crate::ProcessSpec) -> Self {
        Self::new(spec.channels(), spec.block_len())
    }

    /// Number of channel lanes.
    pub fn num_channels(&self) -> usize {
        self.channels
    }

    /// Maximum frames per lane.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Active frames per lane.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the active length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the number of active frames for the next block.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(
            len <= self.capacity,
            "block of {len} frames exceeds prepared capacity of {}",
            self.capacity
        );
        self.len = len;
    }

    /// Zero every lane over the whole capacity.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Borrow the active region as a block.
    #[inline]
    pub fn block(&mut self) -> AudioBlock<'_> {
        AudioBlock::new(&mut self.data, self.channels, self.capacity, self.len)
    }
}

/// Non-owning view over `channels` lanes of `len` samples.
///
/// Lanes start `stride` samples apart in the underlying slice, so a block
/// over a partially filled [`AudioBuffer`] skips the unused tail of each lane.
#[derive(Debug)]
pub struct AudioBlock<'a> {
    data: &'a mut [f32],
    channels: usize,
    stride: usize,
    len: usize,
}

impl<'a> AudioBlock<'a> {
    /// Create a view over `data`.
    ///
    /// `data` must hold at least `channels * stride` samples and `len` must
    /// not exceed `stride`.
    pub fn new(data: &'a mut [f32], channels: usize, stride: usize, len: usize) -> Self {
        debug_assert!(len <= stride, "block length {len} exceeds lane stride {stride}");
        debug_assert!(
            data.len() >= channels * stride,
            "{} samples cannot hold {channels} lanes of {stride}",
            data.len()
        );
        Self {
            data,
            channels,
            stride,
            len,
        }
    }

    /// Single-channel view over a whole slice.
    pub fn from_mono(data: &'a mut [f32]) -> Self {
        let len = data.len();
        Self::new(data, 1, len, len)
    }

    /// Reborrow with a shorter lifetime.
    #[inline]
    pub fn reborrow(&mut self) -> AudioBlock<'_> {
        AudioBlock {
            data: &mut *self.data,
            channels: self.channels,
            stride: self.stride,
            len: self.len,
        }
    }

    /// Number of channel lanes.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels
    }

    /// Frames per lane.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.len
    }

    /// Returns true if the block holds no frames.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples of one channel.
    #[inline]
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.stride;
        &self.data[start..start + self.len]
    }

    /// Mutable samples of one channel.
    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.stride;
        &mut self.data[start..start + self.len]
    }

    /// Write silence into every lane.
    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Write `value` into every sample.
    pub fn fill(&mut self, value: f32) {
        for ch in 0..self.channels {
            self.channel_mut(ch).fill(value);
        }
    }

    /// Copy `src` into this block.
    ///
    /// Both blocks must have the same shape.
    pub fn copy_from(&mut self, src: &AudioBlock<'_>) {
        self.debug_assert_same_shape(src);
        for ch in 0..self.channels {
            self.channel_mut(ch).copy_from_slice(src.channel(ch));
        }
    }

    /// Add `src` sample-by-sample into this block.
    pub fn add_from(&mut self, src: &AudioBlock<'_>) {
        self.debug_assert_same_shape(src);
        for ch in 0..self.channels {
            for (dst, s) in self.channel_mut(ch).iter_mut().zip(src.channel(ch)) {
                *dst += *s;
            }
        }
    }

    /// Scale every sample by `gain`.
    pub fn multiply_by(&mut self, gain: f32) {
        for ch in 0..self.channels {
            for sample in self.channel_mut(ch) {
                *sample *= gain;
            }
        }
    }

    /// Copy lane 0 into every other lane.
    pub fn spread_first_channel(&mut self) {
        if self.channels < 2 {
            return;
        }
        let (first, rest) = self.data.split_at_mut(self.stride);
        let first = &first[..self.len];
        for lane in rest.chunks_mut(self.stride).take(self.channels - 1) {
            lane[..self.len].copy_from_slice(first);
        }
    }

    /// Largest absolute sample across all lanes.
    pub fn max_abs(&self) -> f32 {
        (0..self.channels)
            .flat_map(|ch| self.channel(ch).iter())
            .fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// Fill this block from interleaved samples.
    ///
    /// Lanes beyond `src_channels` are silenced; source channels beyond this
    /// block's lane count are dropped.
    pub fn read_interleaved(&mut self, src: &[f32], src_channels: usize) {
        if src_channels == 0 {
            self.clear();
            return;
        }
        debug_assert!(src.len() >= self.len * src_channels);
        for ch in 0..self.channels {
            let lane = self.channel_mut(ch);
            if ch < src_channels {
                for (frame, sample) in lane.iter_mut().enumerate() {
                    *sample = src[frame * src_channels + ch];
                }
            } else {
                lane.fill(0.0);
            }
        }
    }

    /// Write this block into an interleaved buffer.
    ///
    /// Destination channels beyond this block's lane count are silenced.
    pub fn write_interleaved(&self, dst: &mut [f32], dst_channels: usize) {
        if dst_channels == 0 {
            return;
        }
        debug_assert!(dst.len() >= self.len * dst_channels);
        for (frame, out) in dst.chunks_exact_mut(dst_channels).take(self.len).enumerate() {
            for (ch, sample) in out.iter_mut().enumerate() {
                *sample = if ch < self.channels {
                    self.channel(ch)[frame]
                } else {
                    0.0
                };
            }
        }
    }

    #[inline]
    fn debug_assert_same_shape(&self, other: &AudioBlock<'_>) {
        debug_assert_eq!(self.len, other.len, "block lengths differ");
        debug_assert_eq!(self.channels, other.channels, "block channel counts differ");
    }
}
