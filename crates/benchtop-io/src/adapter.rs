//! Output-callback adapter between the device and the bench.
//!
//! Devices deliver interleaved buffers of whatever length they like; the
//! bench wants planar blocks no larger than its prepared block size. The
//! adapter chunks each device buffer, pulls matching input frames from the
//! input stream's queue, runs the bench on each chunk in place and writes the
//! result back interleaved.
//!
//! The bench is prepared for the wider of the input and output layouts. Input
//! is consumed in whole chunks only: a chunk whose frames have not all
//! arrived reads as silence and leaves the queue untouched, so the channel
//! interleaving never slips.
//!
//! The adapter owns the bench while the device streams. When the stream is
//! torn down the callback, and with it the adapter, is dropped and the bench
//! travels back to the session over the `home` channel.

use benchtop_core::{AudioBuffer, Bench, ProcessSpec};
use crossbeam_channel::{Receiver, Sender};

/// Drives a [`Bench`] from an interleaved output callback.
pub struct BlockAdapter {
    bench: Option<Box<Bench>>,
    io: AudioBuffer,
    input: Option<Receiver<f32>>,
    input_scratch: Vec<f32>,
    input_channels: usize,
    bench_channels: usize,
    output_channels: usize,
    home: Sender<Box<Bench>>,
}

impl BlockAdapter {
    /// Adapter for a bench prepared with `spec`.
    ///
    /// `input` carries interleaved samples of `input_channels` channels, or
    /// is `None` when the device has no input. The producer must push whole
    /// frames. Device buffers are interleaved over `output_channels`.
    /// `spec.channel_count` should cover both layouts; input lanes beyond it
    /// are dropped and output lanes beyond it are silenced.
    pub fn new(
        bench: Box<Bench>,
        spec: &ProcessSpec,
        input: Option<Receiver<f32>>,
        input_channels: u32,
        output_channels: u32,
        home: Sender<Box<Bench>>,
    ) -> Self {
        let input_channels = if input.is_some() { input_channels as usize } else { 0 };
        Self {
            bench: Some(bench),
            io: AudioBuffer::for_spec(spec),
            input,
            input_scratch: vec![0.0; spec.block_len() * input_channels],
            input_channels,
            bench_channels: spec.channels(),
            output_channels: output_channels as usize,
            home,
        }
    }

    /// Fill one interleaved device buffer.
    ///
    /// A chunk whose input has not fully arrived reads silence. Stage
    /// failures have already silenced the chunk and been counted by the
    /// bench.
    pub fn render(&mut self, output: &mut [f32]) {
        let Some(bench) = self.bench.as_mut() else {
            output.fill(0.0);
            return;
        };
        if self.output_channels == 0 || self.bench_channels == 0 || self.io.capacity() == 0 {
            output.fill(0.0);
            return;
        }

        let chunk_len = self.io.capacity() * self.output_channels;
        for chunk in output.chunks_mut(chunk_len) {
            let frames = chunk.len() / self.output_channels;
            let input = &mut self.input_scratch[..frames * self.input_channels];
            match &self.input {
                // Single consumer: the queue cannot shrink under us.
                Some(rx) if rx.len() >= input.len() => {
                    for sample in input.iter_mut() {
                        *sample = rx.try_recv().unwrap_or(0.0);
                    }
                }
                _ => input.fill(0.0),
            }

            self.io.set_len(frames);
            let mut block = self.io.block();
            block.read_interleaved(input, self.input_channels);
            let _ = bench.process_block(&mut block);
            block.write_interleaved(chunk, self.output_channels);
            // Trailing samples of a partial frame.
            chunk[frames * self.output_channels..].fill(0.0);
        }
    }

    /// Take the bench back without dropping the adapter.
    pub fn take_bench(&mut self) -> Option<Box<Bench>> {
        self.bench.take()
    }
}

impl Drop for BlockAdapter {
    fn drop(&mut self) {
        if let Some(bench) = self.bench.take() {
            let _ = self.home.try_send(bench);
        }
    }
}

impl std::fmt::Debug for BlockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockAdapter")
            .field("input_channels", &self.input_channels)
            .field("bench_channels", &self.bench_channels)
            .field("output_channels", &self.output_channels)
            .field("block_capacity", &self.io.capacity())
            .finish_non_exhaustive()
    }
}
