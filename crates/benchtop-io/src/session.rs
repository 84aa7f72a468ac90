//! cpal implementation of [`DeviceSession`].
//!
//! A [`CpalSession`] is either closed, holding the bench, or open, with the
//! bench moved into the output callback's [`BlockAdapter`]. Opening prepares
//! the bench for the device's channel layout and the configured rate and
//! block size, then starts an optional input stream feeding a lock-free
//! sample queue and the output stream driving the bench. The bench gets as
//! many lanes as the wider of the two layouts.

use std::time::Duration;

use benchtop_core::{Bench, DeviceError, DeviceSession, ProcessSpec};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Host, Stream};
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::adapter::BlockAdapter;
use crate::devices::{device_name, find_input_device, find_output_device};
use crate::{Error, Result};

/// How long `close_device` waits for the audio callback to hand the bench back.
const BENCH_RETURN_TIMEOUT: Duration = Duration::from_secs(2);

/// Device blocks of input buffered between the input and output callbacks.
const INPUT_QUEUE_BLOCKS: usize = 8;

/// Device selection and stream parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Input device name filter (default device if `None`).
    pub input_device: Option<String>,
    /// Output device name filter (default device if `None`).
    pub output_device: Option<String>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Block size in frames, also the fixed device buffer size requested.
    pub buffer_size: u32,
    /// Skip the input stream entirely.
    pub output_only: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: 48000,
            buffer_size: 512,
            output_only: false,
        }
    }
}

struct OpenStreams {
    // Field order is drop order: output first so the bench stops before input.
    output: Stream,
    _input: Option<Stream>,
    input_channels: u32,
    output_channels: u32,
    output_name: String,
}

/// Duplex cpal device driving a [`Bench`].
pub struct CpalSession {
    host: Host,
    config: SessionConfig,
    bench: Option<Box<Bench>>,
    home_tx: Sender<Box<Bench>>,
    home_rx: Receiver<Box<Bench>>,
    streams: Option<OpenStreams>,
}

impl CpalSession {
    /// Session over `bench`, closed.
    pub fn new(config: SessionConfig, bench: Bench) -> Self {
        let (home_tx, home_rx) = bounded(1);
        Self {
            host: cpal::default_host(),
            config,
            bench: Some(Box::new(bench)),
            home_tx,
            home_rx,
            streams: None,
        }
    }

    /// Session over `bench`, already streaming.
    pub fn open(config: SessionConfig, bench: Bench) -> std::result::Result<Self, DeviceError> {
        let mut session = Self::new(config, bench);
        session.restart_last_device()?;
        Ok(session)
    }

    /// The configuration the next restart uses.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect on the next restart.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// Name of the output device while streaming.
    pub fn output_device_name(&self) -> Option<&str> {
        self.streams.as_ref().map(|s| s.output_name.as_str())
    }

    fn start(&mut self, mut bench: Box<Bench>) -> std::result::Result<(), DeviceError> {
        let output_device = match find_output_device(&self.host, self.config.output_device.as_deref()) {
            Ok(device) => device,
            Err(e) => {
                self.bench = Some(bench);
                return Err(e.into());
            }
        };
        let input_device = if self.config.output_only {
            None
        } else {
            match find_input_device(&self.host, self.config.input_device.as_deref()) {
                Ok(device) => device,
                Err(e) => {
                    self.bench = Some(bench);
                    return Err(e.into());
                }
            }
        };

        let output_channels = match output_device.default_output_config() {
            Ok(c) => c.channels(),
            Err(e) => {
                self.bench = Some(bench);
                return Err(Error::UnsupportedConfig(e.to_string()).into());
            }
        };
        let input_channels = input_device
            .as_ref()
            .and_then(|d| d.default_input_config().ok())
            .map_or(0, |c| c.channels());

        let spec = ProcessSpec::new(
            f64::from(self.config.sample_rate),
            self.config.buffer_size,
            u32::from(input_channels.max(output_channels)),
        );
        if let Err(e) = bench.prepare(&spec) {
            self.bench = Some(bench);
            return Err(e.into());
        }

        let (input_stream, input_rx) = match input_device {
            Some(device) if input_channels > 0 => {
                match self.build_input(&device, input_channels) {
                    Ok((stream, rx)) => (Some(stream), Some(rx)),
                    Err(e) => {
                        self.bench = Some(bench);
                        return Err(e.into());
                    }
                }
            }
            _ => (None, None),
        };

        let adapter = BlockAdapter::new(
            bench,
            &spec,
            input_rx,
            u32::from(input_channels),
            u32::from(output_channels),
            self.home_tx.clone(),
        );
        let output_stream = match self.build_output(&output_device, output_channels, adapter) {
            Ok(stream) => stream,
            Err(e) => {
                // The callback, and the adapter with it, is gone.
                self.bench = self.home_rx.recv_timeout(BENCH_RETURN_TIMEOUT).ok();
                return Err(e.into());
            }
        };

        let output_name = device_name(&output_device).unwrap_or_else(|_| "unknown".into());
        tracing::info!(
            device = %output_name,
            sample_rate = self.config.sample_rate,
            block_size = self.config.buffer_size,
            input_channels,
            output_channels,
            "device opened"
        );
        self.streams = Some(OpenStreams {
            output: output_stream,
            _input: input_stream,
            input_channels: u32::from(input_channels),
            output_channels: u32::from(output_channels),
            output_name,
        });
        Ok(())
    }

    fn stream_config(&self, channels: u16) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels,
            sample_rate: self.config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(self.config.buffer_size),
        }
    }

    fn build_input(&self, device: &cpal::Device, channels: u16) -> Result<(Stream, Receiver<f32>)> {
        let capacity = self.config.buffer_size as usize * usize::from(channels) * INPUT_QUEUE_BLOCKS;
        let (tx, rx) = bounded::<f32>(capacity);
        let stream = device
            .build_input_stream(
                &self.stream_config(channels),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    push_whole_frames(&tx, data, usize::from(channels));
                },
                |err| tracing::error!(error = %err, "input stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;
        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        Ok((stream, rx))
    }

    fn build_output(
        &self,
        device: &cpal::Device,
        channels: u16,
        mut adapter: BlockAdapter,
    ) -> Result<Stream> {
        let stream = device
            .build_output_stream(
                &self.stream_config(channels),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    adapter.render(data);
                },
                |err| tracing::error!(error = %err, "output stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;
        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        Ok(stream)
    }
}

/// Queue as many whole frames of `data` as fit, dropping the rest.
///
/// Only called from the input callback, the single producer, so the free
/// space measured up front can only grow before the sends complete.
fn push_whole_frames(tx: &Sender<f32>, data: &[f32], channels: usize) {
    if channels == 0 {
        return;
    }
    let free = tx.capacity().unwrap_or(usize::MAX).saturating_sub(tx.len());
    let samples = data.len().min(free) / channels * channels;
    for &sample in &data[..samples] {
        if tx.try_send(sample).is_err() {
            break;
        }
    }
}

impl DeviceSession for CpalSession {
    fn current_active_input_channel_count(&self) -> u32 {
        self.streams.as_ref().map_or(0, |s| s.input_channels)
    }

    fn current_active_output_channel_count(&self) -> u32 {
        self.streams.as_ref().map_or(0, |s| s.output_channels)
    }

    fn close_device(&mut self) -> std::result::Result<(), DeviceError> {
        let Some(streams) = self.streams.take() else {
            return Ok(());
        };
        let _ = streams.output.pause();
        drop(streams);

        match self.home_rx.recv_timeout(BENCH_RETURN_TIMEOUT) {
            Ok(bench) => {
                self.bench = Some(bench);
                tracing::info!("device closed");
                Ok(())
            }
            Err(_) => {
                tracing::error!("device closed but the bench was not returned");
                Err(DeviceError::BenchLost)
            }
        }
    }

    fn restart_last_device(&mut self) -> std::result::Result<(), DeviceError> {
        if self.streams.is_some() {
            return Ok(());
        }
        let bench = self.bench.take().ok_or(DeviceError::BenchLost)?;
        self.start(bench)
    }

    fn is_open(&self) -> bool {
        self.streams.is_some()
    }

    fn bench_mut(&mut self) -> Option<&mut Bench> {
        if self.streams.is_some() {
            None
        } else {
            self.bench.as_deref_mut()
        }
    }
}

impl Drop for CpalSession {
    fn drop(&mut self) {
        let _ = self.close_device();
    }
}

impl std::fmt::Debug for CpalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalSession")
            .field("config", &self.config)
            .field("open", &self.streams.is_some())
            .field("bench_parked", &self.bench.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_whole_frames_only() {
        let (tx, rx) = bounded::<f32>(5);
        push_whole_frames(&tx, &[1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 2);
        assert_eq!(rx.len(), 4);

        tx.send(0.0).unwrap();
        push_whole_frames(&tx, &[4.0, -4.0], 2);
        assert_eq!(rx.len(), 5);

        let queued: Vec<f32> = rx.try_iter().collect();
        assert_eq!(queued, [1.0, -1.0, 2.0, -2.0, 0.0]);
    }

    #[test]
    fn test_push_without_channels_is_noop() {
        let (tx, rx) = bounded::<f32>(4);
        push_whole_frames(&tx, &[1.0, 2.0], 0);
        assert!(rx.is_empty());
    }
}
