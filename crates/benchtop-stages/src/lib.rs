//! Concrete stages for the benchtop DSP test bench.
//!
//! `benchtop-core` defines what a source, analyser, monitor and
//! processor-under-test must do; this crate provides the ones the bench ships
//! with:
//!
//! - [`SignalSource`]: sine, white noise, impulse train, silence, or the
//!   device input, with snapshot rewind
//! - [`CaptureAnalyser`] / [`AnalyserReader`]: 4096-sample capture frames,
//!   peak/RMS meters and a Hann-windowed magnitude [`Spectrum`]
//! - [`GainMonitor`]: output gain plus a hard limiter
//! - [`Gain`] and [`ParametricEq`]: processors-under-test
//! - [`ProcessorRegistry`]: processor lookup by id
//!
//! # Example
//!
//! ```rust
//! use benchtop_core::{BenchBuilder, SlotId, close_channel};
//! use benchtop_stages::{
//!     CaptureAnalyser, GainMonitor, ProcessorRegistry, SignalSource, Waveform,
//! };
//!
//! let registry = ProcessorRegistry::new();
//! let (analyser, _reader) = CaptureAnalyser::new();
//! let (requester, _signal) = close_channel();
//!
//! let bench = BenchBuilder::new(
//!     Box::new(SignalSource::new(Waveform::Sine)),
//!     Box::new(SignalSource::new(Waveform::WhiteNoise)),
//!     Box::new(analyser),
//!     Box::new(GainMonitor::new()),
//! )
//! .processor(SlotId::A, registry.create("peq").unwrap())
//! .build(requester);
//!
//! assert_eq!(bench.handle().processor(SlotId::A).name(), "PEQ");
//! ```

pub mod analyser;
pub mod biquad;
pub mod monitor;
pub mod processors;
pub mod registry;
pub mod source;

pub use analyser::{AnalyserReader, CAPTURE_SIZE, Capture, CaptureAnalyser, Spectrum};
pub use biquad::{Biquad, Coefficients, peaking_eq_coefficients};
pub use monitor::{GainMonitor, MonitorGain, db_to_linear, linear_to_db};
pub use processors::{Gain, ParametricEq};
pub use registry::{ProcessorDescriptor, ProcessorRegistry};
pub use source::{SignalSource, SourceControls, Waveform};
