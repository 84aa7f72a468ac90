//! Capture analyser: fixed-size mono capture frames, level meters and a
//! windowed magnitude spectrum.
//!
//! The audio-thread half ([`CaptureAnalyser`]) downmixes every block into a
//! preallocated frame of [`CAPTURE_SIZE`] samples. Complete frames travel to
//! the UI-thread half ([`AnalyserReader`]) over a bounded channel; readers
//! hand frames back through a second channel so the audio thread never
//! allocates. When no spare frame is available the analyser keeps
//! overwriting its current one.
//!
//! Spectrum analysis happens on the reader side, where allocation is fine.

use core::f32::consts::PI;
use std::sync::Arc;

use benchtop_core::{
    Analyser, AtomicF32, AtomicF64, AudioBlock, Lifecycle, ProcessSpec, StageResult,
};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use rustfft::{FftPlanner, num_complex::Complex};

/// Samples per capture frame. Also the default snapshot hold size.
pub const CAPTURE_SIZE: usize = 4096;

/// Capture frames in circulation between the two halves.
const FRAME_POOL: usize = 4;

/// One complete mono capture.
#[derive(Debug, Clone)]
pub struct Capture {
    samples: Vec<f32>,
    sample_rate: f64,
    peak: f32,
    sum_squares: f64,
}

impl Capture {
    fn empty() -> Self {
        Self {
            samples: vec![0.0; CAPTURE_SIZE],
            sample_rate: 0.0,
            peak: 0.0,
            sum_squares: 0.0,
        }
    }

    /// Captured samples, oldest first.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate the frame was captured at.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Largest absolute sample.
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Root mean square over the whole frame.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        (self.sum_squares / self.samples.len() as f64).sqrt() as f32
    }

    /// Hann-windowed magnitude spectrum of the frame.
    pub fn spectrum(&self) -> Spectrum {
        Spectrum::analyse(&self.samples, self.sample_rate)
    }
}

/// Magnitude spectrum from DC to Nyquist.
#[derive(Debug, Clone)]
pub struct Spectrum {
    magnitudes: Vec<f32>,
    bin_width: f64,
}

impl Spectrum {
    /// Hann-windowed FFT magnitudes of `signal`, scaled so a full-scale sine
    /// centred on a bin reads close to 1.0.
    pub fn analyse(signal: &[f32], sample_rate: f64) -> Self {
        let n = signal.len();
        if n == 0 {
            return Self {
                magnitudes: Vec::new(),
                bin_width: 0.0,
            };
        }

        let mut buffer: Vec<Complex<f32>> = signal
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let w = 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos());
                Complex::new(x * w, 0.0)
            })
            .collect();

        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(n).process(&mut buffer);

        // Hann coherent gain is 0.5, single-sided doubles the energy.
        let scale = 4.0 / n as f32;
        let magnitudes = buffer[..=n / 2].iter().map(|c| c.norm() * scale).collect();

        Self {
            magnitudes,
            bin_width: sample_rate / n as f64,
        }
    }

    /// Bin magnitudes, index 0 is DC.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Frequency spacing between bins in Hz.
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Centre frequency of `bin` in Hz.
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.bin_width
    }

    /// Strongest non-DC bin and its magnitude.
    pub fn peak_bin(&self) -> Option<(usize, f32)> {
        self.magnitudes
            .iter()
            .copied()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Frequency of the strongest non-DC bin.
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.peak_bin().map(|(bin, _)| self.bin_frequency(bin))
    }
}

/// Per-block meters, readable at any time.
#[derive(Debug, Default)]
struct Meters {
    peak: AtomicF32,
    rms: AtomicF32,
    sample_rate: AtomicF64,
}

/// Audio-thread half of the capture analyser.
#[derive(Debug)]
pub struct CaptureAnalyser {
    frame: Option<Capture>,
    write_pos: usize,
    sample_rate: f64,
    meters: Arc<Meters>,
    full_tx: Sender<Capture>,
    spare_rx: Receiver<Capture>,
}

/// UI-thread half of the capture analyser.
#[derive(Debug, Clone)]
pub struct AnalyserReader {
    meters: Arc<Meters>,
    full_rx: Receiver<Capture>,
    spare_tx: Sender<Capture>,
}

impl CaptureAnalyser {
    /// Create both halves with a preallocated frame pool.
    pub fn new() -> (Self, AnalyserReader) {
        let (full_tx, full_rx) = bounded(FRAME_POOL);
        let (spare_tx, spare_rx) = bounded(FRAME_POOL);
        for _ in 1..FRAME_POOL {
            let _ = spare_tx.try_send(Capture::empty());
        }
        let meters = Arc::new(Meters::default());
        let analyser = Self {
            frame: Some(Capture::empty()),
            write_pos: 0,
            sample_rate: 0.0,
            meters: Arc::clone(&meters),
            full_tx,
            spare_rx,
        };
        let reader = AnalyserReader {
            meters,
            full_rx,
            spare_tx,
        };
        (analyser, reader)
    }

    fn restart_frame(&mut self) {
        self.write_pos = 0;
        if self.frame.is_none() {
            self.frame = self.spare_rx.try_recv().ok();
        }
        if let Some(frame) = self.frame.as_mut() {
            frame.peak = 0.0;
            frame.sum_squares = 0.0;
            frame.sample_rate = self.sample_rate;
        }
    }

    fn push(&mut self, sample: f32) {
        if self.frame.is_none() {
            self.restart_frame();
        }
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        frame.samples[self.write_pos] = sample;
        frame.peak = frame.peak.max(sample.abs());
        frame.sum_squares += f64::from(sample) * f64::from(sample);
        self.write_pos += 1;

        if self.write_pos == CAPTURE_SIZE {
            if let Some(full) = self.frame.take() {
                match self.full_tx.try_send(full) {
                    Ok(()) => {}
                    Err(TrySendError::Full(full) | TrySendError::Disconnected(full)) => {
                        self.frame = Some(full);
                    }
                }
            }
            self.restart_frame();
        }
    }
}

impl Lifecycle for CaptureAnalyser {
    fn prepare(&mut self, spec: &ProcessSpec) -> StageResult {
        self.sample_rate = spec.sample_rate;
        self.meters.sample_rate.store(spec.sample_rate);
        self.restart_frame();
        Ok(())
    }

    /// Discards the partial frame so the next capture starts at the next block.
    fn reset(&mut self) -> StageResult {
        self.meters.peak.store(0.0);
        self.meters.rms.store(0.0);
        self.restart_frame();
        Ok(())
    }
}

impl Analyser for CaptureAnalyser {
    fn analyse(&mut self, block: &AudioBlock<'_>) -> StageResult {
        let channels = block.num_channels();
        if channels == 0 || block.is_empty() {
            return Ok(());
        }
        let scale = 1.0 / channels as f32;

        let mut peak = 0.0_f32;
        let mut sum_squares = 0.0_f64;
        for frame in 0..block.num_samples() {
            let mono = (0..channels).map(|ch| block.channel(ch)[frame]).sum::<f32>() * scale;
            peak = peak.max(mono.abs());
            sum_squares += f64::from(mono) * f64::from(mono);
            self.push(mono);
        }

        self.meters.peak.store(peak);
        self.meters
            .rms
            .store((sum_squares / block.num_samples() as f64).sqrt() as f32);
        Ok(())
    }
}

impl AnalyserReader {
    /// Peak of the most recent block.
    pub fn peak(&self) -> f32 {
        self.meters.peak.load()
    }

    /// RMS of the most recent block.
    pub fn rms(&self) -> f32 {
        self.meters.rms.load()
    }

    /// Sample rate of the last `prepare`.
    pub fn sample_rate(&self) -> f64 {
        self.meters.sample_rate.load()
    }

    /// Oldest complete capture, if any.
    pub fn try_next(&self) -> Option<Capture> {
        self.full_rx.try_recv().ok()
    }

    /// Newest complete capture, recycling any older ones.
    pub fn latest(&self) -> Option<Capture> {
        let mut latest = None;
        while let Ok(capture) = self.full_rx.try_recv() {
            if let Some(older) = latest.replace(capture) {
                self.recycle(older);
            }
        }
        latest
    }

    /// Hand a capture's storage back to the analyser.
    pub fn recycle(&self, capture: Capture) {
        let _ = self.spare_tx.try_send(capture);
    }

    /// Drop every pending capture back into the pool.
    pub fn discard_pending(&self) {
        while let Ok(capture) = self.full_rx.try_recv() {
            self.recycle(capture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared() -> (CaptureAnalyser, AnalyserReader) {
        let (mut analyser, reader) = CaptureAnalyser::new();
        analyser.prepare(&ProcessSpec::new(48000.0, 512, 2)).unwrap();
        (analyser, reader)
    }

    fn feed(analyser: &mut CaptureAnalyser, value: f32, blocks: usize) {
        let mut data = vec![value; 2 * 512];
        let block = AudioBlock::new(&mut data, 2, 512, 512);
        for _ in 0..blocks {
            analyser.analyse(&block).unwrap();
        }
    }

    #[test]
    fn test_frame_completes_after_capture_size() {
        let (mut analyser, reader) = prepared();
        feed(&mut analyser, 0.5, CAPTURE_SIZE / 512 - 1);
        assert!(reader.try_next().is_none());

        feed(&mut analyser, 0.5, 1);
        let capture = reader.try_next().unwrap();
        assert_eq!(capture.samples().len(), CAPTURE_SIZE);
        assert_eq!(capture.peak(), 0.5);
        assert!((capture.rms() - 0.5).abs() < 1e-6);
        assert_eq!(capture.sample_rate(), 48000.0);
        assert_eq!(reader.peak(), 0.5);
    }

    #[test]
    fn test_channels_are_averaged() {
        let (mut analyser, reader) = prepared();
        let mut data = vec![0.0; 2 * 4];
        data[..4].fill(1.0);
        analyser.analyse(&AudioBlock::new(&mut data, 2, 4, 4)).unwrap();
        assert_eq!(reader.peak(), 0.5);
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let (mut analyser, reader) = prepared();
        feed(&mut analyser, 1.0, 4);
        analyser.reset().unwrap();
        assert_eq!(reader.peak(), 0.0);
        feed(&mut analyser, 0.25, CAPTURE_SIZE / 512);
        let capture = reader.latest().unwrap();
        assert_eq!(capture.peak(), 0.25);
    }

    #[test]
    fn test_stalled_reader_never_starves_analyser() {
        let (mut analyser, reader) = prepared();
        feed(&mut analyser, 0.1, (FRAME_POOL + 3) * CAPTURE_SIZE / 512);
        let mut received = 0;
        while let Some(capture) = reader.try_next() {
            received += 1;
            reader.recycle(capture);
        }
        assert_eq!(received, FRAME_POOL);
        feed(&mut analyser, 0.2, CAPTURE_SIZE / 512);
        assert_eq!(reader.latest().unwrap().peak(), 0.2);
    }

    #[test]
    fn test_spectrum_finds_sine() {
        let sample_rate = 48000.0;
        let bin_width = sample_rate / CAPTURE_SIZE as f64;
        let frequency = 100.0 * bin_width;
        let signal: Vec<f32> = (0..CAPTURE_SIZE)
            .map(|i| (2.0 * std::f64::consts::PI * frequency * i as f64 / sample_rate).sin() as f32)
            .collect();

        let spectrum = Spectrum::analyse(&signal, sample_rate);
        assert_eq!(spectrum.magnitudes().len(), CAPTURE_SIZE / 2 + 1);
        let (bin, magnitude) = spectrum.peak_bin().unwrap();
        assert_eq!(bin, 100);
        assert!((magnitude - 1.0).abs() < 0.01, "magnitude {magnitude}");
        assert!((spectrum.dominant_frequency().unwrap() - frequency).abs() < 1e-9);
    }

    #[test]
    fn test_empty_spectrum() {
        let spectrum = Spectrum::analyse(&[], 48000.0);
        assert!(spectrum.peak_bin().is_none());
    }
}
