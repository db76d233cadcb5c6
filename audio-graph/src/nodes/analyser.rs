use std::f32::consts::PI;
use std::sync::Arc;

use parking_lot::Mutex;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::node::{Processor, QUANTUM, Quantum, RenderScope};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    /// Power of two in 32..=32768.
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self { fft_size: 256, smoothing: 0.8, min_decibels: -100.0, max_decibels: -30.0 }
    }
}

impl AnalyserOptions {
    pub(crate) fn sanitized(mut self) -> Self {
        self.fft_size = self.fft_size.clamp(32, 32_768).next_power_of_two();
        self.smoothing = self.smoothing.clamp(0.0, 1.0);
        if self.max_decibels <= self.min_decibels {
            self.max_decibels = self.min_decibels + 1.0;
        }
        self
    }
}

/// Ring of the most recent mono samples written by the render thread.
pub(crate) struct AnalyserTap {
    samples: Vec<f32>,
    write: usize,
}

impl AnalyserTap {
    pub(crate) fn new(size: usize) -> Self {
        Self { samples: vec![0.0; size], write: 0 }
    }

    fn push(&mut self, s: f32) {
        self.samples[self.write] = s;
        self.write = (self.write + 1) % self.samples.len();
    }

    /// Oldest-first copy of the ring.
    fn copy_ordered(&self, out: &mut [f32]) {
        let (newer, older) = self.samples.split_at(self.write);
        out[..older.len()].copy_from_slice(older);
        out[older.len()..].copy_from_slice(newer);
    }
}

/// Passes audio through and records it for the control side.
pub(crate) struct AnalyserProcessor {
    tap: Arc<Mutex<AnalyserTap>>,
}

impl AnalyserProcessor {
    pub(crate) fn new(tap: Arc<Mutex<AnalyserTap>>) -> Self {
        Self { tap }
    }
}

impl Processor for AnalyserProcessor {
    fn process(&mut self, input: &Quantum, output: &mut Quantum, _scope: &RenderScope<'_>) {
        output.copy_from(input);
        // never block the render thread on a reader
        if let Some(mut tap) = self.tap.try_lock() {
            for i in 0..QUANTUM {
                tap.push((input.channels[0][i] + input.channels[1][i]) * 0.5);
            }
        }
    }
}

/// Control-side half of an analyser: windowing, FFT and smoothing.
pub(crate) struct AnalyserState {
    tap: Arc<Mutex<AnalyserTap>>,
    opts: AnalyserOptions,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl AnalyserState {
    pub(crate) fn new(opts: AnalyserOptions) -> (Self, Arc<Mutex<AnalyserTap>>) {
        let opts = opts.sanitized();
        let n = opts.fft_size;
        let tap = Arc::new(Mutex::new(AnalyserTap::new(n)));
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(n);
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let state = Self {
            tap: tap.clone(),
            opts,
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            window,
            frame: vec![0.0; n],
            smoothed: vec![0.0; n / 2],
        };
        (state, tap)
    }

    pub(crate) fn bin_count(&self) -> usize {
        self.opts.fft_size / 2
    }

    /// Fills `out` with smoothed magnitudes mapped onto 0..=255. Each call
    /// advances the smoothing state by one step.
    pub(crate) fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.tap.lock().copy_ordered(&mut self.frame);
        for (s, w) in self.frame.iter_mut().zip(self.window.iter()) {
            *s *= *w;
        }
        if let Err(e) = self.fft.process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch) {
            tracing::debug!(error = %e, "analyser fft failed");
            out.fill(0);
            return;
        }
        let n = self.opts.fft_size as f32;
        let tau = self.opts.smoothing;
        let range = self.opts.max_decibels - self.opts.min_decibels;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let mag = self.spectrum[k].norm() / n;
            let next = tau * *smoothed + (1.0 - tau) * mag;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }
        for (byte, mag) in out.iter_mut().zip(self.smoothed.iter()) {
            let db = 20.0 * mag.max(1e-20).log10();
            let scaled = 255.0 / range * (db - self.opts.min_decibels);
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}
