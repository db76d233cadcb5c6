use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::buffer::AudioBuffer;
use crate::node::{Processor, QUANTUM, Quantum, RenderScope};

const FFT_LEN: usize = QUANTUM * 2;
const BINS: usize = FFT_LEN / 2 + 1;
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000125;

/// Scale that brings an impulse response to a consistent loudness.
pub(crate) fn normalization_scale(impulse: &AudioBuffer) -> f32 {
    let count = (impulse.channel_count() * impulse.frames()).max(1);
    let energy: f32 = impulse.channels().iter().flatten().map(|s| s * s).sum();
    let mut power = (energy / count as f32).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    (1.0 / power) * GAIN_CALIBRATION * GAIN_CALIBRATION_SAMPLE_RATE / impulse.sample_rate() as f32
}

struct ChannelState {
    partitions: Vec<Vec<Complex<f32>>>,
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    previous: [f32; QUANTUM],
}

/// Uniformly partitioned overlap-save convolution, one partition per quantum.
pub(crate) struct ConvolverProcessor {
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    channels: [ChannelState; 2],
    time: Vec<f32>,
    accum: Vec<Complex<f32>>,
    fwd_scratch: Vec<Complex<f32>>,
    inv_scratch: Vec<Complex<f32>>,
}

impl ConvolverProcessor {
    pub(crate) fn new(impulse: &AudioBuffer, normalize: bool) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(FFT_LEN);
        let inverse = planner.plan_fft_inverse(FFT_LEN);
        let scale = if normalize { normalization_scale(impulse) } else { 1.0 };

        let mut fwd_scratch = forward.make_scratch_vec();
        let mut time = vec![0.0f32; FFT_LEN];
        let mut build = |ch: usize| {
            let data = impulse.channel(ch);
            let count = data.len().div_ceil(QUANTUM).max(1);
            let mut partitions = Vec::with_capacity(count);
            for p in 0..count {
                time.fill(0.0);
                let start = p * QUANTUM;
                let end = (start + QUANTUM).min(data.len());
                for (dst, src) in time.iter_mut().zip(data[start.min(end)..end].iter()) {
                    *dst = *src * scale;
                }
                let mut spectrum = vec![Complex::new(0.0, 0.0); BINS];
                if forward.process_with_scratch(&mut time, &mut spectrum, &mut fwd_scratch).is_err() {
                    spectrum.fill(Complex::new(0.0, 0.0));
                }
                partitions.push(spectrum);
            }
            ChannelState {
                history: vec![vec![Complex::new(0.0, 0.0); BINS]; count],
                partitions,
                head: 0,
                previous: [0.0; QUANTUM],
            }
        };
        let channels = [build(0), build(1)];

        Self {
            inv_scratch: inverse.make_scratch_vec(),
            forward,
            inverse,
            channels,
            time,
            accum: vec![Complex::new(0.0, 0.0); BINS],
            fwd_scratch,
        }
    }
}

impl Processor for ConvolverProcessor {
    fn process(&mut self, input: &Quantum, output: &mut Quantum, _scope: &RenderScope<'_>) {
        for (c, state) in self.channels.iter_mut().enumerate() {
            let block = &input.channels[c];
            self.time[..QUANTUM].copy_from_slice(&state.previous);
            self.time[QUANTUM..].copy_from_slice(block);
            state.previous.copy_from_slice(block);

            let count = state.partitions.len();
            let head = state.head;
            if self
                .forward
                .process_with_scratch(&mut self.time, &mut state.history[head], &mut self.fwd_scratch)
                .is_err()
            {
                output.channels[c].fill(0.0);
                continue;
            }

            self.accum.fill(Complex::new(0.0, 0.0));
            for (p, h) in state.partitions.iter().enumerate() {
                let x = &state.history[(head + count - p) % count];
                for ((acc, xv), hv) in self.accum.iter_mut().zip(x.iter()).zip(h.iter()) {
                    *acc += xv * hv;
                }
            }
            // DC and Nyquist must be purely real for the inverse transform
            self.accum[0].im = 0.0;
            self.accum[BINS - 1].im = 0.0;

            if self
                .inverse
                .process_with_scratch(&mut self.accum, &mut self.time, &mut self.inv_scratch)
                .is_err()
            {
                output.channels[c].fill(0.0);
            } else {
                let norm = 1.0 / FFT_LEN as f32;
                for (dst, src) in output.channels[c].iter_mut().zip(self.time[QUANTUM..].iter()) {
                    *dst = *src * norm;
                }
            }
            state.head = (head + 1) % count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ListenerFrame;
    use crate::node::NodeId;
    use crossbeam::queue::ArrayQueue;

    fn run(proc: &mut ConvolverProcessor, input: &Quantum) -> Quantum {
        let listener = ListenerFrame::default();
        let events = ArrayQueue::new(4);
        let scope = RenderScope {
            id: NodeId::new(0, 0),
            time: 0.0,
            sample_rate: 48_000.0,
            listener: &listener,
            events: &events,
        };
        let mut out = Quantum::silent();
        proc.process(input, &mut out, &scope);
        out
    }

    #[test]
    fn delayed_impulse_delays_signal_across_partitions() {
        // unit impulse at 200 frames: lands in the second partition
        let mut ir = vec![0.0; 300];
        ir[200] = 1.0;
        let impulse = AudioBuffer::new(48_000, vec![ir]).unwrap();
        let mut conv = ConvolverProcessor::new(&impulse, false);

        let mut first = Quantum::silent();
        first.channels[0][0] = 1.0;
        first.channels[1][0] = 1.0;
        let out0 = run(&mut conv, &first);
        assert!(out0.channels[0].iter().all(|s| s.abs() < 1e-4));

        let out1 = run(&mut conv, &Quantum::silent());
        // 200 - 128 = 72 frames into the second block
        assert!((out1.channels[0][72] - 1.0).abs() < 1e-4);
        assert!((out1.channels[1][72] - 1.0).abs() < 1e-4);
        assert!(out1.channels[0][71].abs() < 1e-4);
    }

    #[test]
    fn normalization_is_finite_for_silence() {
        let impulse = AudioBuffer::new(48_000, vec![vec![0.0; 64]]).unwrap();
        let scale = normalization_scale(&impulse);
        assert!(scale.is_finite() && scale > 0.0);
    }
}
