use crate::node::{Processor, QUANTUM, Quantum, RenderScope};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorOptions {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    /// Seconds.
    pub attack: f32,
    /// Seconds.
    pub release: f32,
}

impl Default for CompressorOptions {
    fn default() -> Self {
        Self { threshold_db: -24.0, knee_db: 30.0, ratio: 12.0, attack: 0.003, release: 0.25 }
    }
}

/// Output level in dB for an input level in dB (soft-knee static curve).
pub(crate) fn static_curve_db(x: f32, opts: &CompressorOptions) -> f32 {
    let t = opts.threshold_db;
    let w = opts.knee_db.max(0.0);
    let r = opts.ratio.max(1.0);
    let over = x - t;
    if 2.0 * over < -w {
        x
    } else if w > 0.0 && 2.0 * over.abs() <= w {
        x + (1.0 / r - 1.0) * (over + w / 2.0).powi(2) / (2.0 * w)
    } else {
        t + over / r
    }
}

/// Feed-forward peak compressor with a linked stereo detector.
pub(crate) struct CompressorProcessor {
    opts: CompressorOptions,
    attack_coef: f32,
    release_coef: f32,
    envelope: f32,
}

impl CompressorProcessor {
    pub(crate) fn new(opts: CompressorOptions, sample_rate: u32) -> Self {
        let coef = |secs: f32| {
            if secs <= 0.0 {
                0.0
            } else {
                (-1.0 / (secs * sample_rate as f32)).exp()
            }
        };
        Self {
            attack_coef: coef(opts.attack),
            release_coef: coef(opts.release),
            opts,
            envelope: 0.0,
        }
    }
}

impl Processor for CompressorProcessor {
    fn process(&mut self, input: &Quantum, output: &mut Quantum, _scope: &RenderScope<'_>) {
        for i in 0..QUANTUM {
            let l = input.channels[0][i];
            let r = input.channels[1][i];
            let level = l.abs().max(r.abs());
            let coef = if level > self.envelope { self.attack_coef } else { self.release_coef };
            self.envelope = level + coef * (self.envelope - level);

            let gain = if self.envelope > 1e-6 {
                let x = 20.0 * self.envelope.log10();
                let y = static_curve_db(x, &self.opts);
                10f32.powf((y - x) / 20.0)
            } else {
                1.0
            };
            output.channels[0][i] = l * gain;
            output.channels[1][i] = r * gain;
        }
    }
}
