//! Render-side node processors.

pub(crate) mod analyser;
pub(crate) mod compressor;
pub(crate) mod convolver;
pub(crate) mod gain;
pub(crate) mod panner;
pub(crate) mod source;

pub use analyser::AnalyserOptions;
pub use compressor::CompressorOptions;
pub use panner::{PannerOptions, inverse_distance_gain};
pub use source::SourceOptions;

use crate::node::{Processor, Quantum, RenderScope};

/// Sums its inputs unchanged. Used for the destination.
pub(crate) struct Passthrough;

impl Processor for Passthrough {
    fn process(&mut self, input: &Quantum, output: &mut Quantum, _scope: &RenderScope<'_>) {
        output.copy_from(input);
    }
}
