use crate::node::{NodeMessage, Processor, QUANTUM, Quantum, RenderScope};
use crate::param::ParamTimeline;

/// Multiplies its input by an automatable gain.
///
/// The gain is evaluated at both edges of the quantum and interpolated
/// linearly in between, so ramps stay smooth at any block size.
pub(crate) struct GainProcessor {
    gain: ParamTimeline,
}

impl GainProcessor {
    pub(crate) fn new(initial: f32) -> Self {
        Self { gain: ParamTimeline::new(initial) }
    }
}

impl Processor for GainProcessor {
    fn process(&mut self, input: &Quantum, output: &mut Quantum, scope: &RenderScope<'_>) {
        let g0 = self.gain.value_at(scope.time);
        let g1 = self.gain.value_at(scope.time + scope.quantum_duration());
        let step = (g1 - g0) / QUANTUM as f32;
        for (dst, src) in output.channels.iter_mut().zip(input.channels.iter()) {
            let mut g = g0;
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d = *s * g;
                g += step;
            }
        }
        self.gain.prune_before(scope.time);
    }

    fn handle(&mut self, msg: NodeMessage) {
        if let NodeMessage::Param(op) = msg {
            self.gain.apply(op);
        }
    }
}
