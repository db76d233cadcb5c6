use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::node::{NodeMessage, Processor, QUANTUM, Quantum, RenderEvent, RenderScope};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceOptions {
    pub looped: bool,
    pub playback_rate: f32,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self { looped: false, playback_rate: 1.0 }
    }
}

/// One-shot playback of a shared buffer.
pub(crate) struct SourceProcessor {
    buffer: Arc<AudioBuffer>,
    looped: bool,
    step: f64,
    position: f64,
    start: Option<f64>,
    stop: Option<f64>,
    finished: bool,
    notified: bool,
}

impl SourceProcessor {
    pub(crate) fn new(buffer: Arc<AudioBuffer>, opts: SourceOptions, context_rate: u32) -> Self {
        let rate = if opts.playback_rate.is_finite() && opts.playback_rate > 0.0 {
            opts.playback_rate as f64
        } else {
            1.0
        };
        let step = rate * buffer.sample_rate() as f64 / context_rate as f64;
        Self {
            buffer,
            looped: opts.looped,
            step,
            position: 0.0,
            start: None,
            stop: None,
            finished: false,
            notified: false,
        }
    }

    fn sample(&self, channel: usize, index: usize, frac: f32) -> f32 {
        let data = self.buffer.channel(channel);
        let a = data[index];
        let b = match data.get(index + 1) {
            Some(b) => *b,
            None if self.looped => data[0],
            None => 0.0,
        };
        a + (b - a) * frac
    }
}

impl Processor for SourceProcessor {
    fn process(&mut self, _input: &Quantum, output: &mut Quantum, scope: &RenderScope<'_>) {
        output.clear();
        if !self.finished {
            if let Some(start) = self.start {
                let frames = self.buffer.frames();
                let sr = scope.sample_rate as f64;
                for i in 0..QUANTUM {
                    let t = scope.time + i as f64 / sr;
                    if t < start {
                        continue;
                    }
                    if self.stop.is_some_and(|stop| t >= stop) || frames == 0 {
                        self.finished = true;
                        break;
                    }
                    if self.position >= frames as f64 {
                        if self.looped {
                            self.position %= frames as f64;
                        } else {
                            self.finished = true;
                            break;
                        }
                    }
                    let index = self.position as usize;
                    let frac = (self.position - index as f64) as f32;
                    output.channels[0][i] = self.sample(0, index, frac);
                    output.channels[1][i] = self.sample(1, index, frac);
                    self.position += self.step;
                }
            }
        }
        if self.finished && !self.notified {
            self.notified = scope.try_emit(RenderEvent::Ended(scope.id));
        }
    }

    fn handle(&mut self, msg: NodeMessage) {
        match msg {
            NodeMessage::Start(when) => {
                if self.start.is_none() {
                    self.start = Some(when);
                }
            }
            NodeMessage::Stop(when) => {
                if self.start.is_none() {
                    // stopping a source that never started ends it outright
                    self.finished = true;
                } else {
                    self.stop = Some(self.stop.map_or(when, |s| s.min(when)));
                }
            }
            _ => {}
        }
    }
}
