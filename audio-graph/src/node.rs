use crossbeam::queue::ArrayQueue;
use glam::Vec3;

use crate::listener::ListenerFrame;
use crate::param::ParamOp;

/// Frames processed per render quantum.
pub const QUANTUM: usize = 128;

/// Handle to a node: slot index plus the generation the slot had when the
/// node was created. Ids of freed nodes never alias newer nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Destination,
    Gain,
    BufferSource,
    Panner,
    Analyser,
    Compressor,
    Convolver,
}

/// Stereo block of one render quantum.
#[derive(Clone)]
pub(crate) struct Quantum {
    pub(crate) channels: [[f32; QUANTUM]; 2],
}

impl Quantum {
    pub(crate) fn silent() -> Self {
        Self { channels: [[0.0; QUANTUM]; 2] }
    }

    pub(crate) fn clear(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.fill(0.0);
        }
    }

    pub(crate) fn add(&mut self, other: &Quantum) {
        for (dst, src) in self.channels.iter_mut().zip(other.channels.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += *s;
            }
        }
    }

    pub(crate) fn copy_from(&mut self, other: &Quantum) {
        self.channels = other.channels;
    }
}

/// Things the render side reports back to the control side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    Ended(NodeId),
}

/// Node-specific control messages.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NodeMessage {
    Param(ParamOp),
    Start(f64),
    Stop(f64),
    Position(Vec3),
}

/// Per-quantum context handed to every processor.
pub(crate) struct RenderScope<'a> {
    pub(crate) id: NodeId,
    pub(crate) time: f64,
    pub(crate) sample_rate: f32,
    pub(crate) listener: &'a ListenerFrame,
    pub(crate) events: &'a ArrayQueue<RenderEvent>,
}

impl RenderScope<'_> {
    pub(crate) fn quantum_duration(&self) -> f64 {
        QUANTUM as f64 / self.sample_rate as f64
    }

    /// Returns false when the event queue is full; callers retry next quantum.
    pub(crate) fn try_emit(&self, event: RenderEvent) -> bool {
        self.events.push(event).is_ok()
    }
}

/// Render-side behaviour of a node.
pub(crate) trait Processor: Send {
    fn process(&mut self, input: &Quantum, output: &mut Quantum, scope: &RenderScope<'_>);

    fn handle(&mut self, _msg: NodeMessage) {}
}
