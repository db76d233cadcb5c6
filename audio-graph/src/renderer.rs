//! Render side of the graph. Lives inside the backend callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

use crate::listener::{ListenerFrame, ListenerParam, ListenerTimelines};
use crate::node::{NodeId, NodeMessage, Processor, QUANTUM, Quantum, RenderEvent, RenderScope};
use crate::param::ParamOp;

/// Render-side storage of one node.
pub(crate) struct RenderNode {
    processor: Box<dyn Processor>,
    generation: u32,
    inputs: Vec<u32>,
    input_mix: Quantum,
    output: Quantum,
    last_quantum: u64,
}

impl RenderNode {
    pub(crate) fn new(processor: Box<dyn Processor>) -> Self {
        Self {
            processor,
            generation: 0,
            inputs: Vec::with_capacity(16),
            input_mix: Quantum::silent(),
            output: Quantum::silent(),
            last_quantum: u64::MAX,
        }
    }
}

pub(crate) enum Command {
    Insert { id: NodeId, node: Box<RenderNode> },
    Connect { from: NodeId, to: NodeId },
    Disconnect { from: NodeId, to: NodeId },
    Free { id: NodeId },
    Message { id: NodeId, msg: NodeMessage },
    Listener { param: ListenerParam, op: ParamOp },
}

/// Queues shared between [`crate::AudioContext`] and the [`Renderer`].
pub(crate) struct Shared {
    pub(crate) commands: ArrayQueue<Command>,
    pub(crate) events: ArrayQueue<RenderEvent>,
    pub(crate) retired: ArrayQueue<Box<RenderNode>>,
    pub(crate) frames: AtomicU64,
}

impl Shared {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            commands: ArrayQueue::new(capacity),
            events: ArrayQueue::new(capacity),
            retired: ArrayQueue::new(capacity),
            frames: AtomicU64::new(0),
        }
    }
}

pub(crate) struct Renderer {
    shared: Arc<Shared>,
    sample_rate: u32,
    slots: Vec<Option<Box<RenderNode>>>,
    destination: usize,
    listener: ListenerTimelines,
    listener_frame: ListenerFrame,
    quantum: u64,
    block: Quantum,
    block_pos: usize,
}

impl Renderer {
    pub(crate) fn new(shared: Arc<Shared>, sample_rate: u32, destination: NodeId, mut node: Box<RenderNode>) -> Self {
        let mut slots: Vec<Option<Box<RenderNode>>> = Vec::with_capacity(1024);
        slots.resize_with(destination.index as usize + 1, || None);
        node.generation = destination.generation;
        slots[destination.index as usize] = Some(node);
        Self {
            shared,
            sample_rate,
            slots,
            destination: destination.index as usize,
            listener: ListenerTimelines::new(),
            listener_frame: ListenerFrame::default(),
            quantum: 0,
            block: Quantum::silent(),
            block_pos: QUANTUM,
        }
    }

    /// Fills an interleaved device buffer, rendering new quanta as needed.
    pub(crate) fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_exact_mut(channels) {
            if self.block_pos == QUANTUM {
                self.render_quantum();
                self.block_pos = 0;
            }
            let l = self.block.channels[0][self.block_pos];
            let r = self.block.channels[1][self.block_pos];
            match channels {
                1 => frame[0] = (l + r) * 0.5,
                _ => {
                    frame[0] = l;
                    frame[1] = r;
                    for s in frame[2..].iter_mut() {
                        *s = 0.0;
                    }
                }
            }
            self.block_pos += 1;
        }
    }

    fn time(&self) -> f64 {
        (self.quantum * QUANTUM as u64) as f64 / self.sample_rate as f64
    }

    fn render_quantum(&mut self) {
        self.drain_commands();
        let now = self.time();
        self.listener_frame = self.listener.frame_at(now);
        self.listener.prune_before(now);

        self.pull(self.destination);
        // nodes outside the destination's tree still advance (sources must end)
        for index in 0..self.slots.len() {
            self.pull(index);
        }

        match self.slots[self.destination].as_ref() {
            Some(dest) => self.block.copy_from(&dest.output),
            None => self.block.clear(),
        }
        self.quantum += 1;
        self.shared.frames.store(self.quantum * QUANTUM as u64, Ordering::Release);
    }

    fn pull(&mut self, index: usize) {
        let Some(mut node) = self.slots.get_mut(index).and_then(Option::take) else {
            return;
        };
        if node.last_quantum == self.quantum {
            self.slots[index] = Some(node);
            return;
        }
        node.last_quantum = self.quantum;
        node.input_mix.clear();
        for i in 0..node.inputs.len() {
            let input = node.inputs[i] as usize;
            self.pull(input);
            if let Some(src) = self.slots[input].as_ref() {
                node.input_mix.add(&src.output);
            }
        }
        let scope = RenderScope {
            id: NodeId::new(index as u32, node.generation),
            time: self.time(),
            sample_rate: self.sample_rate as f32,
            listener: &self.listener_frame,
            events: &self.shared.events,
        };
        let RenderNode { processor, input_mix, output, .. } = &mut *node;
        processor.process(input_mix, output, &scope);
        self.slots[index] = Some(node);
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.slots
            .get_mut(id.index as usize)
            .and_then(|s| s.as_deref_mut())
            .filter(|n| n.generation == id.generation)
    }

    fn drain_commands(&mut self) {
        while let Some(cmd) = self.shared.commands.pop() {
            match cmd {
                Command::Insert { id, mut node } => {
                    node.generation = id.generation;
                    let index = id.index as usize;
                    if index >= self.slots.len() {
                        self.slots.resize_with(index + 1, || None);
                    }
                    if let Some(old) = self.slots[index].replace(node) {
                        self.retire(old);
                    }
                }
                Command::Connect { from, to } => {
                    if let Some(node) = self.slot_mut(to) {
                        if !node.inputs.contains(&from.index) {
                            node.inputs.push(from.index);
                        }
                    }
                }
                Command::Disconnect { from, to } => {
                    if let Some(node) = self.slot_mut(to) {
                        node.inputs.retain(|i| *i != from.index);
                    }
                }
                Command::Free { id } => {
                    if self.slot_mut(id).is_some() {
                        if let Some(old) = self.slots[id.index as usize].take() {
                            self.retire(old);
                        }
                    }
                }
                Command::Message { id, msg } => {
                    if let Some(node) = self.slot_mut(id) {
                        node.processor.handle(msg);
                    }
                }
                Command::Listener { param, op } => self.listener.apply(param, op),
            }
        }
    }

    fn retire(&self, node: Box<RenderNode>) {
        // a full queue means the control side stopped polling; dropping here is the fallback
        let _ = self.shared.retired.push(node);
    }
}
