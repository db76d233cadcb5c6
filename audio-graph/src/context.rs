//! Control side of the graph.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use audio_backend::{AudioBackend, RenderFn};
use glam::Vec3;
use parking_lot::Mutex;

use crate::buffer::AudioBuffer;
use crate::error::{GraphError, Result};
use crate::listener::{ListenerFrame, ListenerParam, ListenerTimelines, direct_ops};
use crate::node::{NodeId, NodeKind, NodeMessage, Processor, RenderEvent};
use crate::nodes::analyser::{AnalyserProcessor, AnalyserState};
use crate::nodes::compressor::CompressorProcessor;
use crate::nodes::convolver::ConvolverProcessor;
use crate::nodes::gain::GainProcessor;
use crate::nodes::panner::PannerProcessor;
use crate::nodes::source::SourceProcessor;
use crate::nodes::{AnalyserOptions, CompressorOptions, PannerOptions, Passthrough, SourceOptions};
use crate::param::{ParamOp, ParamTimeline};
use crate::renderer::{Command, RenderNode, Renderer, Shared};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// What the platform underneath supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Listener coordinates are automatable params. Without it only the
    /// direct `set_listener_position`/`set_listener_orientation` calls exist.
    pub listener_automation: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { listener_automation: true }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContextOptions {
    pub capabilities: Capabilities,
    /// Capacity of each control/render queue.
    pub queue_capacity: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self { capabilities: Capabilities::default(), queue_capacity: 4096 }
    }
}

#[derive(Debug, Default)]
struct SourceState {
    started: bool,
    stopped: bool,
}

struct ControlNode {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    param: Option<ParamTimeline>,
    source: Option<SourceState>,
    analyser: Option<AnalyserState>,
    ended: bool,
}

impl ControlNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            param: None,
            source: None,
            analyser: None,
            ended: false,
        }
    }
}

/// Owner of a node graph and the backend that renders it.
///
/// All methods run on the caller's thread and only enqueue work for the
/// render thread; they never wait on it.
pub struct AudioContext {
    backend: Box<dyn AudioBackend>,
    shared: Arc<Shared>,
    renderer: Arc<Mutex<Renderer>>,
    sample_rate: u32,
    channels: usize,
    state: ContextState,
    capabilities: Capabilities,
    nodes: Vec<Option<ControlNode>>,
    generations: Vec<u32>,
    free_list: Vec<u32>,
    destination: NodeId,
    backlog: VecDeque<Command>,
    listener: ListenerTimelines,
}

impl AudioContext {
    pub fn new(backend: Box<dyn AudioBackend>, options: ContextOptions) -> Self {
        let sample_rate = match backend.sample_rate() {
            0 => 48_000,
            sr => sr,
        };
        let channels = backend.channels().max(1) as usize;
        let shared = Arc::new(Shared::new(options.queue_capacity.max(16)));
        let destination = NodeId::new(0, 0);
        let renderer = Renderer::new(
            shared.clone(),
            sample_rate,
            destination,
            Box::new(RenderNode::new(Box::new(Passthrough))),
        );
        tracing::debug!(sample_rate, channels, "audio context created");
        Self {
            backend,
            shared,
            renderer: Arc::new(Mutex::new(renderer)),
            sample_rate,
            channels,
            state: ContextState::Suspended,
            capabilities: options.capabilities,
            nodes: vec![Some(ControlNode::new(NodeKind::Destination))],
            generations: vec![0],
            free_list: Vec::new(),
            destination,
            backlog: VecDeque::new(),
            listener: ListenerTimelines::new(),
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Seconds of audio rendered so far. Anchor for all automation.
    pub fn current_time(&self) -> f64 {
        self.shared.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    /// Starts the backend. A refusal leaves the context suspended; retry later.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => return Err(GraphError::Closed),
            ContextState::Running => return Ok(()),
            ContextState::Suspended => {}
        }
        let renderer = self.renderer.clone();
        let channels = self.channels;
        let render: RenderFn = Arc::new(move |buf: &mut [f32], _sr: u32, _frames: usize| {
            renderer.lock().render(buf, channels);
        });
        match self.backend.start(render) {
            Ok(()) => {
                self.state = ContextState::Running;
                tracing::info!(sample_rate = self.sample_rate, "audio context running");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio context could not start; still suspended");
                Err(e.into())
            }
        }
    }

    pub fn suspend(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(GraphError::Closed),
            ContextState::Suspended => Ok(()),
            ContextState::Running => {
                self.backend.stop()?;
                self.state = ContextState::Suspended;
                tracing::info!("audio context suspended");
                Ok(())
            }
        }
    }

    /// Stops rendering for good. Every later call fails with [`GraphError::Closed`].
    pub fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        if self.state == ContextState::Running {
            if let Err(e) = self.backend.stop() {
                tracing::warn!(error = %e, "backend stop failed while closing");
            }
        }
        self.state = ContextState::Closed;
        self.backlog.clear();
        while self.shared.retired.pop().is_some() {}
        tracing::info!("audio context closed");
    }

    // ---- node creation ----

    pub fn create_gain(&mut self, value: f32) -> Result<NodeId> {
        let mut node = ControlNode::new(NodeKind::Gain);
        node.param = Some(ParamTimeline::new(value));
        self.insert(node, Box::new(GainProcessor::new(value)))
    }

    pub fn create_buffer_source(&mut self, buffer: Arc<AudioBuffer>, opts: SourceOptions) -> Result<NodeId> {
        let mut node = ControlNode::new(NodeKind::BufferSource);
        node.source = Some(SourceState::default());
        let proc = SourceProcessor::new(buffer, opts, self.sample_rate);
        self.insert(node, Box::new(proc))
    }

    pub fn create_panner(&mut self, opts: PannerOptions) -> Result<NodeId> {
        self.insert(ControlNode::new(NodeKind::Panner), Box::new(PannerProcessor::new(opts)))
    }

    pub fn create_analyser(&mut self, opts: AnalyserOptions) -> Result<NodeId> {
        let (state, tap) = AnalyserState::new(opts);
        let mut node = ControlNode::new(NodeKind::Analyser);
        node.analyser = Some(state);
        self.insert(node, Box::new(AnalyserProcessor::new(tap)))
    }

    pub fn create_compressor(&mut self, opts: CompressorOptions) -> Result<NodeId> {
        let proc = CompressorProcessor::new(opts, self.sample_rate);
        self.insert(ControlNode::new(NodeKind::Compressor), Box::new(proc))
    }

    pub fn create_convolver(&mut self, impulse: &AudioBuffer, normalize: bool) -> Result<NodeId> {
        let proc = ConvolverProcessor::new(impulse, normalize);
        self.insert(ControlNode::new(NodeKind::Convolver), Box::new(proc))
    }

    fn insert(&mut self, node: ControlNode, processor: Box<dyn Processor>) -> Result<NodeId> {
        self.ensure_open()?;
        let index = match self.free_list.pop() {
            Some(i) => i,
            None => {
                self.nodes.push(None);
                self.generations.push(0);
                (self.nodes.len() - 1) as u32
            }
        };
        let id = NodeId::new(index, self.generations[index as usize]);
        self.nodes[index as usize] = Some(node);
        self.send(Command::Insert { id, node: Box::new(RenderNode::new(processor)) });
        Ok(id)
    }

    // ---- wiring ----

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.ensure_open()?;
        self.node(from)?;
        self.node(to)?;
        if self.reaches(to, from) {
            return Err(GraphError::Cycle { from, to });
        }
        let src = self.node_mut(from)?;
        if src.outputs.contains(&to) {
            return Ok(());
        }
        src.outputs.push(to);
        self.node_mut(to)?.inputs.push(from);
        self.send(Command::Connect { from, to });
        Ok(())
    }

    /// Removes every outgoing connection of `from`.
    pub fn disconnect(&mut self, from: NodeId) -> Result<()> {
        self.ensure_open()?;
        let outputs = std::mem::take(&mut self.node_mut(from)?.outputs);
        for to in outputs {
            if let Ok(dst) = self.node_mut(to) {
                dst.inputs.retain(|i| *i != from);
            }
            self.send(Command::Disconnect { from, to });
        }
        Ok(())
    }

    /// Disconnects a node on both sides and releases it. The id goes stale.
    pub fn free(&mut self, id: NodeId) -> Result<()> {
        self.ensure_open()?;
        if id == self.destination {
            return Err(GraphError::WrongKind(id));
        }
        self.disconnect(id)?;
        let inputs = std::mem::take(&mut self.node_mut(id)?.inputs);
        for from in inputs {
            if let Ok(src) = self.node_mut(from) {
                src.outputs.retain(|o| *o != id);
            }
            self.send(Command::Disconnect { from, to: id });
        }
        self.send(Command::Free { id });
        let index = id.index as usize;
        self.nodes[index] = None;
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free_list.push(id.index);
        Ok(())
    }

    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen = Vec::new();
        while let Some(n) = stack.pop() {
            if n == target {
                return true;
            }
            if seen.contains(&n) {
                continue;
            }
            seen.push(n);
            if let Ok(node) = self.node(n) {
                stack.extend(node.outputs.iter().copied());
            }
        }
        false
    }

    // ---- sources ----

    pub fn start(&mut self, id: NodeId) -> Result<()> {
        let now = self.current_time();
        self.start_at(id, now)
    }

    pub fn start_at(&mut self, id: NodeId, when: f64) -> Result<()> {
        self.ensure_open()?;
        let source = self.source_mut(id)?;
        if source.started {
            return Err(GraphError::AlreadyStarted(id));
        }
        source.started = true;
        self.send(Command::Message { id, msg: NodeMessage::Start(when) });
        Ok(())
    }

    /// Stops a source now. Stopping twice is a no-op.
    pub fn stop(&mut self, id: NodeId) -> Result<()> {
        let now = self.current_time();
        self.stop_at(id, now)
    }

    pub fn stop_at(&mut self, id: NodeId, when: f64) -> Result<()> {
        self.ensure_open()?;
        let source = self.source_mut(id)?;
        if source.stopped {
            return Ok(());
        }
        source.stopped = true;
        self.send(Command::Message { id, msg: NodeMessage::Stop(when) });
        Ok(())
    }

    pub fn is_ended(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.ended).unwrap_or(true)
    }

    // ---- params ----

    /// Automation handle for a gain node's `gain` param.
    pub fn param(&mut self, id: NodeId) -> Result<ParamHandle<'_>> {
        self.ensure_open()?;
        if self.node(id)?.param.is_none() {
            return Err(GraphError::WrongKind(id));
        }
        Ok(ParamHandle { ctx: self, node: id })
    }

    pub fn param_value(&self, id: NodeId) -> Option<f32> {
        self.param_value_at(id, self.current_time())
    }

    pub fn param_value_at(&self, id: NodeId, t: f64) -> Option<f32> {
        self.node(id).ok()?.param.as_ref().map(|p| p.value_at(t))
    }

    fn apply_param(&mut self, id: NodeId, op: ParamOp) {
        let now = self.current_time();
        if let Ok(node) = self.node_mut(id) {
            if let Some(p) = node.param.as_mut() {
                p.apply(op);
                p.prune_before(now);
            }
        }
        self.send(Command::Message { id, msg: NodeMessage::Param(op) });
    }

    // ---- spatial ----

    pub fn set_panner_position(&mut self, id: NodeId, position: Vec3) -> Result<()> {
        self.ensure_open()?;
        if self.node(id)?.kind != NodeKind::Panner {
            return Err(GraphError::WrongKind(id));
        }
        self.send(Command::Message { id, msg: NodeMessage::Position(position) });
        Ok(())
    }

    /// Direct listener placement; available on every platform.
    pub fn set_listener_position(&mut self, position: Vec3) -> Result<()> {
        let frame = self.listener_frame();
        self.set_listener(position, frame.forward, frame.up)
    }

    pub fn set_listener_orientation(&mut self, forward: Vec3, up: Vec3) -> Result<()> {
        let frame = self.listener_frame();
        self.set_listener(frame.position, forward, up)
    }

    fn set_listener(&mut self, position: Vec3, forward: Vec3, up: Vec3) -> Result<()> {
        self.ensure_open()?;
        for (param, op) in direct_ops(position, forward, up) {
            self.listener.apply(param, op);
            self.send(Command::Listener { param, op });
        }
        Ok(())
    }

    /// Automated listener coordinate. Requires `listener_automation`.
    pub fn set_listener_param_at_time(&mut self, param: ListenerParam, value: f32, time: f64) -> Result<()> {
        self.ensure_open()?;
        if !self.capabilities.listener_automation {
            return Err(GraphError::Unsupported("listener automation"));
        }
        let op = ParamOp::SetValueAtTime { value, time };
        self.listener.apply(param, op);
        self.listener.prune_before(self.current_time());
        self.send(Command::Listener { param, op });
        Ok(())
    }

    pub fn listener_frame(&self) -> ListenerFrame {
        self.listener.frame_at(self.current_time())
    }

    // ---- analysis ----

    pub fn frequency_bin_count(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;
        node.analyser.as_ref().map(|a| a.bin_count()).ok_or(GraphError::WrongKind(id))
    }

    pub fn get_byte_frequency_data(&mut self, id: NodeId, out: &mut [u8]) -> Result<()> {
        let node = self.node_mut(id)?;
        let analyser = node.analyser.as_mut().ok_or(GraphError::WrongKind(id))?;
        analyser.byte_frequency_data(out);
        Ok(())
    }

    // ---- housekeeping ----

    /// Flushes queued commands, drops retired render storage and returns
    /// the render events that arrived since the last poll.
    pub fn poll_events(&mut self) -> Vec<RenderEvent> {
        self.flush_backlog();
        while self.shared.retired.pop().is_some() {}
        let mut events = Vec::new();
        while let Some(ev) = self.shared.events.pop() {
            let RenderEvent::Ended(id) = ev;
            if let Ok(node) = self.node_mut(id) {
                node.ended = true;
                events.push(ev);
            }
        }
        events
    }

    pub fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).ok().map(|n| n.kind)
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Nodes currently allocated, destination included.
    pub fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn connections(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.outputs.clone()).unwrap_or_default()
    }

    pub fn pending_commands(&self) -> usize {
        self.backlog.len() + self.shared.commands.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ContextState::Closed {
            Err(GraphError::Closed)
        } else {
            Ok(())
        }
    }

    fn node(&self, id: NodeId) -> Result<&ControlNode> {
        if self.generations.get(id.index as usize) != Some(&id.generation) {
            return Err(GraphError::UnknownNode(id));
        }
        self.nodes[id.index as usize].as_ref().ok_or(GraphError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut ControlNode> {
        if self.generations.get(id.index as usize) != Some(&id.generation) {
            return Err(GraphError::UnknownNode(id));
        }
        self.nodes[id.index as usize].as_mut().ok_or(GraphError::UnknownNode(id))
    }

    fn source_mut(&mut self, id: NodeId) -> Result<&mut SourceState> {
        self.node_mut(id)?.source.as_mut().ok_or(GraphError::WrongKind(id))
    }

    fn send(&mut self, cmd: Command) {
        self.flush_backlog();
        if !self.backlog.is_empty() {
            self.backlog.push_back(cmd);
            return;
        }
        if let Err(cmd) = self.shared.commands.push(cmd) {
            tracing::debug!("render queue full; holding command in backlog");
            self.backlog.push_back(cmd);
        }
    }

    fn flush_backlog(&mut self) {
        while let Some(cmd) = self.backlog.pop_front() {
            if let Err(cmd) = self.shared.commands.push(cmd) {
                self.backlog.push_front(cmd);
                break;
            }
        }
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Automation calls against one gain param. Every call is mirrored on the
/// render thread in the same order.
pub struct ParamHandle<'a> {
    ctx: &'a mut AudioContext,
    node: NodeId,
}

impl ParamHandle<'_> {
    pub fn set_value(&mut self, value: f32) {
        self.ctx.apply_param(self.node, ParamOp::SetValue(value));
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.ctx.apply_param(self.node, ParamOp::SetValueAtTime { value, time });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end: f64) {
        let now = self.ctx.current_time();
        self.ctx.apply_param(self.node, ParamOp::LinearRampToValueAtTime { value, end, now });
    }

    pub fn cancel_scheduled_values(&mut self, from: f64) {
        self.ctx.apply_param(self.node, ParamOp::CancelScheduledValues { from });
    }

    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        self.ctx.apply_param(self.node, ParamOp::CancelAndHoldAtTime { time });
    }

    pub fn value(&self) -> f32 {
        self.ctx.param_value(self.node).unwrap_or(0.0)
    }
}
