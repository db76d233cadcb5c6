//! Fixed rings of reusable voices for preloaded sounds.
//!
//! Every slot owns a gain node wired to the sound's bus at construction.
//! Playing only creates the one-shot source node; when the pool is full the
//! oldest voice is stolen.

use std::sync::Arc;

use audio_graph::{AudioBuffer, AudioContext, NodeId, Result as GraphResult, SourceOptions};
use tracing::debug;

use crate::options::{EndedCallback, PlayOptions};

#[derive(Default)]
struct VoiceSlot {
    gain: Option<NodeId>,
    source: Option<NodeId>,
    /// Play sequence number; lowest is the oldest voice.
    started: u64,
    on_ended: Option<EndedCallback>,
}

impl VoiceSlot {
    fn is_playing(&self) -> bool {
        self.source.is_some()
    }
}

pub struct VoicePool {
    sound_id: String,
    slots: Vec<VoiceSlot>,
    sequence: u64,
    steals: u64,
}

impl VoicePool {
    pub fn new(ctx: &mut AudioContext, sound_id: &str, size: usize, bus: NodeId) -> GraphResult<Self> {
        let mut slots = Vec::with_capacity(size.max(1));
        for _ in 0..size.max(1) {
            let gain = ctx.create_gain(1.0)?;
            ctx.connect(gain, bus)?;
            slots.push(VoiceSlot { gain: Some(gain), ..VoiceSlot::default() });
        }
        debug!(sound = sound_id, size = slots.len(), "voice pool ready");
        Ok(Self { sound_id: sound_id.to_string(), slots, sequence: 0, steals: 0 })
    }

    pub fn sound_id(&self) -> &str {
        &self.sound_id
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn active(&self) -> usize {
        self.slots.iter().filter(|s| s.is_playing()).count()
    }

    pub fn steals(&self) -> u64 {
        self.steals
    }

    /// Starts a voice in the first idle slot, stealing the oldest if none is idle.
    /// Returns the callback of a stolen voice so the caller can run it.
    pub fn play(
        &mut self,
        ctx: &mut AudioContext,
        buffer: Arc<AudioBuffer>,
        opts: PlayOptions,
    ) -> GraphResult<Option<EndedCallback>> {
        let index = match self.slots.iter().position(|s| !s.is_playing()) {
            Some(i) => i,
            None => self.oldest(),
        };
        let stolen = if self.slots[index].is_playing() {
            self.steals += 1;
            debug!(sound = %self.sound_id, slot = index, "stealing oldest voice");
            self.release(ctx, index)
        } else {
            None
        };

        let Some(gain) = self.slots[index].gain else {
            return Ok(stolen);
        };
        ctx.param(gain)?.set_value(opts.volume.max(0.0));
        let source = ctx.create_buffer_source(
            buffer,
            SourceOptions { looped: opts.looped, playback_rate: opts.rate },
        )?;
        ctx.connect(source, gain)?;
        ctx.start(source)?;

        self.sequence += 1;
        let slot = &mut self.slots[index];
        slot.source = Some(source);
        slot.started = self.sequence;
        slot.on_ended = opts.on_ended;
        Ok(stolen)
    }

    fn oldest(&self) -> usize {
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.started)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Stops and frees the slot's source. The gain node stays for reuse.
    fn release(&mut self, ctx: &mut AudioContext, index: usize) -> Option<EndedCallback> {
        let slot = &mut self.slots[index];
        if let Some(source) = slot.source.take() {
            // already-ended sources are fine to stop and free
            let _ = ctx.stop(source);
            let _ = ctx.free(source);
        }
        slot.on_ended.take()
    }

    /// Marks the voice that owned `source` idle. `None` if no slot owns it.
    pub fn on_source_ended(&mut self, ctx: &mut AudioContext, source: NodeId) -> Option<Option<EndedCallback>> {
        let index = self.slots.iter().position(|s| s.source == Some(source))?;
        Some(self.release(ctx, index))
    }

    pub fn owns(&self, source: NodeId) -> bool {
        self.slots.iter().any(|s| s.source == Some(source))
    }

    /// Stops every active voice and returns their callbacks.
    pub fn stop_all(&mut self, ctx: &mut AudioContext) -> Vec<EndedCallback> {
        (0..self.slots.len()).filter_map(|i| self.release(ctx, i)).collect()
    }

    /// Releases the gain nodes too. The pool is unusable afterwards.
    pub fn dispose(&mut self, ctx: &mut AudioContext) -> Vec<EndedCallback> {
        let callbacks = self.stop_all(ctx);
        for slot in self.slots.iter_mut() {
            if let Some(gain) = slot.gain.take() {
                let _ = ctx.free(gain);
            }
        }
        callbacks
    }
}
