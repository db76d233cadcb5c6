//! Positioned voices keyed by caller-chosen ids.

use std::collections::HashMap;
use std::sync::Arc;

use audio_graph::{AudioBuffer, AudioContext, NodeId, PannerOptions, Result as GraphResult, SourceOptions, Vec3};
use tracing::debug;

use crate::config::SpatialDefaults;
use crate::options::SpatialOptions;

#[derive(Debug, Clone)]
pub struct SpatialVoice {
    pub sound_id: String,
    pub source: NodeId,
    pub panner: NodeId,
    pub gain: NodeId,
    pub looped: bool,
    pub position: Vec3,
}

impl SpatialVoice {
    fn nodes(&self) -> [NodeId; 3] {
        [self.source, self.panner, self.gain]
    }
}

#[derive(Default)]
pub struct SpatialRegistry {
    voices: HashMap<String, SpatialVoice>,
}

impl SpatialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `source → panner → gain → bus` under `id`, replacing any voice
    /// already registered there.
    #[allow(clippy::too_many_arguments)]
    pub fn play(
        &mut self,
        ctx: &mut AudioContext,
        id: &str,
        sound_id: &str,
        buffer: Arc<AudioBuffer>,
        position: Vec3,
        opts: SpatialOptions,
        defaults: &SpatialDefaults,
        bus: NodeId,
    ) -> GraphResult<()> {
        self.stop(ctx, id);

        let model = opts.distance_model(defaults);
        let panner = ctx.create_panner(PannerOptions { position, ..model.panner_options() })?;
        let gain = ctx.create_gain(opts.volume.max(0.0))?;
        let source = ctx.create_buffer_source(buffer, SourceOptions { looped: opts.looped, playback_rate: 1.0 })?;
        let voice = SpatialVoice { sound_id: sound_id.to_string(), source, panner, gain, looped: opts.looped, position };

        let wired = ctx
            .connect(source, panner)
            .and_then(|_| ctx.connect(panner, gain))
            .and_then(|_| ctx.connect(gain, bus))
            .and_then(|_| ctx.start(source));
        if let Err(e) = wired {
            teardown(ctx, &voice);
            return Err(e);
        }
        debug!(id, sound = sound_id, ?position, looped = opts.looped, "spatial voice started");
        self.voices.insert(id.to_string(), voice);
        Ok(())
    }

    /// No-op for unknown ids.
    pub fn update_position(&mut self, ctx: &mut AudioContext, id: &str, position: Vec3) -> bool {
        let Some(voice) = self.voices.get_mut(id) else {
            return false;
        };
        voice.position = position;
        ctx.set_panner_position(voice.panner, position).is_ok()
    }

    /// Stops and disconnects the whole chain. Returns whether `id` existed.
    pub fn stop(&mut self, ctx: &mut AudioContext, id: &str) -> bool {
        match self.voices.remove(id) {
            Some(voice) => {
                teardown(ctx, &voice);
                debug!(id, "spatial voice stopped");
                true
            }
            None => false,
        }
    }

    /// Drops a one-shot voice whose source finished. Looping voices stay
    /// registered until stopped.
    pub fn on_source_ended(&mut self, ctx: &mut AudioContext, source: NodeId) -> bool {
        let Some(id) = self.voices.iter().find(|(_, v)| v.source == source).map(|(k, _)| k.clone()) else {
            return false;
        };
        if self.voices.get(&id).is_some_and(|v| !v.looped) {
            self.stop(ctx, &id);
        }
        true
    }

    pub fn stop_all(&mut self, ctx: &mut AudioContext) {
        for (_, voice) in self.voices.drain() {
            teardown(ctx, &voice);
        }
    }

    pub fn get(&self, id: &str) -> Option<&SpatialVoice> {
        self.voices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.voices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

fn teardown(ctx: &mut AudioContext, voice: &SpatialVoice) {
    let _ = ctx.stop(voice.source);
    for node in voice.nodes() {
        let _ = ctx.free(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_backend::MockAudioBackend;
    use audio_graph::ContextOptions;

    fn setup() -> (AudioContext, NodeId, Arc<AudioBuffer>) {
        let mut ctx = AudioContext::new(Box::new(MockAudioBackend::new()), ContextOptions::default());
        let bus = ctx.create_gain(1.0).unwrap();
        let buffer = Arc::new(AudioBuffer::new(48_000, vec![vec![0.2; 256]]).unwrap());
        (ctx, bus, buffer)
    }

    #[test]
    fn same_id_replaces_the_chain() {
        let (mut ctx, bus, buffer) = setup();
        let defaults = SpatialDefaults::default();
        let mut reg = SpatialRegistry::new();
        let before = ctx.live_nodes();
        reg.play(&mut ctx, "torch", "fire", buffer.clone(), Vec3::X, SpatialOptions::looped(), &defaults, bus).unwrap();
        let old = reg.get("torch").unwrap().clone();
        reg.play(&mut ctx, "torch", "fire", buffer, Vec3::Z, SpatialOptions::looped(), &defaults, bus).unwrap();

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("torch").unwrap().position, Vec3::Z);
        assert_eq!(ctx.live_nodes(), before + 3);
        assert!(old.nodes().iter().all(|n| !ctx.is_live(*n)));
    }

    #[test]
    fn one_shots_leave_on_end_loops_stay() {
        let (mut ctx, bus, buffer) = setup();
        let defaults = SpatialDefaults::default();
        let mut reg = SpatialRegistry::new();
        reg.play(&mut ctx, "a", "fire", buffer.clone(), Vec3::ZERO, SpatialOptions::default(), &defaults, bus).unwrap();
        reg.play(&mut ctx, "b", "fire", buffer, Vec3::ZERO, SpatialOptions::looped(), &defaults, bus).unwrap();
        let a = reg.get("a").unwrap().source;
        let b = reg.get("b").unwrap().source;
        assert!(reg.on_source_ended(&mut ctx, a));
        assert!(reg.on_source_ended(&mut ctx, b));
        assert!(!reg.contains("a"));
        assert!(reg.contains("b"));
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let (mut ctx, _, _) = setup();
        let mut reg = SpatialRegistry::new();
        assert!(!reg.update_position(&mut ctx, "ghost", Vec3::ONE));
        assert!(!reg.stop(&mut ctx, "ghost"));
    }
}
