//! Throwaway voices for sounds without a pool.

use std::collections::HashMap;
use std::sync::Arc;

use audio_graph::{AudioBuffer, AudioContext, NodeId, Result as GraphResult, SourceOptions};

use crate::options::{EndedCallback, PlayOptions};

struct DirectVoice {
    sound_id: String,
    gain: NodeId,
    on_ended: Option<EndedCallback>,
}

/// Voices keyed by their source node.
#[derive(Default)]
pub struct DirectPlayback {
    voices: HashMap<NodeId, DirectVoice>,
}

impl DirectPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a source → gain → bus chain and starts it now.
    pub fn play(
        &mut self,
        ctx: &mut AudioContext,
        sound_id: &str,
        buffer: Arc<AudioBuffer>,
        bus: NodeId,
        opts: PlayOptions,
    ) -> GraphResult<NodeId> {
        let gain = ctx.create_gain(opts.volume.max(0.0))?;
        let source = match ctx.create_buffer_source(
            buffer,
            SourceOptions { looped: opts.looped, playback_rate: opts.rate },
        ) {
            Ok(s) => s,
            Err(e) => {
                let _ = ctx.free(gain);
                return Err(e);
            }
        };
        let wired = ctx
            .connect(source, gain)
            .and_then(|_| ctx.connect(gain, bus))
            .and_then(|_| ctx.start(source));
        if let Err(e) = wired {
            let _ = ctx.free(source);
            let _ = ctx.free(gain);
            return Err(e);
        }
        self.voices.insert(source, DirectVoice { sound_id: sound_id.to_string(), gain, on_ended: opts.on_ended });
        Ok(source)
    }

    /// Frees the chain of a finished voice. `None` if the source is not ours.
    pub fn on_source_ended(&mut self, ctx: &mut AudioContext, source: NodeId) -> Option<Option<EndedCallback>> {
        let voice = self.voices.remove(&source)?;
        let _ = ctx.free(source);
        let _ = ctx.free(voice.gain);
        Some(voice.on_ended)
    }

    pub fn stop_sound(&mut self, ctx: &mut AudioContext, sound_id: &str) -> Vec<EndedCallback> {
        let sources: Vec<NodeId> = self
            .voices
            .iter()
            .filter(|(_, v)| v.sound_id == sound_id)
            .map(|(s, _)| *s)
            .collect();
        sources
            .into_iter()
            .filter_map(|s| {
                let _ = ctx.stop(s);
                self.on_source_ended(ctx, s).flatten()
            })
            .collect()
    }

    pub fn stop_all(&mut self, ctx: &mut AudioContext) -> Vec<EndedCallback> {
        let sources: Vec<NodeId> = self.voices.keys().copied().collect();
        sources
            .into_iter()
            .filter_map(|s| {
                let _ = ctx.stop(s);
                self.on_source_ended(ctx, s).flatten()
            })
            .collect()
    }

    pub fn active(&self) -> usize {
        self.voices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_backend::MockAudioBackend;
    use audio_graph::ContextOptions;

    #[test]
    fn chain_is_built_and_torn_down() {
        let mut ctx = AudioContext::new(Box::new(MockAudioBackend::new()), ContextOptions::default());
        let bus = ctx.create_gain(1.0).unwrap();
        let before = ctx.live_nodes();
        let buffer = Arc::new(AudioBuffer::new(48_000, vec![vec![0.1; 128]]).unwrap());
        let mut direct = DirectPlayback::new();

        let source = direct.play(&mut ctx, "jackpot", buffer, bus, PlayOptions::volume(0.5)).unwrap();
        assert_eq!(ctx.live_nodes(), before + 2);
        let gain = ctx.connections(source)[0];
        assert_eq!(ctx.param_value(gain), Some(0.5));
        assert_eq!(ctx.connections(gain), vec![bus]);

        assert!(direct.on_source_ended(&mut ctx, source).is_some());
        assert_eq!(ctx.live_nodes(), before);
        assert_eq!(direct.active(), 0);
    }

    #[test]
    fn stop_sound_only_hits_that_sound() {
        let mut ctx = AudioContext::new(Box::new(MockAudioBackend::new()), ContextOptions::default());
        let bus = ctx.create_gain(1.0).unwrap();
        let buffer = Arc::new(AudioBuffer::new(48_000, vec![vec![0.1; 128]]).unwrap());
        let mut direct = DirectPlayback::new();
        direct.play(&mut ctx, "a", buffer.clone(), bus, PlayOptions::default()).unwrap();
        direct.play(&mut ctx, "a", buffer.clone(), bus, PlayOptions::default()).unwrap();
        direct.play(&mut ctx, "b", buffer, bus, PlayOptions::default()).unwrap();
        direct.stop_sound(&mut ctx, "a");
        assert_eq!(direct.active(), 1);
    }
}
