//! Looping ambient tracks with independent fades.
//!
//! Each track owns its gain node below the ambient bus, so a fade-out of the
//! old track and a fade-in of the new one never write to the same param.
//! Only the newest track is "current"; faded-out tracks linger until their
//! scheduled stop fires.

use std::sync::Arc;

use audio_graph::{AudioBuffer, AudioContext, NodeId, Result as GraphResult, SourceOptions};
use tracing::debug;

use crate::bus::ramp_from_now;

#[derive(Debug, Clone)]
struct AmbientTrack {
    id: String,
    source: NodeId,
    gain: NodeId,
    /// Target volume, restored by `resume`.
    volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientPhase {
    Idle,
    Playing,
    Paused,
    /// A new track is current while older ones fade out.
    Crossfading,
}

#[derive(Debug, Default)]
pub struct AmbientController {
    current: Option<AmbientTrack>,
    fading: Vec<AmbientTrack>,
    paused: bool,
}

impl AmbientController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.id.as_str())
    }

    /// Current source node; stable for as long as the track keeps playing.
    pub fn current_source(&self) -> Option<NodeId> {
        self.current.as_ref().map(|t| t.source)
    }

    pub fn current_gain(&self) -> Option<NodeId> {
        self.current.as_ref().map(|t| t.gain)
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some() && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn fading_count(&self) -> usize {
        self.fading.len()
    }

    pub fn phase(&self) -> AmbientPhase {
        match (&self.current, self.paused, self.fading.is_empty()) {
            (None, _, _) => AmbientPhase::Idle,
            (Some(_), true, _) => AmbientPhase::Paused,
            (Some(_), false, false) => AmbientPhase::Crossfading,
            (Some(_), false, true) => AmbientPhase::Playing,
        }
    }

    /// Fades out whatever is current and fades `id` in from silence.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        ctx: &mut AudioContext,
        id: &str,
        buffer: Arc<AudioBuffer>,
        bus: NodeId,
        fade: f32,
        volume: f32,
        stop_margin: f32,
    ) -> GraphResult<()> {
        self.stop(ctx, fade, stop_margin)?;

        let gain = ctx.create_gain(0.0)?;
        let source = ctx.create_buffer_source(buffer, SourceOptions { looped: true, playback_rate: 1.0 })?;
        let wired = ctx
            .connect(source, gain)
            .and_then(|_| ctx.connect(gain, bus))
            .and_then(|_| ctx.start(source))
            .and_then(|_| ramp_from_now(ctx, gain, volume, fade));
        if let Err(e) = wired {
            let _ = ctx.free(source);
            let _ = ctx.free(gain);
            return Err(e);
        }
        debug!(track = id, fade, volume, "ambient track started");
        self.current = Some(AmbientTrack { id: id.to_string(), source, gain, volume });
        self.paused = false;
        Ok(())
    }

    /// Same track: a short volume ramp, nothing restarts. Otherwise a full
    /// fade-out/fade-in.
    #[allow(clippy::too_many_arguments)]
    pub fn crossfade(
        &mut self,
        ctx: &mut AudioContext,
        id: &str,
        buffer: Arc<AudioBuffer>,
        bus: NodeId,
        fade: f32,
        volume: f32,
        same_track_fade: f32,
        stop_margin: f32,
    ) -> GraphResult<()> {
        if self.current_track() == Some(id) {
            debug!(track = id, volume, "crossfade to current track adjusts volume only");
            self.paused = false;
            return self.set_volume(ctx, volume, same_track_fade);
        }
        self.start(ctx, id, buffer, bus, fade, volume, stop_margin)
    }

    /// Logically stops now; the node keeps fading and is stopped after
    /// `fade + margin`.
    pub fn stop(&mut self, ctx: &mut AudioContext, fade: f32, margin: f32) -> GraphResult<bool> {
        let Some(track) = self.current.take() else {
            return Ok(false);
        };
        self.paused = false;
        let now = ctx.current_time();
        ramp_from_now(ctx, track.gain, 0.0, fade)?;
        ctx.stop_at(track.source, now + (fade.max(0.0) + margin.max(0.0)) as f64)?;
        debug!(track = %track.id, fade, "ambient track fading out");
        self.fading.push(track);
        Ok(true)
    }

    /// No-op when nothing is current.
    pub fn set_volume(&mut self, ctx: &mut AudioContext, volume: f32, fade: f32) -> GraphResult<()> {
        let Some(track) = self.current.as_mut() else {
            return Ok(());
        };
        track.volume = volume.max(0.0);
        if self.paused {
            return Ok(());
        }
        ramp_from_now(ctx, track.gain, track.volume, fade)
    }

    /// Fades the current track to silence; the source keeps running.
    pub fn pause(&mut self, ctx: &mut AudioContext, fade: f32) -> GraphResult<bool> {
        let Some(track) = self.current.as_ref() else {
            return Ok(false);
        };
        if self.paused {
            return Ok(false);
        }
        ramp_from_now(ctx, track.gain, 0.0, fade)?;
        self.paused = true;
        Ok(true)
    }

    pub fn resume(&mut self, ctx: &mut AudioContext, fade: f32) -> GraphResult<bool> {
        let Some(track) = self.current.as_ref() else {
            return Ok(false);
        };
        if !self.paused {
            return Ok(false);
        }
        ramp_from_now(ctx, track.gain, track.volume, fade)?;
        self.paused = false;
        Ok(true)
    }

    /// Frees a faded-out track once its source has stopped.
    pub fn on_source_ended(&mut self, ctx: &mut AudioContext, source: NodeId) -> bool {
        if let Some(i) = self.fading.iter().position(|t| t.source == source) {
            let track = self.fading.swap_remove(i);
            let _ = ctx.free(track.source);
            let _ = ctx.free(track.gain);
            return true;
        }
        // the current track only ends if someone stopped it underneath us
        if self.current.as_ref().is_some_and(|t| t.source == source) {
            if let Some(track) = self.current.take() {
                let _ = ctx.free(track.source);
                let _ = ctx.free(track.gain);
            }
            self.paused = false;
            return true;
        }
        false
    }

    /// Immediate teardown of every track.
    pub fn stop_all(&mut self, ctx: &mut AudioContext) {
        for track in self.current.take().into_iter().chain(self.fading.drain(..)) {
            let _ = ctx.stop(track.source);
            let _ = ctx.free(track.source);
            let _ = ctx.free(track.gain);
        }
        self.paused = false;
    }
}
