//! The engine facade.
//!
//! `AudioEngine` owns the audio context, the decode cache and every
//! controller. Play-family calls never block and never fail loudly: they
//! report a [`PlayOutcome`] and log. Sounds still decoding are queued and
//! started from [`AudioEngine::update`], which the host calls once per frame.

use std::collections::HashMap;
use std::sync::Arc;

use asset_manager::{AssetSource, DecodeCache, DecodeEvent, Resolve, SoundCatalog, SoundDescriptor};
use audio_backend::{AudioBackend, DiagnosticEvent};
use audio_graph::{AudioBuffer, AudioContext, ContextState, NodeId, RenderEvent, Vec3};
use tracing::{debug, info, warn};

use crate::ambient::AmbientController;
use crate::analysis::AnalysisTap;
use crate::bus::{Bus, BusGraph};
use crate::config::EngineConfig;
use crate::ducking::Ducker;
use crate::error::{EngineError, Result};
use crate::listener::{self, ListenerStrategy};
use crate::options::{EndedCallback, PlayOptions, PlayOutcome, SkipReason, SpatialOptions};
use crate::playback::DirectPlayback;
use crate::spatial::{SpatialRegistry, SpatialVoice};
use crate::voice_pool::VoicePool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub active_pooled_voices: usize,
    pub active_direct_voices: usize,
    pub spatial_voices: usize,
    pub live_nodes: usize,
    pub decodes_started: usize,
    pub queued_requests: usize,
}

/// A play-family call waiting for its sound to decode.
enum Request {
    Play { sound_id: String, opts: PlayOptions },
    Spatial { id: String, sound_id: String, position: Vec3, opts: SpatialOptions },
    Ambient { sound_id: String, fade: f32, volume: f32, crossfade: bool },
}

impl Request {
    fn sound_id(&self) -> &str {
        match self {
            Request::Play { sound_id, .. }
            | Request::Spatial { sound_id, .. }
            | Request::Ambient { sound_id, .. } => sound_id,
        }
    }
}

/// Completes requests that will never start; a waiting `on_ended` still fires.
fn abandon(requests: impl IntoIterator<Item = Request>) {
    let callbacks = requests.into_iter().filter_map(|r| match r {
        Request::Play { opts, .. } => opts.on_ended,
        _ => None,
    });
    run_callbacks(callbacks);
}

enum Lifecycle {
    Created(Box<dyn AudioBackend>),
    Ready(Box<Running>),
    Disposed,
}

pub struct AudioEngine {
    config: EngineConfig,
    catalog: Arc<SoundCatalog>,
    source: Arc<dyn AssetSource>,
    state: Lifecycle,
}

impl AudioEngine {
    pub fn new(
        config: EngineConfig,
        catalog: Arc<SoundCatalog>,
        source: Arc<dyn AssetSource>,
        backend: Box<dyn AudioBackend>,
    ) -> Self {
        Self { config, catalog, source, state: Lifecycle::Created(backend) }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<SoundCatalog> {
        &self.catalog
    }

    /// Builds the graph and preloads the hot sounds. Calling it again is a
    /// no-op. A context the platform will not start yet stays suspended
    /// until [`resume`](Self::resume).
    pub fn init(&mut self) -> Result<()> {
        match self.state {
            Lifecycle::Ready(_) => return Ok(()),
            Lifecycle::Disposed => return Err(EngineError::Disposed),
            Lifecycle::Created(_) => {}
        }
        self.config.validate()?;
        let Lifecycle::Created(backend) = std::mem::replace(&mut self.state, Lifecycle::Disposed) else {
            return Err(EngineError::Disposed);
        };
        match self.build(backend) {
            Ok(running) => {
                self.state = Lifecycle::Ready(Box::new(running));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "engine init failed");
                Err(e)
            }
        }
    }

    fn build(&self, mut backend: Box<dyn AudioBackend>) -> Result<Running> {
        backend.set_diagnostics_callback(Some(Arc::new(|event: DiagnosticEvent| {
            warn!(%event, "audio backend diagnostic");
        })));
        let mut ctx = AudioContext::new(backend, self.config.context_options());
        if let Err(e) = ctx.resume() {
            warn!(error = %e, "audio output not started; waiting for resume()");
        }
        let buses = BusGraph::create(&mut ctx, &self.config)?;
        let analysis = AnalysisTap::new(&ctx, buses.analyser(), self.config.analyser.bass_bins)?;
        let listener = listener::select(ctx.capabilities());
        let mut cache = DecodeCache::new(self.catalog.clone(), self.source.clone(), ctx.sample_rate());

        let preload: Vec<&SoundDescriptor> = self.catalog.preload_set().collect();
        let mut pools = HashMap::with_capacity(preload.len());
        for desc in &preload {
            cache.resolve(&desc.id);
            let size = desc.pool_size.unwrap_or(self.config.pool_size);
            let bus = buses.node(desc.bus_kind().into());
            pools.insert(desc.id.clone(), VoicePool::new(&mut ctx, &desc.id, size, bus)?);
        }
        let ids: Vec<&str> = preload.iter().map(|d| d.id.as_str()).collect();
        let events = cache.wait_for(&ids, self.config.preload_timeout());
        let ready = events.iter().filter(|e| e.ok).count();

        info!(
            sample_rate = ctx.sample_rate(),
            running = ctx.state() == ContextState::Running,
            listener = listener.name(),
            preloaded = ready,
            preload_total = ids.len(),
            "audio engine initialized"
        );
        Ok(Running {
            ctx,
            cache,
            buses,
            pools,
            direct: DirectPlayback::new(),
            spatial: SpatialRegistry::new(),
            listener,
            ducker: Ducker::new(),
            ambient: AmbientController::new(),
            analysis,
            queued: Vec::new(),
        })
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, Lifecycle::Ready(_))
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, Lifecycle::Disposed)
    }

    fn running(&mut self) -> std::result::Result<(&mut Running, &EngineConfig), SkipReason> {
        match &mut self.state {
            Lifecycle::Ready(run) => Ok((&mut **run, &self.config)),
            Lifecycle::Created(_) => Err(SkipReason::NotInitialized),
            Lifecycle::Disposed => Err(SkipReason::Disposed),
        }
    }

    fn running_ref(&self) -> Option<&Running> {
        match &self.state {
            Lifecycle::Ready(run) => Some(&**run),
            _ => None,
        }
    }

    /// Restarts output after a refusal or a `suspend`.
    pub fn resume(&mut self) -> Result<()> {
        match &mut self.state {
            Lifecycle::Ready(run) => Ok(run.ctx.resume()?),
            Lifecycle::Created(_) => Err(EngineError::NotInitialized),
            Lifecycle::Disposed => Err(EngineError::Disposed),
        }
    }

    /// Stops output but keeps every voice and setting.
    pub fn suspend(&mut self) -> Result<()> {
        match &mut self.state {
            Lifecycle::Ready(run) => Ok(run.ctx.suspend()?),
            Lifecycle::Created(_) => Err(EngineError::NotInitialized),
            Lifecycle::Disposed => Err(EngineError::Disposed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_ref().is_some_and(|r| r.ctx.state() == ContextState::Running)
    }

    /// Host clock in seconds; zero before init.
    pub fn current_time(&self) -> f64 {
        self.running_ref().map(|r| r.ctx.current_time()).unwrap_or(0.0)
    }

    /// Finishes ended voices, runs their callbacks and starts queued sounds
    /// whose decode completed.
    pub fn update(&mut self) {
        if let Ok((run, config)) = self.running() {
            run.update(config);
        }
    }

    /// Tears everything down. The engine cannot be initialized again.
    pub fn dispose(&mut self) {
        if let Lifecycle::Ready(mut run) = std::mem::replace(&mut self.state, Lifecycle::Disposed) {
            run.teardown();
            info!("audio engine disposed");
        }
    }

    // ---- playback ----

    pub fn play(&mut self, sound_id: &str, opts: PlayOptions) -> PlayOutcome {
        match self.running() {
            Ok((run, _)) => run.play(sound_id, opts),
            Err(reason) => skipped(sound_id, reason),
        }
    }

    /// Stops every voice of `sound_id`, pooled or direct, and drops queued plays of it.
    pub fn stop_sound(&mut self, sound_id: &str) {
        if let Ok((run, _)) = self.running() {
            run.stop_sound(sound_id);
        }
    }

    pub fn play_spatial(&mut self, id: &str, sound_id: &str, position: Vec3, opts: SpatialOptions) -> PlayOutcome {
        match self.running() {
            Ok((run, config)) => run.play_spatial(config, id, sound_id, position, opts),
            Err(reason) => skipped(sound_id, reason),
        }
    }

    /// Safe to call every frame; unknown ids are ignored.
    pub fn update_spatial_position(&mut self, id: &str, position: Vec3) {
        if let Ok((run, _)) = self.running() {
            run.update_spatial_position(id, position);
        }
    }

    pub fn stop_spatial(&mut self, id: &str) -> bool {
        match self.running() {
            Ok((run, _)) => run.stop_spatial(id),
            Err(_) => false,
        }
    }

    pub fn spatial_voice(&self, id: &str) -> Option<SpatialVoice> {
        self.running_ref()?.spatial.get(id).cloned()
    }

    /// `up` defaults to +Y.
    pub fn update_listener(&mut self, position: Vec3, forward: Vec3, up: Option<Vec3>) {
        if let Ok((run, _)) = self.running() {
            let up = up.unwrap_or(Vec3::Y);
            if let Err(e) = run.listener.update(&mut run.ctx, position, forward, up) {
                debug!(error = %e, "listener update dropped");
            }
        }
    }

    pub fn listener_strategy(&self) -> Option<&'static str> {
        self.running_ref().map(|r| r.listener.name())
    }

    // ---- buses ----

    pub fn set_bus_volume(&mut self, bus: Bus, volume: f32) {
        if let Ok((run, _)) = self.running() {
            if let Err(e) = run.buses.set_volume(&mut run.ctx, bus, volume) {
                warn!(bus = bus.name(), error = %e, "bus volume not applied");
            }
        }
    }

    /// Stored volume; before init, the configured default.
    pub fn bus_volume(&self, bus: Bus) -> f32 {
        match self.running_ref() {
            Some(run) => run.buses.volume(bus),
            None => self.config.bus_volumes.get(bus).clamp(0.0, 1.0),
        }
    }

    /// Gain the bus has right now, with ducking and mute applied.
    pub fn bus_gain(&self, bus: Bus) -> f32 {
        self.running_ref().map(|r| r.buses.realized_gain(&r.ctx, bus)).unwrap_or(0.0)
    }

    pub fn set_muted(&mut self, muted: bool) {
        if let Ok((run, _)) = self.running() {
            if let Err(e) = run.buses.set_muted(&mut run.ctx, muted) {
                warn!(error = %e, "mute not applied");
            }
        }
    }

    pub fn is_muted(&self) -> bool {
        self.running_ref().is_some_and(|r| r.buses.is_muted())
    }

    // ---- ducking ----

    /// Defaults come from `config.ducking`. Returns false when already ducking.
    pub fn start_ducking(&mut self, amount: Option<f32>, fade_time: Option<f32>) -> bool {
        let Ok((run, config)) = self.running() else {
            return false;
        };
        let amount = amount.unwrap_or(config.ducking.amount);
        let fade = fade_time.unwrap_or(config.ducking.fade_in);
        match run.ducker.start(&mut run.ctx, &mut run.buses, &config.ducking.buses, amount, fade) {
            Ok(started) => started,
            Err(e) => {
                warn!(error = %e, "ducking not applied");
                false
            }
        }
    }

    pub fn stop_ducking(&mut self, fade_time: Option<f32>) -> bool {
        let Ok((run, config)) = self.running() else {
            return false;
        };
        let fade = fade_time.unwrap_or(config.ducking.fade_out);
        match run.ducker.stop(&mut run.ctx, &mut run.buses, fade) {
            Ok(stopped) => stopped,
            Err(e) => {
                warn!(error = %e, "ducking release not applied");
                false
            }
        }
    }

    pub fn is_ducking(&self) -> bool {
        self.running_ref().is_some_and(|r| r.ducker.is_ducking())
    }

    // ---- analysis ----

    /// Byte magnitude per bin, refreshed on every call. All zeros before init.
    pub fn frequency_data(&mut self) -> Vec<u8> {
        let bins = self.config.analyser.fft_size / 2;
        match self.running() {
            Ok((run, _)) => run.analysis.frequency_data(&mut run.ctx).to_vec(),
            Err(_) => vec![0; bins],
        }
    }

    /// Mean over all bins, in [0, 1].
    pub fn average_volume(&mut self) -> f32 {
        match self.running() {
            Ok((run, _)) => run.analysis.average_volume(&mut run.ctx),
            Err(_) => 0.0,
        }
    }

    /// Mean over the lowest bins, in [0, 1].
    pub fn bass_level(&mut self) -> f32 {
        match self.running() {
            Ok((run, _)) => run.analysis.bass_level(&mut run.ctx),
            Err(_) => 0.0,
        }
    }

    // ---- ambient music ----

    pub fn start_ambient_music(&mut self, sound_id: &str, fade_time: Option<f32>, volume: Option<f32>) -> PlayOutcome {
        match self.running() {
            Ok((run, config)) => {
                let fade = fade_time.unwrap_or(config.ambient.fade);
                let volume = volume.unwrap_or(config.ambient.volume);
                run.ambient_request(config, sound_id, fade, volume, false)
            }
            Err(reason) => skipped(sound_id, reason),
        }
    }

    pub fn crossfade_ambient_music(&mut self, sound_id: &str, fade_time: Option<f32>, volume: Option<f32>) -> PlayOutcome {
        match self.running() {
            Ok((run, config)) => {
                let fade = fade_time.unwrap_or(config.ambient.crossfade);
                let volume = volume.unwrap_or(config.ambient.volume);
                run.ambient_request(config, sound_id, fade, volume, true)
            }
            Err(reason) => skipped(sound_id, reason),
        }
    }

    pub fn stop_ambient_music(&mut self, fade_time: Option<f32>) {
        if let Ok((run, config)) = self.running() {
            run.queued.retain(|r| !matches!(r, Request::Ambient { .. }));
            let fade = fade_time.unwrap_or(config.ambient.fade);
            if let Err(e) = run.ambient.stop(&mut run.ctx, fade, config.ambient.stop_margin) {
                warn!(error = %e, "ambient stop not applied");
            }
        }
    }

    pub fn set_ambient_volume(&mut self, volume: f32, fade_time: Option<f32>) {
        if let Ok((run, config)) = self.running() {
            let fade = fade_time.unwrap_or(config.ambient.volume_fade);
            if let Err(e) = run.ambient.set_volume(&mut run.ctx, volume, fade) {
                warn!(error = %e, "ambient volume not applied");
            }
        }
    }

    pub fn pause_ambient_music(&mut self, fade_time: Option<f32>) -> bool {
        let Ok((run, config)) = self.running() else {
            return false;
        };
        let fade = fade_time.unwrap_or(config.ambient.volume_fade);
        run.ambient.pause(&mut run.ctx, fade).unwrap_or_else(|e| {
            warn!(error = %e, "ambient pause not applied");
            false
        })
    }

    pub fn resume_ambient_music(&mut self, fade_time: Option<f32>) -> bool {
        let Ok((run, config)) = self.running() else {
            return false;
        };
        let fade = fade_time.unwrap_or(config.ambient.volume_fade);
        run.ambient.resume(&mut run.ctx, fade).unwrap_or_else(|e| {
            warn!(error = %e, "ambient resume not applied");
            false
        })
    }

    pub fn is_ambient_playing(&self) -> bool {
        self.running_ref().is_some_and(|r| r.ambient.is_playing())
    }

    pub fn current_ambient_track(&self) -> Option<String> {
        self.running_ref()?.ambient.current_track().map(str::to_string)
    }

    /// Source node of the current ambient track.
    pub fn ambient_source(&self) -> Option<NodeId> {
        self.running_ref()?.ambient.current_source()
    }

    /// Gain of the current ambient track's own node.
    pub fn ambient_gain(&self) -> Option<f32> {
        let run = self.running_ref()?;
        run.ctx.param_value(run.ambient.current_gain()?)
    }

    // ---- introspection ----

    pub fn stats(&self) -> EngineStats {
        let Some(run) = self.running_ref() else {
            return EngineStats::default();
        };
        EngineStats {
            active_pooled_voices: run.pools.values().map(|p| p.active()).sum(),
            active_direct_voices: run.direct.active(),
            spatial_voices: run.spatial.len(),
            live_nodes: run.ctx.live_nodes(),
            decodes_started: run.cache.decode_count(),
            queued_requests: run.queued.len(),
        }
    }

    /// Active voices of one pooled sound; `None` for sounds without a pool.
    pub fn pool_active(&self, sound_id: &str) -> Option<usize> {
        self.running_ref()?.pools.get(sound_id).map(|p| p.active())
    }

    pub fn is_sound_ready(&self, sound_id: &str) -> bool {
        self.running_ref().is_some_and(|r| r.cache.is_ready(sound_id))
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn skipped(sound_id: &str, reason: SkipReason) -> PlayOutcome {
    debug!(sound = sound_id, ?reason, "playback skipped");
    PlayOutcome::Skipped(reason)
}

fn run_callbacks(callbacks: impl IntoIterator<Item = EndedCallback>) {
    for cb in callbacks {
        cb();
    }
}

/// Everything that exists between `init` and `dispose`.
struct Running {
    ctx: AudioContext,
    cache: DecodeCache,
    buses: BusGraph,
    pools: HashMap<String, VoicePool>,
    direct: DirectPlayback,
    spatial: SpatialRegistry,
    listener: Box<dyn ListenerStrategy>,
    ducker: Ducker,
    ambient: AmbientController,
    analysis: AnalysisTap,
    queued: Vec<Request>,
}

impl Running {
    fn bus_for(&self, sound_id: &str) -> NodeId {
        let bus = self
            .cache
            .catalog()
            .get(sound_id)
            .map(|d| Bus::from(d.bus_kind()))
            .unwrap_or(Bus::Sfx);
        self.buses.node(bus)
    }

    fn play(&mut self, sound_id: &str, opts: PlayOptions) -> PlayOutcome {
        match self.cache.resolve(sound_id) {
            Resolve::Ready(buffer) => self.start_play(sound_id, buffer, opts),
            Resolve::Pending => {
                debug!(sound = sound_id, "queued until decoded");
                self.queued.push(Request::Play { sound_id: sound_id.to_string(), opts });
                PlayOutcome::Queued
            }
            Resolve::Unavailable => skipped(sound_id, SkipReason::Unavailable),
        }
    }

    fn start_play(&mut self, sound_id: &str, buffer: Arc<AudioBuffer>, opts: PlayOptions) -> PlayOutcome {
        let result = match self.pools.get_mut(sound_id) {
            Some(pool) => pool.play(&mut self.ctx, buffer, opts).map(run_callbacks),
            None => {
                let bus = self.bus_for(sound_id);
                self.direct.play(&mut self.ctx, sound_id, buffer, bus, opts).map(|_| ())
            }
        };
        match result {
            Ok(()) => PlayOutcome::Started,
            Err(e) => {
                warn!(sound = sound_id, error = %e, "voice could not start");
                PlayOutcome::Skipped(SkipReason::Unavailable)
            }
        }
    }

    fn stop_sound(&mut self, sound_id: &str) {
        let (dropped, kept): (Vec<Request>, Vec<Request>) = std::mem::take(&mut self.queued)
            .into_iter()
            .partition(|r| matches!(r, Request::Play { sound_id: s, .. } if s == sound_id));
        self.queued = kept;
        abandon(dropped);
        if let Some(pool) = self.pools.get_mut(sound_id) {
            run_callbacks(pool.stop_all(&mut self.ctx));
        }
        run_callbacks(self.direct.stop_sound(&mut self.ctx, sound_id));
    }

    fn play_spatial(
        &mut self,
        config: &EngineConfig,
        id: &str,
        sound_id: &str,
        position: Vec3,
        opts: SpatialOptions,
    ) -> PlayOutcome {
        // a newer request under the same id supersedes a queued one
        self.queued.retain(|r| !matches!(r, Request::Spatial { id: q, .. } if q == id));
        match self.cache.resolve(sound_id) {
            Resolve::Ready(buffer) => self.start_spatial(config, id, sound_id, buffer, position, opts),
            Resolve::Pending => {
                self.queued.push(Request::Spatial {
                    id: id.to_string(),
                    sound_id: sound_id.to_string(),
                    position,
                    opts,
                });
                PlayOutcome::Queued
            }
            Resolve::Unavailable => skipped(sound_id, SkipReason::Unavailable),
        }
    }

    fn start_spatial(
        &mut self,
        config: &EngineConfig,
        id: &str,
        sound_id: &str,
        buffer: Arc<AudioBuffer>,
        position: Vec3,
        opts: SpatialOptions,
    ) -> PlayOutcome {
        let bus = self.buses.node(Bus::Ambient);
        match self.spatial.play(&mut self.ctx, id, sound_id, buffer, position, opts, &config.spatial, bus) {
            Ok(()) => PlayOutcome::Started,
            Err(e) => {
                warn!(id, sound = sound_id, error = %e, "spatial voice could not start");
                PlayOutcome::Skipped(SkipReason::Unavailable)
            }
        }
    }

    fn update_spatial_position(&mut self, id: &str, position: Vec3) {
        if self.spatial.update_position(&mut self.ctx, id, position) {
            return;
        }
        for req in self.queued.iter_mut() {
            if let Request::Spatial { id: q, position: p, .. } = req {
                if q == id {
                    *p = position;
                }
            }
        }
    }

    fn stop_spatial(&mut self, id: &str) -> bool {
        let before = self.queued.len();
        self.queued.retain(|r| !matches!(r, Request::Spatial { id: q, .. } if q == id));
        self.spatial.stop(&mut self.ctx, id) || self.queued.len() != before
    }

    fn ambient_request(
        &mut self,
        config: &EngineConfig,
        sound_id: &str,
        fade: f32,
        volume: f32,
        crossfade: bool,
    ) -> PlayOutcome {
        self.queued.retain(|r| !matches!(r, Request::Ambient { .. }));
        if crossfade && self.ambient.current_track() == Some(sound_id) {
            if let Err(e) = self.ambient.set_volume(&mut self.ctx, volume, config.ambient.same_track_fade) {
                warn!(error = %e, "ambient volume not applied");
            }
            return PlayOutcome::Started;
        }
        match self.cache.resolve(sound_id) {
            Resolve::Ready(buffer) => self.start_ambient(config, sound_id, buffer, fade, volume, crossfade),
            Resolve::Pending => {
                self.queued.push(Request::Ambient { sound_id: sound_id.to_string(), fade, volume, crossfade });
                PlayOutcome::Queued
            }
            Resolve::Unavailable => skipped(sound_id, SkipReason::Unavailable),
        }
    }

    fn start_ambient(
        &mut self,
        config: &EngineConfig,
        sound_id: &str,
        buffer: Arc<AudioBuffer>,
        fade: f32,
        volume: f32,
        crossfade: bool,
    ) -> PlayOutcome {
        let bus = self.buses.node(Bus::Ambient);
        let margin = config.ambient.stop_margin;
        let result = if crossfade {
            let same = config.ambient.same_track_fade;
            self.ambient.crossfade(&mut self.ctx, sound_id, buffer, bus, fade, volume, same, margin)
        } else {
            self.ambient.start(&mut self.ctx, sound_id, buffer, bus, fade, volume, margin)
        };
        match result {
            Ok(()) => PlayOutcome::Started,
            Err(e) => {
                warn!(sound = sound_id, error = %e, "ambient track could not start");
                PlayOutcome::Skipped(SkipReason::Unavailable)
            }
        }
    }

    fn update(&mut self, config: &EngineConfig) {
        for event in self.ctx.poll_events() {
            let RenderEvent::Ended(node) = event;
            self.finish(node);
        }
        for event in self.cache.poll() {
            self.dispatch_decoded(config, event);
        }
    }

    fn finish(&mut self, source: NodeId) {
        for pool in self.pools.values_mut() {
            if let Some(callback) = pool.on_source_ended(&mut self.ctx, source) {
                run_callbacks(callback);
                return;
            }
        }
        if let Some(callback) = self.direct.on_source_ended(&mut self.ctx, source) {
            run_callbacks(callback);
            return;
        }
        if self.spatial.on_source_ended(&mut self.ctx, source) {
            return;
        }
        self.ambient.on_source_ended(&mut self.ctx, source);
    }

    fn dispatch_decoded(&mut self, config: &EngineConfig, event: DecodeEvent) {
        let (waiting, rest): (Vec<Request>, Vec<Request>) =
            std::mem::take(&mut self.queued).into_iter().partition(|r| r.sound_id() == event.id);
        self.queued = rest;
        if waiting.is_empty() {
            return;
        }
        let buffer = match self.cache.get(&event.id) {
            Some(buffer) if event.ok => buffer,
            _ => {
                warn!(sound = %event.id, dropped = waiting.len(), "queued playback skipped");
                abandon(waiting);
                return;
            }
        };
        for request in waiting {
            match request {
                Request::Play { sound_id, opts } => {
                    self.start_play(&sound_id, buffer.clone(), opts);
                }
                Request::Spatial { id, sound_id, position, opts } => {
                    self.start_spatial(config, &id, &sound_id, buffer.clone(), position, opts);
                }
                Request::Ambient { sound_id, fade, volume, crossfade } => {
                    self.start_ambient(config, &sound_id, buffer.clone(), fade, volume, crossfade);
                }
            }
        }
    }

    fn teardown(&mut self) {
        abandon(std::mem::take(&mut self.queued));
        for pool in self.pools.values_mut() {
            run_callbacks(pool.dispose(&mut self.ctx));
        }
        self.pools.clear();
        run_callbacks(self.direct.stop_all(&mut self.ctx));
        self.spatial.stop_all(&mut self.ctx);
        self.ambient.stop_all(&mut self.ctx);
        self.ctx.close();
        self.cache.clear();
    }
}
