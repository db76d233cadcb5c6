//! Shared fixtures for the end-to-end suites: a small casino sound set held
//! in memory, and a harness that drives an [`AudioEngine`] through the mock
//! backend so tests control the audio clock.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};

use asset_manager::{MemorySource, SoundCatalog, SoundDescriptor};
use audio_backend::{MockAudioBackend, MockDriver};
use audio_system::{AudioEngine, EngineConfig};

pub const RATE: u32 = 48_000;

/// Frames the mock device pulls per callback.
pub const BLOCK: usize = 256;

/// Headered PCM: `[u16 channels][u16 flags][u32 rate]` then interleaved f32.
pub fn pcm_bytes(channels: u16, sample_rate: u32, interleaved: &[f32]) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + interleaved.len() * 4);
    v.extend_from_slice(&channels.to_le_bytes());
    v.extend_from_slice(&0u16.to_le_bytes());
    v.extend_from_slice(&sample_rate.to_le_bytes());
    for s in interleaved {
        v.extend_from_slice(&s.to_le_bytes());
    }
    v
}

/// A sine of `seconds` length, duplicated across `channels`.
pub fn tone(channels: u16, sample_rate: u32, freq: f32, amplitude: f32, seconds: f32) -> Vec<u8> {
    let frames = (sample_rate as f32 * seconds) as usize;
    let mut out = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let s = (TAU * freq * i as f32 / sample_rate as f32).sin() * amplitude;
        out.extend(std::iter::repeat_n(s, channels as usize));
    }
    pcm_bytes(channels, sample_rate, &out)
}

pub fn casino_catalog() -> SoundCatalog {
    let sounds = vec![
        SoundDescriptor::new("coin", "slots/coin.pcm").preloaded().with_pool(4),
        SoundDescriptor::new("click", "ui/click.pcm").preloaded(),
        SoundDescriptor::new("jackpot", "slots/jackpot.pcm"),
        SoundDescriptor::new("fire", "sfx/fire.pcm"),
        SoundDescriptor::new("lounge", "ambient/lounge.pcm"),
        SoundDescriptor::new("night", "ambient/night.pcm"),
        SoundDescriptor::new("broken", "sfx/broken.pcm"),
        SoundDescriptor::new("missing", "sfx/missing.pcm"),
    ];
    SoundCatalog::new(sounds).unwrap_or_else(|e| panic!("fixture catalog: {e}"))
}

/// Every catalog path except `missing`; `broken` holds bytes no decoder accepts.
pub fn casino_source() -> MemorySource {
    MemorySource::new()
        .with("slots/coin.pcm", tone(1, RATE, 880.0, 0.5, 0.2))
        .with("ui/click.pcm", tone(1, RATE, 2_000.0, 0.4, 0.05))
        // decoded at a foreign rate so the resampler sits on the path
        .with("slots/jackpot.pcm", tone(2, 24_000, 440.0, 0.5, 0.5))
        .with("sfx/fire.pcm", tone(1, RATE, 220.0, 0.5, 1.0))
        .with("ambient/lounge.pcm", tone(2, RATE, 110.0, 0.5, 1.0))
        .with("ambient/night.pcm", tone(2, RATE, 165.0, 0.5, 1.0))
        .with("sfx/broken.pcm", vec![1, 2, 3])
}

/// An engine wired to a mock device plus the handles to drive it.
pub struct Harness {
    pub engine: AudioEngine,
    pub driver: MockDriver,
    pub source: Arc<MemorySource>,
}

impl Harness {
    /// Builds and initializes an engine on a mock device that starts on request.
    pub fn new() -> Self {
        Self::with(EngineConfig::default(), MockAudioBackend::new())
    }

    pub fn with(config: EngineConfig, backend: MockAudioBackend) -> Self {
        let mut harness = Self::uninitialized(config, backend);
        harness.engine.init().unwrap_or_else(|e| panic!("engine init: {e}"));
        harness
    }

    pub fn uninitialized(config: EngineConfig, backend: MockAudioBackend) -> Self {
        let driver = backend.driver();
        let source = Arc::new(casino_source());
        let engine = AudioEngine::new(config, Arc::new(casino_catalog()), source.clone(), Box::new(backend));
        Self { engine, driver, source }
    }

    /// Renders `seconds` of output and lets the engine react to it.
    pub fn run_for(&mut self, seconds: f64) -> Vec<f32> {
        let frames = (seconds * self.driver.sample_rate() as f64).round() as usize;
        let mut out = Vec::with_capacity(frames * self.driver.channels());
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(BLOCK);
            out.extend(self.driver.render(n));
            done += n;
            self.engine.update();
        }
        out
    }

    /// Pumps `update` until no play request is waiting on a decode.
    pub fn settle(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            self.engine.update();
            if self.engine.stats().queued_requests == 0 {
                return;
            }
            assert!(Instant::now() < deadline, "queued requests never drained");
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}
