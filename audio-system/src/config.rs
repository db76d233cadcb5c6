//! Engine configuration, loadable from RON.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```ron
//! (
//!     pool_size: 6,
//!     bus_volumes: (ambient: 0.3),
//!     ducking: (amount: 0.2),
//! )
//! ```

use std::path::Path;
use std::time::Duration;

use audio_graph::{AnalyserOptions, CompressorOptions, ContextOptions, PannerOptions};
use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::error::{EngineError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub bus_volumes: BusVolumes,
    /// Voices per preloaded sound unless its descriptor says otherwise.
    pub pool_size: usize,
    pub preload_timeout_ms: u64,
    pub ducking: DuckingConfig,
    pub ambient: AmbientConfig,
    pub spatial: SpatialDefaults,
    pub reverb: ReverbConfig,
    pub compressor: CompressorConfig,
    pub analyser: AnalyserConfig,
    pub platform: PlatformConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bus_volumes: BusVolumes::default(),
            pool_size: 8,
            preload_timeout_ms: 5_000,
            ducking: DuckingConfig::default(),
            ambient: AmbientConfig::default(),
            spatial: SpatialDefaults::default(),
            reverb: ReverbConfig::default(),
            compressor: CompressorConfig::default(),
            analyser: AnalyserConfig::default(),
            platform: PlatformConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(src: &str) -> Result<Self> {
        let cfg: EngineConfig =
            ron::de::from_str(src).map_err(|e| EngineError::Config(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_ron_str(&src)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(EngineError::Config("pool_size must be at least 1".into()));
        }
        if !self.analyser.fft_size.is_power_of_two() {
            return Err(EngineError::Config("analyser.fft_size must be a power of two".into()));
        }
        if self.reverb.duration <= 0.0 {
            return Err(EngineError::Config("reverb.duration must be positive".into()));
        }
        Ok(())
    }

    pub fn preload_timeout(&self) -> Duration {
        Duration::from_millis(self.preload_timeout_ms)
    }

    pub(crate) fn context_options(&self) -> ContextOptions {
        let mut opts = ContextOptions::default();
        opts.capabilities.listener_automation = self.platform.listener_automation;
        opts.queue_capacity = self.platform.queue_capacity;
        opts
    }
}

/// Initial stored volume per bus.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct BusVolumes {
    pub master: f32,
    pub ambient: f32,
    pub sfx: f32,
    pub slots: f32,
    pub ui: f32,
}

impl Default for BusVolumes {
    fn default() -> Self {
        Self { master: 1.0, ambient: 0.6, sfx: 0.8, slots: 0.9, ui: 0.7 }
    }
}

impl BusVolumes {
    pub fn get(&self, bus: Bus) -> f32 {
        match bus {
            Bus::Master => self.master,
            Bus::Ambient => self.ambient,
            Bus::Sfx => self.sfx,
            Bus::Slots => self.slots,
            Bus::Ui => self.ui,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DuckingConfig {
    pub amount: f32,
    pub fade_in: f32,
    pub fade_out: f32,
    /// Buses attenuated while ducking.
    pub buses: Vec<Bus>,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self { amount: 0.3, fade_in: 0.3, fade_out: 0.5, buses: vec![Bus::Ambient, Bus::Sfx, Bus::Ui] }
    }
}

/// Seconds unless noted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AmbientConfig {
    pub fade: f32,
    pub volume: f32,
    pub crossfade: f32,
    pub volume_fade: f32,
    /// Ramp used when a crossfade targets the track already playing.
    pub same_track_fade: f32,
    /// Extra time after a fade-out before the source is stopped.
    pub stop_margin: f32,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self { fade: 1.0, volume: 0.4, crossfade: 2.0, volume_fade: 0.3, same_track_fade: 0.5, stop_margin: 0.1 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SpatialDefaults {
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
}

impl Default for SpatialDefaults {
    fn default() -> Self {
        Self { ref_distance: 1.0, max_distance: 50.0, rolloff_factor: 1.0 }
    }
}

impl SpatialDefaults {
    pub(crate) fn panner_options(&self) -> PannerOptions {
        PannerOptions {
            ref_distance: self.ref_distance,
            max_distance: self.max_distance,
            rolloff_factor: self.rolloff_factor,
            ..PannerOptions::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ReverbConfig {
    /// Impulse length in seconds.
    pub duration: f32,
    /// Exponent of the `(1 - t)^decay` envelope.
    pub decay: f32,
    pub return_gain: f32,
    pub seed: u64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self { duration: 1.0, decay: 2.5, return_gain: 0.15, seed: 0x5eed }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CompressorConfig {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack: f32,
    pub release: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        let d = CompressorOptions::default();
        Self { threshold_db: d.threshold_db, knee_db: d.knee_db, ratio: d.ratio, attack: d.attack, release: d.release }
    }
}

impl From<CompressorConfig> for CompressorOptions {
    fn from(c: CompressorConfig) -> Self {
        CompressorOptions { threshold_db: c.threshold_db, knee_db: c.knee_db, ratio: c.ratio, attack: c.attack, release: c.release }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Lowest bins averaged by `bass_level`.
    pub bass_bins: usize,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        let d = AnalyserOptions::default();
        Self {
            fft_size: d.fft_size,
            smoothing: d.smoothing,
            min_decibels: d.min_decibels,
            max_decibels: d.max_decibels,
            bass_bins: 8,
        }
    }
}

impl From<AnalyserConfig> for AnalyserOptions {
    fn from(c: AnalyserConfig) -> Self {
        AnalyserOptions {
            fft_size: c.fft_size,
            smoothing: c.smoothing,
            min_decibels: c.min_decibels,
            max_decibels: c.max_decibels,
        }
    }
}

/// What the host platform offers. Normally left at the defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PlatformConfig {
    pub listener_automation: bool,
    pub queue_capacity: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        let d = ContextOptions::default();
        Self { listener_automation: d.capabilities.listener_automation, queue_capacity: d.queue_capacity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_keeps_defaults() {
        let cfg = EngineConfig::from_ron_str("(pool_size: 4, bus_volumes: (ambient: 0.25))").unwrap();
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.bus_volumes.ambient, 0.25);
        assert_eq!(cfg.bus_volumes.master, 1.0);
        assert_eq!(cfg.ambient.stop_margin, 0.1);
        assert_eq!(cfg.ducking.buses, vec![Bus::Ambient, Bus::Sfx, Bus::Ui]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(EngineConfig::from_ron_str("(pool_size: 0)").is_err());
        assert!(EngineConfig::from_ron_str("(analyser: (fft_size: 300))").is_err());
        assert!(EngineConfig::from_ron_str("(nonsense").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ron");
        std::fs::write(&path, "(ducking: (amount: 0.5, buses: [ambient]))").unwrap();
        let cfg = EngineConfig::load(&path).unwrap();
        assert_eq!(cfg.ducking.amount, 0.5);
        assert_eq!(cfg.ducking.buses, vec![Bus::Ambient]);
        assert_eq!(cfg.ducking.fade_out, 0.5);
    }

    #[test]
    fn compressor_defaults_match_graph() {
        let c: CompressorOptions = CompressorConfig::default().into();
        assert_eq!(c, CompressorOptions::default());
    }
}
