use std::fmt;

use crate::config::SpatialDefaults;

/// Runs once when a voice finishes, naturally or because it was stopped or stolen.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

pub struct PlayOptions {
    pub volume: f32,
    pub looped: bool,
    pub rate: f32,
    pub on_ended: Option<EndedCallback>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self { volume: 1.0, looped: false, rate: 1.0, on_ended: None }
    }
}

impl fmt::Debug for PlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayOptions")
            .field("volume", &self.volume)
            .field("looped", &self.looped)
            .field("rate", &self.rate)
            .field("on_ended", &self.on_ended.is_some())
            .finish()
    }
}

impl PlayOptions {
    pub fn volume(volume: f32) -> Self {
        Self { volume, ..Self::default() }
    }

    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn on_ended(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_ended = Some(Box::new(f));
        self
    }
}

/// Distance model fields left as `None` fall back to the configured defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialOptions {
    pub volume: f32,
    pub looped: bool,
    pub ref_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub rolloff_factor: Option<f32>,
}

impl Default for SpatialOptions {
    fn default() -> Self {
        Self { volume: 1.0, looped: false, ref_distance: None, max_distance: None, rolloff_factor: None }
    }
}

impl SpatialOptions {
    pub fn looped() -> Self {
        Self { looped: true, ..Self::default() }
    }

    /// Values that are negative or not finite count as unset.
    pub(crate) fn distance_model(&self, defaults: &SpatialDefaults) -> SpatialDefaults {
        let pick = |v: Option<f32>, fallback: f32| v.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(fallback);
        SpatialDefaults {
            ref_distance: pick(self.ref_distance, defaults.ref_distance),
            max_distance: pick(self.max_distance, defaults.max_distance),
            rolloff_factor: pick(self.rolloff_factor, defaults.rolloff_factor),
        }
    }
}

/// What a play-family call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A voice is playing now.
    Started,
    /// The sound is still decoding; it starts from `update` once ready.
    Queued,
    Skipped(SkipReason),
}

impl PlayOutcome {
    pub fn is_started(self) -> bool {
        self == PlayOutcome::Started
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInitialized,
    /// Unknown id, failed decode, or the graph refused the voice.
    Unavailable,
    Disposed,
}
