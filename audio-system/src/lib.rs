//! Real-time mixing engine for the slot floor.
//!
//! Sounds route through a fixed bus tree (`master` fed by `ambient`, `sfx`,
//! `slots` and `ui`). Preloaded sounds play from fixed voice pools, others
//! from throwaway voices; positioned sounds, ducking, ambient music with
//! crossfades and a spectrum tap sit on top. [`AudioEngine`] is the entry
//! point.

pub mod ambient;
pub mod analysis;
pub mod bus;
pub mod config;
pub mod ducking;
pub mod engine;
pub mod error;
pub mod listener;
pub mod options;
pub mod playback;
pub mod spatial;
pub mod voice_pool;

pub use ambient::{AmbientController, AmbientPhase};
pub use analysis::average_level;
pub use bus::{Bus, BusGraph};
pub use config::EngineConfig;
pub use engine::{AudioEngine, EngineStats};
pub use error::{EngineError, Result};
pub use listener::{ListenerStrategy, MethodListener, ParamListener};
pub use options::{EndedCallback, PlayOptions, PlayOutcome, SkipReason, SpatialOptions};
pub use spatial::SpatialVoice;

pub use asset_manager::{AssetSource, BusKind, DirSource, MemorySource, SoundCatalog, SoundDescriptor};
pub use audio_graph::Vec3;
