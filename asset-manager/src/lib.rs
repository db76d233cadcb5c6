//! Sound catalog, asset sources, decoding and the decode cache.
pub mod cache;
pub mod catalog;
pub mod decode;
pub mod resample;
pub mod sfx;
pub mod sfx_loader;
pub mod source;
pub mod util;

pub use audio_graph::AudioBuffer as DecodedBuffer;
pub use cache::{DecodeCache, DecodeEvent, Resolve};
pub use catalog::{BusKind, SoundCatalog, SoundDescriptor};
pub use decode::{RawAudio, decode_raw, decode_to_buffer};
pub use sfx::SfxBlob;
pub use sfx_loader::SfxMetadata;
pub use source::{AssetSource, DirSource, MemorySource};
pub use util::{AssetError, Result};
