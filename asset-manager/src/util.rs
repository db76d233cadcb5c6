use thiserror::Error;

/// Longest stream any decoder will produce, about 35 minutes at 48 kHz.
pub const MAX_SFX_FRAMES: u64 = 100_000_000;
pub const MAX_CHANNELS: u16 = 8;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("sound id not in catalog: {0}")]
    UnknownSound(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("resource limits exceeded: {0}")]
    ResourceLimit(String),
    #[error("invalid catalog: {0}")]
    Catalog(String),
}

pub type Result<T> = std::result::Result<T, AssetError>;

/// Lower-cased extension of a catalog path, if any.
pub(crate) fn extension(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}
