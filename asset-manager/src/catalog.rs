//! Static table mapping logical sound ids to resource paths.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::{AssetError, Result};

/// Category bus a sound plays through.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Ambient,
    Sfx,
    Slots,
    Ui,
}

impl BusKind {
    pub const ALL: [BusKind; 4] = [BusKind::Ambient, BusKind::Sfx, BusKind::Slots, BusKind::Ui];

    /// Derives the bus from a path's first segment (`slots/jackpot.wav` → `Slots`).
    pub fn from_path(path: &str) -> BusKind {
        match path.split(['/', '\\']).next().unwrap_or_default() {
            "ambient" | "music" => BusKind::Ambient,
            "slots" | "reels" => BusKind::Slots,
            "ui" => BusKind::Ui,
            _ => BusKind::Sfx,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BusKind::Ambient => "ambient",
            BusKind::Sfx => "sfx",
            BusKind::Slots => "slots",
            BusKind::Ui => "ui",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SoundDescriptor {
    pub id: String,
    pub path: String,
    /// Explicit routing; derived from `path` when absent.
    #[serde(default)]
    pub bus: Option<BusKind>,
    /// Decoded eagerly at init and backed by a voice pool.
    #[serde(default)]
    pub preload: bool,
    #[serde(default)]
    pub pool_size: Option<usize>,
}

impl SoundDescriptor {
    pub fn new(id: &str, path: &str) -> Self {
        Self { id: id.to_string(), path: path.to_string(), bus: None, preload: false, pool_size: None }
    }

    pub fn preloaded(mut self) -> Self {
        self.preload = true;
        self
    }

    pub fn with_pool(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    pub fn on_bus(mut self, bus: BusKind) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn bus_kind(&self) -> BusKind {
        self.bus.unwrap_or_else(|| BusKind::from_path(&self.path))
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    sounds: Vec<SoundDescriptor>,
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SoundCatalog {
    sounds: Vec<SoundDescriptor>,
    index: HashMap<String, usize>,
}

impl SoundCatalog {
    pub fn new(sounds: Vec<SoundDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(sounds.len());
        for (i, s) in sounds.iter().enumerate() {
            if s.id.is_empty() || s.path.is_empty() {
                return Err(AssetError::Catalog(format!("entry {i} has an empty id or path")));
            }
            if index.insert(s.id.clone(), i).is_some() {
                return Err(AssetError::Catalog(format!("duplicate sound id '{}'", s.id)));
            }
        }
        Ok(Self { sounds, index })
    }

    pub fn from_ron_str(src: &str) -> Result<Self> {
        let file: CatalogFile =
            ron::de::from_str(src).map_err(|e| AssetError::Catalog(format!("parse error: {e}")))?;
        Self::new(file.sounds)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)?;
        Self::from_ron_str(&src)
    }

    pub fn get(&self, id: &str) -> Option<&SoundDescriptor> {
        self.index.get(id).map(|i| &self.sounds[*i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SoundDescriptor> {
        self.sounds.iter()
    }

    pub fn preload_set(&self) -> impl Iterator<Item = &SoundDescriptor> {
        self.sounds.iter().filter(|s| s.preload)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

impl Default for SoundCatalog {
    /// The slot-floor sound set.
    fn default() -> Self {
        let sounds = vec![
            SoundDescriptor::new("spin", "slots/spin.wav").preloaded(),
            SoundDescriptor::new("reel_stop", "slots/reel_stop.wav").preloaded().with_pool(10),
            SoundDescriptor::new("win_small", "slots/win_small.wav").preloaded(),
            SoundDescriptor::new("win_big", "slots/win_big.wav"),
            SoundDescriptor::new("jackpot", "slots/jackpot.wav"),
            SoundDescriptor::new("coin", "slots/coin.wav").preloaded().with_pool(12),
            SoundDescriptor::new("click", "ui/click.wav").preloaded(),
            SoundDescriptor::new("hover", "ui/hover.wav").preloaded().with_pool(4),
            SoundDescriptor::new("error", "ui/error.wav"),
            SoundDescriptor::new("fire", "sfx/fire.wav"),
            SoundDescriptor::new("whoosh", "sfx/whoosh.wav"),
            SoundDescriptor::new("chime", "sfx/chime.wav"),
            SoundDescriptor::new("casino_floor", "ambient/casino_floor.ogg"),
            SoundDescriptor::new("lounge", "ambient/lounge.ogg"),
            SoundDescriptor::new("night", "ambient/night.ogg"),
        ];
        // the table above is fixed and valid
        Self::new(sounds).unwrap_or_else(|_| Self { sounds: Vec::new(), index: HashMap::new() })
    }
}
