//! Headered raw PCM (`.pcm`, legacy `.sfx`).
//!
//! Header: `[u16 channels][u16 flags][u32 sample_rate]` (8 bytes). When bit 0
//! of `flags` is set, `[u64 loop_start][u64 loop_end]` follows (24 bytes in
//! total). Interleaved little-endian f32 samples fill the rest.

use serde::{Deserialize, Serialize};

use crate::decode::RawAudio;
use crate::util::{AssetError, MAX_CHANNELS, Result};

pub const FLAG_LOOP_POINTS: u16 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SfxMetadata {
    pub channels: u16,
    pub sample_rate: u32,
    pub loop_points: Option<(u64, u64)>,
}

fn u64_at(data: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(b)
}

pub fn parse_pcm_sfx_data(data: &[u8]) -> Result<(Vec<f32>, SfxMetadata)> {
    if data.len() < 8 {
        return Err(AssetError::Decode("no headered pcm data".into()));
    }
    let channels = u16::from_le_bytes([data[0], data[1]]);
    let flags = u16::from_le_bytes([data[2], data[3]]);
    let sample_rate = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if channels == 0 || channels > MAX_CHANNELS || sample_rate == 0 {
        return Err(AssetError::Decode("pcm header has no channels or rate".into()));
    }

    let mut offset = 8;
    let mut loop_points = None;
    if flags & FLAG_LOOP_POINTS != 0 {
        if data.len() < 24 {
            return Err(AssetError::Decode("pcm loop header truncated".into()));
        }
        let (start, end) = (u64_at(data, 8), u64_at(data, 16));
        // only accept a loop if start < end
        if start < end {
            loop_points = Some((start, end));
        }
        offset = 24;
    }

    let body = &data[offset..];
    if body.len() % 4 != 0 {
        return Err(AssetError::Decode("pcm data length invalid".into()));
    }
    let samples = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((samples, SfxMetadata { channels, sample_rate, loop_points }))
}

pub(crate) fn parse_raw(data: &[u8]) -> Result<RawAudio> {
    let (interleaved, meta) = parse_pcm_sfx_data(data)?;
    Ok(RawAudio {
        sample_rate: meta.sample_rate,
        channels: meta.channels as usize,
        interleaved,
        loop_points: meta.loop_points,
    })
}
