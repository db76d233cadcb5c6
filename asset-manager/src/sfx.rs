//! `SFX1` blobs: a 20-byte header followed by interleaved samples.
//!
//! ```text
//! [0..4)   b"SFX1"
//! [4]      sample format (0 = f32, 1 = i16, 2 = u8)
//! [5]      channels
//! [6..8)   reserved
//! [8..12)  sample rate, u32 LE
//! [12..20) frames, u64 LE
//! ```

use crate::decode::RawAudio;
use crate::util::{AssetError, MAX_CHANNELS, MAX_SFX_FRAMES, Result};

pub const SFX_MAGIC: &[u8; 4] = b"SFX1";
const HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    F32,
    S16,
    U8,
}

impl SampleFormat {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(SampleFormat::F32),
            1 => Ok(SampleFormat::S16),
            2 => Ok(SampleFormat::U8),
            _ => Err(AssetError::Decode(format!("unknown sample format {b}"))),
        }
    }

    fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::F32 => 4,
            SampleFormat::S16 => 2,
            SampleFormat::U8 => 1,
        }
    }

    fn to_f32(self, raw: &[u8]) -> f32 {
        match self {
            SampleFormat::F32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            SampleFormat::S16 => i16::from_le_bytes([raw[0], raw[1]]) as f32 / i16::MAX as f32,
            SampleFormat::U8 => raw[0] as f32 / 255.0 * 2.0 - 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SfxBlob {
    pub samples: Vec<f32>, // interleaved f32
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u64,
    pub format: SampleFormat,
}

impl SfxBlob {
    pub fn is_sfx(bytes: &[u8]) -> bool {
        bytes.len() >= 4 && &bytes[..4] == SFX_MAGIC
    }

    pub fn from_sfx_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AssetError::Decode("sfx too small".into()));
        }
        if !Self::is_sfx(bytes) {
            return Err(AssetError::Decode("bad sfx magic".into()));
        }
        let format = SampleFormat::from_byte(bytes[4])?;
        let channels = bytes[5] as u16;
        let sample_rate = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let mut frame_bytes = [0u8; 8];
        frame_bytes.copy_from_slice(&bytes[12..20]);
        let frames = u64::from_le_bytes(frame_bytes);

        if frames == 0 || frames > MAX_SFX_FRAMES {
            return Err(AssetError::ResourceLimit("sfx frame count unreasonable".into()));
        }
        if channels == 0 || channels > MAX_CHANNELS || sample_rate == 0 {
            return Err(AssetError::Decode("sfx header has no channels or rate".into()));
        }

        let width = format.bytes_per_sample();
        let expected = (frames as usize)
            .checked_mul(channels as usize)
            .and_then(|n| n.checked_mul(width))
            .ok_or_else(|| AssetError::ResourceLimit("overflow computing sfx size".into()))?;
        let body = bytes
            .get(HEADER_LEN..HEADER_LEN + expected)
            .ok_or_else(|| AssetError::Decode("file truncated".into()))?;

        let samples = body.chunks_exact(width).map(|raw| format.to_f32(raw)).collect();
        Ok(SfxBlob { samples, sample_rate, channels, frames, format })
    }

    /// An f32 blob from interleaved samples.
    pub fn from_f32(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        let frames = (samples.len() / channels.max(1) as usize) as u64;
        SfxBlob { samples, sample_rate, channels, frames, format: SampleFormat::F32 }
    }

    /// Serializes as an f32 `SFX1` blob whatever the source format was.
    pub fn to_sfx_bytes(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(HEADER_LEN + self.samples.len() * 4);
        b.extend_from_slice(SFX_MAGIC);
        b.push(0);
        b.push(self.channels as u8);
        b.extend_from_slice(&[0, 0]);
        b.extend_from_slice(&self.sample_rate.to_le_bytes());
        b.extend_from_slice(&self.frames.to_le_bytes());
        for s in &self.samples {
            b.extend_from_slice(&s.to_le_bytes());
        }
        b
    }

    pub fn into_raw(self) -> RawAudio {
        RawAudio {
            sample_rate: self.sample_rate,
            channels: self.channels as usize,
            interleaved: self.samples,
            loop_points: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s16_samples_are_scaled() {
        let mut b = Vec::new();
        b.extend_from_slice(SFX_MAGIC);
        b.extend_from_slice(&[1, 1, 0, 0]);
        b.extend_from_slice(&22_050u32.to_le_bytes());
        b.extend_from_slice(&2u64.to_le_bytes());
        b.extend_from_slice(&i16::MAX.to_le_bytes());
        b.extend_from_slice(&0i16.to_le_bytes());
        let blob = SfxBlob::from_sfx_bytes(&b).unwrap();
        assert_eq!(blob.format, SampleFormat::S16);
        assert_eq!(blob.samples, vec![1.0, 0.0]);
        let raw = blob.into_raw();
        assert_eq!(raw.channels, 1);
        assert_eq!(raw.sample_rate, 22_050);
    }

    #[test]
    fn written_blob_reads_back_as_f32() {
        let blob = SfxBlob::from_f32(44_100, 2, vec![0.5, -0.5, 0.25, -0.25]);
        assert_eq!(blob.frames, 2);
        let back = SfxBlob::from_sfx_bytes(&blob.to_sfx_bytes()).unwrap();
        assert_eq!(back.format, SampleFormat::F32);
        assert_eq!(back.samples, blob.samples);
        assert_eq!(back.sample_rate, 44_100);
    }
}
