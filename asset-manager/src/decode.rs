use std::io::Cursor;

use audio_graph::AudioBuffer;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::resample::resample_planar;
use crate::sfx::SfxBlob;
use crate::sfx_loader;
use crate::util::{AssetError, MAX_SFX_FRAMES, Result, extension};

/// Interleaved audio straight out of a decoder, before resampling.
#[derive(Debug, Clone)]
pub struct RawAudio {
    pub sample_rate: u32,
    pub channels: usize,
    pub interleaved: Vec<f32>,
    pub loop_points: Option<(u64, u64)>,
}

impl RawAudio {
    pub fn frames(&self) -> usize {
        self.interleaved.len() / self.channels.max(1)
    }

    /// Deinterleaves and resamples to `target_rate`.
    pub fn into_buffer(self, target_rate: u32) -> Result<AudioBuffer> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(AssetError::Decode("stream has no channels or rate".into()));
        }
        let frames = self.frames();
        if frames == 0 {
            return Err(AssetError::Decode("no audio frames".into()));
        }
        let mut planar = vec![Vec::with_capacity(frames); self.channels];
        for frame in self.interleaved.chunks_exact(self.channels) {
            for (ch, s) in frame.iter().enumerate() {
                planar[ch].push(*s);
            }
        }
        let planar = resample_planar(&planar, self.sample_rate, target_rate)?;
        AudioBuffer::new(target_rate, planar).map_err(|e| AssetError::Decode(e.to_string()))
    }
}

/// Picks a decoder from the magic bytes and the path's extension.
pub fn decode_raw(path: &str, bytes: Vec<u8>) -> Result<RawAudio> {
    if SfxBlob::is_sfx(&bytes) {
        return Ok(SfxBlob::from_sfx_bytes(&bytes)?.into_raw());
    }
    let ext = extension(path);
    match ext.as_deref() {
        Some("pcm") | Some("sfx") => sfx_loader::parse_raw(&bytes),
        _ => decode_with_symphonia(bytes, ext.as_deref()),
    }
}

/// Full pipeline: bytes in, playable buffer at `target_rate` out.
pub fn decode_to_buffer(path: &str, bytes: Vec<u8>, target_rate: u32) -> Result<AudioBuffer> {
    decode_raw(path, bytes)?.into_buffer(target_rate)
}

fn decode_with_symphonia(bytes: Vec<u8>, ext: Option<&str>) -> Result<RawAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = ext {
        hint.with_extension(ext);
    }
    let probed = get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AssetError::Decode(format!("probe error: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AssetError::Decode("no default track".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AssetError::Decode(format!("codec make error: {e}")))?;

    let mut interleaved = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AssetError::Decode(format!("read error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(audio) => {
                let spec = *audio.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut buf = SampleBuffer::<f32>::new(audio.capacity() as u64, spec);
                buf.copy_interleaved_ref(audio);
                interleaved.extend_from_slice(buf.samples());
                if (interleaved.len() / channels.max(1)) as u64 > MAX_SFX_FRAMES {
                    return Err(AssetError::ResourceLimit("decoded stream too long".into()));
                }
            }
            // a corrupt packet is skipped, the stream goes on
            Err(SymphoniaError::DecodeError(e)) => tracing::debug!(error = %e, "skipping bad packet"),
            Err(e) => return Err(AssetError::Decode(format!("decode error: {e}"))),
        }
    }

    Ok(RawAudio { sample_rate, channels, interleaved, loop_points: None })
}
