use crate::error::{GraphError, Result};

/// Decoded, immutable PCM audio stored planar (one `Vec` per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(GraphError::InvalidBuffer("sample rate is zero".into()));
        }
        if channels.is_empty() {
            return Err(GraphError::InvalidBuffer("no channels".into()));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(GraphError::InvalidBuffer("channel lengths differ".into()));
        }
        Ok(Self { sample_rate, channels })
    }

    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Result<Self> {
        if channel_count == 0 {
            return Err(GraphError::InvalidBuffer("no channels".into()));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, s) in frame.iter().enumerate() {
                channels[ch].push(*s);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index.min(self.channels.len() - 1)]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }
}
