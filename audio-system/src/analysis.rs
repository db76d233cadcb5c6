//! Spectrum snapshots of the master bus for visuals.

use audio_graph::{AudioContext, NodeId, Result as GraphResult};

pub struct AnalysisTap {
    analyser: NodeId,
    bins: Vec<u8>,
    bass_bins: usize,
}

impl AnalysisTap {
    pub fn new(ctx: &AudioContext, analyser: NodeId, bass_bins: usize) -> GraphResult<Self> {
        let count = ctx.frequency_bin_count(analyser)?;
        Ok(Self { analyser, bins: vec![0; count], bass_bins: bass_bins.max(1) })
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Refreshes and returns byte magnitudes (0..=255), one per bin.
    pub fn frequency_data(&mut self, ctx: &mut AudioContext) -> &[u8] {
        if ctx.get_byte_frequency_data(self.analyser, &mut self.bins).is_err() {
            self.bins.fill(0);
        }
        &self.bins
    }

    pub fn average_volume(&mut self, ctx: &mut AudioContext) -> f32 {
        average_level(self.frequency_data(ctx))
    }

    pub fn bass_level(&mut self, ctx: &mut AudioContext) -> f32 {
        let n = self.bass_bins;
        let bins = self.frequency_data(ctx);
        average_level(&bins[..n.min(bins.len())])
    }
}

/// Mean of byte magnitudes scaled to [0, 1]. Empty input is silence.
pub fn average_level(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|b| *b as u32).sum();
    (sum as f32 / (bins.len() as f32 * 255.0)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_stay_in_unit_range() {
        assert_eq!(average_level(&[]), 0.0);
        assert_eq!(average_level(&[0; 128]), 0.0);
        assert_eq!(average_level(&[255; 128]), 1.0);
        let mixed = [255, 0, 255, 0];
        assert!((average_level(&mixed) - 0.5).abs() < 1e-6);
    }
}
