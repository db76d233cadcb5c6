use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::util::{AssetError, Result};

const CHUNK: usize = 1024;

/// Sinc-resamples planar audio from `from_rate` to `to_rate`.
///
/// The output is trimmed of the filter delay so sample `n` of the output
/// lines up with time `n / to_rate` of the input.
pub fn resample_planar(input: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>> {
    if from_rate == to_rate || input.is_empty() || input[0].is_empty() {
        return Ok(input.to_vec());
    }
    let channels = input.len();
    let frames = input[0].len();
    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 32,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK, channels)
        .map_err(|e| AssetError::Decode(format!("resampler setup: {e}")))?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * ratio).ceil() as usize;
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];
    let append = |out: &mut Vec<Vec<f32>>, block: Vec<Vec<f32>>| {
        for (dst, src) in out.iter_mut().zip(block) {
            dst.extend_from_slice(&src);
        }
    };

    let mut pos = 0;
    while pos + CHUNK <= frames {
        let slices: Vec<&[f32]> = input.iter().map(|c| &c[pos..pos + CHUNK]).collect();
        let block = resampler
            .process(&slices[..], None)
            .map_err(|e| AssetError::Decode(format!("resample: {e}")))?;
        append(&mut out, block);
        pos += CHUNK;
    }
    if pos < frames {
        let slices: Vec<&[f32]> = input.iter().map(|c| &c[pos..]).collect();
        let block = resampler
            .process_partial(Some(&slices[..]), None)
            .map_err(|e| AssetError::Decode(format!("resample: {e}")))?;
        append(&mut out, block);
    }
    // flush the filter tail
    while out[0].len() < expected + delay {
        let block = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| AssetError::Decode(format!("resample: {e}")))?;
        if block.first().is_none_or(|b| b.is_empty()) {
            break;
        }
        append(&mut out, block);
    }

    for ch in out.iter_mut() {
        ch.drain(..delay.min(ch.len()));
        ch.truncate(expected);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let input = vec![vec![0.1, 0.2, 0.3]];
        assert_eq!(resample_planar(&input, 48_000, 48_000).unwrap(), input);
    }

    #[test]
    fn upsampling_scales_length() {
        let input = vec![vec![0.5f32; 2400], vec![-0.5f32; 2400]];
        let out = resample_planar(&input, 24_000, 48_000).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 4800);
        // steady-state DC survives the filter
        assert!((out[0][2400] - 0.5).abs() < 0.02);
        assert!((out[1][2400] + 0.5).abs() < 0.02);
    }

    #[test]
    fn fractional_ratio_scales_length() {
        let input = vec![vec![0.0f32; 44_100]];
        let out = resample_planar(&input, 44_100, 48_000).unwrap();
        assert_eq!(out[0].len(), 48_000);
    }
}
