//! Built-in sound bank so the demo runs without any asset files.

use std::f32::consts::TAU;

use asset_manager::{MemorySource, SfxBlob, SoundCatalog};

const RATE: u32 = 48_000;

fn render(seconds: f32, f: impl Fn(f32) -> f32) -> Vec<f32> {
    let frames = (seconds * RATE as f32) as usize;
    (0..frames).map(|i| f(i as f32 / RATE as f32)).collect()
}

fn decay(t: f32, rate: f32) -> f32 {
    (-t * rate).exp()
}

fn sine(freq: f32, t: f32) -> f32 {
    (TAU * freq * t).sin()
}

/// Notes played one after another, each ringing out.
fn arpeggio(notes: &[f32], step: f32, ring: f32) -> Vec<f32> {
    let len = step * notes.len() as f32 + ring;
    render(len, |t| {
        notes
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let local = t - i as f32 * step;
                (local >= 0.0).then(|| sine(*f, local) * decay(local, 4.0) * 0.3)
            })
            .sum()
    })
}

/// A seamless stereo loop; partials are whole cycles over the loop length.
fn pad(seconds: f32, partials: &[f32]) -> (u16, Vec<f32>) {
    let mono = render(seconds, |t| {
        let swell = 0.75 + 0.25 * sine(1.0 / seconds, t);
        partials.iter().map(|f| sine(*f, t)).sum::<f32>() * 0.12 * swell
    });
    let mut stereo = Vec::with_capacity(mono.len() * 2);
    for (i, s) in mono.iter().enumerate() {
        let t = i as f32 / RATE as f32;
        let pan = 0.5 + 0.3 * sine(2.0 / seconds, t);
        stereo.push(s * (1.0 - pan));
        stereo.push(s * pan);
    }
    (2, stereo)
}

fn sound_for(id: &str) -> (u16, Vec<f32>) {
    let mono = match id {
        "spin" => render(0.6, |t| sine(200.0 + 600.0 * t, t) * 0.3 * (1.0 - t / 0.6)),
        "reel_stop" => render(0.12, |t| sine(90.0, t) * decay(t, 30.0) * 0.6),
        "win_small" => arpeggio(&[523.25, 659.25, 783.99], 0.12, 0.3),
        "win_big" => arpeggio(&[523.25, 659.25, 783.99, 1046.5, 1318.5, 1568.0], 0.15, 0.5),
        "jackpot" => render(2.5, |t| {
            [880.0, 1108.7, 1318.5, 1760.0].iter().map(|f| sine(*f, t)).sum::<f32>()
                * decay(t % 0.5, 3.0)
                * 0.15
        }),
        "coin" => render(0.15, |t| {
            let f = if t < 0.05 { 1320.0 } else { 1760.0 };
            sine(f, t) * decay(t, 20.0) * 0.4
        }),
        "click" => render(0.02, |t| sine(3_000.0, t) * decay(t, 200.0) * 0.5),
        "hover" => render(0.04, |t| sine(1_800.0, t) * decay(t, 80.0) * 0.2),
        "error" => render(0.3, |t| sine(200.0, t).signum() * 0.15 * (1.0 - t / 0.3)),
        "fire" => render(2.0, |t| {
            let flicker = 0.6 + 0.4 * sine(3.0, t) * sine(7.5, t);
            (sine(61.0, t) + 0.5 * sine(183.5, t) + 0.25 * sine(377.0, t)) * flicker * 0.2
        }),
        "whoosh" => render(0.5, |t| sine(900.0 - 1_400.0 * t, t) * sine(1.0, t) * 0.3),
        "chime" => render(1.5, |t| (sine(1_046.5, t) + 0.5 * sine(2_093.0, t)) * decay(t, 2.5) * 0.25),
        "casino_floor" => return pad(4.0, &[110.0, 164.75, 220.0, 277.25]),
        "lounge" => return pad(4.0, &[98.0, 146.75, 196.0, 246.75]),
        "night" => return pad(4.0, &[73.5, 110.0, 146.75, 174.5]),
        _ => render(0.2, |t| sine(440.0, t) * 0.3),
    };
    (1, mono)
}

/// One synthesized blob for every catalog path.
pub fn sound_bank(catalog: &SoundCatalog) -> MemorySource {
    let mut source = MemorySource::new();
    for desc in catalog.iter() {
        let (channels, samples) = sound_for(&desc.id);
        source.insert(&desc.path, SfxBlob::from_f32(RATE, channels, samples).to_sfx_bytes());
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_manager::{AssetSource, decode_to_buffer};

    #[test]
    fn every_default_sound_decodes() {
        let catalog = SoundCatalog::default();
        let bank = sound_bank(&catalog);
        for desc in catalog.iter() {
            let bytes = bank.fetch(&desc.path).unwrap();
            let buf = decode_to_buffer(&desc.path, bytes, RATE).unwrap();
            assert!(buf.frames() > 0, "{} is empty", desc.id);
        }
    }

    #[test]
    fn pads_are_stereo() {
        let (channels, samples) = sound_for("night");
        assert_eq!(channels, 2);
        assert_eq!(samples.len(), 4 * RATE as usize * 2);
    }
}
