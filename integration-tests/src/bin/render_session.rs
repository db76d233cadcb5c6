//! Renders a scripted slot-floor session offline and writes it to a WAV file.
//!
//! Usage: `render_session [out.wav] [seconds]`

use std::process::ExitCode;

use audio_backend::MockAudioBackend;
use audio_system::{EngineConfig, PlayOptions, SpatialOptions};
use glam::vec3;
use integration_tests::{BLOCK, Harness};

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "session.wav".to_string());
    let seconds: f32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(6.0);

    let mut h = Harness::with(EngineConfig::default(), MockAudioBackend::new());
    let rate = h.driver.sample_rate();
    let spec = hound::WavSpec {
        channels: h.driver.channels() as u16,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = match hound::WavWriter::create(&path, spec) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("cannot create {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    h.engine.start_ambient_music("lounge", Some(1.0), None);
    h.engine.play_spatial("torch", "fire", vec3(-6.0, 0.0, -2.0), SpatialOptions::looped());

    let total = (seconds * rate as f32) as usize;
    let mut frame = 0usize;
    let mut next_coin = 0.5f32;
    let mut ducked = false;
    let mut crossfaded = false;
    while frame < total {
        let t = frame as f32 / rate as f32;

        // the torch sweeps past the listener
        let x = -6.0 + 12.0 * (t / seconds);
        h.engine.update_spatial_position("torch", vec3(x, 0.0, -2.0));

        if t >= next_coin {
            h.engine.play("coin", PlayOptions::volume(0.8));
            next_coin += 0.3;
        }
        if !ducked && t >= seconds * 0.4 {
            h.engine.play("jackpot", PlayOptions::default());
            h.engine.start_ducking(None, None);
            ducked = true;
        }
        if ducked && h.engine.is_ducking() && t >= seconds * 0.6 {
            h.engine.stop_ducking(None);
        }
        if !crossfaded && t >= seconds * 0.7 {
            h.engine.crossfade_ambient_music("night", None, None);
            crossfaded = true;
        }

        for s in h.driver.render(BLOCK) {
            if let Err(e) = writer.write_sample(s) {
                eprintln!("write failed: {e}");
                return ExitCode::FAILURE;
            }
        }
        h.engine.update();
        frame += BLOCK;
    }

    if let Err(e) = writer.finalize() {
        eprintln!("finalize failed: {e}");
        return ExitCode::FAILURE;
    }
    let stats = h.engine.stats();
    println!(
        "wrote {path}: {seconds}s at {rate} Hz, {} decodes, {} live nodes at the end",
        stats.decodes_started, stats.live_nodes
    );
    ExitCode::SUCCESS
}
