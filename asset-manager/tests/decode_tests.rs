use std::sync::Arc;
use std::time::Duration;

use asset_manager::{
    AssetSource, BusKind, DecodeCache, DirSource, Resolve, SoundCatalog, decode_to_buffer,
};
use tempfile::tempdir;

fn make_headered_pcm(channels: u16, sample_rate: u32, samples: &[f32]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&channels.to_le_bytes());
    v.extend_from_slice(&0u16.to_le_bytes());
    v.extend_from_slice(&sample_rate.to_le_bytes());
    for s in samples {
        v.extend_from_slice(&s.to_le_bytes());
    }
    v
}

fn write_wav(path: &std::path::Path, rate: u32, frames: usize) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let s = ((i as f32 * 0.05).sin() * 12_000.0) as i16;
        w.write_sample(s).unwrap();
        w.write_sample(s).unwrap();
    }
    w.finalize().unwrap();
}

#[test]
fn pcm_at_engine_rate_is_untouched() {
    let samples = vec![0.0f32, 1.0, -1.0, 0.5];
    let data = make_headered_pcm(2, 48_000, &samples);
    let buf = decode_to_buffer("ui/t.pcm", data, 48_000).unwrap();
    assert_eq!(buf.frames(), 2);
    assert_eq!(buf.channel(0), &[0.0, -1.0]);
    assert_eq!(buf.channel(1), &[1.0, 0.5]);
}

#[test]
fn pcm_is_resampled_to_requested_rate() {
    let data = make_headered_pcm(1, 24_000, &vec![0.25f32; 2_400]);
    let at_32k = decode_to_buffer("ui/t.pcm", data.clone(), 32_000).unwrap();
    assert_eq!(at_32k.sample_rate(), 32_000);
    assert_eq!(at_32k.frames(), 3_200);
    let at_48k = decode_to_buffer("ui/t.pcm", data, 48_000).unwrap();
    assert_eq!(at_48k.frames(), 4_800);
}

#[test]
fn catalog_and_files_on_disk() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("slots")).unwrap();
    std::fs::create_dir_all(dir.path().join("ui")).unwrap();
    write_wav(&dir.path().join("slots/coin.wav"), 44_100, 4_410);
    std::fs::write(
        dir.path().join("ui/click.pcm"),
        make_headered_pcm(1, 48_000, &[0.5; 480]),
    )
    .unwrap();
    let catalog_path = dir.path().join("catalog.ron");
    std::fs::write(
        &catalog_path,
        r#"(sounds: [
            (id: "coin", path: "slots/coin.wav", preload: true),
            (id: "click", path: "ui/click.pcm"),
            (id: "gone", path: "ui/gone.wav"),
        ])"#,
    )
    .unwrap();

    let catalog = Arc::new(SoundCatalog::load(&catalog_path).unwrap());
    assert_eq!(catalog.get("coin").unwrap().bus_kind(), BusKind::Slots);
    let source: Arc<dyn AssetSource> = Arc::new(DirSource::new(dir.path()));
    let mut cache = DecodeCache::new(catalog, source, 48_000);

    for id in ["coin", "click", "gone"] {
        assert!(matches!(cache.resolve(id), Resolve::Pending));
    }
    let events = cache.wait_for(&["coin", "click", "gone"], Duration::from_secs(10));
    assert_eq!(events.len(), 3);
    assert!(events.iter().any(|e| e.id == "gone" && !e.ok));

    let coin = cache.get("coin").unwrap();
    assert_eq!(coin.sample_rate(), 48_000);
    assert_eq!(coin.frames(), 4_800);
    assert_eq!(coin.channel_count(), 2);
    assert!(cache.is_ready("click"));
    assert!(!cache.is_ready("gone"));
}
