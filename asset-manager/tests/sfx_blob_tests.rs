use asset_manager::sfx::SfxBlob;
use asset_manager::util::AssetError;
use asset_manager::{decode_raw, decode_to_buffer};

fn header(format: u8, channels: u8, sample_rate: u32, frames: u64) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(b"SFX1");
    b.push(format);
    b.push(channels);
    b.extend_from_slice(&[0, 0]);
    b.extend_from_slice(&sample_rate.to_le_bytes());
    b.extend_from_slice(&frames.to_le_bytes());
    b
}

#[test]
fn stereo_blob_becomes_planar_buffer() {
    let bytes = SfxBlob::from_f32(48_000, 2, vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]).to_sfx_bytes();
    // the magic decides the decoder, not the extension
    let buf = decode_to_buffer("ambient/loop.ogg", bytes, 48_000).unwrap();
    assert_eq!(buf.channel_count(), 2);
    assert_eq!(buf.channel(0), &[0.1, 0.2, 0.3]);
    assert_eq!(buf.channel(1), &[-0.1, -0.2, -0.3]);
}

#[test]
fn u8_samples_are_centered() {
    let mut bytes = header(2, 1, 8_000, 3);
    bytes.extend_from_slice(&[0, 255, 128]);
    let raw = decode_raw("ui/beep.sfx", bytes).unwrap();
    assert_eq!(raw.sample_rate, 8_000);
    assert!((raw.interleaved[0] + 1.0).abs() < 1e-6);
    assert!((raw.interleaved[1] - 1.0).abs() < 1e-6);
    assert!(raw.interleaved[2].abs() < 0.01);
}

#[test]
fn low_rate_blob_is_brought_to_the_context_rate() {
    let bytes = SfxBlob::from_f32(16_000, 1, vec![0.25; 1_600]).to_sfx_bytes();
    let buf = decode_to_buffer("slots/coin.wav", bytes, 48_000).unwrap();
    assert_eq!(buf.sample_rate(), 48_000);
    assert!((4_790..=4_800).contains(&buf.frames()));
}

#[test]
fn unknown_sample_format_is_a_decode_error() {
    let mut bytes = header(9, 2, 48_000, 1);
    bytes.extend_from_slice(&[0; 8]);
    assert!(matches!(SfxBlob::from_sfx_bytes(&bytes), Err(AssetError::Decode(_))));
}

#[test]
fn truncated_body_is_a_decode_error() {
    let mut bytes = SfxBlob::from_f32(48_000, 2, vec![0.1, 0.2, 0.3, 0.4]).to_sfx_bytes();
    bytes.truncate(bytes.len() - 4);
    assert!(matches!(SfxBlob::from_sfx_bytes(&bytes), Err(AssetError::Decode(_))));
}

#[test]
fn header_limits_are_enforced() {
    let empty = header(0, 2, 48_000, 0);
    assert!(matches!(SfxBlob::from_sfx_bytes(&empty), Err(AssetError::ResourceLimit(_))));

    let mut silent_channels = header(0, 0, 48_000, 1);
    silent_channels.extend_from_slice(&[0; 4]);
    assert!(matches!(SfxBlob::from_sfx_bytes(&silent_channels), Err(AssetError::Decode(_))));

    let mut bad_magic = header(0, 1, 48_000, 1);
    bad_magic[0] = b'X';
    bad_magic.extend_from_slice(&[0; 4]);
    assert!(matches!(SfxBlob::from_sfx_bytes(&bad_magic), Err(AssetError::Decode(_))));
}
