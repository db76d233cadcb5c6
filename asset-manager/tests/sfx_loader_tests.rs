use asset_manager::decode_raw;
use asset_manager::sfx_loader::{FLAG_LOOP_POINTS, parse_pcm_sfx_data};

fn pcm(channels: u16, rate: u32, looped: Option<(u64, u64)>, samples: &[f32]) -> Vec<u8> {
    let flags = if looped.is_some() { FLAG_LOOP_POINTS } else { 0 };
    let mut data = Vec::new();
    data.extend_from_slice(&channels.to_le_bytes());
    data.extend_from_slice(&flags.to_le_bytes());
    data.extend_from_slice(&rate.to_le_bytes());
    if let Some((start, end)) = looped {
        data.extend_from_slice(&start.to_le_bytes());
        data.extend_from_slice(&end.to_le_bytes());
    }
    for s in samples {
        data.extend_from_slice(&s.to_le_bytes());
    }
    data
}

#[test]
fn loop_points_reach_the_decoded_stream() {
    let data = pcm(2, 48_000, Some((10, 20)), &[0.1, -0.1, 0.2, -0.2]);
    let raw = decode_raw("ambient/lounge.pcm", data).unwrap();
    assert_eq!(raw.channels, 2);
    assert_eq!(raw.frames(), 2);
    assert_eq!(raw.loop_points, Some((10, 20)));
}

#[test]
fn plain_header_has_no_loop() {
    let (samples, meta) = parse_pcm_sfx_data(&pcm(1, 22_050, None, &[0.5, 0.25])).unwrap();
    assert_eq!(meta.sample_rate, 22_050);
    assert_eq!(meta.loop_points, None);
    assert_eq!(samples, vec![0.5, 0.25]);
}

#[test]
fn inverted_loop_is_dropped() {
    let (samples, meta) = parse_pcm_sfx_data(&pcm(1, 44_100, Some((20, 10)), &[0.25])).unwrap();
    assert_eq!(meta.loop_points, None);
    assert_eq!(samples, vec![0.25]);
}

#[test]
fn malformed_pcm_is_rejected() {
    // shorter than the header
    assert!(parse_pcm_sfx_data(&[0u8; 4]).is_err());
    // loop flag without the loop block
    let mut cut = pcm(1, 48_000, None, &[]);
    cut[2] = FLAG_LOOP_POINTS as u8;
    assert!(parse_pcm_sfx_data(&cut).is_err());
    // a body that is not whole f32s
    let mut ragged = pcm(1, 48_000, None, &[0.1]);
    ragged.pop();
    assert!(parse_pcm_sfx_data(&ragged).is_err());
    // bare floats read as a zero-channel header
    let bare: Vec<u8> = [0.0f32, 1.0, -1.0].iter().flat_map(|s| s.to_le_bytes()).collect();
    assert!(decode_raw("sfx/bare.pcm", bare).is_err());
}
