use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use audio_backend::{AudioBackend, DiagnosticEvent, MockAudioBackend, RenderFn};

fn tone(value: f32) -> RenderFn {
    Arc::new(move |buf: &mut [f32], _sr: u32, _frames: usize| {
        for s in buf.iter_mut() {
            *s = value;
        }
    })
}

#[test]
fn mock_reports_device_info() {
    let backend = MockAudioBackend::with_format(44_100, 2, 512);
    assert_eq!(backend.sample_rate(), 44_100);
    assert_eq!(backend.channels(), 2);
    assert_eq!(backend.buffer_size(), 512);
    let name = backend
        .as_device_info_provider()
        .and_then(|p| p.get_device_name());
    assert_eq!(name, Some("mock-device"));
}

#[test]
fn boxed_mock_drives_through_trait_object() {
    let backend = MockAudioBackend::new();
    let driver = backend.driver();
    let mut boxed: Box<dyn AudioBackend> = Box::new(backend);
    boxed.start(tone(0.25)).unwrap();
    let out = driver.render(32);
    assert!(out.iter().all(|s| (*s - 0.25).abs() < 1e-6));
    assert_eq!(boxed.frames_since_start(), 32);
}

#[test]
fn restart_replaces_render_fn() {
    let mut backend = MockAudioBackend::new();
    let driver = backend.driver();
    backend.start(tone(0.1)).unwrap();
    backend.stop().unwrap();
    backend.start(tone(0.9)).unwrap();
    assert!(driver.render(8).iter().all(|s| (*s - 0.9).abs() < 1e-6));
}

#[test]
fn refused_start_emits_diagnostic() {
    let mut backend = MockAudioBackend::refusing(1);
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_cb = seen.clone();
    backend.set_diagnostics_callback(Some(Arc::new(move |ev: DiagnosticEvent| {
        if let DiagnosticEvent::StartRefused(_) = ev {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        }
    })));
    assert!(backend.start(tone(0.0)).is_err());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(backend.start(tone(0.0)).is_ok());
}

#[test]
fn realtime_mock_advances_on_its_own() {
    let mut backend = MockAudioBackend::realtime();
    backend.start(tone(0.0)).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert!(backend.frames_since_start() > 0);
    backend.stop().unwrap();
}
