use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwapOption;

use crate::{
    AudioBackend, BackendError, DeviceInfo, DeviceInfoProvider, DiagnosticEvent, DiagnosticsCb, RenderFn,
};

/// State shared between the backend handle, its driver(s) and the pacing thread.
struct MockShared {
    render: ArcSwapOption<RenderFn>,
    frames: AtomicU64,
    running: AtomicBool,
    shutdown: AtomicBool,
}

/// Device stand-in with no audio hardware behind it.
///
/// By default nothing renders on its own: tests pull audio through a
/// [`MockDriver`]. [`MockAudioBackend::realtime`] adds a pacing thread that
/// consumes audio at wall-clock speed instead.
pub struct MockAudioBackend {
    info: DeviceInfo,
    shared: Arc<MockShared>,
    diagnostics: Option<DiagnosticsCb>,
    refuse_starts: u32,
    pacer: Option<JoinHandle<()>>,
}

impl MockAudioBackend {
    pub fn new() -> Self {
        Self::with_format(48_000, 2, 256)
    }

    pub fn with_format(sample_rate: u32, channels: u16, buffer_size: usize) -> Self {
        Self {
            info: DeviceInfo {
                sample_rate,
                buffer_size,
                channels,
                device_name: Some("mock-device".to_string()),
            },
            shared: Arc::new(MockShared {
                render: ArcSwapOption::from(None),
                frames: AtomicU64::new(0),
                running: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
            }),
            diagnostics: None,
            refuse_starts: 0,
            pacer: None,
        }
    }

    /// A mock whose first `count` calls to `start` fail, the way a
    /// gesture-gated platform context refuses to run until the user interacts.
    pub fn refusing(count: u32) -> Self {
        let mut backend = Self::new();
        backend.refuse_starts = count;
        backend
    }

    /// A mock that renders on its own thread at wall-clock pace.
    pub fn realtime() -> Self {
        let mut backend = Self::new();
        let shared = backend.shared.clone();
        let info = backend.info.clone();
        let handle = thread::Builder::new()
            .name("mock-audio".to_string())
            .spawn(move || pace_loop(shared, info))
            .ok();
        if handle.is_none() {
            tracing::warn!("mock backend: failed to spawn pacing thread");
        }
        backend.pacer = handle;
        backend
    }

    /// Handle used to pull audio out of this backend manually.
    pub fn driver(&self) -> MockDriver {
        MockDriver {
            shared: self.shared.clone(),
            channels: self.info.channels as usize,
            sample_rate: self.info.sample_rate,
        }
    }
}

impl Default for MockAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MockAudioBackend {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.pacer.take() {
            let _ = handle.join();
        }
    }
}

impl AudioBackend for MockAudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError> {
        if self.refuse_starts > 0 {
            self.refuse_starts -= 1;
            if let Some(cb) = &self.diagnostics {
                cb(DiagnosticEvent::StartRefused("platform refused playback".into()));
            }
            return Err(BackendError::PlaybackError("start refused by platform".into()));
        }
        self.shared.render.store(Some(Arc::new(render)));
        self.shared.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.shared.running.store(false, Ordering::Release);
        self.shared.render.store(None);
        Ok(())
    }

    fn sample_rate(&self) -> u32 { self.info.sample_rate }
    fn buffer_size(&self) -> usize { self.info.buffer_size }
    fn channels(&self) -> u16 { self.info.channels }
    fn frames_since_start(&self) -> u64 { self.shared.frames.load(Ordering::Relaxed) }
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>) { self.diagnostics = cb; }

    fn as_device_info_provider(&self) -> Option<&dyn DeviceInfoProvider> {
        Some(self)
    }
}

impl DeviceInfoProvider for MockAudioBackend {
    fn get_device_name(&self) -> Option<&str> {
        self.info.device_name.as_deref()
    }
}

/// Pulls audio through the render function installed on a [`MockAudioBackend`].
#[derive(Clone)]
pub struct MockDriver {
    shared: Arc<MockShared>,
    channels: usize,
    sample_rate: u32,
}

impl MockDriver {
    /// Render `frames` frames and return the interleaved output. Returns
    /// silence without advancing the clock while the backend is stopped.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * self.channels];
        self.render_into(&mut out);
        out
    }

    pub fn render_into(&self, out: &mut [f32]) {
        render_shared(&self.shared, out, self.sample_rate, self.channels);
    }

    /// Render `seconds` of audio in device-sized chunks, discarding the output.
    pub fn advance(&self, seconds: f64) {
        let total = (seconds * self.sample_rate as f64).round() as usize;
        let mut scratch = vec![0.0f32; 256 * self.channels];
        let mut done = 0;
        while done < total {
            let frames = (total - done).min(256);
            self.render_into(&mut scratch[..frames * self.channels]);
            done += frames;
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn render_shared(shared: &MockShared, out: &mut [f32], sample_rate: u32, channels: usize) {
    out.iter_mut().for_each(|s| *s = 0.0);
    if !shared.running.load(Ordering::Acquire) {
        return;
    }
    let frames = out.len() / channels.max(1);
    if let Some(render) = shared.render.load_full() {
        (render)(out, sample_rate, frames);
    }
    shared.frames.fetch_add(frames as u64, Ordering::Relaxed);
}

fn pace_loop(shared: Arc<MockShared>, info: DeviceInfo) {
    let channels = info.channels as usize;
    let mut buf = vec![0.0f32; info.buffer_size * channels];
    let period = Duration::from_secs_f64(info.buffer_size as f64 / info.sample_rate as f64);
    while !shared.shutdown.load(Ordering::Acquire) {
        render_shared(&shared, &mut buf, info.sample_rate, channels);
        thread::sleep(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_renders_only_while_started() {
        let mut backend = MockAudioBackend::new();
        let driver = backend.driver();
        assert!(driver.render(64).iter().all(|s| *s == 0.0));
        assert_eq!(driver.frames_rendered(), 0);

        backend
            .start(Arc::new(|buf: &mut [f32], _sr: u32, _frames: usize| {
                buf.iter_mut().for_each(|s| *s = 0.5);
            }))
            .unwrap();
        let out = driver.render(64);
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|s| *s == 0.5));
        assert_eq!(backend.frames_since_start(), 64);

        backend.stop().unwrap();
        assert!(driver.render(64).iter().all(|s| *s == 0.0));
        assert_eq!(driver.frames_rendered(), 64);
    }

    #[test]
    fn refusing_backend_fails_first_starts() {
        let mut backend = MockAudioBackend::refusing(2);
        let noop: RenderFn = Arc::new(|_: &mut [f32], _: u32, _: usize| {});
        assert!(backend.start(noop.clone()).is_err());
        assert!(backend.start(noop.clone()).is_err());
        assert!(backend.start(noop).is_ok());
        assert!(backend.driver().is_running());
    }

    #[test]
    fn advance_renders_requested_duration() {
        let mut backend = MockAudioBackend::with_format(48_000, 2, 128);
        backend.start(Arc::new(|_: &mut [f32], _: u32, _: usize| {})).unwrap();
        let driver = backend.driver();
        driver.advance(0.5);
        assert_eq!(driver.frames_rendered(), 24_000);
    }
}
