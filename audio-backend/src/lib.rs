//! Output device abstraction for the mixer.
//!
//! A backend owns the platform stream and repeatedly invokes a [`RenderFn`] to
//! fill interleaved output buffers. Everything above this crate only ever
//! hands a render closure down and never touches the device directly.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub mod mock_backend;

#[cfg(feature = "cpal-backend")]
pub mod cpal_backend;

pub use mock_backend::{MockAudioBackend, MockDriver};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no output device available")]
    DeviceNotFound,
    #[error("unsupported stream format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to create output stream")]
    StreamCreationFailed,
    #[error("playback error: {0}")]
    PlaybackError(String),
    #[error("{0}")]
    Other(String),
}

/// Mixer callback, run on the device thread as `(interleaved, sample_rate, frames)`.
/// `interleaved` holds `frames * channels` samples and arrives zeroed.
pub type RenderFn = Arc<dyn Fn(&mut [f32], u32, usize) + Send + Sync + 'static>;

/// Out-of-band stream events, reported off the render path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// `start` was refused; the engine keeps its graph and waits for `resume`.
    StartRefused(String),
    StreamError(String),
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::StartRefused(why) => write!(f, "stream start refused: {why}"),
            DiagnosticEvent::StreamError(why) => write!(f, "stream error: {why}"),
        }
    }
}

pub type DiagnosticsCb = Arc<dyn Fn(DiagnosticEvent) + Send + Sync + 'static>;

/// Format the stream was opened with.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub channels: u16,
    pub device_name: Option<String>,
}

/// Implemented by backends that sit on a named physical device.
pub trait DeviceInfoProvider {
    fn get_device_name(&self) -> Option<&str>;
}

/// `start` may fail when the platform refuses to open the stream (for example
/// before a user gesture); callers are expected to retry later.
pub trait AudioBackend: Send {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError>;
    fn stop(&mut self) -> Result<(), BackendError>;
    fn sample_rate(&self) -> u32;
    fn buffer_size(&self) -> usize;
    fn channels(&self) -> u16;
    /// Frames rendered since the first successful `start`; frozen while stopped.
    fn frames_since_start(&self) -> u64;
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>);
    fn as_device_info_provider(&self) -> Option<&dyn DeviceInfoProvider>;
}

#[cfg(feature = "cpal-backend")]
pub fn create_audio_backend() -> Result<Box<dyn AudioBackend>, BackendError> {
    let backend = cpal_backend::CpalAudioBackend::new()?;
    log_backend("cpal", &backend);
    Ok(Box::new(backend))
}

/// Without a device backend compiled in, fall back to a mock that consumes
/// audio at wall-clock speed so timing behaves like a real device.
#[cfg(not(feature = "cpal-backend"))]
pub fn create_audio_backend() -> Result<Box<dyn AudioBackend>, BackendError> {
    let backend = MockAudioBackend::realtime();
    log_backend("mock", &backend);
    Ok(Box::new(backend))
}

fn log_backend(kind: &str, backend: &dyn AudioBackend) {
    let name = backend
        .as_device_info_provider()
        .and_then(|d| d.get_device_name().map(|s| s.to_string()))
        .unwrap_or_else(|| "<unknown>".to_string());
    tracing::info!(
        kind,
        sample_rate = backend.sample_rate(),
        buffer_size = backend.buffer_size(),
        channels = backend.channels(),
        device = %name,
        "audio backend created"
    );
}
