use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::{AudioBackend, BackendError, DeviceInfo, DeviceInfoProvider, DiagnosticEvent, DiagnosticsCb, RenderFn};

/// Default output device through cpal.
///
/// `cpal::Stream` is not `Send`, so a dedicated thread owns it and this handle
/// only sends it [`Command`]s.
pub struct CpalAudioBackend {
    inner: Arc<CpalBackendInner>,
    commands: Sender<Command>,
}

struct CpalBackendInner {
    info: DeviceInfo,
    render: ArcSwapOption<RenderFn>,
    frames: AtomicU64,
}

enum Command {
    Start(Sender<Result<(), BackendError>>),
    Stop,
    SetDiagnostics(Option<DiagnosticsCb>),
    Shutdown,
}

impl CpalAudioBackend {
    pub fn new() -> Result<Self, BackendError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(BackendError::DeviceNotFound)?;

        let config = pick_config(&device)?;
        let buffer_size = match config.buffer_size {
            cpal::BufferSize::Fixed(n) => n as usize,
            cpal::BufferSize::Default => 0,
        };

        let info = DeviceInfo {
            sample_rate: config.sample_rate.0,
            buffer_size,
            channels: config.channels,
            device_name: device.name().ok(),
        };

        let (commands, rx) = unbounded::<Command>();

        let inner = Arc::new(CpalBackendInner {
            info,
            render: ArcSwapOption::from(None),
            frames: AtomicU64::new(0),
        });

        let owner = inner.clone();
        thread::Builder::new()
            .name("casino-audio-output".to_string())
            .spawn(move || own_stream(device, config, rx, owner))
            .map_err(|e| BackendError::Other(e.to_string()))?;

        Ok(Self { inner, commands })
    }

    fn send(&self, cmd: Command) -> Result<(), BackendError> {
        self.commands
            .send(cmd)
            .map_err(|_| BackendError::Other("output thread is gone".into()))
    }
}

const PREFERRED_RATE: u32 = 48_000;

/// Stereo-or-wider f32 output, at 48 kHz when the device can do it.
fn pick_config(device: &Device) -> Result<StreamConfig, BackendError> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| BackendError::Other(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();
    let range = ranges
        .iter()
        .find(|c| c.channels() >= 2 && (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&PREFERRED_RATE))
        .or_else(|| ranges.iter().find(|c| c.channels() >= 2))
        .or_else(|| ranges.first())
        .cloned()
        .ok_or_else(|| BackendError::UnsupportedFormat("device offers no f32 output".into()))?;
    let fits = (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&PREFERRED_RATE);
    let supported = if fits {
        range.with_sample_rate(cpal::SampleRate(PREFERRED_RATE))
    } else {
        range.with_max_sample_rate()
    };
    Ok(supported.config())
}

impl Drop for CpalAudioBackend {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

fn report(diagnostics: &Option<DiagnosticsCb>, event: DiagnosticEvent) {
    if let Some(cb) = diagnostics {
        let cb = cb.clone();
        thread::spawn(move || cb(event));
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    inner: &Arc<CpalBackendInner>,
    diagnostics: &Option<DiagnosticsCb>,
) -> Result<cpal::Stream, BackendError> {
    let shared = inner.clone();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let on_error = {
        let diagnostics = diagnostics.clone();
        move |err: cpal::StreamError| {
            tracing::warn!(error = %err, "output stream error");
            report(&diagnostics, DiagnosticEvent::StreamError(err.to_string()));
        }
    };

    let on_data = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        let frames = data.len() / channels;
        data.fill(0.0);
        if let Some(render) = shared.render.load_full() {
            // a panicking mixer must not take the device thread down with it
            let rendered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (render)(data, sample_rate, frames);
            }));
            if rendered.is_err() {
                data.fill(0.0);
            }
        }
        shared.frames.fetch_add(frames as u64, Ordering::Relaxed);
    };

    let stream = device
        .build_output_stream(config, on_data, on_error, None)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to build output stream");
            BackendError::StreamCreationFailed
        })?;
    stream
        .play()
        .map_err(|e| BackendError::PlaybackError(e.to_string()))?;
    Ok(stream)
}

fn own_stream(device: Device, config: StreamConfig, rx: Receiver<Command>, inner: Arc<CpalBackendInner>) {
    let mut diagnostics: Option<DiagnosticsCb> = None;
    let mut stream: Option<cpal::Stream> = None;

    // a closed channel means the handle was dropped
    while let Ok(cmd) = rx.recv() {
        match cmd {
            Command::Start(reply) => {
                let result = match stream {
                    Some(_) => Ok(()),
                    None => build_stream(&device, &config, &inner, &diagnostics).map(|s| stream = Some(s)),
                };
                if let Err(e) = &result {
                    report(&diagnostics, DiagnosticEvent::StartRefused(e.to_string()));
                }
                let _ = reply.send(result);
            }
            Command::Stop => stream = None,
            Command::SetDiagnostics(cb) => diagnostics = cb,
            Command::Shutdown => break,
        }
    }
    tracing::debug!("output thread finished");
}

impl AudioBackend for CpalAudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError> {
        self.inner.render.store(Some(Arc::new(render)));
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Command::Start(reply_tx))?;
        let result = reply_rx
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| BackendError::Other("output thread did not answer".into()))
            .and_then(|r| r);
        if result.is_err() {
            self.inner.render.store(None);
        }
        result
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.send(Command::Stop)?;
        self.inner.render.store(None);
        Ok(())
    }

    fn sample_rate(&self) -> u32 { self.inner.info.sample_rate }
    fn buffer_size(&self) -> usize { self.inner.info.buffer_size }
    fn channels(&self) -> u16 { self.inner.info.channels }
    fn frames_since_start(&self) -> u64 { self.inner.frames.load(Ordering::Relaxed) }
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>) {
        self.send(Command::SetDiagnostics(cb)).ok();
    }

    fn as_device_info_provider(&self) -> Option<&dyn DeviceInfoProvider> {
        Some(self)
    }
}

impl DeviceInfoProvider for CpalAudioBackend {
    fn get_device_name(&self) -> Option<&str> {
        self.inner.info.device_name.as_deref()
    }
}
