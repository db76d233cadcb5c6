use std::sync::Arc;

use audio_backend::{MockAudioBackend, MockDriver};
use audio_graph::{
    AnalyserOptions, AudioBuffer, AudioContext, Capabilities, ContextOptions, ContextState, GraphError,
    ListenerParam, PannerOptions, RenderEvent, SourceOptions, Vec3,
};

fn running() -> (AudioContext, MockDriver) {
    running_with(ContextOptions::default())
}

fn running_with(opts: ContextOptions) -> (AudioContext, MockDriver) {
    let backend = MockAudioBackend::new();
    let driver = backend.driver();
    let mut ctx = AudioContext::new(Box::new(backend), opts);
    ctx.resume().expect("mock backend starts");
    (ctx, driver)
}

fn constant(value: f32, frames: usize) -> Arc<AudioBuffer> {
    Arc::new(AudioBuffer::new(48_000, vec![vec![value; frames]]).unwrap())
}

fn left(out: &[f32], frame: usize) -> f32 {
    out[frame * 2]
}

#[test]
fn source_through_gain_reaches_output() {
    let (mut ctx, driver) = running();
    let src = ctx.create_buffer_source(constant(0.5, 48_000), SourceOptions::default()).unwrap();
    let gain = ctx.create_gain(0.5).unwrap();
    ctx.connect(src, gain).unwrap();
    ctx.connect(gain, ctx.destination()).unwrap();
    ctx.start(src).unwrap();

    let out = driver.render(512);
    assert!((left(&out, 300) - 0.25).abs() < 1e-6);
    assert!((out[300 * 2 + 1] - 0.25).abs() < 1e-6);
}

#[test]
fn one_shot_source_reports_end_once() {
    let (mut ctx, driver) = running();
    let src = ctx.create_buffer_source(constant(1.0, 1000), SourceOptions::default()).unwrap();
    ctx.connect(src, ctx.destination()).unwrap();
    ctx.start(src).unwrap();

    let out = driver.render(2048);
    assert!((left(&out, 999) - 1.0).abs() < 1e-6);
    assert_eq!(left(&out, 1001), 0.0);
    assert_eq!(ctx.poll_events(), vec![RenderEvent::Ended(src)]);
    assert!(ctx.is_ended(src));

    driver.render(2048);
    assert!(ctx.poll_events().is_empty());
}

#[test]
fn looped_source_runs_until_stopped() {
    let (mut ctx, driver) = running();
    let opts = SourceOptions { looped: true, ..Default::default() };
    let src = ctx.create_buffer_source(constant(0.3, 100), opts).unwrap();
    ctx.connect(src, ctx.destination()).unwrap();
    ctx.start(src).unwrap();

    let out = driver.render(4096);
    assert!((left(&out, 4000) - 0.3).abs() < 1e-6);
    assert!(ctx.poll_events().is_empty());

    ctx.stop(src).unwrap();
    // stopping twice is swallowed
    ctx.stop(src).unwrap();
    driver.render(256);
    assert_eq!(ctx.poll_events(), vec![RenderEvent::Ended(src)]);
}

#[test]
fn sources_cannot_restart() {
    let (mut ctx, _driver) = running();
    let src = ctx.create_buffer_source(constant(1.0, 10), SourceOptions::default()).unwrap();
    ctx.start(src).unwrap();
    assert!(matches!(ctx.start(src), Err(GraphError::AlreadyStarted(_))));
}

#[test]
fn linear_ramp_is_audible_sample_by_sample() {
    let (mut ctx, driver) = running();
    let src = ctx.create_buffer_source(constant(0.5, 48_000), SourceOptions::default()).unwrap();
    let gain = ctx.create_gain(1.0).unwrap();
    ctx.connect(src, gain).unwrap();
    ctx.connect(gain, ctx.destination()).unwrap();
    ctx.start(src).unwrap();
    {
        let mut p = ctx.param(gain).unwrap();
        p.set_value_at_time(1.0, 0.0);
        p.linear_ramp_to_value_at_time(0.0, 0.1);
    }

    let out = driver.render(9600);
    assert!((left(&out, 2400) - 0.25).abs() < 1e-3);
    assert!(left(&out, 4900).abs() < 1e-6);
    assert!(ctx.param_value(gain).unwrap().abs() < 1e-6);
}

#[test]
fn cycles_are_rejected() {
    let (mut ctx, _driver) = running();
    let a = ctx.create_gain(1.0).unwrap();
    let b = ctx.create_gain(1.0).unwrap();
    let c = ctx.create_gain(1.0).unwrap();
    ctx.connect(a, b).unwrap();
    ctx.connect(b, c).unwrap();
    assert!(matches!(ctx.connect(c, a), Err(GraphError::Cycle { .. })));
    assert!(matches!(ctx.connect(a, a), Err(GraphError::Cycle { .. })));
}

#[test]
fn freed_ids_go_stale() {
    let (mut ctx, _driver) = running();
    let before = ctx.live_nodes();
    let g = ctx.create_gain(1.0).unwrap();
    ctx.connect(g, ctx.destination()).unwrap();
    ctx.free(g).unwrap();
    assert_eq!(ctx.live_nodes(), before);
    assert!(!ctx.is_live(g));
    assert!(matches!(ctx.connect(g, ctx.destination()), Err(GraphError::UnknownNode(_))));

    // slot reuse hands out a fresh generation
    let h = ctx.create_gain(1.0).unwrap();
    assert_eq!(h.index(), g.index());
    assert_ne!(h, g);
}

#[test]
fn refused_resume_can_be_retried() {
    let backend = MockAudioBackend::refusing(1);
    let driver = backend.driver();
    let mut ctx = AudioContext::new(Box::new(backend), ContextOptions::default());
    assert!(ctx.resume().is_err());
    assert_eq!(ctx.state(), ContextState::Suspended);

    // work queued while suspended plays once running
    let src = ctx.create_buffer_source(constant(0.5, 4800), SourceOptions::default()).unwrap();
    ctx.connect(src, ctx.destination()).unwrap();
    ctx.start(src).unwrap();
    assert_eq!(ctx.current_time(), 0.0);

    ctx.resume().unwrap();
    assert_eq!(ctx.state(), ContextState::Running);
    let out = driver.render(256);
    assert!((left(&out, 10) - 0.5).abs() < 1e-6);
}

#[test]
fn overflowing_commands_wait_in_backlog() {
    let (mut ctx, driver) = running_with(ContextOptions { queue_capacity: 16, ..Default::default() });
    let src = ctx.create_buffer_source(constant(0.5, 48_000), SourceOptions::default()).unwrap();
    let mut prev = src;
    for _ in 0..30 {
        let g = ctx.create_gain(1.0).unwrap();
        ctx.connect(prev, g).unwrap();
        prev = g;
    }
    ctx.connect(prev, ctx.destination()).unwrap();
    ctx.start(src).unwrap();
    assert!(ctx.pending_commands() > 16);

    for _ in 0..16 {
        driver.render(128);
        ctx.poll_events();
    }
    assert_eq!(ctx.pending_commands(), 0);
    let out = driver.render(128);
    assert!((left(&out, 64) - 0.5).abs() < 1e-6);
}

#[test]
fn panner_applies_distance_and_equal_power() {
    let (mut ctx, driver) = running();
    let src = ctx.create_buffer_source(constant(0.5, 48_000), SourceOptions::default()).unwrap();
    let panner = ctx
        .create_panner(PannerOptions {
            ref_distance: 1.0,
            max_distance: 50.0,
            rolloff_factor: 1.0,
            position: Vec3::new(0.0, 0.0, -2.0),
        })
        .unwrap();
    ctx.connect(src, panner).unwrap();
    ctx.connect(panner, ctx.destination()).unwrap();
    ctx.start(src).unwrap();

    let out = driver.render(256);
    let expected = 0.5 * 0.5 * std::f32::consts::FRAC_1_SQRT_2;
    assert!((left(&out, 200) - expected).abs() < 1e-4);

    ctx.set_panner_position(panner, Vec3::new(2.0, 0.0, 0.0)).unwrap();
    let out = driver.render(512);
    assert!(out[400 * 2 + 1] > 0.2);
    assert!(left(&out, 400).abs() < 1e-3);
}

#[test]
fn listener_automation_follows_capabilities() {
    let opts = ContextOptions { capabilities: Capabilities { listener_automation: false }, ..Default::default() };
    let (mut ctx, _driver) = running_with(opts);
    assert!(matches!(
        ctx.set_listener_param_at_time(ListenerParam::PositionX, 1.0, 0.0),
        Err(GraphError::Unsupported(_))
    ));
    ctx.set_listener_position(Vec3::new(1.0, 2.0, 3.0)).unwrap();
    assert_eq!(ctx.listener_frame().position, Vec3::new(1.0, 2.0, 3.0));

    let (mut ctx, _driver) = running();
    ctx.set_listener_param_at_time(ListenerParam::PositionX, 4.0, 0.0).unwrap();
    assert_eq!(ctx.listener_frame().position.x, 4.0);
}

#[test]
fn analyser_sees_what_plays() {
    let (mut ctx, driver) = running();
    let tone: Vec<f32> = (0..48_000)
        .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 48_000.0).sin() * 0.5)
        .collect();
    let buf = Arc::new(AudioBuffer::new(48_000, vec![tone]).unwrap());
    let src = ctx.create_buffer_source(buf, SourceOptions::default()).unwrap();
    let analyser = ctx.create_analyser(AnalyserOptions::default()).unwrap();
    ctx.connect(src, analyser).unwrap();
    ctx.connect(analyser, ctx.destination()).unwrap();
    ctx.start(src).unwrap();
    driver.render(4096);

    let mut bins = vec![0u8; ctx.frequency_bin_count(analyser).unwrap()];
    assert_eq!(bins.len(), 128);
    ctx.get_byte_frequency_data(analyser, &mut bins).unwrap();
    // 1 kHz sits in bin 1000 / (48000 / 256) ~= 5
    assert!(bins[5] > 100);
}

#[test]
fn closed_context_rejects_work() {
    let (mut ctx, _driver) = running();
    ctx.close();
    assert_eq!(ctx.state(), ContextState::Closed);
    assert!(matches!(ctx.create_gain(1.0), Err(GraphError::Closed)));
    assert!(matches!(ctx.resume(), Err(GraphError::Closed)));
}
