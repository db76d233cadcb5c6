//! End-to-end behaviour of the mixing engine, driven block by block through
//! the mock device.

use audio_system::{Bus, PlayOptions, PlayOutcome, SpatialOptions};
use glam::vec3;
use integration_tests::{BLOCK, Harness, peak};

fn close(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn preloaded_sound_is_audible_in_the_next_block() {
    let mut h = Harness::new();
    assert!(h.engine.is_sound_ready("coin"));
    let decodes = h.engine.stats().decodes_started;

    assert_eq!(h.engine.play("coin", PlayOptions::default()), PlayOutcome::Started);
    let out = h.driver.render(BLOCK);
    assert!(peak(&out) > 0.01, "no signal after one block");
    assert_eq!(h.engine.stats().decodes_started, decodes);
}

#[test]
fn concurrent_requests_share_one_decode() {
    let mut h = Harness::new();
    let decodes = h.engine.stats().decodes_started;
    let fetches = h.source.fetch_count();

    for _ in 0..10 {
        assert_eq!(h.engine.play("jackpot", PlayOptions::default()), PlayOutcome::Queued);
    }
    assert_eq!(h.engine.stats().decodes_started, decodes + 1);
    assert_eq!(h.engine.stats().queued_requests, 10);

    h.settle();
    assert_eq!(h.source.fetch_count(), fetches + 1);
    assert_eq!(h.engine.stats().active_direct_voices, 10);

    // a later request hits the cache
    assert_eq!(h.engine.play("jackpot", PlayOptions::default()), PlayOutcome::Started);
    assert_eq!(h.engine.stats().decodes_started, decodes + 1);
}

#[test]
fn exhausted_pool_steals_instead_of_growing() {
    let mut h = Harness::new();
    for _ in 0..7 {
        assert_eq!(h.engine.play("coin", PlayOptions::default()), PlayOutcome::Started);
    }
    assert_eq!(h.engine.pool_active("coin"), Some(4));
    assert!(peak(&h.driver.render(BLOCK)) > 0.01);

    h.run_for(0.3);
    assert_eq!(h.engine.pool_active("coin"), Some(0));
}

#[test]
fn unducking_restores_pre_duck_levels() {
    let mut h = Harness::new();
    let ducked = [Bus::Ambient, Bus::Sfx, Bus::Ui];
    let before: Vec<f32> = ducked.iter().map(|b| h.engine.bus_gain(*b)).collect();

    assert!(h.engine.start_ducking(Some(0.3), Some(0.1)));
    assert!(!h.engine.start_ducking(None, None));
    h.run_for(0.2);
    for (bus, level) in ducked.iter().zip(&before) {
        assert!(close(h.engine.bus_gain(*bus), level * 0.3, 1e-3), "{bus:?} not ducked");
    }
    assert!(close(h.engine.bus_gain(Bus::Slots), 0.9, 1e-6));

    // unrelated buses move while ducked
    h.engine.set_bus_volume(Bus::Slots, 0.2);
    h.engine.set_bus_volume(Bus::Master, 0.5);

    assert!(h.engine.stop_ducking(Some(0.1)));
    assert!(!h.engine.is_ducking());
    h.run_for(0.2);
    for (bus, level) in ducked.iter().zip(&before) {
        assert!(close(h.engine.bus_gain(*bus), *level, 1e-3), "{bus:?} not restored");
    }
    assert!(close(h.engine.bus_gain(Bus::Slots), 0.2, 1e-6));
    assert!(close(h.engine.bus_gain(Bus::Master), 0.5, 1e-6));
}

#[test]
fn reversing_a_duck_midway_does_not_jump() {
    let mut h = Harness::new();
    h.engine.start_ducking(Some(0.3), Some(1.0));
    h.run_for(0.5);
    let midway = h.engine.bus_gain(Bus::Ambient);
    assert!(midway < 0.6 && midway > 0.18, "ramp not in progress: {midway}");

    h.engine.stop_ducking(Some(1.0));
    assert!(close(h.engine.bus_gain(Bus::Ambient), midway, 0.01));
    h.run_for(1.1);
    assert!(close(h.engine.bus_gain(Bus::Ambient), 0.6, 1e-3));
}

#[test]
fn volume_set_while_ducked_survives_the_release() {
    let mut h = Harness::new();
    h.engine.start_ducking(Some(0.3), Some(0.1));
    h.run_for(0.2);

    h.engine.set_bus_volume(Bus::Ambient, 0.2);
    assert!(h.engine.is_ducking());
    assert!(close(h.engine.bus_volume(Bus::Ambient), 0.2, 1e-6));
    assert!(close(h.engine.bus_gain(Bus::Ambient), 0.2 * 0.3, 1e-4), "new volume ignored the duck");

    h.engine.stop_ducking(Some(0.1));
    h.run_for(0.2);
    assert!(close(h.engine.bus_gain(Bus::Ambient), 0.2, 1e-3));
    assert!(close(h.engine.bus_gain(Bus::Sfx), 0.8, 1e-3));
}

#[test]
fn ducking_again_during_the_release_still_recovers() {
    let mut h = Harness::new();
    h.engine.start_ducking(Some(0.3), Some(0.3));
    h.run_for(0.4);
    h.engine.stop_ducking(Some(0.5));
    h.run_for(0.1);
    let partial = h.engine.bus_gain(Bus::Ambient);
    assert!(partial > 0.18 && partial < 0.6, "release not in progress: {partial}");

    h.engine.start_ducking(Some(0.3), Some(0.3));
    h.run_for(0.4);
    assert!(close(h.engine.bus_gain(Bus::Ambient), 0.6 * 0.3, 1e-3));
    h.engine.stop_ducking(Some(0.5));
    h.run_for(1.0);
    assert!(close(h.engine.bus_gain(Bus::Ambient), 0.6, 1e-3));
    assert!(close(h.engine.bus_gain(Bus::Ambient), h.engine.bus_volume(Bus::Ambient), 1e-3));
}

#[test]
fn crossfade_to_the_playing_track_only_changes_volume() {
    let mut h = Harness::new();
    assert_eq!(h.engine.crossfade_ambient_music("lounge", Some(0.2), Some(0.5)), PlayOutcome::Queued);
    h.settle();
    assert!(h.engine.is_ambient_playing());
    assert_eq!(h.engine.current_ambient_track().as_deref(), Some("lounge"));
    h.run_for(0.3);

    let source = h.engine.ambient_source();
    let nodes = h.engine.stats().live_nodes;
    assert_eq!(h.engine.crossfade_ambient_music("lounge", None, Some(0.2)), PlayOutcome::Started);
    assert_eq!(h.engine.ambient_source(), source);
    assert_eq!(h.engine.stats().live_nodes, nodes);
    h.run_for(0.6);
    assert!(close(h.engine.ambient_gain().unwrap_or(-1.0), 0.2, 1e-3));

    // a different track replaces the old one and the old chain is freed
    assert_eq!(h.engine.crossfade_ambient_music("night", Some(0.2), None), PlayOutcome::Queued);
    h.settle();
    assert_eq!(h.engine.current_ambient_track().as_deref(), Some("night"));
    assert_ne!(h.engine.ambient_source(), source);
    h.run_for(0.5);
    assert_eq!(h.engine.stats().live_nodes, nodes);
}

#[test]
fn replacing_a_spatial_voice_leaks_nothing() {
    let mut h = Harness::new();
    h.engine.play_spatial("warmup", "fire", vec3(0.0, 0.0, 0.0), SpatialOptions::default());
    h.settle();
    h.engine.stop_spatial("warmup");
    let baseline = h.engine.stats().live_nodes;

    let torch = SpatialOptions::looped();
    assert!(h.engine.play_spatial("torch", "fire", vec3(1.0, 0.0, 0.0), torch).is_started());
    assert!(h.engine.play_spatial("torch", "fire", vec3(4.0, 0.0, -2.0), torch).is_started());
    assert_eq!(h.engine.stats().spatial_voices, 1);
    assert_eq!(h.engine.stats().live_nodes, baseline + 3);
    assert_eq!(h.engine.spatial_voice("torch").map(|v| v.position), Some(vec3(4.0, 0.0, -2.0)));

    h.engine.update_spatial_position("torch", vec3(-3.0, 1.0, 0.0));
    h.engine.update_spatial_position("ghost", vec3(9.0, 9.0, 9.0));
    assert_eq!(h.engine.spatial_voice("torch").map(|v| v.position), Some(vec3(-3.0, 1.0, 0.0)));

    // looped voices outlive their buffer
    h.run_for(1.5);
    assert_eq!(h.engine.stats().spatial_voices, 1);

    assert!(h.engine.stop_spatial("torch"));
    assert!(!h.engine.stop_spatial("torch"));
    assert_eq!(h.engine.stats().live_nodes, baseline);
}

#[test]
fn queued_spatial_request_keeps_only_the_latest() {
    let mut h = Harness::new();
    let opts = SpatialOptions::looped();
    assert_eq!(h.engine.play_spatial("torch", "fire", vec3(1.0, 0.0, 0.0), opts), PlayOutcome::Queued);
    assert_eq!(h.engine.play_spatial("torch", "fire", vec3(2.0, 0.0, 0.0), opts), PlayOutcome::Queued);
    assert_eq!(h.engine.stats().queued_requests, 1);
    h.engine.update_spatial_position("torch", vec3(5.0, 0.0, 0.0));

    h.settle();
    assert_eq!(h.engine.stats().spatial_voices, 1);
    assert_eq!(h.engine.spatial_voice("torch").map(|v| v.position), Some(vec3(5.0, 0.0, 0.0)));
}

#[test]
fn nonsense_distance_model_still_renders() {
    let mut h = Harness::new();
    let opts = SpatialOptions {
        ref_distance: Some(f32::NAN),
        max_distance: Some(-4.0),
        rolloff_factor: Some(f32::INFINITY),
        ..SpatialOptions::looped()
    };
    h.engine.play_spatial("torch", "fire", vec3(3.0, 0.0, 0.0), opts);
    h.settle();
    assert_eq!(h.engine.stats().spatial_voices, 1);
    let out = h.run_for(0.2);
    assert!(out.iter().all(|s| s.is_finite()));
    assert!(peak(&out) > 0.001, "voice went silent");
}

#[test]
fn unmuting_restores_stored_volumes() {
    let mut h = Harness::new();
    let defaults: Vec<f32> = Bus::ALL.iter().map(|b| h.engine.bus_gain(*b)).collect();
    assert_eq!(defaults, vec![1.0, 0.6, 0.8, 0.9, 0.7]);

    h.engine.set_muted(true);
    assert!(h.engine.is_muted());
    assert_eq!(h.engine.bus_gain(Bus::Master), 0.0);
    assert_eq!(h.engine.bus_volume(Bus::Master), 1.0);
    assert_eq!(h.engine.bus_gain(Bus::Sfx), 0.8);

    h.engine.set_muted(false);
    let restored: Vec<f32> = Bus::ALL.iter().map(|b| h.engine.bus_gain(*b)).collect();
    assert_eq!(restored, defaults);
}

#[test]
fn master_volume_set_while_muted_applies_on_unmute() {
    let mut h = Harness::new();
    h.engine.set_muted(true);
    h.engine.set_bus_volume(Bus::Master, 0.4);
    assert_eq!(h.engine.bus_gain(Bus::Master), 0.0);
    assert_eq!(h.engine.bus_volume(Bus::Master), 0.4);

    h.engine.play("coin", PlayOptions::default());
    assert_eq!(peak(&h.driver.render(BLOCK)), 0.0);

    h.engine.set_muted(false);
    assert!(close(h.engine.bus_gain(Bus::Master), 0.4, 1e-6));
}

#[test]
fn bus_volume_is_clamped() {
    let mut h = Harness::new();
    h.engine.set_bus_volume(Bus::Ui, 3.0);
    assert_eq!(h.engine.bus_volume(Bus::Ui), 1.0);
    h.engine.set_bus_volume(Bus::Ui, -1.0);
    assert_eq!(h.engine.bus_volume(Bus::Ui), 0.0);
    h.engine.set_bus_volume(Bus::Ui, f32::NAN);
    assert_eq!(h.engine.bus_volume(Bus::Ui), 0.0);
}

#[test]
fn analysis_levels_stay_normalized() {
    let mut h = Harness::new();
    assert_eq!(h.engine.average_volume(), 0.0);

    h.engine.play("fire", PlayOptions::volume(1.0).looped());
    h.settle();
    for _ in 0..8 {
        h.engine.play("coin", PlayOptions::volume(1.0));
    }
    h.run_for(0.2);

    let bins = h.engine.frequency_data();
    assert_eq!(bins.len(), 128);
    assert!(bins.iter().any(|b| *b > 0));
    let avg = h.engine.average_volume();
    let bass = h.engine.bass_level();
    assert!(avg > 0.0 && avg <= 1.0, "average {avg}");
    assert!(bass > 0.0 && bass <= 1.0, "bass {bass}");
}
