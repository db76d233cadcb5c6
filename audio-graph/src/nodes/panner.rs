use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

use crate::listener::ListenerFrame;
use crate::node::{NodeMessage, Processor, QUANTUM, Quantum, RenderScope};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PannerOptions {
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
    pub position: Vec3,
}

impl Default for PannerOptions {
    fn default() -> Self {
        Self { ref_distance: 1.0, max_distance: 10_000.0, rolloff_factor: 1.0, position: Vec3::ZERO }
    }
}

impl PannerOptions {
    /// Replaces negative or non-finite distance fields with the defaults.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let pick = |v: f32, fallback: f32| if v.is_finite() && v >= 0.0 { v } else { fallback };
        let position = if self.position.is_finite() { self.position } else { d.position };
        Self {
            ref_distance: pick(self.ref_distance, d.ref_distance),
            max_distance: pick(self.max_distance, d.max_distance),
            rolloff_factor: pick(self.rolloff_factor, d.rolloff_factor),
            position,
        }
    }
}

/// Inverse-distance attenuation: unity inside `ref_distance`, flat beyond `max_distance`.
pub fn inverse_distance_gain(distance: f32, ref_distance: f32, max_distance: f32, rolloff: f32) -> f32 {
    if !ref_distance.is_finite() || ref_distance < 0.0 {
        return 1.0;
    }
    let d = distance.clamp(ref_distance, max_distance.max(ref_distance));
    let denom = ref_distance + rolloff * (d - ref_distance);
    if denom <= 0.0 || !denom.is_finite() {
        return 1.0;
    }
    (ref_distance / denom).clamp(0.0, 1.0)
}

/// Equal-power left/right gains for a source relative to the listener.
pub(crate) fn equal_power_gains(listener: &ListenerFrame, position: Vec3) -> (f32, f32) {
    let rel = position - listener.position;
    let dist = rel.length();
    let right = listener.forward.cross(listener.up).normalize_or_zero();
    let x = if dist > f32::EPSILON && right != Vec3::ZERO {
        (rel.dot(right) / dist).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    // azimuth folded into [-90, 90] degrees, mapped to 0..1 across the stereo field
    let azimuth = x.asin();
    let pan = (azimuth / FRAC_PI_2 + 1.0) * 0.5;
    ((pan * FRAC_PI_2).cos(), (pan * FRAC_PI_2).sin())
}

pub(crate) struct PannerProcessor {
    opts: PannerOptions,
    last: Option<(f32, f32)>,
}

impl PannerProcessor {
    pub(crate) fn new(opts: PannerOptions) -> Self {
        Self { opts: opts.sanitized(), last: None }
    }

    fn target(&self, listener: &ListenerFrame) -> (f32, f32) {
        let distance = (self.opts.position - listener.position).length();
        let att = inverse_distance_gain(
            distance,
            self.opts.ref_distance,
            self.opts.max_distance,
            self.opts.rolloff_factor,
        );
        let (l, r) = equal_power_gains(listener, self.opts.position);
        (l * att, r * att)
    }
}

impl Processor for PannerProcessor {
    fn process(&mut self, input: &Quantum, output: &mut Quantum, scope: &RenderScope<'_>) {
        let (tl, tr) = self.target(scope.listener);
        let (sl, sr) = self.last.unwrap_or((tl, tr));
        let dl = (tl - sl) / QUANTUM as f32;
        let dr = (tr - sr) / QUANTUM as f32;
        for i in 0..QUANTUM {
            let mono = (input.channels[0][i] + input.channels[1][i]) * 0.5;
            let k = i as f32;
            output.channels[0][i] = mono * (sl + dl * k);
            output.channels[1][i] = mono * (sr + dr * k);
        }
        self.last = Some((tl, tr));
    }

    fn handle(&mut self, msg: NodeMessage) {
        if let NodeMessage::Position(p) = msg {
            if p.is_finite() {
                self.opts.position = p;
            }
        }
    }
}
