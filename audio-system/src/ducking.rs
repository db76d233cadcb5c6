use audio_graph::{AudioContext, Result as GraphResult};
use tracing::debug;

use crate::bus::{Bus, BusGraph, ramp_from_now};

/// Reversible attenuation of a set of buses.
///
/// The duck is a scale on the bus graph, not a snapshot of gains: the level a
/// bus returns to is always its stored volume, whatever happened meanwhile.
#[derive(Debug, Default)]
pub struct Ducker {
    ducked: Vec<Bus>,
    active: bool,
}

impl Ducker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ducking(&self) -> bool {
        self.active
    }

    pub fn ducks(&self, bus: Bus) -> bool {
        self.ducked.contains(&bus)
    }

    /// Ramps each bus from wherever it is to `amount` times its stored volume.
    /// A second call while ducking does nothing.
    pub fn start(
        &mut self,
        ctx: &mut AudioContext,
        buses: &mut BusGraph,
        targets: &[Bus],
        amount: f32,
        fade: f32,
    ) -> GraphResult<bool> {
        if self.active {
            return Ok(false);
        }
        let amount = if amount.is_finite() { amount.clamp(0.0, 1.0) } else { 1.0 };
        self.ducked.clear();
        for &bus in targets {
            if self.ducked.contains(&bus) {
                continue;
            }
            buses.set_duck_scale(bus, amount);
            ramp_from_now(ctx, buses.node(bus), buses.level(bus), fade)?;
            self.ducked.push(bus);
        }
        self.active = true;
        debug!(amount, fade, buses = self.ducked.len(), "ducking started");
        Ok(true)
    }

    /// Ramps every ducked bus from wherever it is back to its stored volume.
    pub fn stop(&mut self, ctx: &mut AudioContext, buses: &mut BusGraph, fade: f32) -> GraphResult<bool> {
        if !self.active {
            return Ok(false);
        }
        self.active = false;
        for bus in self.ducked.drain(..) {
            buses.set_duck_scale(bus, 1.0);
            ramp_from_now(ctx, buses.node(bus), buses.level(bus), fade)?;
        }
        debug!(fade, "ducking stopped");
        Ok(true)
    }
}
