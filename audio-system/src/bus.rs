//! Statically wired bus tree.
//!
//! ```text
//! ambient ─┐
//! sfx ─────┼──────────────► master ─► analyser ─► compressor ─► destination
//! slots ───┤                  ▲
//! ui ──────┘                  │
//! sfx, slots ─► reverb ─► reverb_return
//! ```

use asset_manager::BusKind;
use audio_graph::{AudioBuffer, AudioContext, NodeId, Result as GraphResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, ReverbConfig};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Bus {
    Master,
    Ambient,
    Sfx,
    Slots,
    Ui,
}

impl Bus {
    pub const ALL: [Bus; 5] = [Bus::Master, Bus::Ambient, Bus::Sfx, Bus::Slots, Bus::Ui];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Bus::Master => "master",
            Bus::Ambient => "ambient",
            Bus::Sfx => "sfx",
            Bus::Slots => "slots",
            Bus::Ui => "ui",
        }
    }

    pub fn parse(name: &str) -> Option<Bus> {
        Bus::ALL.into_iter().find(|b| b.name() == name)
    }
}

impl From<BusKind> for Bus {
    fn from(kind: BusKind) -> Self {
        match kind {
            BusKind::Ambient => Bus::Ambient,
            BusKind::Sfx => Bus::Sfx,
            BusKind::Slots => Bus::Slots,
            BusKind::Ui => Bus::Ui,
        }
    }
}

pub struct BusGraph {
    gains: [NodeId; 5],
    /// Stored volumes; what the buses return to after ducking or muting.
    volumes: [f32; 5],
    /// Attenuation from ducking, 1.0 when the bus is not ducked.
    duck: [f32; 5],
    muted: bool,
    analyser: NodeId,
    compressor: NodeId,
    reverb: NodeId,
    reverb_return: NodeId,
}

impl BusGraph {
    pub fn create(ctx: &mut AudioContext, config: &EngineConfig) -> GraphResult<Self> {
        let volumes = Bus::ALL.map(|b| config.bus_volumes.get(b).clamp(0.0, 1.0));
        let mut gains = [ctx.destination(); 5];
        for bus in Bus::ALL {
            gains[bus.slot()] = ctx.create_gain(volumes[bus.slot()])?;
        }
        let master = gains[Bus::Master.slot()];

        let analyser = ctx.create_analyser(config.analyser.into())?;
        let compressor = ctx.create_compressor(config.compressor.into())?;
        ctx.connect(master, analyser)?;
        ctx.connect(analyser, compressor)?;
        ctx.connect(compressor, ctx.destination())?;

        for bus in [Bus::Ambient, Bus::Sfx, Bus::Slots, Bus::Ui] {
            ctx.connect(gains[bus.slot()], master)?;
        }

        let impulse = reverb_impulse(ctx.sample_rate(), &config.reverb)?;
        let reverb = ctx.create_convolver(&impulse, true)?;
        let reverb_return = ctx.create_gain(config.reverb.return_gain)?;
        ctx.connect(gains[Bus::Sfx.slot()], reverb)?;
        ctx.connect(gains[Bus::Slots.slot()], reverb)?;
        ctx.connect(reverb, reverb_return)?;
        ctx.connect(reverb_return, master)?;

        tracing::debug!(nodes = ctx.live_nodes(), "bus graph wired");
        Ok(Self { gains, volumes, duck: [1.0; 5], muted: false, analyser, compressor, reverb, reverb_return })
    }

    pub fn node(&self, bus: Bus) -> NodeId {
        self.gains[bus.slot()]
    }

    pub fn analyser(&self) -> NodeId {
        self.analyser
    }

    pub fn compressor(&self) -> NodeId {
        self.compressor
    }

    pub fn reverb(&self) -> NodeId {
        self.reverb
    }

    pub fn reverb_return(&self) -> NodeId {
        self.reverb_return
    }

    /// Stored volume, independent of ducking and mute.
    pub fn volume(&self, bus: Bus) -> f32 {
        self.volumes[bus.slot()]
    }

    /// Gain the bus has right now, automation included.
    pub fn realized_gain(&self, ctx: &AudioContext, bus: Bus) -> f32 {
        ctx.param_value(self.node(bus)).unwrap_or(0.0)
    }

    /// Gain the bus settles at: stored volume, times the duck, zero for a muted master.
    pub fn level(&self, bus: Bus) -> f32 {
        if bus == Bus::Master && self.muted {
            return 0.0;
        }
        self.volumes[bus.slot()] * self.duck[bus.slot()]
    }

    pub fn duck_scale(&self, bus: Bus) -> f32 {
        self.duck[bus.slot()]
    }

    /// Sets the attenuation `level` is computed with; the gain itself is left to the caller.
    pub(crate) fn set_duck_scale(&mut self, bus: Bus, scale: f32) {
        self.duck[bus.slot()] = if scale.is_finite() { scale.clamp(0.0, 1.0) } else { 1.0 };
    }

    /// Stores the volume and applies it at once, scaled by any duck in effect.
    pub fn set_volume(&mut self, ctx: &mut AudioContext, bus: Bus, volume: f32) -> GraphResult<()> {
        let v = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        self.volumes[bus.slot()] = v;
        let level = self.level(bus);
        ctx.param(self.node(bus))?.set_value(level);
        Ok(())
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Only touches the master gain; stored volumes stay as they are.
    pub fn set_muted(&mut self, ctx: &mut AudioContext, muted: bool) -> GraphResult<()> {
        self.muted = muted;
        let level = self.level(Bus::Master);
        ctx.param(self.node(Bus::Master))?.set_value(level);
        Ok(())
    }
}

/// Ramps a gain from its value at `now` to `target` over `fade` seconds.
/// Whatever automation was still pending is cut at `now` first.
pub(crate) fn ramp_from_now(ctx: &mut AudioContext, gain: NodeId, target: f32, fade: f32) -> GraphResult<()> {
    let now = ctx.current_time();
    let mut param = ctx.param(gain)?;
    if fade <= 0.0 || !fade.is_finite() {
        param.set_value(target);
        return Ok(());
    }
    param.cancel_and_hold_at_time(now);
    param.linear_ramp_to_value_at_time(target, now + fade as f64);
    Ok(())
}

/// Stereo noise under a `(1 - t)^decay` envelope.
pub(crate) fn reverb_impulse(sample_rate: u32, cfg: &ReverbConfig) -> GraphResult<AudioBuffer> {
    let frames = ((cfg.duration.max(0.01) * sample_rate as f32) as usize).max(1);
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let channels: Vec<Vec<f32>> = (0..2)
        .map(|_| {
            (0..frames)
                .map(|i| {
                    let t = i as f32 / frames as f32;
                    (rng.random::<f32>() * 2.0 - 1.0) * (1.0 - t).powf(cfg.decay)
                })
                .collect()
        })
        .collect();
    AudioBuffer::new(sample_rate, channels)
}
