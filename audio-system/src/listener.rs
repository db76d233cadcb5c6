//! Listener placement across platform variants.
//!
//! Some platforms expose the listener as automatable params, others only as
//! direct setters. The engine picks one strategy when it initializes.

use audio_graph::{AudioContext, Capabilities, ListenerParam, Result as GraphResult, Vec3};

pub trait ListenerStrategy: Send {
    fn update(&self, ctx: &mut AudioContext, position: Vec3, forward: Vec3, up: Vec3) -> GraphResult<()>;

    fn name(&self) -> &'static str;
}

/// Schedules all nine listener params at the current time.
pub struct ParamListener;

impl ListenerStrategy for ParamListener {
    fn update(&self, ctx: &mut AudioContext, position: Vec3, forward: Vec3, up: Vec3) -> GraphResult<()> {
        let now = ctx.current_time();
        let values = [
            position.x, position.y, position.z,
            forward.x, forward.y, forward.z,
            up.x, up.y, up.z,
        ];
        for (param, value) in ListenerParam::ALL.into_iter().zip(values) {
            ctx.set_listener_param_at_time(param, value, now)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "param"
    }
}

/// Legacy setter calls.
pub struct MethodListener;

impl ListenerStrategy for MethodListener {
    fn update(&self, ctx: &mut AudioContext, position: Vec3, forward: Vec3, up: Vec3) -> GraphResult<()> {
        ctx.set_listener_position(position)?;
        ctx.set_listener_orientation(forward, up)
    }

    fn name(&self) -> &'static str {
        "method"
    }
}

pub fn select(capabilities: Capabilities) -> Box<dyn ListenerStrategy> {
    if capabilities.listener_automation {
        Box::new(ParamListener)
    } else {
        Box::new(MethodListener)
    }
}
