use glam::Vec3;

use crate::param::{ParamOp, ParamTimeline};

/// The nine automatable listener coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerParam {
    PositionX,
    PositionY,
    PositionZ,
    ForwardX,
    ForwardY,
    ForwardZ,
    UpX,
    UpY,
    UpZ,
}

impl ListenerParam {
    pub const ALL: [ListenerParam; 9] = [
        ListenerParam::PositionX,
        ListenerParam::PositionY,
        ListenerParam::PositionZ,
        ListenerParam::ForwardX,
        ListenerParam::ForwardY,
        ListenerParam::ForwardZ,
        ListenerParam::UpX,
        ListenerParam::UpY,
        ListenerParam::UpZ,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Listener transform sampled at a single instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerFrame {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl Default for ListenerFrame {
    fn default() -> Self {
        Self { position: Vec3::ZERO, forward: Vec3::NEG_Z, up: Vec3::Y }
    }
}

/// Listener coordinates as automation timelines.
#[derive(Debug, Clone)]
pub(crate) struct ListenerTimelines {
    params: [ParamTimeline; 9],
}

impl ListenerTimelines {
    pub(crate) fn new() -> Self {
        let d = ListenerFrame::default();
        let init = [
            d.position.x, d.position.y, d.position.z,
            d.forward.x, d.forward.y, d.forward.z,
            d.up.x, d.up.y, d.up.z,
        ];
        Self { params: init.map(ParamTimeline::new) }
    }

    pub(crate) fn apply(&mut self, param: ListenerParam, op: ParamOp) {
        self.params[param.slot()].apply(op);
    }

    pub(crate) fn frame_at(&self, t: f64) -> ListenerFrame {
        let v = |p: ListenerParam| self.params[p.slot()].value_at(t);
        ListenerFrame {
            position: Vec3::new(v(ListenerParam::PositionX), v(ListenerParam::PositionY), v(ListenerParam::PositionZ)),
            forward: Vec3::new(v(ListenerParam::ForwardX), v(ListenerParam::ForwardY), v(ListenerParam::ForwardZ)),
            up: Vec3::new(v(ListenerParam::UpX), v(ListenerParam::UpY), v(ListenerParam::UpZ)),
        }
    }

    pub(crate) fn prune_before(&mut self, t: f64) {
        for p in self.params.iter_mut() {
            p.prune_before(t);
        }
    }
}

/// Ops that overwrite every coordinate immediately.
pub(crate) fn direct_ops(position: Vec3, forward: Vec3, up: Vec3) -> [(ListenerParam, ParamOp); 9] {
    let values = [
        position.x, position.y, position.z,
        forward.x, forward.y, forward.z,
        up.x, up.y, up.z,
    ];
    std::array::from_fn(|i| (ListenerParam::ALL[i], ParamOp::SetValue(values[i])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_face_negative_z() {
        let t = ListenerTimelines::new();
        let f = t.frame_at(0.0);
        assert_eq!(f.forward, Vec3::NEG_Z);
        assert_eq!(f.up, Vec3::Y);
    }

    #[test]
    fn direct_ops_cover_all_params() {
        let mut t = ListenerTimelines::new();
        for (p, op) in direct_ops(Vec3::new(1.0, 2.0, 3.0), Vec3::X, Vec3::Z) {
            t.apply(p, op);
        }
        let f = t.frame_at(1.0);
        assert_eq!(f.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(f.forward, Vec3::X);
        assert_eq!(f.up, Vec3::Z);
    }
}
