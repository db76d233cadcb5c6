//! Time-stamped parameter automation.
//!
//! A [`ParamTimeline`] holds an intrinsic value plus an ordered list of
//! automation events. The control side and the render side each keep their own
//! copy and apply the same [`ParamOp`]s in the same order, so both agree on
//! `value_at(t)` without sharing memory.

#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    SetValue,
    LinearRamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Event {
    kind: EventKind,
    value: f32,
    time: f64,
}

/// One automation call, replayed identically on both sides of the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamOp {
    /// Immediate set that discards all scheduled automation.
    SetValue(f32),
    SetValueAtTime { value: f32, time: f64 },
    /// Ramp ending at `end`. `now` anchors the ramp when no earlier event exists.
    LinearRampToValueAtTime { value: f32, end: f64, now: f64 },
    CancelScheduledValues { from: f64 },
    CancelAndHoldAtTime { time: f64 },
}

#[derive(Debug, Clone)]
pub struct ParamTimeline {
    value: f32,
    events: Vec<Event>,
}

impl ParamTimeline {
    pub fn new(value: f32) -> Self {
        Self { value, events: Vec::with_capacity(8) }
    }

    pub fn apply(&mut self, op: ParamOp) {
        match op {
            ParamOp::SetValue(v) => self.set_value(v),
            ParamOp::SetValueAtTime { value, time } => self.set_value_at_time(value, time),
            ParamOp::LinearRampToValueAtTime { value, end, now } => {
                self.linear_ramp_to_value_at_time(value, end, now)
            }
            ParamOp::CancelScheduledValues { from } => self.cancel_scheduled_values(from),
            ParamOp::CancelAndHoldAtTime { time } => self.cancel_and_hold_at_time(time),
        }
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.events.clear();
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event { kind: EventKind::SetValue, value, time });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end: f64, now: f64) {
        if !self.events.iter().any(|e| e.time <= end) {
            let start = self.value_at(now);
            self.insert(Event { kind: EventKind::SetValue, value: start, time: now.min(end) });
        }
        self.insert(Event { kind: EventKind::LinearRamp, value, time: end });
    }

    pub fn cancel_scheduled_values(&mut self, from: f64) {
        if let Some(last) = self.events.iter().rev().find(|e| e.time < from) {
            self.value = last.value;
        }
        self.events.retain(|e| e.time < from);
    }

    /// Freezes the curve at `time`: whatever value it had there stays.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.retain(|e| e.time < time);
        self.insert(Event { kind: EventKind::SetValue, value: held, time });
    }

    pub fn value_at(&self, t: f64) -> f32 {
        // index of the first event strictly after t
        let next = self.events.partition_point(|e| e.time <= t);
        let prev = next.checked_sub(1).map(|i| self.events[i]);

        if let Some(upcoming) = self.events.get(next) {
            if upcoming.kind == EventKind::LinearRamp {
                let (t0, v0) = match prev {
                    Some(p) => (p.time, p.value),
                    None => return self.value,
                };
                let span = upcoming.time - t0;
                if span <= 0.0 {
                    return upcoming.value;
                }
                let k = ((t - t0) / span) as f32;
                return v0 + (upcoming.value - v0) * k;
            }
        }
        prev.map(|p| p.value).unwrap_or(self.value)
    }

    /// Drops events that can no longer influence any time at or after `t`.
    pub fn prune_before(&mut self, t: f64) {
        let settled = self.events.partition_point(|e| e.time <= t);
        if settled > 1 {
            let keep_from = settled - 1;
            self.value = self.events[keep_from].value;
            self.events.drain(..keep_from);
        }
    }

    /// True while any event lies after `t`.
    pub fn has_automation_after(&self, t: f64) -> bool {
        self.events.last().is_some_and(|e| e.time > t)
    }

    pub fn intrinsic_value(&self) -> f32 {
        self.value
    }

    fn insert(&mut self, event: Event) {
        // events at equal times keep call order
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn intrinsic_value_without_events() {
        let p = ParamTimeline::new(0.7);
        assert!(close(p.value_at(0.0), 0.7));
        assert!(close(p.value_at(100.0), 0.7));
    }

    #[test]
    fn ramp_interpolates_from_previous_event() {
        let mut p = ParamTimeline::new(1.0);
        p.set_value_at_time(1.0, 2.0);
        p.linear_ramp_to_value_at_time(0.0, 3.0, 2.0);
        assert!(close(p.value_at(1.0), 1.0));
        assert!(close(p.value_at(2.5), 0.5));
        assert!(close(p.value_at(3.0), 0.0));
        assert!(close(p.value_at(9.0), 0.0));
    }

    #[test]
    fn ramp_without_anchor_starts_at_now() {
        let mut p = ParamTimeline::new(0.0);
        p.linear_ramp_to_value_at_time(1.0, 2.0, 1.0);
        assert!(close(p.value_at(1.0), 0.0));
        assert!(close(p.value_at(1.5), 0.5));
        assert!(close(p.value_at(2.0), 1.0));
    }

    #[test]
    fn cancel_and_hold_freezes_mid_ramp() {
        let mut p = ParamTimeline::new(1.0);
        p.set_value_at_time(1.0, 0.0);
        p.linear_ramp_to_value_at_time(0.0, 1.0, 0.0);
        p.cancel_and_hold_at_time(0.25);
        assert!(close(p.value_at(0.25), 0.75));
        assert!(close(p.value_at(5.0), 0.75));
    }

    #[test]
    fn set_value_discards_automation() {
        let mut p = ParamTimeline::new(1.0);
        p.set_value_at_time(1.0, 0.0);
        p.linear_ramp_to_value_at_time(0.0, 1.0, 0.0);
        p.set_value(0.4);
        assert!(close(p.value_at(0.5), 0.4));
        assert!(!p.has_automation_after(0.0));
    }

    #[test]
    fn cancel_scheduled_values_keeps_past() {
        let mut p = ParamTimeline::new(0.0);
        p.set_value_at_time(0.5, 1.0);
        p.set_value_at_time(0.9, 3.0);
        p.cancel_scheduled_values(2.0);
        assert!(close(p.value_at(4.0), 0.5));
    }

    #[test]
    fn prune_keeps_values_stable() {
        let mut p = ParamTimeline::new(1.0);
        p.set_value_at_time(1.0, 0.0);
        p.linear_ramp_to_value_at_time(0.5, 1.0, 0.0);
        p.set_value_at_time(0.5, 1.5);
        p.linear_ramp_to_value_at_time(0.0, 2.5, 1.5);
        let before: Vec<f32> = [1.6, 2.0, 3.0].iter().map(|t| p.value_at(*t)).collect();
        p.prune_before(1.6);
        let after: Vec<f32> = [1.6, 2.0, 3.0].iter().map(|t| p.value_at(*t)).collect();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!(close(*a, *b));
        }
    }

    #[test]
    fn apply_matches_direct_calls() {
        let mut a = ParamTimeline::new(1.0);
        let mut b = ParamTimeline::new(1.0);
        let ops = [
            ParamOp::CancelAndHoldAtTime { time: 0.1 },
            ParamOp::SetValueAtTime { value: 1.0, time: 0.1 },
            ParamOp::LinearRampToValueAtTime { value: 0.3, end: 0.4, now: 0.1 },
        ];
        for op in ops {
            a.apply(op);
        }
        b.cancel_and_hold_at_time(0.1);
        b.set_value_at_time(1.0, 0.1);
        b.linear_ramp_to_value_at_time(0.3, 0.4, 0.1);
        assert!(close(a.value_at(0.25), b.value_at(0.25)));
        assert!(close(a.value_at(0.25), 0.65));
    }
}
