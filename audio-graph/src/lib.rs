//! Software node graph that the mixer schedules against.
//!
//! The graph is split in two halves that never share mutable state:
//!
//! - [`AudioContext`] lives on the caller's thread. It allocates node ids,
//!   validates wiring, mirrors every parameter timeline and turns each call
//!   into a render command.
//! - The renderer runs inside the [`audio_backend::RenderFn`] callback. It
//!   drains commands at the top of every 128-frame quantum, pulls audio from
//!   the destination through the graph and reports node completion back.
//!
//! Commands, events and retired node storage travel over bounded
//! `crossbeam` queues. Node storage is boxed on the control thread and
//! dropped there too, so the render thread does not allocate in steady state.

pub mod buffer;
pub mod context;
pub mod error;
pub mod listener;
pub mod node;
pub mod nodes;
pub mod param;
mod renderer;

pub use buffer::AudioBuffer;
pub use context::{AudioContext, Capabilities, ContextOptions, ContextState, ParamHandle};
pub use error::{GraphError, Result};
pub use listener::{ListenerFrame, ListenerParam};
pub use node::{NodeId, NodeKind, QUANTUM, RenderEvent};
pub use nodes::{AnalyserOptions, CompressorOptions, PannerOptions, SourceOptions, inverse_distance_gain};
pub use param::{ParamOp, ParamTimeline};

pub use glam::Vec3;
