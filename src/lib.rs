//! A deterministic timeline runtime: hierarchical fixed-point timers driving
//! clip local time, weight curves and bounded weighted blending over ECS
//! component targets.

pub mod asset;
pub mod bake;
pub mod curve;
pub mod ecs;
pub mod time;

pub use asset::TimelineAsset;
pub use bake::{bake_timeline, BakedTimeline};
pub use ecs::world::TimelineWorld;
pub use time::{DiscreteTime, DiscreteTimeInterval, FrameClock, TICKS_PER_SECOND};
