pub mod blend;
pub mod profiler;
pub mod systems;
mod types;
pub mod world;

pub use types::*;
