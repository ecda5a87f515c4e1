mod clock;
mod lifecycle;
mod local_time;
mod timer;
mod tracks;
mod weight;

pub use clock::*;
pub use lifecycle::*;
pub use local_time::*;
pub use timer::*;
pub use tracks::*;
pub use weight::*;
