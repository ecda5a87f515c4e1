use crate::ecs::{ClockData, ClockSource, TickTime, TimelineActive};
use bevy_ecs::prelude::*;

/// Writes [`ClockData`] for every active timer root from its clock source.
/// Runs first in the tick; the timer update consumes the result.
pub fn sys_update_clocks(
    tick: Res<TickTime>,
    mut clocks: Query<(&ClockSource, &TimelineActive, &mut ClockData)>,
) {
    for (source, active, mut clock) in &mut clocks {
        if !active.current {
            continue;
        }
        let (delta_time, scale) = match *source {
            ClockSource::GameTime => (tick.game_delta, tick.time_scale),
            ClockSource::UnscaledGameTime => (tick.unscaled_delta, 1.0),
            ClockSource::RealTime => (tick.real_delta, 1.0),
            ClockSource::Constant { delta_time, scale } => (delta_time, scale),
        };
        clock.delta_time = delta_time;
        clock.scale = scale;
    }
}
