use crate::ecs::{
    ExtrapolationHold, ExtrapolationLoop, ExtrapolationPingPong, ExtrapolationSides, LocalTime,
    TimeTransform, TimelineActive, TimerData,
};
use crate::time::DiscreteTime;
use bevy_ecs::prelude::*;

/// Recomputes each clip's [`LocalTime`] from its governing timer snapshot.
/// Gated on change detection: an unchanged snapshot (and unchanged activity)
/// leaves local time untouched, which keeps zero-delta ticks cheap.
///
/// The base mapping is unbounded; the optional extrapolation components then
/// rewrite the out-of-range portion in a fixed order (loop, ping-pong, hold),
/// each only touching the sides its [`ExtrapolationSides`] mask names.
pub fn sys_update_local_time(
    mut clips: Query<
        (
            &TimerData,
            &TimeTransform,
            &TimelineActive,
            &mut LocalTime,
            Option<&ExtrapolationLoop>,
            Option<&ExtrapolationPingPong>,
            Option<&ExtrapolationHold>,
        ),
        Or<(Changed<TimerData>, Changed<TimelineActive>)>,
    >,
) {
    for (data, transform, active, mut local, loop_x, ping_pong, hold) in &mut clips {
        if !active.current {
            continue;
        }

        local.is_active = data.time >= transform.start && data.time < transform.end;
        local.value = transform.to_local_unbound(data.time);

        if let Some(ExtrapolationLoop(sides)) = loop_x {
            apply_loop(&mut local, data.time, transform, *sides);
        }
        if let Some(ExtrapolationPingPong(sides)) = ping_pong {
            apply_ping_pong(&mut local, data.time, transform, *sides);
        }
        if let Some(ExtrapolationHold(sides)) = hold {
            apply_hold(&mut local, data.time, transform, *sides);
        }
    }
}

fn apply_loop(
    local: &mut LocalTime,
    time: DiscreteTime,
    transform: &TimeTransform,
    sides: ExtrapolationSides,
) {
    let duration = transform.duration();
    if duration <= DiscreteTime::ZERO {
        local.value = DiscreteTime::ZERO;
        return;
    }
    if sides.contains(ExtrapolationSides::PRE) && time < transform.start {
        let before = transform.start - time;
        let wrapped = duration - before % duration;
        local.value = wrapped * transform.scale + transform.clip_in;
    } else if sides.contains(ExtrapolationSides::POST) && time >= transform.end {
        let wrapped = (time - transform.start) % duration;
        local.value = wrapped * transform.scale + transform.clip_in;
    }
}

fn apply_ping_pong(
    local: &mut LocalTime,
    time: DiscreteTime,
    transform: &TimeTransform,
    sides: ExtrapolationSides,
) {
    let duration = transform.duration();
    if duration <= DiscreteTime::ZERO {
        local.value = DiscreteTime::ZERO;
        return;
    }
    if sides.contains(ExtrapolationSides::PRE) && time < transform.start {
        let before = transform.start - time;
        let phase = duration * 2 - before % (duration * 2);
        let bounced = duration - (phase - duration).abs();
        local.value = bounced * transform.scale + transform.clip_in;
    } else if sides.contains(ExtrapolationSides::POST) && time >= transform.end {
        let phase = (time - transform.start) % (duration * 2);
        let bounced = duration - (phase - duration).abs();
        local.value = bounced * transform.scale + transform.clip_in;
    }
}

fn apply_hold(
    local: &mut LocalTime,
    time: DiscreteTime,
    transform: &TimeTransform,
    sides: ExtrapolationSides,
) {
    if sides.contains(ExtrapolationSides::PRE) && time < transform.start {
        local.value = transform.clip_in;
    } else if sides.contains(ExtrapolationSides::POST) && time >= transform.end {
        local.value = transform.duration() * transform.scale + transform.clip_in;
    }
}
