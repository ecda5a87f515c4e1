use crate::ecs::profiler::StageProfiler;
use crate::ecs::{
    ActiveRange, ClockData, CompositeTimer, CompositeTimerLinks, RangeBehaviour, TimelineActive,
    Timer, TimerData, TimerDataLinks, TimerPaused, TimerRange,
};
use crate::time::DiscreteTime;
use bevy_ecs::prelude::*;
use smallvec::SmallVec;

type ConsumerQuery<'w, 's> = Query<
    'w,
    's,
    (&'static mut TimerData, &'static mut TimelineActive, Option<&'static ActiveRange>),
    Without<Timer>,
>;

/// Activation edge: a timer root whose active flag just turned on resets to
/// zero, adopts the clock scale and re-enables its consumer links with a
/// fresh snapshot. Advancing begins the following tick.
pub fn sys_timer_started(
    mut roots: Query<
        (&mut Timer, &ClockData, &TimerDataLinks, &TimelineActive),
        Without<CompositeTimer>,
    >,
    mut consumers: ConsumerQuery,
) {
    for (mut timer, clock, links, active) in &mut roots {
        if !active.just_activated() {
            continue;
        }
        timer.time = DiscreteTime::ZERO;
        timer.delta_time = DiscreteTime::ZERO;
        timer.time_scale = clock.scale;

        let snapshot = TimerData::snapshot(&timer);
        fan_out(&mut consumers, &links.0, snapshot, true);
    }
}

/// Advances every running timer root, applies its range policy and
/// propagates time through the composite-timer tree in a single
/// parent-before-child pass, updating consumer snapshots and active flags
/// along the way.
pub fn sys_timer_update(
    mut profiler: ResMut<StageProfiler>,
    mut roots: Query<
        (
            &mut Timer,
            &ClockData,
            &mut TimerPaused,
            &mut TimelineActive,
            Option<&mut TimerRange>,
            &TimerDataLinks,
            Option<&CompositeTimerLinks>,
        ),
        Without<CompositeTimer>,
    >,
    mut composites: Query<
        (
            &CompositeTimer,
            &mut Timer,
            &mut TimelineActive,
            &TimerDataLinks,
            Option<&CompositeTimerLinks>,
        ),
        With<CompositeTimer>,
    >,
    mut consumers: ConsumerQuery,
) {
    let _span = profiler.scope("sys_timer_update");

    for (mut timer, clock, mut paused, mut active, range, links, composite_links) in &mut roots {
        if !active.running() {
            continue;
        }

        let previous_time = timer.time;
        timer.delta_time = if paused.0 { DiscreteTime::ZERO } else { clock.delta_time };
        timer.time = timer.time + timer.delta_time;
        timer.time_scale = clock.scale;

        if !paused.0 {
            if let Some(mut range) = range {
                apply_timer_range(&mut timer, &mut range, previous_time, &mut paused, &mut active);
            }
        }

        let snapshot = TimerData::snapshot(&timer);
        let root_active = active.current;
        fan_out(&mut consumers, &links.0, snapshot, root_active);

        // Walk the composite tree, parents strictly before children. Each
        // node must see its parent's this-tick time, so the whole walk stays
        // inside this stage.
        let mut stack: SmallVec<[(Entity, TimerData, bool); 16]> = SmallVec::new();
        if let Some(children) = composite_links {
            for &child in children.0.iter().rev() {
                stack.push((child, snapshot, root_active));
            }
        }

        while let Some((entity, source, parent_active)) = stack.pop() {
            let Ok((composite, mut child_timer, mut child_active, child_links, grandchildren)) =
                composites.get_mut(entity)
            else {
                continue;
            };

            child_timer.time = source.time * composite.scale + composite.offset;
            child_timer.delta_time = source.delta_time * composite.scale;
            child_timer.time_scale = source.time_scale * composite.scale;

            let now_active = parent_active && composite.active_range.contains(source.time);
            if child_active.current != now_active {
                child_active.current = now_active;
            }

            let child_snapshot = TimerData::snapshot(&child_timer);
            fan_out(&mut consumers, &child_links.0, child_snapshot, now_active);

            if let Some(grandchildren) = grandchildren {
                for &grandchild in grandchildren.0.iter().rev() {
                    stack.push((grandchild, child_snapshot, now_active));
                }
            }
        }
    }
}

/// Deactivation edge: clear the paused flag and disable everything linked
/// to the root, including composite subtrees.
pub fn sys_timer_stopped(
    mut roots: Query<
        (&mut TimerPaused, &TimerDataLinks, Option<&CompositeTimerLinks>, &TimelineActive),
        (With<Timer>, Without<CompositeTimer>),
    >,
    mut composites: Query<
        (&mut TimelineActive, &TimerDataLinks, Option<&CompositeTimerLinks>),
        With<CompositeTimer>,
    >,
    mut consumers: Query<&mut TimelineActive, (Without<Timer>, Without<CompositeTimer>)>,
) {
    for (mut paused, links, composite_links, active) in &mut roots {
        if !active.just_deactivated() {
            continue;
        }
        paused.0 = false;

        for &link in &links.0 {
            if let Ok(mut link_active) = consumers.get_mut(link) {
                if link_active.current {
                    link_active.current = false;
                }
            }
        }

        let mut stack: SmallVec<[Entity; 16]> = SmallVec::new();
        if let Some(children) = composite_links {
            stack.extend(children.0.iter().copied());
        }
        while let Some(entity) = stack.pop() {
            let Ok((mut child_active, child_links, grandchildren)) = composites.get_mut(entity)
            else {
                continue;
            };
            if child_active.current {
                child_active.current = false;
            }
            for &link in &child_links.0 {
                if let Ok(mut link_active) = consumers.get_mut(link) {
                    if link_active.current {
                        link_active.current = false;
                    }
                }
            }
            if let Some(grandchildren) = grandchildren {
                stack.extend(grandchildren.0.iter().copied());
            }
        }
    }
}

/// Writes a timer snapshot to each consumer link and refreshes the
/// consumer's active flag from its optional [`ActiveRange`]. Snapshot writes
/// compare first so an unchanged timer does not dirty the downstream
/// change-detection gate. Missing links are skipped; a binding may resolve
/// later.
fn fan_out(
    consumers: &mut ConsumerQuery,
    links: &[Entity],
    snapshot: TimerData,
    timer_active: bool,
) {
    for &link in links {
        let Ok((mut data, mut link_active, range)) = consumers.get_mut(link) else {
            continue;
        };
        if *data != snapshot {
            *data = snapshot;
        }
        let now_active = timer_active && range.map_or(true, |r| r.contains(snapshot.time));
        if link_active.current != now_active {
            link_active.current = now_active;
        }
    }
}

/// Applies a timer's range policy after an advance. `AutoStop` may clear the
/// active flag (one-shot completion); `AutoPause` may raise the paused flag.
fn apply_timer_range(
    timer: &mut Timer,
    range: &mut TimerRange,
    previous_time: DiscreteTime,
    paused: &mut TimerPaused,
    active: &mut TimelineActive,
) {
    match range.behaviour {
        RangeBehaviour::AutoStop => {
            timer.time = timer.time.max(range.range.start);
            if timer.time >= range.range.end {
                if range.sample_last_frame && previous_time < range.range.end {
                    // Render the final frame exactly once before stopping.
                    timer.time = range.range.end;
                } else {
                    timer.time = range.range.start;
                    active.current = false;
                }
            }
        }
        RangeBehaviour::AutoPause => {
            timer.time = range.range.clamp(timer.time);
            if timer.time == range.range.end {
                paused.0 = true;
            }
        }
        RangeBehaviour::Loop => {
            if timer.time < range.range.start {
                timer.time = range.range.start;
            } else if timer.time >= range.range.end {
                if range.range.start == range.range.end {
                    timer.time = range.range.start;
                } else {
                    let duration_ticks = range.range.duration().ticks();
                    let past_start = (timer.time - range.range.start).ticks();
                    range.loop_count += (past_start / duration_ticks) as u32;
                    timer.time =
                        DiscreteTime::from_ticks(range.range.start.ticks() + past_start % duration_ticks);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::DiscreteTimeInterval;

    fn timer_at(seconds: f64) -> Timer {
        Timer { time: DiscreteTime::from_seconds(seconds), ..Default::default() }
    }

    fn range(behaviour: RangeBehaviour, start: f64, end: f64) -> TimerRange {
        TimerRange::new(
            behaviour,
            DiscreteTimeInterval::new(
                DiscreteTime::from_seconds(start),
                DiscreteTime::from_seconds(end),
            ),
        )
    }

    #[test]
    fn auto_stop_resets_and_deactivates() {
        let mut timer = timer_at(12.0);
        let mut r = range(RangeBehaviour::AutoStop, 0.0, 10.0);
        let mut paused = TimerPaused(false);
        let mut active = TimelineActive { current: true, previous: true };
        apply_timer_range(&mut timer, &mut r, DiscreteTime::from_seconds(9.0), &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::ZERO);
        assert!(!active.current);
    }

    #[test]
    fn auto_stop_samples_last_frame_once() {
        let mut timer = timer_at(12.0);
        let mut r = range(RangeBehaviour::AutoStop, 0.0, 10.0);
        r.sample_last_frame = true;
        let mut paused = TimerPaused(false);
        let mut active = TimelineActive { current: true, previous: true };

        // First crossing holds the end time and stays active.
        apply_timer_range(&mut timer, &mut r, DiscreteTime::from_seconds(9.0), &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::from_seconds(10.0));
        assert!(active.current);

        // Next advance starts at the end: reset and deactivate.
        let mut timer = timer_at(13.0);
        apply_timer_range(&mut timer, &mut r, DiscreteTime::from_seconds(10.0), &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::ZERO);
        assert!(!active.current);
    }

    #[test]
    fn auto_pause_clamps_and_pauses_at_end() {
        let mut timer = timer_at(11.0);
        let mut r = range(RangeBehaviour::AutoPause, 0.0, 10.0);
        let mut paused = TimerPaused(false);
        let mut active = TimelineActive { current: true, previous: true };
        apply_timer_range(&mut timer, &mut r, DiscreteTime::from_seconds(9.0), &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::from_seconds(10.0));
        assert!(paused.0);
        assert!(active.current);
    }

    #[test]
    fn loop_wraps_and_counts() {
        // Range [0, 10], time 8 + delta 7 => raw 15 => one loop, time 5.
        let mut timer = timer_at(15.0);
        let mut r = range(RangeBehaviour::Loop, 0.0, 10.0);
        let mut paused = TimerPaused(false);
        let mut active = TimelineActive { current: true, previous: true };
        apply_timer_range(&mut timer, &mut r, DiscreteTime::from_seconds(8.0), &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::from_seconds(5.0));
        assert_eq!(r.loop_count, 1);
    }

    #[test]
    fn loop_accumulates_multiple_wraps_in_one_advance() {
        let mut timer = timer_at(37.0);
        let mut r = range(RangeBehaviour::Loop, 0.0, 10.0);
        let mut paused = TimerPaused(false);
        let mut active = TimelineActive { current: true, previous: true };
        apply_timer_range(&mut timer, &mut r, DiscreteTime::ZERO, &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::from_seconds(7.0));
        assert_eq!(r.loop_count, 3);
    }

    #[test]
    fn loop_zero_length_range_snaps_to_start() {
        let mut timer = timer_at(9.0);
        let mut r = range(RangeBehaviour::Loop, 4.0, 4.0);
        let mut paused = TimerPaused(false);
        let mut active = TimelineActive { current: true, previous: true };
        apply_timer_range(&mut timer, &mut r, DiscreteTime::ZERO, &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::from_seconds(4.0));
        assert_eq!(r.loop_count, 0);
    }

    #[test]
    fn loop_before_start_snaps_to_start() {
        let mut timer = timer_at(-3.0);
        let mut r = range(RangeBehaviour::Loop, 2.0, 10.0);
        let mut paused = TimerPaused(false);
        let mut active = TimelineActive { current: true, previous: true };
        apply_timer_range(&mut timer, &mut r, DiscreteTime::ZERO, &mut paused, &mut active);
        assert_eq!(timer.time, DiscreteTime::from_seconds(2.0));
    }
}
