use crate::ecs::TimelineActive;
use bevy_ecs::prelude::*;

/// Latches every active flag for next tick's edge detection. Runs last in
/// the tick; writes only when the flags differ so settled entities do not
/// trip change detection.
pub fn sys_copy_active_previous(mut flags: Query<&mut TimelineActive>) {
    for mut active in &mut flags {
        if active.previous != active.current {
            active.previous = active.current;
        }
    }
}
