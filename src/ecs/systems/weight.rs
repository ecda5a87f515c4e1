use crate::curve::CurveSampler;
use crate::ecs::{AnimatedClipWeight, ClipWeight, LocalTime};
use bevy_ecs::prelude::*;

/// Samples each weighted clip's mix curve at its current local time. Clips
/// whose curve has no keys hold full weight.
pub fn sys_evaluate_clip_weights(
    mut clips: Query<(&mut ClipWeight, &AnimatedClipWeight, &LocalTime)>,
) {
    for (mut weight, animated, local) in &mut clips {
        weight.value = if animated.0.is_created() {
            animated.0.evaluate(local.value.as_seconds() as f32)
        } else {
            1.0
        };
    }
}
