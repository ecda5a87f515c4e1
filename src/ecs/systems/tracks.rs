use crate::curve::{CurveSampler, Interpolate};
use crate::ecs::blend::{blend, BlendEngine, Mixer};
use crate::ecs::profiler::StageProfiler;
use crate::ecs::{
    Animated, ClipWeight, LocalTime, ResetOnDeactivate, RotationTarget, ScalarTarget,
    TimelineActive, TrackBinding, TranslationTarget,
};
use crate::time::DiscreteTime;
use bevy_ecs::component::Component;
use bevy_ecs::prelude::*;

/// A component the blend pipeline can read and write a value of type `T`
/// from. The read side doubles as the blend default, so partial weight
/// coverage eases toward whatever the target currently holds.
pub trait BlendTarget<T>: Component + Sized {
    fn get(&self) -> T;
    fn set(&mut self, value: T);
}

impl BlendTarget<f32> for ScalarTarget {
    fn get(&self) -> f32 {
        self.0
    }

    fn set(&mut self, value: f32) {
        self.0 = value;
    }
}

impl BlendTarget<glam::Vec3> for TranslationTarget {
    fn get(&self) -> glam::Vec3 {
        self.0
    }

    fn set(&mut self, value: glam::Vec3) {
        self.0 = value;
    }
}

impl BlendTarget<glam::Quat> for RotationTarget {
    fn get(&self) -> glam::Quat {
        self.0
    }

    fn set(&mut self, value: glam::Quat) {
        self.0 = value;
    }
}

/// Samples a clip's value at its local time. A negative local time means the
/// clip is before its content with no pre-extrapolation; it contributes
/// nothing this tick.
fn evaluate_clip<T>(animated: &Animated<T>, local: &LocalTime) -> Option<T>
where
    T: Interpolate + Default + Send + Sync + 'static,
{
    if local.value < DiscreteTime::ZERO {
        return None;
    }
    Some(match &animated.curve {
        Some(curve) if curve.is_created() => curve.evaluate(local.value.as_seconds() as f32),
        _ => animated.default_value,
    })
}

/// One blend pass for a single animated property type: gather active clips
/// into the type's [`BlendEngine`], then blend per target and write back.
/// Instantiated once per `(value, mixer, target)` triple in the schedule.
pub fn sys_blend_channel<T, M, C>(
    mut profiler: ResMut<StageProfiler>,
    mut engine: ResMut<BlendEngine<T>>,
    unweighted: Query<
        (&Animated<T>, &TrackBinding, &LocalTime, &TimelineActive),
        Without<ClipWeight>,
    >,
    weighted: Query<(&Animated<T>, &TrackBinding, &LocalTime, &ClipWeight, &TimelineActive)>,
    mut targets: Query<&mut C>,
) where
    T: Interpolate + Default + Send + Sync + 'static,
    M: Mixer<T> + Send + Sync + 'static,
    C: BlendTarget<T>,
{
    let _span = profiler.scope(std::any::type_name::<C>());

    engine.resize(unweighted.iter().count(), weighted.iter().count());

    for (animated, binding, local, active) in &unweighted {
        if !active.current {
            continue;
        }
        let Some(value) = evaluate_clip(animated, local) else {
            continue;
        };
        engine.insert_unweighted(binding.0, value, animated.additive);
    }

    for (animated, binding, local, weight, active) in &weighted {
        if !active.current {
            continue;
        }
        let Some(value) = evaluate_clip(animated, local) else {
            continue;
        };
        engine.accumulate(binding.0, value, weight.value, animated.additive);
    }

    for (target, mix) in engine.results_mut() {
        // Soft miss: a despawned or not-yet-spawned target skips the write.
        let Ok(mut component) = targets.get_mut(target) else {
            continue;
        };
        let current = component.get();
        component.set(blend::<T, M>(mix, current));
    }
}

/// Captures the target's translation when a reset-flagged clip activates, so
/// deactivation can put it back.
pub fn sys_capture_reset_values(
    mut clips: Query<(&mut ResetOnDeactivate, &TrackBinding, &TimelineActive)>,
    targets: Query<&TranslationTarget>,
) {
    for (mut reset, binding, active) in &mut clips {
        if !active.just_activated() {
            continue;
        }
        let Ok(target) = targets.get(binding.0) else {
            continue;
        };
        reset.0 = target.0;
    }
}

/// Restores the captured translation when a reset-flagged clip deactivates.
pub fn sys_apply_reset_values(
    clips: Query<(&ResetOnDeactivate, &TrackBinding, &TimelineActive)>,
    mut targets: Query<&mut TranslationTarget>,
) {
    for (reset, binding, active) in &clips {
        if !active.just_deactivated() {
            continue;
        }
        let Ok(mut target) = targets.get_mut(binding.0) else {
            continue;
        };
        target.0 = reset.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::blend::{FloatMixer, Vec3Mixer};
    use glam::Vec3;

    const ACTIVE: TimelineActive = TimelineActive { current: true, previous: true };

    fn blend_world<T: Default + Copy + Send + Sync + 'static>() -> (World, Schedule) {
        let mut world = World::new();
        world.insert_resource(StageProfiler::new());
        world.insert_resource(BlendEngine::<T>::new());
        (world, Schedule::default())
    }

    #[test]
    fn sole_unweighted_clip_writes_its_value() {
        let (mut world, mut schedule) = blend_world::<f32>();
        let target = world.spawn(ScalarTarget(0.0)).id();
        world.spawn((
            Animated::constant(7.0f32),
            TrackBinding(target),
            LocalTime::default(),
            ACTIVE,
        ));

        schedule.add_systems(sys_blend_channel::<f32, FloatMixer, ScalarTarget>);
        schedule.run(&mut world);

        assert_eq!(world.get::<ScalarTarget>(target).unwrap().0, 7.0);
    }

    #[test]
    fn inactive_clip_contributes_nothing() {
        let (mut world, mut schedule) = blend_world::<f32>();
        let target = world.spawn(ScalarTarget(3.0)).id();
        world.spawn((
            Animated::constant(7.0f32),
            TrackBinding(target),
            LocalTime::default(),
            TimelineActive::INACTIVE,
        ));

        schedule.add_systems(sys_blend_channel::<f32, FloatMixer, ScalarTarget>);
        schedule.run(&mut world);

        assert_eq!(world.get::<ScalarTarget>(target).unwrap().0, 3.0);
    }

    #[test]
    fn negative_local_time_is_skipped() {
        let (mut world, mut schedule) = blend_world::<f32>();
        let target = world.spawn(ScalarTarget(3.0)).id();
        world.spawn((
            Animated::constant(7.0f32),
            TrackBinding(target),
            LocalTime { value: DiscreteTime::from_seconds(-0.5), is_active: false },
            ACTIVE,
        ));

        schedule.add_systems(sys_blend_channel::<f32, FloatMixer, ScalarTarget>);
        schedule.run(&mut world);

        assert_eq!(world.get::<ScalarTarget>(target).unwrap().0, 3.0);
    }

    #[test]
    fn weighted_pair_blends_by_weight() {
        let (mut world, mut schedule) = blend_world::<Vec3>();
        let target = world.spawn(TranslationTarget(Vec3::ZERO)).id();
        world.spawn((
            Animated::constant(Vec3::X * 10.0),
            TrackBinding(target),
            LocalTime::default(),
            ClipWeight { value: 0.75 },
            ACTIVE,
        ));
        world.spawn((
            Animated::constant(Vec3::X * 2.0),
            TrackBinding(target),
            LocalTime::default(),
            ClipWeight { value: 0.25 },
            ACTIVE,
        ));

        schedule.add_systems(sys_blend_channel::<Vec3, Vec3Mixer, TranslationTarget>);
        schedule.run(&mut world);

        let result = world.get::<TranslationTarget>(target).unwrap().0;
        assert!((result.x - 8.0).abs() < 1e-4, "got {result}");
    }

    #[test]
    fn missing_target_is_a_soft_miss() {
        let (mut world, mut schedule) = blend_world::<f32>();
        let target = world.spawn_empty().id();
        world.despawn(target);
        world.spawn((
            Animated::constant(7.0f32),
            TrackBinding(target),
            LocalTime::default(),
            ACTIVE,
        ));

        schedule.add_systems(sys_blend_channel::<f32, FloatMixer, ScalarTarget>);
        schedule.run(&mut world);
        // No panic is the assertion.
    }

    #[test]
    fn reset_capture_and_apply_round_trip() {
        let mut world = World::new();
        let target = world.spawn(TranslationTarget(Vec3::new(1.0, 2.0, 3.0))).id();
        let clip = world
            .spawn((
                ResetOnDeactivate::default(),
                TrackBinding(target),
                TimelineActive { current: true, previous: false },
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems((sys_capture_reset_values, sys_apply_reset_values).chain());
        schedule.run(&mut world);
        assert_eq!(world.get::<ResetOnDeactivate>(clip).unwrap().0, Vec3::new(1.0, 2.0, 3.0));

        // Clip runs, scribbles on the target, then deactivates.
        world.get_mut::<TranslationTarget>(target).unwrap().0 = Vec3::splat(9.0);
        *world.get_mut::<TimelineActive>(clip).unwrap() =
            TimelineActive { current: false, previous: true };
        schedule.run(&mut world);

        assert_eq!(world.get::<TranslationTarget>(target).unwrap().0, Vec3::new(1.0, 2.0, 3.0));
    }
}
