use crate::ecs::blend::{BlendEngine, FloatMixer, QuatMixer, Vec3Mixer};
use crate::ecs::profiler::StageProfiler;
use crate::ecs::systems::*;
use crate::ecs::{
    RotationTarget, ScalarTarget, TickTime, TimelineActive, Timer, TranslationTarget,
};
use crate::time::DiscreteTime;
use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

/// The timeline runtime: a [`World`] plus the fixed tick pipeline. One tick
/// runs clocks, timers, local time, weights and the blend passes in
/// dependency order; hosts call [`TimelineWorld::tick`] once per frame.
pub struct TimelineWorld {
    pub world: World,
    schedule: Schedule,
}

impl TimelineWorld {
    pub fn new() -> Self {
        let mut world = World::new();
        world.insert_resource(TickTime::default());
        world.insert_resource(StageProfiler::new());
        world.insert_resource(BlendEngine::<f32>::new());
        world.insert_resource(BlendEngine::<Vec3>::new());
        world.insert_resource(BlendEngine::<Quat>::new());

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                sys_update_clocks,
                sys_timer_started,
                sys_timer_update,
                sys_timer_stopped,
                sys_update_local_time,
                sys_evaluate_clip_weights,
                sys_capture_reset_values,
                sys_apply_reset_values,
                sys_blend_channel::<f32, FloatMixer, ScalarTarget>,
                sys_blend_channel::<Vec3, Vec3Mixer, TranslationTarget>,
                sys_blend_channel::<Quat, QuatMixer, RotationTarget>,
                sys_copy_active_previous,
            )
                .chain(),
        );

        Self { world, schedule }
    }

    /// Runs one full pipeline tick with the given time context.
    pub fn tick(&mut self, time: TickTime) {
        self.world.insert_resource(time);
        self.world.resource_mut::<StageProfiler>().begin_tick();
        self.schedule.run(&mut self.world);
    }

    /// Fixed-step tick, handy for deterministic simulation and tests.
    pub fn tick_seconds(&mut self, seconds: f64) {
        self.tick(TickTime::fixed_seconds(seconds));
    }

    /// Requests activation of a timeline root. The start edge is processed
    /// on the next tick.
    pub fn play(&mut self, root: Entity) {
        if let Some(mut active) = self.world.get_mut::<TimelineActive>(root) {
            active.current = true;
        }
    }

    /// Requests deactivation of a timeline root.
    pub fn stop(&mut self, root: Entity) {
        if let Some(mut active) = self.world.get_mut::<TimelineActive>(root) {
            active.current = false;
        }
    }

    pub fn is_active(&self, entity: Entity) -> bool {
        self.world.get::<TimelineActive>(entity).map_or(false, |a| a.current)
    }

    pub fn timer_time(&self, entity: Entity) -> Option<DiscreteTime> {
        self.world.get::<Timer>(entity).map(|t| t.time)
    }

    pub fn profiler(&self) -> &StageProfiler {
        self.world.resource::<StageProfiler>()
    }
}

impl Default for TimelineWorld {
    fn default() -> Self {
        Self::new()
    }
}
