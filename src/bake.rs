//! Turns a [`TimelineAsset`] into runtime entities: one master timer root,
//! one entity per clip, one composite timer per nested timeline. Structural
//! problems (bad ranges, unknown bindings, malformed keys) are hard errors;
//! runtime stays validation-free.

use crate::asset::{
    ChannelKind, ClipSpec, ClockSpec, ExtrapolationKind, KeySpec, RangeBehaviourSpec,
    SubTimelineSpec, TimelineAsset, TrackSpec, WeightSpec,
};
use crate::curve::{Curve, Interpolate, Key};
use crate::ecs::{
    ActiveRange, Animated, AnimatedClipWeight, ClipWeight, ClockData, ClockSource, CompositeTimer,
    CompositeTimerLinks, ExtrapolationHold, ExtrapolationLoop, ExtrapolationPingPong,
    ExtrapolationSides, LocalTime, RangeBehaviour, ResetOnDeactivate, TimeTransform,
    TimelineActive, Timer, TimerData, TimerDataLinks, TimerPaused, TimerRange, TrackBinding,
};
use crate::time::{DiscreteTime, DiscreteTimeInterval};
use anyhow::{bail, ensure, Context, Result};
use bevy_ecs::prelude::{Entity, World};
use glam::{Quat, Vec3};
use std::collections::HashMap;

/// Bake refuses composite nesting deeper than this; a legitimate timeline
/// never approaches it, a miswired one would loop forever.
pub const MAX_TIMELINE_DEPTH: usize = 64;

/// The entities a bake produced. `root` is the master timer to play/stop.
#[derive(Debug)]
pub struct BakedTimeline {
    pub root: Entity,
    pub clips: Vec<Entity>,
    pub composites: Vec<Entity>,
}

/// Bakes `asset` into `world`. `bindings` maps the asset's track binding
/// names to target entities; every referenced name must resolve.
pub fn bake_timeline(
    world: &mut World,
    asset: &TimelineAsset,
    bindings: &HashMap<String, Entity>,
) -> Result<BakedTimeline> {
    let clock = match asset.clock {
        ClockSpec::GameTime => ClockSource::GameTime,
        ClockSpec::UnscaledGameTime => ClockSource::UnscaledGameTime,
        ClockSpec::RealTime => ClockSource::RealTime,
        ClockSpec::Constant { delta_seconds, scale } => {
            ensure!(
                delta_seconds.is_finite() && scale.is_finite(),
                "timeline '{}': constant clock must be finite",
                asset.name
            );
            ClockSource::Constant { delta_time: DiscreteTime::from_seconds(delta_seconds), scale }
        }
    };

    let range = asset
        .range
        .map(|spec| {
            ensure!(
                spec.start_seconds <= spec.end_seconds,
                "timeline '{}': range end precedes start",
                asset.name
            );
            let behaviour = match spec.behaviour {
                RangeBehaviourSpec::AutoStop => RangeBehaviour::AutoStop,
                RangeBehaviourSpec::AutoPause => RangeBehaviour::AutoPause,
                RangeBehaviourSpec::Loop => RangeBehaviour::Loop,
            };
            let mut range = TimerRange::new(
                behaviour,
                DiscreteTimeInterval::new(
                    DiscreteTime::from_seconds(spec.start_seconds),
                    DiscreteTime::from_seconds(spec.end_seconds),
                ),
            );
            range.sample_last_frame = spec.sample_last_frame;
            Ok(range)
        })
        .transpose()?;

    let root = world
        .spawn((
            clock,
            ClockData::default(),
            Timer { time_scale: 1.0, ..Default::default() },
            TimerPaused(false),
            TimelineActive::INACTIVE,
            TimerDataLinks::default(),
            CompositeTimerLinks::default(),
        ))
        .id();
    if let Some(range) = range {
        world.entity_mut(root).insert(range);
    }

    let mut baked = BakedTimeline { root, clips: Vec::new(), composites: Vec::new() };

    for track in &asset.tracks {
        bake_track(world, track, root, bindings, &mut baked)
            .with_context(|| format!("timeline '{}'", asset.name))?;
    }
    for sub in &asset.sub_timelines {
        bake_sub_timeline(world, sub, root, root, bindings, &mut baked, 1)
            .with_context(|| format!("timeline '{}'", asset.name))?;
    }

    Ok(baked)
}

fn bake_sub_timeline(
    world: &mut World,
    spec: &SubTimelineSpec,
    parent: Entity,
    master: Entity,
    bindings: &HashMap<String, Entity>,
    baked: &mut BakedTimeline,
    depth: usize,
) -> Result<()> {
    ensure!(
        depth <= MAX_TIMELINE_DEPTH,
        "sub-timeline '{}' exceeds the maximum nesting depth",
        spec.name
    );
    ensure!(
        spec.active_start_seconds < spec.active_end_seconds,
        "sub-timeline '{}' has an empty active range",
        spec.name
    );
    ensure!(
        spec.scale.is_finite() && spec.offset_seconds.is_finite(),
        "sub-timeline '{}' has a non-finite transform",
        spec.name
    );

    let timer = world
        .spawn((
            Timer { time_scale: 1.0, ..Default::default() },
            TimelineActive::INACTIVE,
            CompositeTimer {
                source: master,
                offset: DiscreteTime::from_seconds(spec.offset_seconds),
                scale: spec.scale,
                active_range: ActiveRange::new(
                    DiscreteTime::from_seconds(spec.active_start_seconds),
                    DiscreteTime::from_seconds(spec.active_end_seconds),
                ),
            },
            TimerDataLinks::default(),
            CompositeTimerLinks::default(),
        ))
        .id();
    attach_composite_child(world, parent, timer);
    baked.composites.push(timer);

    for track in &spec.tracks {
        bake_track(world, track, timer, bindings, baked)
            .with_context(|| format!("sub-timeline '{}'", spec.name))?;
    }
    for child in &spec.sub_timelines {
        bake_sub_timeline(world, child, timer, master, bindings, baked, depth + 1)?;
    }
    Ok(())
}

fn bake_track(
    world: &mut World,
    track: &TrackSpec,
    timer: Entity,
    bindings: &HashMap<String, Entity>,
    baked: &mut BakedTimeline,
) -> Result<()> {
    let Some(&target) = bindings.get(&track.binding) else {
        bail!("track references unknown binding '{}'", track.binding);
    };

    for clip in &track.clips {
        let entity = bake_clip(world, clip, track.channel, target)
            .with_context(|| format!("track '{}'", track.binding))?;
        attach_timer_link(world, timer, entity);
        baked.clips.push(entity);
    }
    Ok(())
}

fn bake_clip(
    world: &mut World,
    clip: &ClipSpec,
    channel: ChannelKind,
    target: Entity,
) -> Result<Entity> {
    ensure!(clip.start_seconds <= clip.end_seconds, "clip end precedes start");
    ensure!(clip.speed.is_finite(), "clip speed must be finite");

    let start = DiscreteTime::from_seconds(clip.start_seconds);
    let end = DiscreteTime::from_seconds(clip.end_seconds);

    // Extrapolation widens the window in which the clip contributes;
    // without it the clip is only live inside its own span.
    let active_range = ActiveRange::new(
        if clip.pre_extrapolation.is_some() { DiscreteTime::MIN } else { start },
        if clip.post_extrapolation.is_some() { DiscreteTime::MAX } else { end },
    );

    let entity = world
        .spawn((
            TimerData::default(),
            TimelineActive::INACTIVE,
            LocalTime::default(),
            TimeTransform { start, end, clip_in: DiscreteTime::from_seconds(clip.clip_in_seconds), scale: clip.speed },
            active_range,
            TrackBinding(target),
        ))
        .id();

    let (hold, looped, ping_pong) = extrapolation_masks(clip.pre_extrapolation, clip.post_extrapolation);
    if !hold.is_empty() {
        world.entity_mut(entity).insert(ExtrapolationHold(hold));
    }
    if !looped.is_empty() {
        world.entity_mut(entity).insert(ExtrapolationLoop(looped));
    }
    if !ping_pong.is_empty() {
        world.entity_mut(entity).insert(ExtrapolationPingPong(ping_pong));
    }

    match &clip.weight {
        None => {}
        Some(WeightSpec::Constant(value)) => {
            ensure!(value.is_finite() && *value >= 0.0, "clip weight must be non-negative");
            world.entity_mut(entity).insert(ClipWeight { value: *value });
        }
        Some(WeightSpec::Curve { keys }) => {
            let curve = build_curve(keys, scalar_value)?;
            world.entity_mut(entity).insert((ClipWeight::default(), AnimatedClipWeight(curve)));
        }
    }

    match channel {
        ChannelKind::Scalar => {
            ensure!(!clip.reset_on_deactivate, "reset_on_deactivate requires a translation channel");
            let animated = build_animated(clip, scalar_value, 0.0f32)?;
            world.entity_mut(entity).insert(animated);
        }
        ChannelKind::Translation => {
            let animated = build_animated(clip, vec3_value, Vec3::ZERO)?;
            world.entity_mut(entity).insert(animated);
            if clip.reset_on_deactivate {
                world.entity_mut(entity).insert(ResetOnDeactivate::default());
            }
        }
        ChannelKind::Rotation => {
            ensure!(!clip.reset_on_deactivate, "reset_on_deactivate requires a translation channel");
            let animated = build_animated(clip, quat_value, Quat::IDENTITY)?;
            world.entity_mut(entity).insert(animated);
        }
    }

    Ok(entity)
}

fn build_animated<T>(
    clip: &ClipSpec,
    convert: fn(&[f32]) -> Result<T>,
    fallback: T,
) -> Result<Animated<T>>
where
    T: Interpolate + Send + Sync + 'static,
{
    let default_value = match &clip.default_value {
        Some(components) => convert(components)?,
        None => fallback,
    };
    let curve = if clip.keys.is_empty() { None } else { Some(build_curve(&clip.keys, convert)?) };
    Ok(Animated { default_value, curve, additive: clip.additive })
}

fn build_curve<T: Interpolate>(keys: &[KeySpec], convert: fn(&[f32]) -> Result<T>) -> Result<Curve<T>> {
    let keys = keys
        .iter()
        .map(|key| {
            ensure!(key.time.is_finite(), "key time must be finite");
            Ok(Key { time: key.time, value: convert(&key.value)? })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Curve::new(keys))
}

fn scalar_value(components: &[f32]) -> Result<f32> {
    match components {
        &[value] => Ok(value),
        other => bail!("scalar key needs 1 component, got {}", other.len()),
    }
}

fn vec3_value(components: &[f32]) -> Result<Vec3> {
    match components {
        &[x, y, z] => Ok(Vec3::new(x, y, z)),
        other => bail!("translation key needs 3 components, got {}", other.len()),
    }
}

fn quat_value(components: &[f32]) -> Result<Quat> {
    match components {
        &[x, y, z, w] => Ok(Quat::from_xyzw(x, y, z, w).normalize()),
        other => bail!("rotation key needs 4 components (x, y, z, w), got {}", other.len()),
    }
}

fn extrapolation_masks(
    pre: Option<ExtrapolationKind>,
    post: Option<ExtrapolationKind>,
) -> (ExtrapolationSides, ExtrapolationSides, ExtrapolationSides) {
    let mut hold = ExtrapolationSides::empty();
    let mut looped = ExtrapolationSides::empty();
    let mut ping_pong = ExtrapolationSides::empty();
    let mut add = |kind: Option<ExtrapolationKind>, side: ExtrapolationSides| {
        match kind {
            Some(ExtrapolationKind::Hold) => hold |= side,
            Some(ExtrapolationKind::Loop) => looped |= side,
            Some(ExtrapolationKind::PingPong) => ping_pong |= side,
            None => {}
        }
    };
    add(pre, ExtrapolationSides::PRE);
    add(post, ExtrapolationSides::POST);
    (hold, looped, ping_pong)
}

fn attach_timer_link(world: &mut World, timer: Entity, consumer: Entity) {
    if let Some(mut links) = world.get_mut::<TimerDataLinks>(timer) {
        links.0.push(consumer);
    }
}

fn attach_composite_child(world: &mut World, parent: Entity, child: Entity) {
    if let Some(mut links) = world.get_mut::<CompositeTimerLinks>(parent) {
        links.0.push(child);
    }
}

/// Wires a composite timer under `parent` at runtime, outside a bake. The
/// parent must itself be a timer; the chain up to the master is validated so
/// a miswired graph fails here rather than hanging the update walk.
pub fn spawn_composite_timer(
    world: &mut World,
    parent: Entity,
    offset: DiscreteTime,
    scale: f64,
    active_range: ActiveRange,
) -> Result<Entity> {
    ensure!(active_range.is_valid(), "composite timer active range is empty");
    ensure!(world.get::<Timer>(parent).is_some(), "composite timer parent must be a timer");
    let master = resolve_master(world, parent)?;

    let timer = world
        .spawn((
            Timer { time_scale: 1.0, ..Default::default() },
            TimelineActive::INACTIVE,
            CompositeTimer { source: master, offset, scale, active_range },
            TimerDataLinks::default(),
            CompositeTimerLinks::default(),
        ))
        .id();
    attach_composite_child(world, parent, timer);
    Ok(timer)
}

/// Follows `CompositeTimer::source` up to the non-composite master. Bails on
/// a cycle or a chain longer than [`MAX_TIMELINE_DEPTH`].
fn resolve_master(world: &World, start: Entity) -> Result<Entity> {
    let mut current = start;
    let mut hops = 0usize;
    while let Some(composite) = world.get::<CompositeTimer>(current) {
        hops += 1;
        if composite.source == start || hops > MAX_TIMELINE_DEPTH {
            bail!("composite timer source chain does not terminate");
        }
        current = composite.source;
    }
    Ok(current)
}
