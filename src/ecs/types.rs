use crate::curve::Curve;
use crate::time::{DiscreteTime, DiscreteTimeInterval};
use bevy_ecs::prelude::*;
use bitflags::bitflags;
use smallvec::SmallVec;

/// Per-frame time context fed by the host loop (or a [`crate::time::FrameClock`]).
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct TickTime {
    /// Game delta with the global time scale applied.
    pub game_delta: DiscreteTime,
    /// Game delta before scaling.
    pub unscaled_delta: DiscreteTime,
    /// Wall-clock delta.
    pub real_delta: DiscreteTime,
    /// The global time scale.
    pub time_scale: f64,
}

impl TickTime {
    /// A fixed-step context, convenient for deterministic ticking.
    pub fn fixed(delta: DiscreteTime) -> Self {
        Self { game_delta: delta, unscaled_delta: delta, real_delta: delta, time_scale: 1.0 }
    }

    pub fn fixed_seconds(seconds: f64) -> Self {
        Self::fixed(DiscreteTime::from_seconds(seconds))
    }
}

/// Selects which time source drives a timer root. Exactly one variant per
/// root; the clock update writes [`ClockData`] from it every tick.
#[derive(Component, Clone, Copy, Debug)]
pub enum ClockSource {
    GameTime,
    UnscaledGameTime,
    RealTime,
    Constant { delta_time: DiscreteTime, scale: f64 },
}

/// The `(delta, scale)` pair a clock produced this tick. Written by
/// `sys_update_clocks`, consumed by the timer update.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct ClockData {
    pub delta_time: DiscreteTime,
    pub scale: f64,
}

/// The authoritative time state of a timer root or composite node.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Timer {
    /// The current time of the timer.
    pub time: DiscreteTime,
    /// The amount the timer advanced this tick, time scale included.
    pub delta_time: DiscreteTime,
    /// The scale of the timer.
    pub time_scale: f64,
}

/// Paused flag for a timer root. Zeroes the advance while set; flipped on by
/// the `AutoPause` range policy and cleared when the timeline deactivates.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct TimerPaused(pub bool);

/// The behaviour of a timer when it reaches the end of its range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeBehaviour {
    /// Reset to the range start and deactivate.
    AutoStop,
    /// Clamp to the range and hold, paused, at the end.
    AutoPause,
    /// Wrap back to the range start.
    Loop,
}

/// Constrains a timer to a range, applied after each advance.
#[derive(Component, Clone, Copy, Debug)]
pub struct TimerRange {
    pub behaviour: RangeBehaviour,
    pub range: DiscreteTimeInterval,
    /// The number of times the timer has looped.
    pub loop_count: u32,
    /// Whether `AutoStop` should render the final frame once before stopping.
    pub sample_last_frame: bool,
}

impl TimerRange {
    pub fn new(behaviour: RangeBehaviour, range: DiscreteTimeInterval) -> Self {
        Self { behaviour, range, loop_count: 0, sample_last_frame: false }
    }
}

/// A timer whose time is an affine transformation of its parent timer's
/// time: `time = parent_time * scale + offset`. Composites form a tree
/// reachable from a master (non-composite) root through
/// [`CompositeTimerLinks`]; offset and scale are relative to the immediate
/// parent and composed once at bake time, so the runtime walk applies one
/// affine step per level.
#[derive(Component, Clone, Copy, Debug)]
pub struct CompositeTimer {
    /// The ultimate master timer of the tree this composite hangs off.
    pub source: Entity,
    pub offset: DiscreteTime,
    pub scale: f64,
    /// The parent-time range in which this composite (and everything linked
    /// to it) is active. Half-open.
    pub active_range: ActiveRange,
}

/// Read-only snapshot of a timer, fanned out to every entity that reacts to
/// it. Decouples the single authoritative writer from its many readers.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct TimerData {
    pub time: DiscreteTime,
    pub delta_time: DiscreteTime,
    pub time_scale: f64,
}

impl TimerData {
    pub fn snapshot(timer: &Timer) -> Self {
        Self { time: timer.time, delta_time: timer.delta_time, time_scale: timer.time_scale }
    }
}

/// Consumer entities receiving this timer's [`TimerData`] snapshot.
#[derive(Component, Clone, Debug, Default)]
pub struct TimerDataLinks(pub SmallVec<[Entity; 8]>);

/// Direct composite children of this timer.
#[derive(Component, Clone, Debug, Default)]
pub struct CompositeTimerLinks(pub SmallVec<[Entity; 4]>);

/// The timer-time range in which an entity carries the active flag.
/// Start inclusive, end exclusive.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveRange {
    pub start: DiscreteTime,
    pub end: DiscreteTime,
}

impl ActiveRange {
    /// The full representable range: always active.
    pub const COMPLETE: Self = Self { start: DiscreteTime::MIN, end: DiscreteTime::MAX };

    pub fn new(start: DiscreteTime, end: DiscreteTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(self) -> bool {
        self.start < self.end
    }

    pub fn contains(self, t: DiscreteTime) -> bool {
        self.start <= t && self.end > t
    }

    pub fn length(self) -> DiscreteTime {
        self.end - self.start
    }
}

impl Default for ActiveRange {
    fn default() -> Self {
        Self::COMPLETE
    }
}

/// The two-flag activity state used for edge detection without events:
/// `current` is written by the timer/lifecycle systems, `previous` is copied
/// from it at the end of every tick. Comparing the two answers "did this
/// just turn on/off".
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimelineActive {
    pub current: bool,
    pub previous: bool,
}

impl TimelineActive {
    pub const INACTIVE: Self = Self { current: false, previous: false };

    pub fn just_activated(self) -> bool {
        self.current && !self.previous
    }

    pub fn just_deactivated(self) -> bool {
        !self.current && self.previous
    }

    pub fn running(self) -> bool {
        self.current && self.previous
    }
}

/// The affine map from timer time into a clip's local coordinate space.
/// Immutable after bake.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct TimeTransform {
    pub start: DiscreteTime,
    pub end: DiscreteTime,
    pub clip_in: DiscreteTime,
    pub scale: f64,
}

impl TimeTransform {
    /// Maps timer time to local clip time without clamping ("continue"
    /// extrapolation semantics).
    pub fn to_local_unbound(&self, time: DiscreteTime) -> DiscreteTime {
        (time - self.start) * self.scale + self.clip_in
    }

    pub fn duration(&self) -> DiscreteTime {
        self.end - self.start
    }
}

bitflags! {
    /// Which sides of a clip's range an extrapolation policy applies to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ExtrapolationSides: u8 {
        const PRE = 1;
        const POST = 2;
    }
}

/// Freezes local time at the clip boundary outside the clip range.
#[derive(Component, Clone, Copy, Debug)]
pub struct ExtrapolationHold(pub ExtrapolationSides);

/// Wraps local time modulo the clip duration outside the clip range.
#[derive(Component, Clone, Copy, Debug)]
pub struct ExtrapolationLoop(pub ExtrapolationSides);

/// Bounces local time back and forth over the clip duration outside the
/// clip range.
#[derive(Component, Clone, Copy, Debug)]
pub struct ExtrapolationPingPong(pub ExtrapolationSides);

/// A clip's local time, recomputed whenever its governing [`TimerData`]
/// snapshot changes.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct LocalTime {
    pub value: DiscreteTime,
    /// Whether timer time currently falls inside the clip's nominal range.
    pub is_active: bool,
}

/// The clip's current blend weight. Presence of this component marks the
/// clip as a weighted contributor; clips without it take the sole-contributor
/// fast path.
#[derive(Component, Clone, Copy, Debug)]
pub struct ClipWeight {
    pub value: f32,
}

impl Default for ClipWeight {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

/// Curve driving [`ClipWeight`] from local time (mix-in/mix-out ramps).
#[derive(Component, Clone, Debug)]
pub struct AnimatedClipWeight(pub Curve<f32>);

/// On a clip entity: which target entity this clip animates. The blend
/// accumulator's grouping key.
#[derive(Component, Clone, Copy, Debug)]
pub struct TrackBinding(pub Entity);

/// A clip's animated value source: an optional curve sampled at local time,
/// falling back to `default_value`, optionally composed additively onto the
/// target instead of overwriting it.
#[derive(Component, Clone, Debug)]
pub struct Animated<T: Send + Sync + 'static> {
    pub default_value: T,
    pub curve: Option<Curve<T>>,
    pub additive: bool,
}

impl<T: Send + Sync + 'static> Animated<T> {
    pub fn constant(default_value: T) -> Self {
        Self { default_value, curve: None, additive: false }
    }

    pub fn curve(default_value: T, curve: Curve<T>) -> Self {
        Self { default_value, curve: Some(curve), additive: false }
    }
}

/// Blend target for scalar channels.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct ScalarTarget(pub f32);

/// Blend target for translation channels.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct TranslationTarget(pub glam::Vec3);

/// Blend target for rotation channels.
#[derive(Component, Clone, Copy, Debug)]
pub struct RotationTarget(pub glam::Quat);

impl Default for RotationTarget {
    fn default() -> Self {
        Self(glam::Quat::IDENTITY)
    }
}

/// On a translation clip: capture the target's value on activation and
/// restore it on deactivation.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct ResetOnDeactivate(pub glam::Vec3);
