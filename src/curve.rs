use glam::{Quat, Vec2, Vec3};

/// Sampling capability a blend source exposes: maps a local time in seconds
/// to a value. Absence of a bound curve means "use the default value".
pub trait CurveSampler<T> {
    fn is_created(&self) -> bool;
    fn evaluate(&self, time: f32) -> T;
}

/// Linear interpolation for curve value types.
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Interpolate for Vec2 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        // Normalized lerp with shortest-path correction.
        a.lerp(b, t)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Key<T> {
    pub time: f32,
    pub value: T,
}

/// A piecewise-linear keyframe curve, clamped at both ends.
///
/// Keys are sorted by time at construction; evaluation is defined for all
/// inputs, returning the first/last key value outside the keyed range.
#[derive(Clone, Debug, Default)]
pub struct Curve<T> {
    keys: Vec<Key<T>>,
}

impl<T: Interpolate> Curve<T> {
    pub fn new(mut keys: Vec<Key<T>>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn constant(value: T) -> Self {
        Self { keys: vec![Key { time: 0.0, value }] }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Key<T>] {
        &self.keys
    }
}

impl<T: Interpolate + Default> CurveSampler<T> for Curve<T> {
    fn is_created(&self) -> bool {
        !self.keys.is_empty()
    }

    fn evaluate(&self, time: f32) -> T {
        let Some(first) = self.keys.first() else {
            return T::default();
        };
        if time <= first.time {
            return first.value;
        }
        let last = self.keys[self.keys.len() - 1];
        if time >= last.time {
            return last.value;
        }
        let next = self.keys.partition_point(|k| k.time <= time);
        let a = self.keys[next - 1];
        let b = self.keys[next];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        T::interpolate(a.value, b.value, (time - a.time) / span)
    }
}
