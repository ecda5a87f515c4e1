use bevy_ecs::prelude::{Entity, Resource};
use glam::{Quat, Vec2, Vec3};
use std::collections::HashMap;

/// How two values of a blendable type combine: `lerp` for weighted
/// interpolation, `add` for additive composition.
pub trait Mixer<T>: Default {
    fn lerp(&self, a: T, b: T, s: f32) -> T;
    fn add(&self, a: T, b: T) -> T;
}

#[derive(Default)]
pub struct FloatMixer;

impl Mixer<f32> for FloatMixer {
    fn lerp(&self, a: f32, b: f32, s: f32) -> f32 {
        a + (b - a) * s
    }

    fn add(&self, a: f32, b: f32) -> f32 {
        a + b
    }
}

#[derive(Default)]
pub struct Vec2Mixer;

impl Mixer<Vec2> for Vec2Mixer {
    fn lerp(&self, a: Vec2, b: Vec2, s: f32) -> Vec2 {
        a.lerp(b, s)
    }

    fn add(&self, a: Vec2, b: Vec2) -> Vec2 {
        a + b
    }
}

#[derive(Default)]
pub struct Vec3Mixer;

impl Mixer<Vec3> for Vec3Mixer {
    fn lerp(&self, a: Vec3, b: Vec3, s: f32) -> Vec3 {
        a.lerp(b, s)
    }

    fn add(&self, a: Vec3, b: Vec3) -> Vec3 {
        a + b
    }
}

#[derive(Default)]
pub struct QuatMixer;

impl Mixer<Quat> for QuatMixer {
    fn lerp(&self, a: Quat, b: Quat, s: f32) -> Quat {
        // Normalized lerp with shortest-path correction.
        a.lerp(b, s)
    }

    fn add(&self, a: Quat, b: Quat) -> Quat {
        a * b
    }
}

/// The bounded top-4 accumulator for one blend target: the four
/// highest-weight contributions seen this tick, sorted descending by weight.
#[derive(Clone, Copy, Debug)]
pub struct MixData<T> {
    pub weights: [f32; 4],
    pub values: [T; 4],
    pub additive: bool,
}

impl<T: Default + Copy> Default for MixData<T> {
    fn default() -> Self {
        Self { weights: [0.0; 4], values: [T::default(); 4], additive: false }
    }
}

/// Per-property-type blend accumulator: a per-tick map from target entity to
/// its [`MixData`]. One engine instance exists per animated property type;
/// the map is cleared and rebuilt every tick, keeping only its capacity
/// across ticks.
#[derive(Resource)]
pub struct BlendEngine<T: Send + Sync + 'static> {
    results: HashMap<Entity, MixData<T>>,
}

impl<T: Default + Copy + Send + Sync + 'static> BlendEngine<T> {
    pub fn new() -> Self {
        Self { results: HashMap::with_capacity(64) }
    }

    /// Clears the previous tick's results and reserves for the expected
    /// number of contributors. Must complete before any insertion.
    pub fn resize(&mut self, unweighted_count: usize, weighted_count: usize) {
        self.results.clear();
        let wanted = unweighted_count + weighted_count;
        if self.results.capacity() < wanted {
            self.results.reserve(wanted - self.results.len());
        }
    }

    /// Sole-contributor fast path: full weight in slot 0. First writer wins
    /// per target; authoring is expected to keep unweighted clips mutually
    /// exclusive per target.
    pub fn insert_unweighted(&mut self, target: Entity, value: T, additive: bool) {
        self.results.entry(target).or_insert(MixData {
            weights: [1.0, 0.0, 0.0, 0.0],
            values: [value, T::default(), T::default(), T::default()],
            additive,
        });
    }

    /// Ranks a weighted contribution into the target's 4-slot structure.
    /// At most 3 comparisons and 3 shifts; anything beyond the 4th highest
    /// weight is dropped, a bounded approximation rather than an error.
    pub fn accumulate(&mut self, target: Entity, value: T, weight: f32, additive: bool) {
        let data = self.results.entry(target).or_default();
        data.additive |= additive;
        if weight > data.weights[0] {
            data.weights[3] = data.weights[2];
            data.weights[2] = data.weights[1];
            data.weights[1] = data.weights[0];
            data.weights[0] = weight;
            data.values[3] = data.values[2];
            data.values[2] = data.values[1];
            data.values[1] = data.values[0];
            data.values[0] = value;
        } else if weight > data.weights[1] {
            data.weights[3] = data.weights[2];
            data.weights[2] = data.weights[1];
            data.weights[1] = weight;
            data.values[3] = data.values[2];
            data.values[2] = data.values[1];
            data.values[1] = value;
        } else if weight > data.weights[2] {
            data.weights[3] = data.weights[2];
            data.weights[2] = weight;
            data.values[3] = data.values[2];
            data.values[2] = value;
        } else if weight > data.weights[3] {
            data.weights[3] = weight;
            data.values[3] = value;
        }
    }

    /// The accumulated results for the final blend-and-write pass.
    pub fn results_mut(&mut self) -> impl Iterator<Item = (Entity, &mut MixData<T>)> {
        self.results.iter_mut().map(|(entity, data)| (*entity, data))
    }

    pub fn get(&self, target: Entity) -> Option<&MixData<T>> {
        self.results.get(&target)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<T: Default + Copy + Send + Sync + 'static> Default for BlendEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

const WEIGHT_EPSILON: f32 = 1e-6;

/// Blends the accumulated contributions into a final value.
///
/// When the weights sum below 1 and the mix is not additive, the missing
/// mass is filled with `default_value` so partial coverage blends toward the
/// target's current state. Up to four contributions combine through a
/// binary lerp tree, a weight-correct O(1) interpolation for the bounded
/// slot count. Additive mixes compose the blended delta onto the default
/// instead of replacing it.
pub fn blend<T, M>(values: &mut MixData<T>, default_value: T) -> T
where
    T: Default + Copy,
    M: Mixer<T>,
{
    let mixer = M::default();
    let mut result = default_value;

    if values.weights[0] > WEIGHT_EPSILON {
        let mut total_weight: f32 = values.weights.iter().sum();
        if total_weight < 1.0 && !values.additive {
            if values.weights[1] <= WEIGHT_EPSILON {
                values.weights[1] = 1.0 - total_weight;
                values.values[1] = default_value;
            } else if values.weights[2] <= WEIGHT_EPSILON {
                values.weights[2] = 1.0 - total_weight;
                values.values[2] = default_value;
            } else if values.weights[3] <= WEIGHT_EPSILON {
                values.weights[3] = 1.0 - total_weight;
                values.values[3] = default_value;
            }

            total_weight = 1.0;
        }

        let inv = total_weight.recip();
        let w = [
            values.weights[0] * inv,
            values.weights[1] * inv,
            values.weights[2] * inv,
            values.weights[3] * inv,
        ];

        if w[1] <= WEIGHT_EPSILON {
            result = values.values[0];
        } else if w[2] <= WEIGHT_EPSILON {
            result = mixer.lerp(values.values[0], values.values[1], w[1]);
        } else {
            let pair = w[0] + w[1];
            let a = mixer.lerp(values.values[0], values.values[1], w[1] / pair);
            let b = mixer.lerp(values.values[2], values.values[3], w[3] / (1.0 - pair));
            result = mixer.lerp(b, a, pair);
        }

        if values.additive {
            result = mixer.add(default_value, result);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    fn target() -> Entity {
        World::new().spawn_empty().id()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-5
    }

    #[test]
    fn top4_slots_sort_descending_regardless_of_insert_order() {
        let entity = target();
        let mut engine = BlendEngine::<f32>::new();
        engine.resize(0, 4);
        for &(weight, value) in &[(0.5, 50.0), (0.9, 90.0), (0.3, 30.0), (0.7, 70.0)] {
            engine.accumulate(entity, value, weight, false);
        }
        let data = engine.get(entity).unwrap();
        assert_eq!(data.weights, [0.9, 0.7, 0.5, 0.3]);
        assert_eq!(data.values, [90.0, 70.0, 50.0, 30.0]);
    }

    #[test]
    fn fifth_low_weight_contribution_is_dropped() {
        let entity = target();
        let mut engine = BlendEngine::<f32>::new();
        engine.resize(0, 5);
        for &w in &[0.9, 0.7, 0.5, 0.3] {
            engine.accumulate(entity, w, w, false);
        }
        engine.accumulate(entity, 0.1, 0.1, false);
        let data = engine.get(entity).unwrap();
        assert_eq!(data.weights, [0.9, 0.7, 0.5, 0.3]);
    }

    #[test]
    fn fifth_high_weight_contribution_evicts_the_lowest() {
        let entity = target();
        let mut engine = BlendEngine::<f32>::new();
        engine.resize(0, 5);
        for &w in &[0.9, 0.7, 0.5, 0.3] {
            engine.accumulate(entity, w, w, false);
        }
        engine.accumulate(entity, 0.95, 0.95, false);
        let data = engine.get(entity).unwrap();
        assert_eq!(data.weights, [0.95, 0.9, 0.7, 0.5]);
    }

    #[test]
    fn unweighted_first_writer_wins() {
        let entity = target();
        let mut engine = BlendEngine::<f32>::new();
        engine.resize(2, 0);
        engine.insert_unweighted(entity, 1.0, false);
        engine.insert_unweighted(entity, 2.0, false);
        assert_eq!(engine.get(entity).unwrap().values[0], 1.0);
    }

    #[test]
    fn blend_below_epsilon_returns_default() {
        let mut mix = MixData::<f32>::default();
        assert_eq!(blend::<_, FloatMixer>(&mut mix, 42.0), 42.0);
    }

    #[test]
    fn blend_partial_coverage_fills_toward_default() {
        let mut mix = MixData::<f32> {
            weights: [0.4, 0.0, 0.0, 0.0],
            values: [10.0, 0.0, 0.0, 0.0],
            additive: false,
        };
        // Lerp(default, value, 0.4), not the value outright.
        let result = blend::<_, FloatMixer>(&mut mix, 0.0);
        assert!(approx(result, 4.0), "got {result}");
    }

    #[test]
    fn blend_full_weight_single_contribution_passes_through() {
        let mut mix = MixData::<f32> {
            weights: [1.0, 0.0, 0.0, 0.0],
            values: [10.0, 0.0, 0.0, 0.0],
            additive: false,
        };
        assert!(approx(blend::<_, FloatMixer>(&mut mix, 5.0), 10.0));
    }

    #[test]
    fn blend_four_equal_weights_averages() {
        let mut mix = MixData::<f32> {
            weights: [0.25; 4],
            values: [1.0, 2.0, 3.0, 4.0],
            additive: false,
        };
        assert!(approx(blend::<_, FloatMixer>(&mut mix, 0.0), 2.5));
    }

    #[test]
    fn blend_additive_composes_onto_default() {
        let mut mix = MixData::<f32> {
            weights: [1.0, 0.0, 0.0, 0.0],
            values: [3.0, 0.0, 0.0, 0.0],
            additive: true,
        };
        assert!(approx(blend::<_, FloatMixer>(&mut mix, 10.0), 13.0));
    }

    #[test]
    fn blend_additive_does_not_fill_missing_mass() {
        let mut mix = MixData::<f32> {
            weights: [0.5, 0.0, 0.0, 0.0],
            values: [8.0, 0.0, 0.0, 0.0],
            additive: true,
        };
        // Weights normalize to 1 without a default fill, then add.
        assert!(approx(blend::<_, FloatMixer>(&mut mix, 10.0), 18.0));
    }

    #[test]
    fn quat_mixer_nlerp_halfway() {
        let mixer = QuatMixer;
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let mid = mixer.lerp(a, b, 0.5);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(mid.angle_between(expected) < 1e-3);
    }
}
