use bevy_ecs::prelude::Resource;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct StageTimingSummary {
    pub name: &'static str,
    /// Time spent in this stage during the most recent tick; zero if the
    /// stage did not run.
    pub last_ms: f32,
    /// Average over the ticks in which the stage ran.
    pub average_ms: f32,
    /// Average over all pipeline ticks, counting ticks the stage skipped.
    pub per_tick_ms: f32,
    pub max_ms: f32,
    pub samples: u64,
}

#[derive(Default)]
struct StageTiming {
    last_ms: f32,
    total_ms: f32,
    max_ms: f32,
    samples: u64,
}

/// Scope-guard timing for the pipeline stages, tick-aware: the world calls
/// [`StageProfiler::begin_tick`] before each schedule run, so `last_ms`
/// always reflects the current tick and per-tick averages stay honest for
/// stages that bail out early on quiet frames. Hosts poll
/// [`StageProfiler::summaries`] to see where tick time goes.
#[derive(Resource, Default)]
pub struct StageProfiler {
    timings: HashMap<&'static str, StageTiming>,
    ticks: u64,
}

impl StageProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a pipeline tick: clears every stage's last-tick
    /// reading and advances the tick count.
    pub fn begin_tick(&mut self) {
        self.ticks += 1;
        for timing in self.timings.values_mut() {
            timing.last_ms = 0.0;
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn scope(&mut self, name: &'static str) -> StageProfileScope<'_> {
        StageProfileScope { name, profiler: self, start: Instant::now() }
    }

    fn record(&mut self, name: &'static str, duration_ms: f32) {
        let entry = self.timings.entry(name).or_default();
        entry.last_ms += duration_ms;
        entry.max_ms = entry.max_ms.max(duration_ms);
        entry.total_ms += duration_ms;
        entry.samples += 1;
    }

    pub fn summaries(&self) -> Vec<StageTimingSummary> {
        let mut out: Vec<_> = self
            .timings
            .iter()
            .map(|(&name, timing)| StageTimingSummary {
                name,
                last_ms: timing.last_ms,
                average_ms: if timing.samples == 0 {
                    0.0
                } else {
                    timing.total_ms / timing.samples as f32
                },
                per_tick_ms: if self.ticks == 0 {
                    0.0
                } else {
                    timing.total_ms / self.ticks as f32
                },
                max_ms: timing.max_ms,
                samples: timing.samples,
            })
            .collect();
        out.sort_by(|a, b| b.last_ms.partial_cmp(&a.last_ms).unwrap_or(std::cmp::Ordering::Equal));
        out
    }
}

pub struct StageProfileScope<'a> {
    name: &'static str,
    profiler: &'a mut StageProfiler,
    start: Instant,
}

impl Drop for StageProfileScope<'_> {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f32() * 1000.0;
        self.profiler.record(self.name, duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_tick_clears_last_readings_for_skipped_stages() {
        let mut profiler = StageProfiler::new();
        profiler.begin_tick();
        drop(profiler.scope("stage_a"));
        let summary = &profiler.summaries()[0];
        assert_eq!(summary.samples, 1);

        // Next tick the stage does not run: last_ms reads zero, the sample
        // count stands.
        profiler.begin_tick();
        let summary = &profiler.summaries()[0];
        assert_eq!(summary.last_ms, 0.0);
        assert_eq!(summary.samples, 1);
        assert_eq!(profiler.ticks(), 2);
    }

    #[test]
    fn per_tick_average_counts_quiet_ticks() {
        let mut profiler = StageProfiler::new();
        profiler.begin_tick();
        profiler.record("stage_a", 4.0);
        profiler.begin_tick();
        // stage_a ran nothing this tick
        let summary = &profiler.summaries()[0];
        assert_eq!(summary.average_ms, 4.0);
        assert_eq!(summary.per_tick_ms, 2.0);
    }

    #[test]
    fn repeated_scopes_in_one_tick_accumulate_last_ms() {
        let mut profiler = StageProfiler::new();
        profiler.begin_tick();
        profiler.record("stage_a", 1.0);
        profiler.record("stage_a", 2.0);
        let summary = &profiler.summaries()[0];
        assert_eq!(summary.last_ms, 3.0);
        assert_eq!(summary.max_ms, 2.0);
        assert_eq!(summary.samples, 2);
    }
}
