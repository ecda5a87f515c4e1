//! Serialized timeline descriptions. A [`TimelineAsset`] is the authoring
//! format the baker turns into entities; all times are in seconds and
//! converted to ticks at bake.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineAsset {
    pub name: String,
    #[serde(default)]
    pub clock: ClockSpec,
    /// Optional range policy on the master timer.
    #[serde(default)]
    pub range: Option<RangeSpec>,
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
    #[serde(default)]
    pub sub_timelines: Vec<SubTimelineSpec>,
}

impl TimelineAsset {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read timeline asset {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse timeline asset {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClockSpec {
    #[default]
    GameTime,
    UnscaledGameTime,
    RealTime,
    Constant {
        delta_seconds: f64,
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBehaviourSpec {
    AutoStop,
    AutoPause,
    Loop,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RangeSpec {
    pub behaviour: RangeBehaviourSpec,
    pub start_seconds: f64,
    pub end_seconds: f64,
    #[serde(default)]
    pub sample_last_frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Scalar,
    Translation,
    Rotation,
}

/// One track: clips of a single channel kind, all writing the same named
/// binding. The binding name resolves to a target entity at bake.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackSpec {
    pub binding: String,
    pub channel: ChannelKind,
    #[serde(default)]
    pub clips: Vec<ClipSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationKind {
    Hold,
    Loop,
    PingPong,
}

/// A clip's blend weight: either a constant, or a curve over local time.
/// Omitting the weight entirely marks the clip unweighted (sole-contributor
/// fast path).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WeightSpec {
    Constant(f32),
    Curve { keys: Vec<KeySpec> },
}

/// A keyframe. `value` carries as many components as the channel kind needs:
/// 1 for scalar, 3 for translation, 4 (x, y, z, w) for rotation.
#[derive(Debug, Clone, Deserialize)]
pub struct KeySpec {
    pub time: f32,
    pub value: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipSpec {
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// Local-time offset into the clip's content at its start.
    #[serde(default)]
    pub clip_in_seconds: f64,
    #[serde(default = "default_scale")]
    pub speed: f64,
    #[serde(default)]
    pub pre_extrapolation: Option<ExtrapolationKind>,
    #[serde(default)]
    pub post_extrapolation: Option<ExtrapolationKind>,
    #[serde(default)]
    pub weight: Option<WeightSpec>,
    #[serde(default)]
    pub additive: bool,
    #[serde(default)]
    pub keys: Vec<KeySpec>,
    /// Fallback value when the clip carries no keys. Same layout as a key
    /// value.
    #[serde(default)]
    pub default_value: Option<Vec<f32>>,
    /// Capture the target on activation and restore it on deactivation.
    /// Translation channels only.
    #[serde(default)]
    pub reset_on_deactivate: bool,
}

/// A nested timeline running on a composite timer: child time is
/// `parent_time * scale + offset_seconds`, active while the parent is inside
/// `[active_start_seconds, active_end_seconds)`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubTimelineSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub offset_seconds: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub active_start_seconds: f64,
    pub active_end_seconds: f64,
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
    #[serde(default)]
    pub sub_timelines: Vec<SubTimelineSpec>,
}

fn default_scale() -> f64 {
    1.0
}
