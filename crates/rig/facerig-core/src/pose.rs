//! Frame → pose table.
//!
//! The authoring animation holds one ARKit expression per integer frame with the
//! neutral face at frame 0. The default layout keys the ARKit-52 vocabulary,
//! minus `mouthClose`, on frames 1..=50 in canonical ARKit order and keys
//! `tongueOut` on frame 52. Frame 51 is the `mouthClose` slot, kept in the
//! table as an absent pose so it can never be captured by accident.

use serde::{Deserialize, Serialize};

use crate::data::Frame;
use crate::error::RigError;

/// The ARKit blendshape vocabulary in canonical order.
pub const ARKIT52_NAMES: [&str; 52] = [
    "eyeBlinkLeft",
    "eyeLookDownLeft",
    "eyeLookInLeft",
    "eyeLookOutLeft",
    "eyeLookUpLeft",
    "eyeSquintLeft",
    "eyeWideLeft",
    "eyeBlinkRight",
    "eyeLookDownRight",
    "eyeLookInRight",
    "eyeLookOutRight",
    "eyeLookUpRight",
    "eyeSquintRight",
    "eyeWideRight",
    "jawForward",
    "jawLeft",
    "jawRight",
    "jawOpen",
    "mouthClose",
    "mouthFunnel",
    "mouthPucker",
    "mouthLeft",
    "mouthRight",
    "mouthSmileLeft",
    "mouthSmileRight",
    "mouthFrownLeft",
    "mouthFrownRight",
    "mouthDimpleLeft",
    "mouthDimpleRight",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthRollLower",
    "mouthRollUpper",
    "mouthShrugLower",
    "mouthShrugUpper",
    "mouthPressLeft",
    "mouthPressRight",
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "mouthUpperUpLeft",
    "mouthUpperUpRight",
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "noseSneerLeft",
    "noseSneerRight",
    "tongueOut",
];

pub const NEUTRAL_POSE: &str = "neutral";
pub const OMITTED_POSE: &str = "mouthClose";
pub const TONGUE_POSE: &str = "tongueOut";

pub const NEUTRAL_FRAME: Frame = 0;
pub const OMITTED_FRAME: Frame = 51;
pub const TONGUE_FRAME: Frame = 52;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pose {
    pub name: String,
    pub frame: Frame,
    #[serde(default = "default_present")]
    pub present: bool,
}

fn default_present() -> bool {
    true
}

impl Pose {
    pub fn new(name: impl Into<String>, frame: Frame) -> Self {
        Self {
            name: name.into(),
            frame,
            present: true,
        }
    }

    pub fn absent(name: impl Into<String>, frame: Frame) -> Self {
        Self {
            present: false,
            ..Self::new(name, frame)
        }
    }
}

/// Immutable frame → pose mapping. Construct through [`PoseTable::arkit_default`]
/// or [`PoseTable::new`]; both validate the invariants.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoseTable {
    neutral: Pose,
    poses: Vec<Pose>,
}

#[derive(Deserialize)]
struct RawPoseTable {
    neutral: Pose,
    poses: Vec<Pose>,
}

impl<'de> Deserialize<'de> for PoseTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawPoseTable::deserialize(deserializer)?;
        PoseTable::new(raw.neutral, raw.poses).map_err(serde::de::Error::custom)
    }
}

impl Default for PoseTable {
    fn default() -> Self {
        Self::arkit_default()
    }
}

impl PoseTable {
    /// Validate and build a table. Pose frames must be unique and distinct from
    /// the neutral frame; names must be unique and non-empty.
    pub fn new(neutral: Pose, poses: Vec<Pose>) -> Result<Self, RigError> {
        if neutral.name.is_empty() {
            return Err(RigError::InvalidConfig("neutral pose needs a name".into()));
        }
        let mut frames = vec![neutral.frame];
        let mut names = vec![neutral.name.as_str()];
        for pose in &poses {
            if pose.name.is_empty() {
                return Err(RigError::InvalidConfig(format!(
                    "pose at frame {} has an empty name",
                    pose.frame
                )));
            }
            if frames.contains(&pose.frame) {
                return Err(RigError::InvalidConfig(format!(
                    "frame {} is assigned to more than one pose",
                    pose.frame
                )));
            }
            if names.contains(&pose.name.as_str()) {
                return Err(RigError::InvalidConfig(format!(
                    "pose '{}' appears more than once",
                    pose.name
                )));
            }
            frames.push(pose.frame);
            names.push(pose.name.as_str());
        }
        Ok(Self {
            neutral: Pose {
                present: true,
                ..neutral
            },
            poses,
        })
    }

    /// Default ARKit layout (neutral@0, 50 poses @1..=50, mouthClose absent @51, tongueOut @52).
    pub fn arkit_default() -> Self {
        let mut poses = Vec::with_capacity(ARKIT52_NAMES.len());
        let mut frame: Frame = 1;
        for name in ARKIT52_NAMES {
            if name == OMITTED_POSE || name == TONGUE_POSE {
                continue;
            }
            poses.push(Pose::new(name, frame));
            frame += 1;
        }
        poses.push(Pose::absent(OMITTED_POSE, OMITTED_FRAME));
        poses.push(Pose::new(TONGUE_POSE, TONGUE_FRAME));
        Self {
            neutral: Pose::new(NEUTRAL_POSE, NEUTRAL_FRAME),
            poses,
        }
    }

    /// Build from parallel name/frame lists, the way the authoring script took
    /// `arkit_names` and `frame_indices`.
    pub fn from_names_and_frames(
        neutral_frame: Frame,
        names: &[&str],
        frames: &[Frame],
    ) -> Result<Self, RigError> {
        if names.len() != frames.len() {
            return Err(RigError::InvalidConfig(format!(
                "{} pose names for {} frames",
                names.len(),
                frames.len()
            )));
        }
        let poses = names
            .iter()
            .zip(frames)
            .map(|(n, f)| Pose::new(*n, *f))
            .collect();
        Self::new(Pose::new(NEUTRAL_POSE, neutral_frame), poses)
    }

    pub fn neutral(&self) -> &Pose {
        &self.neutral
    }

    /// All non-neutral poses in table order, including absent ones.
    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// Present poses in table order.
    pub fn present(&self) -> impl Iterator<Item = &Pose> {
        self.poses.iter().filter(|p| p.present)
    }

    pub fn by_name(&self, name: &str) -> Option<&Pose> {
        if self.neutral.name == name {
            return Some(&self.neutral);
        }
        self.poses.iter().find(|p| p.name == name)
    }

    pub fn by_frame(&self, frame: Frame) -> Option<&Pose> {
        if self.neutral.frame == frame {
            return Some(&self.neutral);
        }
        self.poses.iter().find(|p| p.frame == frame)
    }

    /// Inclusive frame span covering neutral and every pose.
    pub fn frame_span(&self) -> (Frame, Frame) {
        self.poses
            .iter()
            .fold((self.neutral.frame, self.neutral.frame), |(lo, hi), p| {
                (lo.min(p.frame), hi.max(p.frame))
            })
    }
}
