//! Rig data model shared by the engines and the host scene contract.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::DeformerHandle;
use crate::pose::Pose;

/// Integer frame number at the authoring rate.
pub type Frame = i32;

/// Point or offset in a mesh's local space.
pub type Vec3 = [f32; 3];

/// Local TRS of a transform node. Rotation is Euler degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn unit_scale() -> Vec3 {
    [1.0, 1.0, 1.0]
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0; 3],
        rotation: [0.0; 3],
        scale: [1.0; 3],
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn is_unscaled(&self) -> bool {
        self.scale == [1.0; 3]
    }
}

/// A scalar plug on a host node: a morph stack alias or a controller channel.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlRef {
    pub node: String,
    pub channel: String,
}

impl ControlRef {
    pub fn new(node: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for ControlRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.channel)
    }
}

/// A captured pose: per-vertex offset from neutral plus its driver control.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MorphTarget {
    pub pose: Pose,
    pub delta: Vec<Vec3>,
    pub control: ControlRef,
}

/// The morph deformer owned by one mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MorphStack {
    /// Host node name; also the `node` of every target's control.
    pub node: String,
    /// Vertex count recorded when the stack was created.
    pub baseline_vertex_count: usize,
    #[serde(default)]
    pub targets: Vec<MorphTarget>,
}

impl MorphStack {
    pub fn target(&self, pose_name: &str) -> Option<&MorphTarget> {
        self.targets.iter().find(|t| t.pose.name == pose_name)
    }

    pub fn has_pose(&self, pose_name: &str) -> bool {
        self.target(pose_name).is_some()
    }

    pub fn pose_names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.pose.name.as_str())
    }

    pub fn control(&self, pose_name: &str) -> ControlRef {
        ControlRef::new(self.node.clone(), pose_name)
    }
}

/// Directed connection from one control to another.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WiringLink {
    pub source: ControlRef,
    pub destination: ControlRef,
}

/// A deformer as reported by the host, in stack (evaluation) order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeformerRef {
    pub handle: DeformerHandle,
    /// Host node type, e.g. `skinCluster` or `blendShape`.
    pub kind: String,
    pub name: String,
}

impl DeformerRef {
    pub fn new(handle: impl Into<String>, kind: impl Into<String>) -> Self {
        let name: String = handle.into();
        Self {
            handle: DeformerHandle::new(name.clone()),
            kind: kind.into(),
            name,
        }
    }
}

/// Functional role of a deformer in the composition chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeformerRole {
    Skin,
    Morph,
    Corrective,
    Wrap,
    Other,
}

impl DeformerRole {
    pub const ALL: [DeformerRole; 5] = [
        DeformerRole::Skin,
        DeformerRole::Morph,
        DeformerRole::Corrective,
        DeformerRole::Wrap,
        DeformerRole::Other,
    ];
}

/// One classified entry of a mesh's deformer stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeformerStackEntry {
    pub mesh: String,
    pub role: DeformerRole,
    pub deformer: DeformerRef,
    pub position: usize,
}

/// Weights sampled for one target at one frame, keyed by pose name in driver order.
pub type WeightSample = IndexMap<String, f32>;

/// Baked per-frame weights for one mesh. `None` marks a frame where nothing
/// on the target matched the driver.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BakedWeightTrack {
    pub mesh: String,
    pub frames: BTreeMap<Frame, Option<WeightSample>>,
}

impl BakedWeightTrack {
    pub fn new(mesh: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            frames: BTreeMap::new(),
        }
    }

    pub fn sample(&self, frame: Frame) -> Option<&WeightSample> {
        self.frames.get(&frame).and_then(|s| s.as_ref())
    }

    pub fn weight(&self, frame: Frame, pose: &str) -> Option<f32> {
        self.sample(frame).and_then(|s| s.get(pose).copied())
    }

    pub fn frame_range(&self) -> Option<(Frame, Frame)> {
        let first = *self.frames.keys().next()?;
        let last = *self.frames.keys().next_back()?;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_defaults_to_identity() {
        let t: Transform = serde_json::from_str("{}").unwrap();
        assert!(t.is_identity());
        let scaled: Transform = serde_json::from_str(r#"{"scale":[2,2,2]}"#).unwrap();
        assert!(!scaled.is_unscaled());
    }

    #[test]
    fn roles_order_matches_default_canonical_order() {
        let mut roles = DeformerRole::ALL.to_vec();
        roles.reverse();
        roles.sort();
        assert_eq!(roles, DeformerRole::ALL.to_vec());
    }

    #[test]
    fn baked_track_queries() {
        let mut track = BakedWeightTrack::new("teeth");
        let mut s = WeightSample::new();
        s.insert("jawOpen".into(), 0.5);
        track.frames.insert(3, Some(s));
        track.frames.insert(4, None);
        assert_eq!(track.weight(3, "jawOpen"), Some(0.5));
        assert_eq!(track.sample(4), None);
        assert_eq!(track.frame_range(), Some((3, 4)));
    }
}
