//! Host capability contract.
//!
//! The host application owns the scene graph; engines only ever call these
//! capability-level operations. Adapters for a real DCC implement both traits;
//! [`crate::memory::MemoryScene`] is the in-process reference host.

use crate::data::{
    BakedWeightTrack, ControlRef, DeformerRef, Frame, MorphStack, MorphTarget, Transform, Vec3,
    WeightSample,
};
use crate::error::SceneError;
use crate::ids::{DeformerHandle, ProxyId};

/// Scene graph capabilities used by the pipeline.
pub trait SceneGraph {
    fn has_mesh(&self, mesh: &str) -> bool;

    fn vertex_count(&self, mesh: &str) -> Result<usize, SceneError>;

    /// Deformed local-space points of `mesh` evaluated at `frame`.
    fn geometry_at(&self, mesh: &str, frame: Frame) -> Result<Vec<Vec3>, SceneError>;

    fn local_transform(&self, mesh: &str) -> Result<Transform, SceneError>;

    /// Local transforms of the ancestors, nearest parent first.
    fn parent_chain(&self, mesh: &str) -> Result<Vec<Transform>, SceneError>;

    /// Deformer stack in evaluation order.
    fn deformer_stack(&self, mesh: &str) -> Result<Vec<DeformerRef>, SceneError>;

    /// Replace the evaluation order. `order` must be a permutation of the current stack.
    fn set_deformer_order(&mut self, mesh: &str, order: &[DeformerHandle])
        -> Result<(), SceneError>;

    fn morph_stack(&self, mesh: &str) -> Result<Option<MorphStack>, SceneError>;

    /// Create the mesh's morph deformer at the top of its stack and return the
    /// actual node name (hosts may uniquify `name`).
    fn create_morph_stack(
        &mut self,
        mesh: &str,
        name: &str,
        baseline_vertex_count: usize,
    ) -> Result<String, SceneError>;

    /// Replace the vertex count recorded on the mesh's morph stack.
    fn set_morph_baseline(&mut self, mesh: &str, vertex_count: usize) -> Result<(), SceneError>;

    /// Append a target to the mesh's morph stack.
    fn add_morph_target(&mut self, mesh: &str, target: MorphTarget) -> Result<(), SceneError>;

    /// Remove the target for `pose` and any connection into its control.
    /// Returns whether a target existed.
    fn delete_morph_target(&mut self, mesh: &str, pose: &str) -> Result<bool, SceneError>;

    /// Connect `source` into `destination`, replacing any existing input.
    fn connect(&mut self, source: &ControlRef, destination: &ControlRef)
        -> Result<(), SceneError>;

    fn disconnect(&mut self, destination: &ControlRef) -> Result<(), SceneError>;

    /// Current input connection of `destination`, if any.
    fn input_of(&self, destination: &ControlRef) -> Option<ControlRef>;

    fn has_node(&self, node: &str) -> bool;

    /// Create an empty controller node; no-op when it already exists.
    fn ensure_controller(&mut self, name: &str) -> Result<(), SceneError>;

    /// Add a [0,1] channel on a controller; no-op when it already exists.
    fn ensure_channel(&mut self, control: &ControlRef) -> Result<(), SceneError>;

    fn has_channel(&self, control: &ControlRef) -> bool;

    /// Duplicate `mesh` as evaluated at `frame` into a history-free proxy.
    fn create_proxy(&mut self, mesh: &str, name: &str, frame: Frame)
        -> Result<ProxyId, SceneError>;

    /// Create (or reuse) a grouping transform at `translation`.
    fn create_group(&mut self, name: &str, translation: Vec3) -> Result<(), SceneError>;

    /// Parent `proxy` under `group` and set its root translation relative to it.
    fn place_proxy(&mut self, proxy: ProxyId, group: &str, translation: Vec3)
        -> Result<(), SceneError>;

    /// Record the baked sample of `mesh` at `frame`, replacing any previous one.
    fn write_baked_frame(
        &mut self,
        mesh: &str,
        frame: Frame,
        sample: Option<WeightSample>,
    ) -> Result<(), SceneError>;

    fn baked_track(&self, mesh: &str) -> Option<BakedWeightTrack>;
}

/// Animation-curve capabilities.
pub trait AnimationCurves {
    fn set_keyframe(&mut self, control: &ControlRef, frame: Frame, value: f32)
        -> Result<(), SceneError>;

    /// Value of `control` at `frame`, following live connections.
    fn evaluate(&self, control: &ControlRef, frame: Frame) -> Result<f32, SceneError>;

    /// Host playback range, used when an operation is not given explicit frames.
    fn playback_range(&self) -> (Frame, Frame);

    /// Scene time unit in frames per second.
    fn frame_rate(&self) -> f32;

    fn set_frame_rate(&mut self, fps: f32) -> Result<(), SceneError>;
}

/// Everything an engine needs from the host.
pub trait Scene: SceneGraph + AnimationCurves {}

impl<T: SceneGraph + AnimationCurves> Scene for T {}
