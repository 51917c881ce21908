//! Facerig Core (host-agnostic)
//!
//! ARKit facial-rig deformation pipeline: capture the 52 ARKit poses of a
//! sampled face animation as morph targets, wire companion meshes (teeth,
//! eyes, brows) to the head's controls, bake the live weights onto those
//! meshes, and put every deformer stack into a canonical order for export.
//!
//! The host application (a DCC) is reached only through the [`scene`]
//! traits. [`memory::MemoryScene`] implements them over plain data.

pub mod baking;
pub mod capture;
pub mod commands;
pub mod config;
pub mod data;
pub mod deformer_order;
pub mod error;
pub mod ids;
pub mod layout;
pub mod memory;
pub mod naming;
pub mod outputs;
pub mod pose;
pub mod scene;
pub mod wiring;

// Re-exports for host adapters
pub use baking::{bake_weights, export_baked_json, BakeRequest};
pub use capture::{capture_batch, capture_mesh, ensure_frame_rate, rebuild_mesh, CaptureRequest};
pub use config::{CaptureConfig, RigConfig};
pub use data::{
    BakedWeightTrack, ControlRef, DeformerRef, DeformerRole, DeformerStackEntry, Frame,
    MorphStack, MorphTarget, Transform, Vec3, WeightSample, WiringLink,
};
pub use deformer_order::{resolve_mesh, resolve_meshes, CanonicalOrder, RoleRules};
pub use error::{RigError, RigResult, SceneError};
pub use ids::{DeformerHandle, IdAllocator, ProxyId};
pub use layout::{arrange, grid_positions, GridConfig, GridPlane};
pub use memory::MemoryScene;
pub use outputs::{
    BakeReport, BatchReport, CaptureReport, CapturedPose, DestinationWiring, ExportIssue,
    ExportPrepReport, LinkOutcome, LinkRecord, OrderReport, WiringReport,
};
pub use pose::{Pose, PoseTable, ARKIT52_NAMES};
pub use scene::{AnimationCurves, Scene, SceneGraph};
pub use wiring::{wire_meshes, wire_to_controller};
