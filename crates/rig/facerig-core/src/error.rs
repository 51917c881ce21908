//! Error types for the rig pipeline and its host scene.

use thiserror::Error;

use crate::data::Frame;

/// Failures reported by a host scene implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("mesh '{0}' not found")]
    MeshNotFound(String),
    #[error("node '{0}' not found")]
    NodeNotFound(String),
    #[error("control '{node}.{channel}' not found")]
    ControlNotFound { node: String, channel: String },
    #[error("proxy #{0} not found")]
    ProxyNotFound(u32),
    #[error("mesh '{mesh}' already owns morph stack '{existing}'")]
    StackExists { mesh: String, existing: String },
    #[error("deformer order for '{mesh}' is not a permutation of its stack: {reason}")]
    InvalidDeformerOrder { mesh: String, reason: String },
    #[error("connections into '{0}' form a cycle")]
    ConnectionCycle(String),
}

/// Errors produced by the capture, wiring, baking, ordering and layout engines.
///
/// `MissingPoseFrame`, `UnknownDeformerRole` and `MorphTargetExists` are
/// recoverable: engines log them, record them in their report and continue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigError {
    #[error("topology mismatch on '{mesh}': expected {expected} vertices, found {found}{}", frame_suffix(.frame))]
    TopologyMismatch {
        mesh: String,
        expected: usize,
        found: usize,
        frame: Option<Frame>,
    },
    #[error("pose '{pose}' at frame {frame} on '{mesh}' is indistinguishable from neutral; skipped")]
    MissingPoseFrame {
        mesh: String,
        pose: String,
        frame: Frame,
    },
    #[error("morph target '{pose}' already exists on '{mesh}'; delete it before recapturing")]
    MorphTargetExists { mesh: String, pose: String },
    #[error("driver '{mesh}' has no morph stack")]
    UnresolvedDriver { mesh: String },
    #[error("no target meshes selected")]
    EmptyTargetSet,
    #[error("deformer '{deformer}' ({kind}) on '{mesh}' has no known role; left in place among Other")]
    UnknownDeformerRole {
        mesh: String,
        deformer: String,
        kind: String,
    },
    #[error("precondition violated on '{mesh}': {reason}")]
    PreconditionViolation { mesh: String, reason: String },
    #[error("invalid frame range [{start}, {end}]")]
    InvalidFrameRange { start: Frame, end: Frame },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

fn frame_suffix(frame: &Option<Frame>) -> String {
    match frame {
        Some(f) => format!(" at frame {f}"),
        None => String::new(),
    }
}

impl RigError {
    /// Recoverable kinds that are skipped with a warning rather than aborting.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RigError::MissingPoseFrame { .. }
                | RigError::UnknownDeformerRole { .. }
                | RigError::MorphTargetExists { .. }
        )
    }
}

pub type RigResult<T> = Result<T, RigError>;
