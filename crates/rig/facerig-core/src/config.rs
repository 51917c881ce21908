//! Pipeline configuration.
//!
//! Every field has a default matching the head-capture quick run of the
//! authoring workflow, so `RigConfig::default()` is usable as is and JSON
//! overrides only need the fields they change.

use serde::{Deserialize, Serialize};

use crate::deformer_order::{CanonicalOrder, RoleRules};
use crate::error::RigError;
use crate::layout::GridConfig;
use crate::naming::{DEFAULT_CONTROLLER_NAME, DEFAULT_GROUP_NAME, DEFAULT_STACK_NAME};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Authoring rate. Sampling is always at integer frames.
    pub fps: f32,
    /// Morph stack node name (multi-mesh runs append `_<mesh>`).
    pub stack_name: String,
    /// Layout group name (multi-mesh runs append `_<mesh>`).
    pub group_name: String,
    /// Central controller node used by controller wiring.
    pub controller_name: String,
    pub capture: CaptureConfig,
    pub grid: GridConfig,
    /// X distance between the layout groups of consecutive meshes in a multi-mesh capture.
    pub multi_offset_step_x: f32,
    pub canonical_order: CanonicalOrder,
    pub role_rules: RoleRules,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            fps: 24.0,
            stack_name: DEFAULT_STACK_NAME.to_string(),
            group_name: DEFAULT_GROUP_NAME.to_string(),
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
            capture: CaptureConfig::default(),
            grid: GridConfig::default(),
            multi_offset_step_x: 400.0,
            canonical_order: CanonicalOrder::default(),
            role_rules: RoleRules::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Largest absolute delta component still treated as "same as neutral".
    pub identical_epsilon: f32,
    /// Add a zero-delta target for the neutral pose ahead of the captured ones.
    pub include_neutral_target: bool,
    /// Keep a frozen proxy per captured pose, laid out on the grid for QA.
    pub keep_proxies: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            identical_epsilon: 1e-6,
            include_neutral_target: false,
            keep_proxies: true,
        }
    }
}

impl RigConfig {
    pub fn from_json_str(text: &str) -> Result<Self, RigError> {
        let cfg: RigConfig = serde_json::from_str(text)
            .map_err(|e| RigError::InvalidConfig(format!("config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RigError> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(RigError::InvalidConfig(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        if !self.capture.identical_epsilon.is_finite() || self.capture.identical_epsilon < 0.0 {
            return Err(RigError::InvalidConfig(
                "capture.identical_epsilon must be a non-negative number".into(),
            ));
        }
        if self.stack_name.trim().is_empty() {
            return Err(RigError::InvalidConfig("stack_name is empty".into()));
        }
        self.grid.validate()?;
        self.canonical_order.validate()?;
        Ok(())
    }
}
