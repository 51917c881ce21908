//! Grid placement of captured QA proxies.
//!
//! Only the proxy's root translation is written; local points stay untouched so
//! morph deltas defined in local space are unaffected by where a proxy sits.

use serde::{Deserialize, Serialize};

use crate::data::Vec3;
use crate::error::RigError;
use crate::ids::ProxyId;
use crate::naming::DEFAULT_GROUP_NAME;
use crate::scene::SceneGraph;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GridPlane {
    /// Columns along X, rows along Y.
    XY,
    /// Columns along X, rows along Z.
    XZ,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Fixed column count; 0 derives it from `aspect`.
    pub columns: usize,
    /// Width:height ratio used when `columns` is 0.
    pub aspect: (u32, u32),
    pub spacing_x: f32,
    pub spacing_y: f32,
    pub plane: GridPlane,
    pub group_offset: Vec3,
    pub group_name: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 0,
            aspect: (16, 9),
            spacing_x: 15.0,
            spacing_y: 40.0,
            plane: GridPlane::XY,
            group_offset: [-300.0, 100.0, 0.0],
            group_name: DEFAULT_GROUP_NAME.to_string(),
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), RigError> {
        let ok = |s: f32| s.is_finite() && s > 0.0;
        if !ok(self.spacing_x) || !ok(self.spacing_y) {
            return Err(RigError::InvalidConfig(format!(
                "grid spacing must be positive, got ({}, {})",
                self.spacing_x, self.spacing_y
            )));
        }
        if self.columns == 0 && (self.aspect.0 == 0 || self.aspect.1 == 0) {
            return Err(RigError::InvalidConfig(
                "grid aspect needs non-zero width and height".into(),
            ));
        }
        Ok(())
    }

    /// Column count for `count` items.
    pub fn column_count(&self, count: usize) -> usize {
        if self.columns > 0 {
            return self.columns;
        }
        let ratio = self.aspect.0 as f64 / self.aspect.1.max(1) as f64;
        ((count as f64 * ratio).sqrt().ceil() as usize).max(1)
    }
}

/// Row-major grid translations for `count` items, relative to the group.
pub fn grid_positions(count: usize, cfg: &GridConfig) -> Vec<Vec3> {
    let cols = cfg.column_count(count);
    (0..count)
        .map(|i| {
            let row = (i / cols) as f32;
            let col = (i % cols) as f32;
            match cfg.plane {
                GridPlane::XY => [col * cfg.spacing_x, row * cfg.spacing_y, 0.0],
                GridPlane::XZ => [col * cfg.spacing_x, 0.0, row * cfg.spacing_y],
            }
        })
        .collect()
}

/// Create the layout group and place every proxy on the grid, in order.
pub fn arrange<S: SceneGraph + ?Sized>(
    scene: &mut S,
    proxies: &[ProxyId],
    cfg: &GridConfig,
) -> Result<Option<String>, RigError> {
    if proxies.is_empty() {
        return Ok(None);
    }
    cfg.validate()?;
    scene.create_group(&cfg.group_name, cfg.group_offset)?;
    for (proxy, pos) in proxies.iter().zip(grid_positions(proxies.len(), cfg)) {
        scene.place_proxy(*proxy, &cfg.group_name, pos)?;
    }
    log::debug!(
        "laid out {} proxies under '{}' ({} columns)",
        proxies.len(),
        cfg.group_name,
        cfg.column_count(proxies.len())
    );
    Ok(Some(cfg.group_name.clone()))
}
