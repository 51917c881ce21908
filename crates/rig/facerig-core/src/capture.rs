//! Morph capture: turn posed frames of a sampled animation into morph targets.
//!
//! A capture reads every pose first and only then touches the scene, so a mesh
//! that fails (bad transform, topology change mid-animation) is left exactly
//! as it was. Existing targets are never overwritten; recapturing a pose needs
//! an explicit [`rebuild_mesh`].

use serde::{Deserialize, Serialize};

use crate::config::RigConfig;
use crate::data::{ControlRef, Frame, MorphStack, MorphTarget, Vec3};
use crate::error::RigError;
use crate::layout::{self, GridConfig};
use crate::naming::sanitize_node_name;
use crate::outputs::{BatchReport, CaptureReport, CapturedPose};
use crate::pose::{Pose, PoseTable};
use crate::scene::Scene;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Animated mesh whose frames are sampled.
    pub source: String,
    /// Mesh receiving the morph targets; equal to `source` for a self capture.
    pub target: String,
    /// Requested morph stack node name (sanitised before use).
    pub stack_name: String,
    /// Only poses whose frame lies in this inclusive range are captured.
    #[serde(default)]
    pub frame_range: Option<(Frame, Frame)>,
    /// Grid for QA proxies; `None` keeps no proxies.
    #[serde(default)]
    pub layout: Option<GridConfig>,
}

impl CaptureRequest {
    /// Self capture of `mesh` using the configured stack name and grid.
    pub fn self_capture(mesh: &str, cfg: &RigConfig) -> Self {
        Self {
            source: mesh.to_string(),
            target: mesh.to_string(),
            stack_name: cfg.stack_name.clone(),
            frame_range: None,
            layout: cfg.capture.keep_proxies.then(|| GridConfig {
                group_name: cfg.group_name.clone(),
                ..cfg.grid.clone()
            }),
        }
    }

    pub fn onto(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }

    pub fn in_range(mut self, start: Frame, end: Frame) -> Self {
        self.frame_range = Some((start, end));
        self
    }

    pub fn without_proxies(mut self) -> Self {
        self.layout = None;
        self
    }

    fn includes(&self, frame: Frame) -> bool {
        match self.frame_range {
            Some((lo, hi)) => lo <= frame && frame <= hi,
            None => true,
        }
    }
}

/// Identity local transform and an unscaled parent chain are required, since
/// deltas are measured in local space.
pub fn check_transform<S: Scene + ?Sized>(scene: &S, mesh: &str) -> Result<(), RigError> {
    let local = scene.local_transform(mesh)?;
    if !local.is_identity() {
        return Err(RigError::PreconditionViolation {
            mesh: mesh.to_string(),
            reason: format!("local transform is not identity ({local:?})"),
        });
    }
    for (depth, parent) in scene.parent_chain(mesh)?.iter().enumerate() {
        if !parent.is_unscaled() {
            return Err(RigError::PreconditionViolation {
                mesh: mesh.to_string(),
                reason: format!("ancestor {} is scaled ({:?})", depth + 1, parent.scale),
            });
        }
    }
    Ok(())
}

fn delta(posed: &[Vec3], neutral: &[Vec3]) -> Vec<Vec3> {
    posed
        .iter()
        .zip(neutral)
        .map(|(p, n)| [p[0] - n[0], p[1] - n[1], p[2] - n[2]])
        .collect()
}

fn is_flat(delta: &[Vec3], epsilon: f32) -> bool {
    delta.iter().flatten().all(|c| c.abs() <= epsilon)
}

struct PlannedTarget {
    pose: Pose,
    delta: Vec<Vec3>,
}

/// Everything a capture will write, computed before the scene is touched.
struct CapturePlan {
    existing: Option<MorphStack>,
    baseline: usize,
    /// Existing targets to delete first (rebuild only).
    replaced: Vec<String>,
    /// Whether the rebuild covers every existing target, so the stack's
    /// baseline is re-recorded from the mesh.
    rebaseline: bool,
    targets: Vec<PlannedTarget>,
    warnings: Vec<RigError>,
}

/// Poses `req` asks for: the neutral slot when configured, then every present
/// pose inside the frame range.
fn poses_in_scope<'a>(
    req: &CaptureRequest,
    table: &'a PoseTable,
    cfg: &RigConfig,
) -> Vec<&'a Pose> {
    let neutral = table.neutral();
    let with_neutral = cfg.capture.include_neutral_target && req.includes(neutral.frame);
    with_neutral
        .then_some(neutral)
        .into_iter()
        .chain(table.present().filter(|p| req.includes(p.frame)))
        .collect()
}

/// Read-only pass: preconditions, topology and deltas for every pose in scope.
/// With `rebuild`, poses already on the stack are planned for replacement
/// instead of being rejected.
fn plan_capture<S: Scene + ?Sized>(
    scene: &S,
    req: &CaptureRequest,
    table: &PoseTable,
    cfg: &RigConfig,
    rebuild: bool,
) -> Result<CapturePlan, RigError> {
    if let Some((start, end)) = req.frame_range {
        if start > end {
            return Err(RigError::InvalidFrameRange { start, end });
        }
    }
    check_transform(scene, &req.source)?;
    if req.target != req.source {
        check_transform(scene, &req.target)?;
    }

    let existing = scene.morph_stack(&req.target)?;
    let scope = poses_in_scope(req, table, cfg);
    let already = |name: &str| existing.as_ref().map(|s| s.has_pose(name)).unwrap_or(false);
    let replaced: Vec<String> = if rebuild {
        scope
            .iter()
            .filter(|p| already(&p.name))
            .map(|p| p.name.clone())
            .collect()
    } else {
        Vec::new()
    };
    let rebaseline = rebuild
        && existing
            .as_ref()
            .map(|s| s.pose_names().all(|n| replaced.iter().any(|r| r == n)))
            .unwrap_or(false);
    let baseline = match &existing {
        Some(stack) if !rebaseline => stack.baseline_vertex_count,
        _ => scene.vertex_count(&req.target)?,
    };

    let neutral_pose = table.neutral();
    let neutral = scene.geometry_at(&req.source, neutral_pose.frame)?;
    if neutral.len() != baseline {
        return Err(RigError::TopologyMismatch {
            mesh: req.target.clone(),
            expected: baseline,
            found: neutral.len(),
            frame: Some(neutral_pose.frame),
        });
    }

    let mut warnings = Vec::new();
    let mut targets = Vec::new();
    for pose in scope {
        if !rebuild && already(&pose.name) {
            warnings.push(RigError::MorphTargetExists {
                mesh: req.target.clone(),
                pose: pose.name.clone(),
            });
            continue;
        }
        if pose.name == neutral_pose.name && pose.frame == neutral_pose.frame {
            targets.push(PlannedTarget {
                pose: pose.clone(),
                delta: vec![[0.0; 3]; baseline],
            });
            continue;
        }
        let posed = scene.geometry_at(&req.source, pose.frame)?;
        if posed.len() != baseline {
            return Err(RigError::TopologyMismatch {
                mesh: req.source.clone(),
                expected: baseline,
                found: posed.len(),
                frame: Some(pose.frame),
            });
        }
        let d = delta(&posed, &neutral);
        if is_flat(&d, cfg.capture.identical_epsilon) {
            warnings.push(RigError::MissingPoseFrame {
                mesh: req.source.clone(),
                pose: pose.name.clone(),
                frame: pose.frame,
            });
            continue;
        }
        log::debug!("captured '{}' from frame {} of '{}'", pose.name, pose.frame, req.source);
        targets.push(PlannedTarget {
            pose: pose.clone(),
            delta: d,
        });
    }
    Ok(CapturePlan {
        existing,
        baseline,
        replaced,
        rebaseline,
        targets,
        warnings,
    })
}

/// Put the scene time unit on the configured authoring rate. Returns whether it changed.
pub fn ensure_frame_rate<S: Scene + ?Sized>(
    scene: &mut S,
    cfg: &RigConfig,
) -> Result<bool, RigError> {
    let current = scene.frame_rate();
    if current == cfg.fps {
        return Ok(false);
    }
    log::warn!("scene runs at {current} fps; switching to {} fps", cfg.fps);
    scene.set_frame_rate(cfg.fps)?;
    Ok(true)
}

fn apply_plan<S: Scene + ?Sized>(
    scene: &mut S,
    req: &CaptureRequest,
    cfg: &RigConfig,
    plan: CapturePlan,
) -> Result<CaptureReport, RigError> {
    for w in &plan.warnings {
        log::warn!("{w}");
    }
    ensure_frame_rate(scene, cfg)?;
    for pose in &plan.replaced {
        scene.delete_morph_target(&req.target, pose)?;
    }
    if !plan.replaced.is_empty() {
        log::info!(
            "deleted {} morph targets on '{}' for rebuild",
            plan.replaced.len(),
            req.target
        );
    }

    let (stack, stack_created) = match plan.existing {
        Some(stack) => {
            if plan.rebaseline && stack.baseline_vertex_count != plan.baseline {
                log::info!(
                    "'{}' baseline re-recorded: {} -> {} vertices",
                    stack.node,
                    stack.baseline_vertex_count,
                    plan.baseline
                );
                scene.set_morph_baseline(&req.target, plan.baseline)?;
            }
            (stack.node, false)
        }
        None if plan.targets.is_empty() => (String::new(), false),
        None => {
            let name = sanitize_node_name(&req.stack_name);
            if name != req.stack_name {
                log::info!("morph stack name '{}' sanitised to '{name}'", req.stack_name);
            }
            (scene.create_morph_stack(&req.target, &name, plan.baseline)?, true)
        }
    };

    let mut captured = Vec::with_capacity(plan.targets.len());
    let mut proxies = Vec::new();
    for p in plan.targets {
        let proxy = match &req.layout {
            Some(_) => {
                let id = scene.create_proxy(&req.source, &p.pose.name, p.pose.frame)?;
                proxies.push(id);
                Some(id)
            }
            None => None,
        };
        captured.push(CapturedPose {
            pose: p.pose.name.clone(),
            frame: p.pose.frame,
            proxy,
        });
        scene.add_morph_target(
            &req.target,
            MorphTarget {
                control: ControlRef::new(stack.clone(), p.pose.name.clone()),
                pose: p.pose,
                delta: p.delta,
            },
        )?;
    }

    let group = match &req.layout {
        Some(grid) => layout::arrange(scene, &proxies, grid)?,
        None => None,
    };

    log::info!(
        "captured {} poses from '{}' onto '{}' ({} skipped)",
        captured.len(),
        req.source,
        req.target,
        plan.warnings.len()
    );
    Ok(CaptureReport {
        source: req.source.clone(),
        target: req.target.clone(),
        stack,
        stack_created,
        captured,
        warnings: plan.warnings,
        group,
    })
}

/// Capture every present pose of `table` from `req.source` onto `req.target`.
pub fn capture_mesh<S: Scene + ?Sized>(
    scene: &mut S,
    req: &CaptureRequest,
    table: &PoseTable,
    cfg: &RigConfig,
) -> Result<CaptureReport, RigError> {
    let plan = plan_capture(scene, req, table, cfg, false)?;
    apply_plan(scene, req, cfg, plan)
}

/// Delete and recapture the targets `req` covers; targets outside its frame
/// range are kept. Nothing is deleted unless the whole recapture checks out.
/// When every existing target is rebuilt, the stack's baseline is re-recorded
/// from the mesh's current vertex count; otherwise the stored baseline holds.
/// Connections into the deleted controls go with them.
pub fn rebuild_mesh<S: Scene + ?Sized>(
    scene: &mut S,
    req: &CaptureRequest,
    table: &PoseTable,
    cfg: &RigConfig,
) -> Result<CaptureReport, RigError> {
    let plan = plan_capture(scene, req, table, cfg, true)?;
    apply_plan(scene, req, cfg, plan)
}

/// Capture each request independently, collecting failures per target mesh.
pub fn capture_batch<S: Scene + ?Sized>(
    scene: &mut S,
    requests: &[CaptureRequest],
    table: &PoseTable,
    cfg: &RigConfig,
) -> BatchReport<CaptureReport> {
    let mut report = BatchReport::default();
    for req in requests {
        match capture_mesh(scene, req, table, cfg) {
            Ok(r) => report.succeeded.push(r),
            Err(e) => {
                log::error!("capture of '{}' failed: {e}", req.target);
                report.failed.push((req.target.clone(), e));
            }
        }
    }
    report
}
