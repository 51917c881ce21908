//! Named operations for a host menu or script binding.
//!
//! Each takes the caller's selection explicitly, in selection order, and
//! returns a typed result. Nothing here keeps state between calls.

use crate::baking::{self, BakeRequest};
use crate::capture::{self, ensure_frame_rate, CaptureRequest};
use crate::config::RigConfig;
use crate::data::Frame;
use crate::deformer_order::{self, classify_stack, sort_entries, RoleRules};
use crate::error::RigError;
use crate::naming::{group_name_for, stack_name_for};
use crate::outputs::{
    BakeReport, BatchReport, CaptureReport, ExportIssue, ExportPrepReport, OrderReport,
    WiringReport,
};
use crate::pose::PoseTable;
use crate::scene::Scene;
use crate::wiring;

/// Capture the first selected mesh. With a second selection the targets go
/// onto that mesh instead (same topology required).
pub fn run_head_capture<S: Scene + ?Sized>(
    scene: &mut S,
    selection: &[&str],
    table: &PoseTable,
    cfg: &RigConfig,
) -> Result<CaptureReport, RigError> {
    let (&source, rest) = selection.split_first().ok_or(RigError::EmptyTargetSet)?;
    let target = rest.first().copied().unwrap_or(source);
    let mut req = CaptureRequest::self_capture(source, cfg).onto(target);
    if let Some(grid) = req.layout.as_mut() {
        grid.group_name = group_name_for(&cfg.group_name, source);
    }
    capture::capture_mesh(scene, &req, table, cfg)
}

/// Capture every selected mesh onto itself with its own stack and layout group.
/// Groups are spread along X so the per-mesh grids do not overlap.
pub fn run_multi_capture<S: Scene + ?Sized>(
    scene: &mut S,
    selection: &[&str],
    table: &PoseTable,
    cfg: &RigConfig,
) -> Result<BatchReport<CaptureReport>, RigError> {
    if selection.is_empty() {
        return Err(RigError::EmptyTargetSet);
    }
    let requests: Vec<CaptureRequest> = selection
        .iter()
        .enumerate()
        .map(|(idx, mesh)| {
            let mut req = CaptureRequest::self_capture(mesh, cfg);
            req.stack_name = stack_name_for(&cfg.stack_name, mesh);
            if let Some(grid) = req.layout.as_mut() {
                grid.group_name = group_name_for(&cfg.group_name, mesh);
                grid.group_offset[0] += idx as f32 * cfg.multi_offset_step_x;
            }
            req
        })
        .collect();
    Ok(capture::capture_batch(scene, &requests, table, cfg))
}

/// Drive the remaining selected meshes from the first one's morph stack.
pub fn wire_selection_to_first<S: Scene + ?Sized>(
    scene: &mut S,
    selection: &[&str],
) -> Result<WiringReport, RigError> {
    let (&source, rest) = selection.split_first().ok_or(RigError::EmptyTargetSet)?;
    wiring::wire_meshes(scene, source, rest)
}

/// Drive every selected mesh from the configured central controller.
pub fn wire_selection_to_controller<S: Scene + ?Sized>(
    scene: &mut S,
    selection: &[&str],
    cfg: &RigConfig,
) -> Result<WiringReport, RigError> {
    wiring::wire_to_controller(scene, &cfg.controller_name, selection)
}

/// Bake from `driver` (default: first selected) onto the other selected meshes.
/// `range` defaults to the host playback range. The scene is put on the
/// configured frame rate first, so integer frames mean authoring frames.
pub fn bake_selection<S: Scene + ?Sized>(
    scene: &mut S,
    selection: &[&str],
    driver: Option<&str>,
    range: Option<(Frame, Frame)>,
    cfg: &RigConfig,
) -> Result<BakeReport, RigError> {
    let first = *selection.first().ok_or(RigError::EmptyTargetSet)?;
    let driver = driver.unwrap_or(first);
    let (start, end) = range.unwrap_or_else(|| scene.playback_range());
    let req = BakeRequest::new(driver, selection, start, end);
    baking::validate_request(scene, &req)?;
    ensure_frame_rate(scene, cfg)?;
    baking::bake_weights(scene, &req)
}

/// One-shot export preparation: bake the selection from its driver, then put
/// every selected mesh (driver included) into canonical deformer order.
pub fn export_prep<S: Scene + ?Sized>(
    scene: &mut S,
    selection: &[&str],
    driver: Option<&str>,
    range: Option<(Frame, Frame)>,
    cfg: &RigConfig,
) -> Result<ExportPrepReport, RigError> {
    let bake = bake_selection(scene, selection, driver, range, cfg)?;
    let order = enforce_deformer_order(scene, selection, cfg);
    for r in &order.succeeded {
        log::info!("export prep: '{}' deformers {:?}", r.mesh, r.after());
    }
    Ok(ExportPrepReport { bake, order })
}

fn effective_rules(cfg: &RigConfig) -> RoleRules {
    let mut rules = cfg.role_rules.clone();
    if !rules
        .morph_name_prefixes
        .iter()
        .any(|p| cfg.stack_name.starts_with(p.as_str()))
    {
        rules.morph_name_prefixes.push(cfg.stack_name.clone());
    }
    rules
}

/// Put every listed mesh's deformer stack into the configured canonical order.
pub fn enforce_deformer_order<S: Scene + ?Sized>(
    scene: &mut S,
    meshes: &[&str],
    cfg: &RigConfig,
) -> BatchReport<OrderReport> {
    deformer_order::resolve_meshes(scene, meshes, &cfg.canonical_order, &effective_rules(cfg))
}

/// What an exporter would trip over: stacks out of canonical order or frames
/// of `[start, end]` without a baked entry. Empty means ready.
pub fn check_export_ready<S: Scene + ?Sized>(
    scene: &S,
    meshes: &[&str],
    start: Frame,
    end: Frame,
    cfg: &RigConfig,
) -> Vec<ExportIssue> {
    let rules = effective_rules(cfg);
    let mut issues = Vec::new();
    for &mesh in meshes {
        let stack = match scene.deformer_stack(mesh) {
            Ok(s) => s,
            Err(e) => {
                issues.push(ExportIssue::Unreadable {
                    mesh: mesh.to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        let (entries, _) = classify_stack(mesh, &stack, &rules);
        let sorted = sort_entries(entries.clone(), &cfg.canonical_order);
        if sorted != entries {
            issues.push(ExportIssue::OutOfOrder {
                mesh: mesh.to_string(),
            });
        }
        let missing = baking::missing_frames(scene.baked_track(mesh).as_ref(), start, end);
        if !missing.is_empty() {
            issues.push(ExportIssue::MissingFrames {
                mesh: mesh.to_string(),
                frames: missing,
            });
        }
    }
    issues
}
