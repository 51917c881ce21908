//! Rig wiring: drive the morph controls of companion meshes from one source.
//!
//! A destination control has at most one input. Wiring replaces an existing
//! input from another source and leaves an identical one alone, so running it
//! again on the same selection changes nothing.

use crate::data::{ControlRef, MorphStack, WiringLink};
use crate::error::RigError;
use crate::naming::sanitize_node_name;
use crate::outputs::{BatchReport, DestinationWiring, LinkOutcome, LinkRecord, WiringReport};
use crate::scene::Scene;

/// Connect `source` into `destination` unless it is already its input.
pub fn link<S: Scene + ?Sized>(
    scene: &mut S,
    source: &ControlRef,
    destination: &ControlRef,
) -> Result<LinkOutcome, RigError> {
    let outcome = match scene.input_of(destination) {
        Some(current) if &current == source => return Ok(LinkOutcome::Unchanged),
        Some(current) => {
            log::debug!("replacing input {current} of {destination} with {source}");
            LinkOutcome::Replaced
        }
        None => LinkOutcome::Created,
    };
    scene.connect(source, destination)?;
    Ok(outcome)
}

fn record(source: ControlRef, destination: ControlRef, outcome: LinkOutcome) -> LinkRecord {
    LinkRecord {
        link: WiringLink {
            source,
            destination,
        },
        outcome,
    }
}

fn wire_destination<S: Scene + ?Sized>(
    scene: &mut S,
    source: &MorphStack,
    mesh: &str,
) -> Result<DestinationWiring, RigError> {
    let mut out = DestinationWiring {
        mesh: mesh.to_string(),
        ..Default::default()
    };
    let Some(dest) = scene.morph_stack(mesh)? else {
        log::warn!("'{mesh}' has no morph stack; nothing wired");
        out.skipped_poses = source.pose_names().map(str::to_string).collect();
        return Ok(out);
    };
    for pose in source.pose_names() {
        if !dest.has_pose(pose) {
            out.skipped_poses.push(pose.to_string());
            continue;
        }
        let src = source.control(pose);
        let dst = dest.control(pose);
        let outcome = link(scene, &src, &dst)?;
        out.links.push(record(src, dst, outcome));
    }
    if !out.skipped_poses.is_empty() {
        log::debug!(
            "'{mesh}' lacks {} of the source poses: {:?}",
            out.skipped_poses.len(),
            out.skipped_poses
        );
    }
    Ok(out)
}

/// Wire every pose of `source`'s morph stack to the same-named pose on each destination.
pub fn wire_meshes<S: Scene + ?Sized>(
    scene: &mut S,
    source: &str,
    destinations: &[&str],
) -> Result<WiringReport, RigError> {
    let stack = scene
        .morph_stack(source)?
        .ok_or_else(|| RigError::UnresolvedDriver {
            mesh: source.to_string(),
        })?;
    let targets: Vec<&str> = destinations
        .iter()
        .copied()
        .filter(|d| *d != source)
        .collect();
    if targets.is_empty() {
        return Err(RigError::EmptyTargetSet);
    }

    let mut report = BatchReport::default();
    for mesh in targets {
        match wire_destination(scene, &stack, mesh) {
            Ok(w) => report.succeeded.push(w),
            Err(e) => {
                log::error!("wiring '{mesh}' failed: {e}");
                report.failed.push((mesh.to_string(), e));
            }
        }
    }
    log::info!(
        "wired '{}' to {} meshes ({} failed)",
        stack.node,
        report.succeeded.len(),
        report.failed.len()
    );
    Ok(WiringReport {
        source: stack.node,
        destinations: report,
    })
}

fn wire_controller_destination<S: Scene + ?Sized>(
    scene: &mut S,
    controller: &str,
    mesh: &str,
) -> Result<DestinationWiring, RigError> {
    let mut out = DestinationWiring {
        mesh: mesh.to_string(),
        ..Default::default()
    };
    let Some(stack) = scene.morph_stack(mesh)? else {
        log::warn!("'{mesh}' has no morph stack; nothing wired");
        return Ok(out);
    };
    for pose in stack.pose_names() {
        let src = ControlRef::new(controller, sanitize_node_name(pose));
        if !scene.has_channel(&src) {
            scene.ensure_channel(&src)?;
        }
        let dst = stack.control(pose);
        let outcome = link(scene, &src, &dst)?;
        out.links.push(record(src, dst, outcome));
    }
    Ok(out)
}

/// Drive every mesh's morph stack from one controller node with a channel per pose.
///
/// The controller and its channels are created on demand from the first mesh
/// that has a morph stack.
pub fn wire_to_controller<S: Scene + ?Sized>(
    scene: &mut S,
    controller: &str,
    meshes: &[&str],
) -> Result<WiringReport, RigError> {
    if meshes.is_empty() {
        return Err(RigError::EmptyTargetSet);
    }
    let mut first = None;
    for mesh in meshes {
        match scene.morph_stack(mesh) {
            Ok(Some(stack)) => {
                first = Some(stack);
                break;
            }
            Ok(None) => {}
            // The per-mesh pass below records this mesh as failed.
            Err(e) => log::warn!("no channel layout from '{mesh}': {e}"),
        }
    }
    let first = first.ok_or_else(|| RigError::UnresolvedDriver {
        mesh: meshes[0].to_string(),
    })?;

    let controller = sanitize_node_name(controller);
    scene.ensure_controller(&controller)?;
    for pose in first.pose_names() {
        scene.ensure_channel(&ControlRef::new(controller.clone(), sanitize_node_name(pose)))?;
    }

    let mut report = BatchReport::default();
    for mesh in meshes {
        match wire_controller_destination(scene, &controller, mesh) {
            Ok(w) => report.succeeded.push(w),
            Err(e) => {
                log::error!("wiring '{mesh}' to '{controller}' failed: {e}");
                report.failed.push((mesh.to_string(), e));
            }
        }
    }
    log::info!("wired {} meshes to controller '{controller}'", report.succeeded.len());
    Ok(WiringReport {
        source: controller,
        destinations: report,
    })
}
