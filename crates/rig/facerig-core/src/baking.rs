//! Weight baking: sample a driver's live morph weights at integer frames and
//! record them on each target so the targets animate without the wiring.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::capture::check_transform;
use crate::data::{BakedWeightTrack, Frame, MorphStack, WeightSample};
use crate::error::RigError;
use crate::outputs::BakeReport;
use crate::scene::Scene;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakeRequest {
    pub driver: String,
    pub targets: Vec<String>,
    /// First frame, inclusive.
    pub start: Frame,
    /// Last frame, inclusive.
    pub end: Frame,
}

impl BakeRequest {
    pub fn new(driver: &str, targets: &[&str], start: Frame, end: Frame) -> Self {
        Self {
            driver: driver.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
            start,
            end,
        }
    }
}

struct BakeTarget {
    mesh: String,
    stack: Option<MorphStack>,
}

/// Check the request without touching the scene: the range must be ordered,
/// the driver must carry a morph stack and at least one target must remain
/// once the driver is excluded. Returns the driver's stack.
pub fn validate_request<S: Scene + ?Sized>(
    scene: &S,
    req: &BakeRequest,
) -> Result<MorphStack, RigError> {
    if req.start > req.end {
        return Err(RigError::InvalidFrameRange {
            start: req.start,
            end: req.end,
        });
    }
    let driver = scene
        .morph_stack(&req.driver)?
        .ok_or_else(|| RigError::UnresolvedDriver {
            mesh: req.driver.clone(),
        })?;
    if req.targets.iter().all(|t| *t == req.driver) {
        return Err(RigError::EmptyTargetSet);
    }
    Ok(driver)
}

/// Bake `req.driver`'s weights onto every target over `[req.start, req.end]`.
///
/// Frames are processed in ascending order and written as they go; only the
/// covered frames of each target's track are replaced. A target with nothing
/// matching the driver gets a `None` entry for the frame instead of failing.
pub fn bake_weights<S: Scene + ?Sized>(
    scene: &mut S,
    req: &BakeRequest,
) -> Result<BakeReport, RigError> {
    let driver = validate_request(scene, req)?;
    let names: IndexSet<&str> = req
        .targets
        .iter()
        .map(String::as_str)
        .filter(|t| *t != req.driver)
        .collect();

    let mut failed = Vec::new();
    let mut active = Vec::new();
    for mesh in names {
        let prepared = check_transform(scene, mesh)
            .and_then(|()| scene.morph_stack(mesh).map_err(RigError::from));
        match prepared {
            Ok(stack) => {
                if stack.is_none() {
                    log::warn!("'{mesh}' has no morph stack; its frames are recorded as empty");
                }
                active.push(BakeTarget {
                    mesh: mesh.to_string(),
                    stack,
                });
            }
            Err(e) => {
                log::error!("skipping bake target '{mesh}': {e}");
                failed.push((mesh.to_string(), e));
            }
        }
    }

    let mut empty_frames = 0;
    for frame in req.start..=req.end {
        let mut driven = WeightSample::with_capacity(driver.targets.len());
        for pose in driver.pose_names() {
            let value = scene.evaluate(&driver.control(pose), frame)?;
            driven.insert(pose.to_string(), value);
        }
        let mut i = 0;
        while i < active.len() {
            match bake_frame(scene, &active[i], &driven, frame) {
                Ok(wrote) => {
                    if !wrote {
                        empty_frames += 1;
                    }
                    i += 1;
                }
                Err(e) => {
                    let target = active.remove(i);
                    log::error!("bake of '{}' stopped at frame {frame}: {e}", target.mesh);
                    failed.push((target.mesh, e));
                }
            }
        }
        log::debug!("baked frame {frame} onto {} targets", active.len());
    }

    log::info!(
        "baked weights from '{}' to {} targets over {}-{}",
        req.driver,
        active.len(),
        req.start,
        req.end
    );
    Ok(BakeReport {
        driver: req.driver.clone(),
        start: req.start,
        end: req.end,
        baked: active.into_iter().map(|t| t.mesh).collect(),
        empty_frames,
        failed,
    })
}

/// Write one target's sample for `frame`. Returns whether anything matched.
fn bake_frame<S: Scene + ?Sized>(
    scene: &mut S,
    target: &BakeTarget,
    driven: &WeightSample,
    frame: Frame,
) -> Result<bool, RigError> {
    let mut sample = WeightSample::new();
    if let Some(stack) = &target.stack {
        for (pose, value) in driven {
            if !stack.has_pose(pose) {
                continue;
            }
            scene.set_keyframe(&stack.control(pose), frame, *value)?;
            sample.insert(pose.clone(), *value);
        }
    }
    let wrote = !sample.is_empty();
    scene.write_baked_frame(&target.mesh, frame, wrote.then_some(sample))?;
    Ok(wrote)
}

/// Frames of `[start, end]` with no entry in `track`.
pub fn missing_frames(track: Option<&BakedWeightTrack>, start: Frame, end: Frame) -> Vec<Frame> {
    (start..=end)
        .filter(|f| track.map(|t| !t.frames.contains_key(f)).unwrap_or(true))
        .collect()
}

/// Export a baked track as serde_json::Value (stable schema for the exporter).
pub fn export_baked_json(track: &BakedWeightTrack) -> serde_json::Value {
    serde_json::to_value(track).unwrap_or(serde_json::Value::Null)
}

/// Export several tracks keyed by mesh name, in the given order.
pub fn export_baked_tracks_json(tracks: &[BakedWeightTrack]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for t in tracks {
        map.insert(t.mesh.clone(), export_baked_json(t));
    }
    serde_json::Value::Object(map)
}
