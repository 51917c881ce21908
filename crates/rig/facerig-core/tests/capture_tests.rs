use facerig_core::{
    capture::{capture_mesh, rebuild_mesh, CaptureRequest},
    config::RigConfig,
    data::{Transform, Vec3},
    error::RigError,
    layout::grid_positions,
    memory::MemoryScene,
    pose::PoseTable,
    scene::{AnimationCurves, SceneGraph},
};

fn face() -> MemoryScene {
    facerig_test_fixtures::scenes::load("arkit_face").expect("load arkit_face fixture")
}

fn sub(a: &[Vec3], b: &[Vec3]) -> Vec<Vec3> {
    a.iter()
        .zip(b)
        .map(|(p, n)| [p[0] - n[0], p[1] - n[1], p[2] - n[2]])
        .collect()
}

/// Add one vertex to the mesh's rest points and every cached frame.
fn grow_by_one_vertex(scene: &mut MemoryScene, mesh: &str) {
    let m = scene.mesh_mut(mesh).unwrap();
    m.points.push([0.0, -1.0, 0.0]);
    for points in m.point_cache.values_mut() {
        points.push([0.0, -1.0, 0.0]);
    }
}

#[test]
fn head_capture_produces_51_targets_with_none_at_frame_51() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg);

    let report = capture_mesh(&mut scene, &req, &table, &cfg).expect("capture head");
    assert!(report.stack_created);
    assert_eq!(report.stack, "ARKit52_BS");
    assert_eq!(report.captured.len(), 51);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert!(report.captured.iter().all(|c| c.frame != 51));
    assert!(report.captured.iter().all(|c| c.pose != "mouthClose"));
    assert_eq!(report.captured.last().unwrap().pose, "tongueOut");
    assert_eq!(report.captured.last().unwrap().frame, 52);

    let stack = scene.morph_stack("head").unwrap().expect("stack created");
    assert_eq!(stack.targets.len(), 51);
    assert_eq!(stack.baseline_vertex_count, 4);
    assert!(stack.has_pose("jawOpen"));
    assert!(!stack.has_pose("mouthClose"));

    // New stack sits at the top of the deformer stack.
    let deformers = scene.deformer_stack("head").unwrap();
    assert_eq!(deformers[0].name, "ARKit52_BS");
    assert_eq!(deformers[0].kind, "blendShape");
    assert_eq!(deformers[1].name, "skinCluster1");
}

#[test]
fn delta_is_exactly_posed_minus_neutral() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let neutral = scene.geometry_at("head", 0).unwrap();
    let jaw = scene.geometry_at("head", 18).unwrap();
    let tongue = scene.geometry_at("head", 52).unwrap();

    capture_mesh(
        &mut scene,
        &CaptureRequest::self_capture("head", &cfg).without_proxies(),
        &table,
        &cfg,
    )
    .unwrap();

    let stack = scene.morph_stack("head").unwrap().unwrap();
    let jaw_target = stack.target("jawOpen").expect("jawOpen target");
    assert_eq!(jaw_target.pose.frame, 18);
    assert_eq!(jaw_target.delta, sub(&jaw, &neutral));
    assert_eq!(stack.target("tongueOut").unwrap().delta, sub(&tongue, &neutral));
    assert_eq!(jaw_target.control.to_string(), "ARKit52_BS.jawOpen");
}

#[test]
fn recapture_never_duplicates_targets() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg);
    capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    let before = scene.morph_stack("head").unwrap();

    let again = capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    assert!(!again.stack_created);
    assert!(again.captured.is_empty());
    assert_eq!(again.warnings.len(), 51);
    assert!(again
        .warnings
        .iter()
        .all(|w| matches!(w, RigError::MorphTargetExists { .. })));
    assert_eq!(scene.morph_stack("head").unwrap(), before);
}

#[test]
fn poses_identical_to_neutral_are_skipped_with_warning() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("teeth", &cfg);

    let report = capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    // Teeth only move on jaw*, mouth* and tongueOut.
    assert_eq!(report.captured.len(), 27);
    assert_eq!(report.warnings.len(), 24);
    assert!(report.warnings.iter().all(RigError::is_warning));
    assert!(report.warnings.iter().any(|w| matches!(
        w,
        RigError::MissingPoseFrame { pose, frame: 1, .. } if pose == "eyeBlinkLeft"
    )));
    let stack = scene.morph_stack("teeth").unwrap().unwrap();
    assert!(stack.has_pose("jawOpen"));
    assert!(!stack.has_pose("eyeBlinkLeft"));
}

#[test]
fn topology_change_mid_animation_aborts_without_touching_the_scene() {
    let mut scene = face();
    scene
        .mesh_mut("head")
        .unwrap()
        .point_cache
        .get_mut(&30)
        .unwrap()
        .push([9.0, 9.0, 9.0]);
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let before = scene.to_json();

    let err = capture_mesh(
        &mut scene,
        &CaptureRequest::self_capture("head", &cfg),
        &table,
        &cfg,
    )
    .unwrap_err();
    assert_eq!(
        err,
        RigError::TopologyMismatch {
            mesh: "head".into(),
            expected: 4,
            found: 5,
            frame: Some(30),
        }
    );
    assert_eq!(scene.to_json(), before);
    assert!(scene.proxies.is_empty());
}

#[test]
fn capture_onto_mesh_with_other_topology_is_rejected() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg).onto("teeth");
    let err = capture_mesh(&mut scene, &req, &table, &cfg).unwrap_err();
    assert!(matches!(
        err,
        RigError::TopologyMismatch { expected: 3, found: 4, .. }
    ));
    assert!(scene.morph_stack("teeth").unwrap().is_none());
}

#[test]
fn scaled_ancestor_or_moved_mesh_violates_precondition() {
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();

    let mut scene = face();
    scene.mesh_mut("head").unwrap().parents = vec![
        Transform::IDENTITY,
        Transform {
            scale: [2.0, 2.0, 2.0],
            ..Transform::IDENTITY
        },
    ];
    let err = capture_mesh(&mut scene, &CaptureRequest::self_capture("head", &cfg), &table, &cfg)
        .unwrap_err();
    assert!(matches!(err, RigError::PreconditionViolation { ref mesh, .. } if mesh == "head"));
    assert!(scene.morph_stack("head").unwrap().is_none());

    let mut scene = face();
    scene.mesh_mut("head").unwrap().transform.translation = [0.0, 150.0, 0.0];
    let err = capture_mesh(&mut scene, &CaptureRequest::self_capture("head", &cfg), &table, &cfg)
        .unwrap_err();
    assert!(matches!(err, RigError::PreconditionViolation { .. }));
}

#[test]
fn frame_range_limits_captured_poses() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg).in_range(10, 20);
    let report = capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    assert_eq!(report.captured.len(), 11);
    assert_eq!(report.captured[0].frame, 10);

    let bad = CaptureRequest::self_capture("head", &cfg).in_range(20, 10);
    assert_eq!(
        capture_mesh(&mut scene, &bad, &table, &cfg).unwrap_err(),
        RigError::InvalidFrameRange { start: 20, end: 10 }
    );
}

#[test]
fn neutral_target_is_optional_and_zero() {
    let mut scene = face();
    let mut cfg = RigConfig::default();
    cfg.capture.include_neutral_target = true;
    let table = PoseTable::arkit_default();
    let report = capture_mesh(
        &mut scene,
        &CaptureRequest::self_capture("head", &cfg).without_proxies(),
        &table,
        &cfg,
    )
    .unwrap();
    assert_eq!(report.captured.len(), 52);
    let stack = scene.morph_stack("head").unwrap().unwrap();
    assert_eq!(stack.targets[0].pose.name, "neutral");
    assert!(stack.targets[0].delta.iter().all(|d| *d == [0.0; 3]));
}

#[test]
fn rebuild_replaces_every_target() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg).without_proxies();
    capture_mesh(&mut scene, &req, &table, &cfg).unwrap();

    let report = rebuild_mesh(&mut scene, &req, &table, &cfg).unwrap();
    assert!(!report.stack_created);
    assert_eq!(report.captured.len(), 51);
    assert!(report.warnings.is_empty());
    assert_eq!(scene.morph_stack("head").unwrap().unwrap().targets.len(), 51);
}

#[test]
fn proxies_are_laid_out_without_changing_their_points() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let expected_points: Vec<Vec<Vec3>> = table
        .present()
        .map(|p| scene.geometry_at("head", p.frame).unwrap())
        .collect();

    let report = capture_mesh(
        &mut scene,
        &CaptureRequest::self_capture("head", &cfg),
        &table,
        &cfg,
    )
    .unwrap();
    assert_eq!(report.group.as_deref(), Some("ARKit_Poses_GRP"));
    assert_eq!(scene.groups["ARKit_Poses_GRP"], [-300.0, 100.0, 0.0]);

    let cells = grid_positions(51, &cfg.grid);
    for (i, captured) in report.captured.iter().enumerate() {
        let proxy = scene.proxy(captured.proxy.expect("proxy kept")).unwrap();
        assert_eq!(proxy.name, captured.pose);
        assert_eq!(proxy.points, expected_points[i]);
        assert_eq!(proxy.translation, cells[i]);
        assert_eq!(proxy.group.as_deref(), Some("ARKit_Poses_GRP"));
    }
}

#[test]
fn ranged_rebuild_keeps_targets_outside_the_range() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let full = CaptureRequest::self_capture("head", &cfg).without_proxies();
    capture_mesh(&mut scene, &full, &table, &cfg).unwrap();
    let before = scene.morph_stack("head").unwrap().unwrap();

    // Re-sculpt one frame inside the range and one outside it.
    for frame in [15, 40] {
        let points = scene.mesh_mut("head").unwrap().point_cache.get_mut(&frame).unwrap();
        points[0][1] += 0.5;
    }
    let inside = &table.present().find(|p| p.frame == 15).unwrap().name;
    let outside = &table.present().find(|p| p.frame == 40).unwrap().name;

    let ranged = full.clone().in_range(10, 20);
    let report = rebuild_mesh(&mut scene, &ranged, &table, &cfg).unwrap();
    assert_eq!(report.captured.len(), 11);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let after = scene.morph_stack("head").unwrap().unwrap();
    assert_eq!(after.targets.len(), 51);
    assert_eq!(after.baseline_vertex_count, 4);
    for pose in before.pose_names() {
        assert!(after.has_pose(pose), "{pose} lost by ranged rebuild");
    }
    assert_ne!(after.target(inside).unwrap().delta, before.target(inside).unwrap().delta);
    assert_eq!(after.target(outside).unwrap().delta, before.target(outside).unwrap().delta);
}

#[test]
fn failed_rebuild_leaves_existing_targets_in_place() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg).without_proxies();
    capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    scene
        .mesh_mut("head")
        .unwrap()
        .point_cache
        .get_mut(&30)
        .unwrap()
        .push([9.0, 9.0, 9.0]);
    let before = scene.to_json();

    let err = rebuild_mesh(&mut scene, &req, &table, &cfg).unwrap_err();
    assert_eq!(
        err,
        RigError::TopologyMismatch {
            mesh: "head".into(),
            expected: 4,
            found: 5,
            frame: Some(30),
        }
    );
    assert_eq!(scene.to_json(), before);
    assert_eq!(scene.morph_stack("head").unwrap().unwrap().targets.len(), 51);
}

#[test]
fn rebuild_onto_other_topology_is_rejected_before_deleting() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    capture_mesh(
        &mut scene,
        &CaptureRequest::self_capture("teeth", &cfg).without_proxies(),
        &table,
        &cfg,
    )
    .unwrap();
    let before = scene.morph_stack("teeth").unwrap();

    let req = CaptureRequest::self_capture("head", &cfg)
        .without_proxies()
        .onto("teeth");
    let err = rebuild_mesh(&mut scene, &req, &table, &cfg).unwrap_err();
    assert!(matches!(
        err,
        RigError::TopologyMismatch { expected: 3, found: 4, .. }
    ));
    assert_eq!(scene.morph_stack("teeth").unwrap(), before);
}

#[test]
fn full_rebuild_re_records_the_baseline() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg).without_proxies();
    capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    grow_by_one_vertex(&mut scene, "head");

    // A plain capture still checks against the recorded baseline.
    assert!(matches!(
        capture_mesh(&mut scene, &req, &table, &cfg).unwrap_err(),
        RigError::TopologyMismatch { expected: 4, found: 5, .. }
    ));

    let report = rebuild_mesh(&mut scene, &req, &table, &cfg).unwrap();
    assert_eq!(report.captured.len(), 51);
    let stack = scene.morph_stack("head").unwrap().unwrap();
    assert_eq!(stack.baseline_vertex_count, 5);
    assert_eq!(stack.targets.len(), 51);
    assert!(stack.targets.iter().all(|t| t.delta.len() == 5));
}

#[test]
fn partial_rebuild_keeps_the_recorded_baseline() {
    let mut scene = face();
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg).without_proxies();
    capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    grow_by_one_vertex(&mut scene, "head");
    let before = scene.to_json();

    let err = rebuild_mesh(&mut scene, &req.clone().in_range(10, 20), &table, &cfg).unwrap_err();
    assert_eq!(
        err,
        RigError::TopologyMismatch {
            mesh: "head".into(),
            expected: 4,
            found: 5,
            frame: Some(0),
        }
    );
    assert_eq!(scene.to_json(), before);
}

#[test]
fn capture_puts_the_scene_on_the_configured_frame_rate() {
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg).without_proxies();

    let mut scene = face();
    scene.set_frame_rate(30.0).unwrap();
    capture_mesh(&mut scene, &req, &table, &cfg).unwrap();
    assert_eq!(scene.frame_rate(), 24.0);

    // A rejected capture changes nothing, frame rate included.
    let mut scene = face();
    scene.set_frame_rate(30.0).unwrap();
    scene.mesh_mut("head").unwrap().transform.translation = [0.0, 1.0, 0.0];
    assert!(capture_mesh(&mut scene, &req, &table, &cfg).is_err());
    assert_eq!(scene.frame_rate(), 30.0);
}
