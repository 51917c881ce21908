use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use facerig_core::{
    baking::{bake_weights, BakeRequest},
    capture::{capture_mesh, CaptureRequest},
    commands::{run_multi_capture, wire_selection_to_first},
    config::RigConfig,
    data::ControlRef,
    memory::MemoryScene,
    pose::{PoseTable, ARKIT52_NAMES},
    scene::AnimationCurves,
};

const FACE: [&str; 3] = ["head", "teeth", "eyeLeft"];

fn performed_face() -> MemoryScene {
    let mut scene: MemoryScene =
        facerig_test_fixtures::scenes::load("arkit_face").expect("load arkit_face fixture");
    let cfg = RigConfig::default();
    run_multi_capture(&mut scene, &FACE, &PoseTable::arkit_default(), &cfg).expect("capture");
    wire_selection_to_first(&mut scene, &FACE).expect("wire");
    for (i, name) in ARKIT52_NAMES.iter().enumerate() {
        let control = ControlRef::new("ARKit52_BS_head", *name);
        // mouthClose has no target on the head.
        if scene.set_keyframe(&control, 0, 0.0).is_err() {
            continue;
        }
        scene
            .set_keyframe(&control, (i as i32 % 20) + 1, 1.0)
            .expect("key");
    }
    scene
}

fn bench_bake(c: &mut Criterion) {
    let base = performed_face();
    let mut group = c.benchmark_group("bake_weights");
    for end in [52, 240, 1200] {
        let req = BakeRequest::new("head", &FACE, 0, end);
        group.bench_with_input(BenchmarkId::from_parameter(end), &req, |b, req| {
            b.iter_batched(
                || base.clone(),
                |mut scene| black_box(bake_weights(&mut scene, req).expect("bake")),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_capture(c: &mut Criterion) {
    let base: MemoryScene =
        facerig_test_fixtures::scenes::load("arkit_face").expect("load arkit_face fixture");
    let cfg = RigConfig::default();
    let table = PoseTable::arkit_default();
    let req = CaptureRequest::self_capture("head", &cfg);
    c.bench_function("capture_head", |b| {
        b.iter_batched(
            || base.clone(),
            |mut scene| black_box(capture_mesh(&mut scene, &req, &table, &cfg).expect("capture")),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_bake, bench_capture);
criterion_main!(benches);
