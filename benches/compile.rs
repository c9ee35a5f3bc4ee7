//! Compilation benchmarks for lanegen.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lanegen::config::{CameraDocument, CompilerSettings, WorkloadDocument};
use lanegen::device::DeviceProfiles;
use lanegen::locator::ModelStore;
use lanegen::pipeline::{Compiler, parse_command};
use std::hint::black_box;

const WORKLOADS: &str = r#"{
  "workload_pipeline_map": {
    "retail": [
      {"type": "gvadetect", "model": "yolov5s", "device": "CPU", "precision": "INT8"},
      {"type": "gvaclassify", "model": "efficientnet", "device": "CPU", "precision": "INT8"}
    ],
    "people": [
      {"type": "gvadetect", "model": "person-detect", "device": "GPU", "precision": "FP16"}
    ]
  }
}"#;

/// `lanes` lanes of `cameras` cameras; every third camera gets its own ROI.
fn camera_document(lanes: usize, cameras: usize) -> CameraDocument {
    let mut doc = serde_json::Map::new();
    for lane in 0..lanes {
        let list: Vec<serde_json::Value> = (0..cameras)
            .map(|cam| {
                let workloads = if cam % 2 == 0 {
                    vec!["retail"]
                } else {
                    vec!["retail", "people"]
                };
                let mut camera = serde_json::json!({
                    "camera_id": format!("cam{cam}"),
                    "fileSrc": format!("video{}.mp4", cam % 4),
                    "workloads": workloads,
                });
                if cam % 3 == 0 {
                    camera["region_of_interest"] =
                        serde_json::json!({"x": cam, "y": cam, "width": 100, "height": 100});
                }
                camera
            })
            .collect();
        doc.insert(format!("lane{lane}"), serde_json::json!({ "cameras": list }));
    }
    serde_json::from_value(serde_json::Value::Object(doc)).unwrap()
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let workloads: WorkloadDocument = serde_json::from_str(WORKLOADS).unwrap();
    let settings = CompilerSettings::default().with_timestamp("20250101_000000");
    let profiles = DeviceProfiles::empty();
    let models = ModelStore::new(&settings.models_dir);
    let compiler = Compiler::new(&settings, &profiles, &models);

    for (lanes, cameras) in [(1, 4), (4, 16), (16, 64)] {
        let doc = camera_document(lanes, cameras);
        group.throughput(Throughput::Elements((lanes * cameras) as u64));
        group.bench_with_input(
            BenchmarkId::new("lanes_x_cameras", format!("{lanes}x{cameras}")),
            &doc,
            |b, doc| {
                b.iter(|| black_box(compiler.compile(black_box(doc), &workloads).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let workloads: WorkloadDocument = serde_json::from_str(WORKLOADS).unwrap();
    let settings = CompilerSettings::default().with_timestamp("20250101_000000");
    let profiles = DeviceProfiles::empty();
    let models = ModelStore::new(&settings.models_dir);
    let commands = Compiler::new(&settings, &profiles, &models)
        .compile(&camera_document(1, 8), &workloads)
        .unwrap();
    let command = commands.get("lane0").unwrap().to_string();

    c.bench_function("parse_lane_command", |b| {
        b.iter(|| black_box(parse_command(black_box(&command)).unwrap()));
    });
}

criterion_group!(benches, bench_compile, bench_parse);
criterion_main!(benches);
