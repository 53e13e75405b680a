use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pathtab_codec::{reconstruct_row, Flattener, Mapper};
use pathtab_format::{RenderConfig, DEFAULT_SEPARATOR};
use serde_json::{json, Value};

fn create_test_records(count: usize, width: usize) -> Value {
    let records: Vec<Value> = (0..count)
        .map(|i| {
            let tags: Vec<String> = (0..width).map(|t| format!("tag{}", t)).collect();
            json!({
                "id": i,
                "user": {"name": format!("user{}", i % 100), "roles": [{"id": 1}, {"id": 2}]},
                "timestamp": 1600000000 + i,
                "tags": tags,
                "level": if i % 3 == 0 { "info" } else if i % 3 == 1 { "warn" } else { "error" }
            })
        })
        .collect();
    Value::Array(records)
}

fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");
    let config = RenderConfig::default();
    let mapper = Mapper::default();

    for width in [2, 32] {
        for record_count in [1000, 10000] {
            let records = create_test_records(record_count, width);

            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}rec_{}wide", record_count, width)),
                &records,
                |b, records| {
                    b.iter(|| {
                        let dataset = Flattener::new(&config, &mapper)
                            .flatten_tree(black_box(records.clone()))
                            .unwrap();
                        black_box(dataset);
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_reconstruct(c: &mut Criterion) {
    let config = RenderConfig::default();
    let mapper = Mapper::default();
    let dataset = Flattener::new(&config, &mapper)
        .flatten_tree(create_test_records(1000, 16))
        .unwrap();

    c.bench_function("reconstruct_1000_rows", |b| {
        b.iter(|| {
            for row in &dataset.rows {
                black_box(reconstruct_row(black_box(row), DEFAULT_SEPARATOR, None));
            }
        });
    });
}

criterion_group!(benches, bench_flatten, bench_reconstruct);
criterion_main!(benches);
