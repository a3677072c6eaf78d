//! Criterion microbenches for annox parsing, writing and validation.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - COCO JSON parsing (from_coco_str, from_coco_slice)
//! - COCO JSON writing (to_coco_string)
//! - Dataset validation, in-process and on a worker pool

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use annox::ir::io_coco_json::{from_coco_slice, from_coco_str, to_coco_string};
use annox::ir::{Annotation, BBox, Category, Dataset, Image, Item, Keypoints};
use annox::validation::{validate_dataset, ValidateOptions};

// Include test fixtures at compile time (no file I/O during benchmark)
const COCO_FIXTURE: &str = include_str!("../tests/fixtures/sample_valid.coco.json");

/// A dataset with `items` items of four annotations each.
fn synthetic_dataset(items: usize) -> Dataset {
    let categories = vec![
        Category::try_new(
            1u64,
            "person",
            None,
            Some(vec!["nose".into(), "eye".into()]),
            None,
        )
        .expect("valid category"),
        Category::new(2u64, "car"),
    ];
    let items = (0..items)
        .map(|i| {
            let offset = (i % 100) as f64;
            let mut item = Item::new(i.to_string(), Image::new(format!("{i:06}.jpg"), 640, 480));
            for k in 0..3u64 {
                let bbox = BBox::new(offset + k as f64 * 10.0, offset, 50.0, 40.0).expect("bbox");
                item = item.with_annotation(Annotation::bbox(k + 1, bbox).with_category(2u64));
            }
            let keypoints = Keypoints::new(vec![offset, offset, 2.0, offset + 5.0, offset, 2.0])
                .expect("keypoints");
            item.with_annotation(Annotation::keypoints(4u64, keypoints).with_category(1u64))
        })
        .collect();
    Dataset {
        categories,
        items,
        ..Default::default()
    }
}

/// Benchmark COCO JSON parsing from string.
fn bench_coco_parse_str(c: &mut Criterion) {
    let mut group = c.benchmark_group("coco_parse");
    group.throughput(Throughput::Bytes(COCO_FIXTURE.len() as u64));

    group.bench_function("from_coco_str", |b| {
        b.iter(|| {
            let ds = from_coco_str(black_box(COCO_FIXTURE)).unwrap();
            black_box(ds)
        })
    });

    group.finish();
}

/// Benchmark COCO JSON parsing from byte slice.
fn bench_coco_parse_slice(c: &mut Criterion) {
    let bytes = COCO_FIXTURE.as_bytes();
    let mut group = c.benchmark_group("coco_parse");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("from_coco_slice", |b| {
        b.iter(|| {
            let ds = from_coco_slice(black_box(bytes)).unwrap();
            black_box(ds)
        })
    });

    group.finish();
}

/// Benchmark COCO JSON writing of a synthetic dataset.
fn bench_coco_write(c: &mut Criterion) {
    let dataset = synthetic_dataset(500);

    let mut group = c.benchmark_group("coco_write");
    group.throughput(Throughput::Elements(dataset.annotation_count() as u64));

    group.bench_function("to_coco_string", |b| {
        b.iter(|| {
            let json = to_coco_string(black_box(&dataset)).unwrap();
            black_box(json)
        })
    });

    group.finish();
}

/// Benchmark validation with and without a worker pool.
fn bench_validate(c: &mut Criterion) {
    let dataset = synthetic_dataset(2_000);

    let mut group = c.benchmark_group("validate");
    group.throughput(Throughput::Elements(dataset.items.len() as u64));

    for workers in [0usize, 4] {
        let opts = ValidateOptions { workers };
        group.bench_with_input(BenchmarkId::from_parameter(workers), &opts, |b, opts| {
            b.iter(|| {
                let report = validate_dataset(black_box(&dataset), opts).unwrap();
                black_box(report)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_coco_parse_str,
    bench_coco_parse_slice,
    bench_coco_write,
    bench_validate,
);
criterion_main!(benches);
