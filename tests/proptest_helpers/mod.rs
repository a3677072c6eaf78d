#![allow(dead_code)]

use annox::ir::{Annotation, AnnotationKind, BBox, Category, Dataset, Image, Item};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const EPS_COCO: f64 = 1e-10;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

fn finite_coord() -> impl Strategy<Value = f64> {
    (0u32..100_000).prop_map(|v| v as f64 / 100.0)
}

pub fn arb_bbox() -> impl Strategy<Value = BBox> {
    (finite_coord(), finite_coord(), finite_coord(), finite_coord())
        .prop_map(|(x, y, w, h)| BBox::new(x, y, w, h).expect("non-negative box"))
}

/// Box-only datasets with numeric item ids `1..=n` and dense per-item
/// annotation ids, the shape a COCO round trip reproduces exactly.
pub fn arb_bbox_dataset(
    max_items: usize,
    max_categories: u64,
    max_anns_per_item: usize,
) -> BoxedStrategy<Dataset> {
    (1..=max_categories)
        .prop_flat_map(move |category_count| {
            let item = (
                1u32..4096,
                1u32..4096,
                prop::collection::vec((arb_bbox(), 1..=category_count), 0..=max_anns_per_item),
            );
            (
                Just(category_count),
                prop::collection::vec(item, 0..=max_items),
            )
        })
        .prop_map(|(category_count, raw_items)| {
            let categories = (1..=category_count)
                .map(|id| Category::new(id, format!("class_{id}")))
                .collect();
            let items = raw_items
                .into_iter()
                .enumerate()
                .map(|(idx, (width, height, boxes))| {
                    let id = idx as u64 + 1;
                    let mut item = Item::new(id, Image::new(format!("img_{id}.jpg"), width, height));
                    for (bbox, category) in boxes {
                        let next = item.next_annotation_id();
                        item = item.with_annotation(Annotation::bbox(next, bbox).with_category(category));
                    }
                    item
                })
                .collect();
            Dataset {
                categories,
                items,
                ..Default::default()
            }
        })
        .boxed()
}

/// Compares two box-only datasets structurally, with `eps` slack on coordinates.
pub fn assert_bbox_datasets_equivalent(
    left: &Dataset,
    right: &Dataset,
    eps: f64,
) -> Result<(), String> {
    if left.categories != right.categories {
        return Err(format!(
            "categories differ: {:?} vs {:?}",
            left.categories, right.categories
        ));
    }
    if left.items.len() != right.items.len() {
        return Err(format!(
            "item count differs: {} vs {}",
            left.items.len(),
            right.items.len()
        ));
    }
    for (a, b) in left.items.iter().zip(&right.items) {
        if a.id != b.id || a.image != b.image {
            return Err(format!("item differs: {:?} vs {:?}", a.id, b.id));
        }
        if a.annotations.len() != b.annotations.len() {
            return Err(format!(
                "item {}: annotation count {} vs {}",
                a.id,
                a.annotations.len(),
                b.annotations.len()
            ));
        }
        for (x, y) in a.annotations.iter().zip(&b.annotations) {
            if x.id != y.id || x.category_id != y.category_id {
                return Err(format!("item {}: annotation {} differs", a.id, x.id));
            }
            let (AnnotationKind::BBox { bbox: bx }, AnnotationKind::BBox { bbox: by }) =
                (&x.kind, &y.kind)
            else {
                return Err(format!("item {}: annotation {} is not a box", a.id, x.id));
            };
            let close = bx
                .to_xywh()
                .iter()
                .zip(by.to_xywh())
                .all(|(p, q)| (p - q).abs() <= eps);
            if !close {
                return Err(format!("item {}: {:?} vs {:?}", a.id, bx, by));
            }
        }
    }
    Ok(())
}
