use annox::ir::io_coco_json::{allocate_image_ids, from_coco_str, to_coco_string};
use annox::ir::{Image, Item};
use proptest::prelude::*;
use std::collections::HashSet;

mod proptest_helpers;

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn coco_roundtrip_preserves_box_datasets(dataset in proptest_helpers::arb_bbox_dataset(5, 5, 20)) {
        let json = to_coco_string(&dataset).expect("serialize coco");
        let restored = from_coco_str(&json).expect("parse coco");

        let res = proptest_helpers::assert_bbox_datasets_equivalent(
            &dataset,
            &restored,
            proptest_helpers::EPS_COCO,
        );
        prop_assert!(res.is_ok(), "{}", res.unwrap_err());
    }

    #[test]
    fn coco_annotation_ids_are_global_and_dense(dataset in proptest_helpers::arb_bbox_dataset(5, 3, 10)) {
        let json: serde_json::Value =
            serde_json::from_str(&to_coco_string(&dataset).expect("serialize coco")).unwrap();
        let ids: Vec<u64> = json["annotations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_u64().unwrap())
            .collect();
        let expected: Vec<u64> = (1..=dataset.annotation_count() as u64).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn allocated_image_ids_are_unique(ids in prop::collection::vec(
        prop_oneof![
            (1u64..20).prop_map(|n| n.to_string()),
            "[a-z]{1,4}",
        ],
        0..30,
    )) {
        let items: Vec<Item> = ids
            .iter()
            .map(|id| Item::new(id.as_str(), Image::new("x.jpg", 1, 1)))
            .collect();
        let allocated = allocate_image_ids(&items);

        prop_assert_eq!(allocated.len(), items.len());
        let unique: HashSet<u64> = allocated.iter().copied().collect();
        prop_assert_eq!(unique.len(), allocated.len());

        // The first occurrence of a numeric id keeps it.
        let mut seen = HashSet::new();
        for (item, &image_id) in items.iter().zip(&allocated) {
            if let Some(n) = item.id.as_numeric() {
                if seen.insert(n) {
                    prop_assert_eq!(image_id, n);
                }
            }
        }
    }
}
