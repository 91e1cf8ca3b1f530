use proptest::prelude::*;

use cheshu::{
  count::{CountReport, VehicleClass},
  model::{ClassLabel, DetectItem, LabelTable},
};

fn detections(ids: &[u32]) -> Vec<DetectItem<ClassLabel>> {
  let table = LabelTable::coco();
  ids
    .iter()
    .map(|&id| DetectItem {
      kind: table.resolve(id),
      score: 0.5,
      bbox: [0.0, 0.0, 1.0, 1.0],
    })
    .collect()
}

proptest! {
  #[test]
  fn total_is_sum_of_counts(ids in prop::collection::vec(0u32..120, 0..200)) {
    let report = CountReport::from_detections(&detections(&ids));
    let sum: usize = report.iter().map(|(_, count)| count).sum();
    prop_assert_eq!(report.total(), sum);
  }

  #[test]
  fn keys_are_always_the_vocabulary(ids in prop::collection::vec(0u32..120, 0..200)) {
    let report = CountReport::from_detections(&detections(&ids));
    let keys: Vec<&str> = report.iter().map(|(class, _)| class.as_str()).collect();
    prop_assert_eq!(keys, vec!["bicycle", "bus", "car", "motorcycle", "truck"]);

    let json = report.to_json();
    let counts = json["counts"].as_object().unwrap();
    prop_assert!(counts.keys().all(|key| key.parse::<VehicleClass>().is_ok()));
  }

  #[test]
  fn aggregation_is_order_independent(ids in prop::collection::vec(0u32..120, 0..100)) {
    let forward = CountReport::from_detections(&detections(&ids));
    let mut reversed_ids = ids.clone();
    reversed_ids.reverse();
    let reversed = CountReport::from_detections(&detections(&reversed_ids));
    prop_assert_eq!(forward, reversed);
  }

  #[test]
  fn total_counts_only_vehicle_ids(ids in prop::collection::vec(0u32..120, 0..200)) {
    // COCO: bicycle 1, car 2, motorcycle 3, bus 5, truck 7
    let expected = ids.iter().filter(|id| matches!(id, 1 | 2 | 3 | 5 | 7)).count();
    prop_assert_eq!(CountReport::from_detections(&detections(&ids)).total(), expected);
  }
}

#[test]
fn text_report_lists_every_class() {
  let report = CountReport::from_detections(&detections(&[2, 2, 5, 0]));
  assert_eq!(
    report.to_string(),
    "车辆总数: 3\n分类统计:\n  bicycle: 0\n  bus: 1\n  car: 2\n  motorcycle: 0\n  truck: 0\n"
  );
}
