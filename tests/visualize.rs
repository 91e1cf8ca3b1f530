#![cfg(feature = "save_image_file")]

use image::RgbImage;

use cheshu::{
  config::ReportFormat,
  count::VehicleClass,
  input::SingleFrame,
  model::{ClassLabel, DetectItem, DetectResult, Model},
  output::{SaveImageFileOutput, draw::Draw},
  task::{OneShotTask, Task, VisualizationStatus},
};

/// 返回固定检测结果的模型
struct FixedModel(Vec<DetectItem<ClassLabel>>);

impl Model for FixedModel {
  type Input = RgbImage;
  type Output = DetectResult<ClassLabel>;
  type Error = std::convert::Infallible;

  fn infer(&mut self, _input: &RgbImage) -> Result<Self::Output, Self::Error> {
    Ok(DetectResult::from(self.0.clone()))
  }
}

fn street() -> FixedModel {
  let item = |kind, bbox| DetectItem {
    kind,
    score: 0.9,
    bbox,
  };
  FixedModel(vec![
    item(ClassLabel::named(2, "car"), [0.1, 0.1, 0.4, 0.4]),
    item(ClassLabel::named(2, "car"), [0.5, 0.5, 0.9, 0.9]),
    item(ClassLabel::named(5, "bus"), [0.2, 0.6, 0.5, 0.95]),
    item(ClassLabel::named(0, "person"), [0.6, 0.1, 0.7, 0.3]),
  ])
}

fn frames() -> SingleFrame {
  SingleFrame::from(RgbImage::new(64, 48))
}

#[test]
fn unwritable_visualization_path_keeps_the_report() {
  let blocker = tempfile::NamedTempFile::new().unwrap();
  let vis_path = blocker.path().join("vis.png");
  let output = SaveImageFileOutput::new(&vis_path, Draw::new(None));

  let outcome = OneShotTask::default()
    .run_task(frames(), street(), Some(output))
    .unwrap();

  assert_eq!(outcome.report.total(), 3);
  assert_eq!(outcome.report.get(VehicleClass::Car), 2);
  assert_eq!(outcome.report.get(VehicleClass::Bus), 1);
  assert!(matches!(
    outcome.visualization,
    VisualizationStatus::Failed(_)
  ));

  let text = outcome.render(ReportFormat::Text, Some(vis_path.as_path()));
  assert!(text.starts_with("车辆总数: 3\n分类统计:\n"));
  assert!(!text.contains("可视化已保存"));

  let json: serde_json::Value =
    serde_json::from_str(&outcome.render(ReportFormat::Json, Some(vis_path.as_path()))).unwrap();
  assert_eq!(json["visualization"]["saved"], false);
}

#[test]
fn visualization_is_written_beside_the_report() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("out").join("vis.jpg");
  let output = SaveImageFileOutput::new(&path, Draw::new(None));

  let outcome = OneShotTask::default()
    .run_task(frames(), street(), Some(output))
    .unwrap();

  assert!(outcome.visualization.is_saved());
  assert_eq!(outcome.detections, 4);
  assert!(
    outcome
      .render(ReportFormat::Text, Some(path.as_path()))
      .ends_with(&format!("可视化已保存: {}\n", path.display()))
  );
  let saved = image::open(&path).unwrap();
  assert_eq!((saved.width(), saved.height()), (64, 48));
}
