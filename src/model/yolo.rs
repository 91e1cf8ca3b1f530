// 该文件是 Cheshu （车数） 项目的一部分。
// src/model/yolo.rs - YOLO ONNX 检测模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::{ArrayViewD, Axis, Ix3};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use tracing::{debug, info, warn};

use crate::{
  config::{DEFAULT_CONFIDENCE, DEFAULT_IOU},
  frame::LetterboxFrame,
  model::{ClassLabel, DetectItem, DetectResult, LabelTable, Model, ModelError},
};

pub const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_INTRA_THREADS: usize = 4;
const MAX_DETECTIONS: usize = 300;
const BOX_COORDS: usize = 4;
const END_TO_END_WIDTH: usize = 6;
const NAMES_METADATA_KEY: &str = "names";

/// 模型输出张量的排布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// `[1, 4 + nc, N]`，Ultralytics 默认导出
  ChannelsFirst,
  /// `[1, N, 4 + nc]`
  ChannelsLast,
  /// `[1, K, 6]`：`x1, y1, x2, y2, score, class`，模型内已做 NMS
  EndToEnd,
}

impl OutputLayout {
  pub fn detect(shape: &[usize]) -> Option<Self> {
    let &[1, rows, cols] = shape else {
      return None;
    };
    // 与两类别的 ChannelsLast 形状相同时按端到端处理
    if cols == END_TO_END_WIDTH && rows > END_TO_END_WIDTH {
      Some(OutputLayout::EndToEnd)
    } else if rows > BOX_COORDS && rows < cols {
      Some(OutputLayout::ChannelsFirst)
    } else if cols > BOX_COORDS && cols < rows {
      Some(OutputLayout::ChannelsLast)
    } else {
      None
    }
  }
}

/// 把模型输出解码为输入坐标系下的候选框，类别为索引
///
/// 置信度低于 `confidence` 的候选框被丢弃。
pub fn decode_output(
  output: ArrayViewD<'_, f32>,
  confidence: f32,
) -> Result<Vec<DetectItem<u32>>, ModelError> {
  let shape = output.shape().to_vec();
  let layout = OutputLayout::detect(&shape).ok_or_else(|| {
    debug!("无法识别的模型输出形状: {:?}", shape);
    ModelError::UnexpectedOutput(shape.clone())
  })?;
  let output = output
    .into_dimensionality::<Ix3>()
    .map_err(|_| ModelError::UnexpectedOutput(shape.clone()))?;
  debug!("模型输出排布: {:?}, 形状: {:?}", layout, shape);

  let mut items = Vec::new();
  match layout {
    OutputLayout::ChannelsFirst | OutputLayout::ChannelsLast => {
      let (anchors, channels) = match layout {
        OutputLayout::ChannelsFirst => (shape[2], shape[1]),
        _ => (shape[1], shape[2]),
      };
      let at = |anchor: usize, channel: usize| match layout {
        OutputLayout::ChannelsFirst => output[[0, channel, anchor]],
        _ => output[[0, anchor, channel]],
      };

      for anchor in 0..anchors {
        let (class_id, score) = (BOX_COORDS..channels)
          .map(|c| ((c - BOX_COORDS) as u32, at(anchor, c)))
          .fold((0u32, f32::MIN), |best, cur| {
            if cur.1 > best.1 { cur } else { best }
          });

        if !(score >= confidence) {
          continue;
        }

        let (cx, cy) = (at(anchor, 0), at(anchor, 1));
        let (w, h) = (at(anchor, 2), at(anchor, 3));
        items.push(DetectItem {
          kind: class_id,
          score,
          bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
        });
      }
    }
    OutputLayout::EndToEnd => {
      let rows = output.index_axis(Axis(0), 0);
      for row in rows.outer_iter() {
        let score = row[4];
        let class = row[5];
        if !(score >= confidence) || !class.is_finite() || class < 0.0 {
          continue;
        }
        items.push(DetectItem {
          kind: class as u32,
          score,
          bbox: [row[0], row[1], row[2], row[3]],
        });
      }
    }
  }

  debug!("置信度过滤后剩余 {} 个候选框", items.len());
  Ok(items)
}

/// 按类别进行非极大值抑制
///
/// 与已保留的同类框 IoU 大于 `iou_threshold` 的框被丢弃，结果按置信度降序。
pub fn non_max_suppression<T: PartialEq>(
  mut items: Vec<DetectItem<T>>,
  iou_threshold: f32,
) -> Vec<DetectItem<T>> {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem<T>> = Vec::with_capacity(items.len());
  for item in items {
    let suppressed = kept
      .iter()
      .any(|best| best.kind == item.kind && iou(&best.bbox, &item.bbox) > iou_threshold);
    if !suppressed {
      kept.push(item);
    }
  }
  kept
}

/// 计算两个 `[x_min, y_min, x_max, y_max]` 边界框的 IoU
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

pub struct Yolo {
  session: Session,
  input_name: String,
  input_size: u32,
  confidence: f32,
  iou: f32,
  labels: LabelTable,
}

impl std::fmt::Debug for Yolo {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Yolo")
      .field("input_name", &self.input_name)
      .field("input_size", &self.input_size)
      .field("confidence", &self.confidence)
      .field("iou", &self.iou)
      .field("labels", &self.labels.len())
      .finish_non_exhaustive()
  }
}

pub struct YoloBuilder {
  model_path: PathBuf,
  confidence: f32,
  iou: f32,
  input_size: u32,
}

impl YoloBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
      input_size: DEFAULT_INPUT_SIZE,
    }
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence.clamp(0.0, 1.0);
    self
  }

  pub fn iou(mut self, iou: f32) -> Self {
    self.iou = iou.clamp(0.0, 1.0);
    self
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size.max(32);
    self
  }

  pub fn build(self) -> Result<Yolo, ModelError> {
    if !self.model_path.is_file() {
      debug!("模型文件不存在: {}", self.model_path.display());
      return Err(ModelError::NotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()
      .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
      .and_then(|builder| builder.with_intra_threads(DEFAULT_INTRA_THREADS))
      .and_then(|builder| builder.commit_from_file(&self.model_path))
      .map_err(|source| ModelError::Load {
        path: self.model_path.clone(),
        source,
      })?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .unwrap_or_else(|| "images".to_string());
    debug!("模型输入: {}, 输出数量: {}", input_name, session.outputs.len());

    let labels = read_label_table(&session);
    info!("模型加载完成，类别数: {}", labels.len());

    Ok(Yolo {
      session,
      input_name,
      input_size: self.input_size,
      confidence: self.confidence,
      iou: self.iou,
      labels,
    })
  }
}

fn read_label_table(session: &Session) -> LabelTable {
  match session
    .metadata()
    .and_then(|metadata| metadata.custom(NAMES_METADATA_KEY))
  {
    Ok(Some(raw)) => LabelTable::from_ultralytics_names(&raw).unwrap_or_else(|| {
      warn!("无法解析模型类别元数据，使用 COCO 类别表");
      LabelTable::coco()
    }),
    Ok(None) => {
      debug!("模型未携带类别元数据，使用 COCO 类别表");
      LabelTable::coco()
    }
    Err(e) => {
      warn!("读取模型元数据失败: {}，使用 COCO 类别表", e);
      LabelTable::coco()
    }
  }
}

impl Model for Yolo {
  type Input = RgbImage;
  type Output = DetectResult<ClassLabel>;
  type Error = ModelError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (width, height) = input.dimensions();
    if width == 0 || height == 0 {
      return Err(ModelError::EmptyImage(width, height));
    }

    debug!("预处理输入图像 {}x{}", width, height);
    let frame = LetterboxFrame::from_image(input, self.input_size, self.input_size);
    let input_value = Value::from_array(frame.tensor().clone())?;

    let now = std::time::Instant::now();
    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => input_value])?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let output = outputs[0].try_extract_array::<f32>()?;
    let candidates = decode_output(output, self.confidence)?;
    let mut kept = non_max_suppression(candidates, self.iou);
    kept.truncate(MAX_DETECTIONS);

    let items: Vec<DetectItem<ClassLabel>> = kept
      .into_iter()
      .map(|item| DetectItem {
        kind: self.labels.resolve(item.kind),
        score: item.score,
        bbox: frame.restore_bbox(item.bbox),
      })
      .collect();

    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult::from(items))
  }
}
