// 该文件是 Cheshu （车数） 项目的一部分。
// src/model/labels.rs - 类别标签表
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

use std::{fmt, sync::Arc};

use tracing::{debug, warn};

use crate::model::WithLabel;

/// 元数据中允许的最大类别索引
pub const MAX_CLASS_ID: u32 = u16::MAX as u32;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 单个检测对象的类别
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClassLabel {
  Named { id: u32, name: Arc<str> },
  /// 标签表中没有对应名称的类别索引
  Unknown(u32),
}

impl ClassLabel {
  pub fn named(id: u32, name: &str) -> Self {
    ClassLabel::Named {
      id,
      name: Arc::from(name),
    }
  }
}

impl fmt::Display for ClassLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ClassLabel::Named { name, .. } => f.write_str(name),
      ClassLabel::Unknown(id) => write!(f, "{}", id),
    }
  }
}

impl WithLabel for ClassLabel {
  fn to_label_str(&self) -> String {
    self.to_string()
  }

  fn to_label_id(&self) -> u32 {
    match self {
      ClassLabel::Named { id, .. } | ClassLabel::Unknown(id) => *id,
    }
  }

  fn label_name(&self) -> Option<&str> {
    match self {
      ClassLabel::Named { name, .. } => Some(name.as_ref()),
      ClassLabel::Unknown(_) => None,
    }
  }
}

/// 类别索引到名称的查找表，在模型加载时构建一次
#[derive(Debug, Clone)]
pub struct LabelTable {
  names: Box<[Option<Arc<str>>]>,
}

impl LabelTable {
  pub fn coco() -> Self {
    COCO_CLASSES.iter().copied().collect()
  }

  /// 由 `(索引, 名称)` 对构建，索引可以不连续，调用方保证不超过 `MAX_CLASS_ID`
  fn from_pairs<I, S>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (u32, S)>,
    S: AsRef<str>,
  {
    let pairs: Vec<(u32, S)> = pairs.into_iter().collect();
    let size = pairs
      .iter()
      .map(|(id, _)| *id as usize + 1)
      .max()
      .unwrap_or(0);
    let mut names: Vec<Option<Arc<str>>> = vec![None; size];
    for (id, name) in pairs {
      names[id as usize] = Some(Arc::from(name.as_ref()));
    }
    Self {
      names: names.into_boxed_slice(),
    }
  }

  /// 解析 Ultralytics 导出的 ONNX 元数据 `names` 字段
  ///
  /// 格式为 Python 字典字面量，例如 `{0: 'person', 1: 'bicycle'}`。
  /// 无法解析时返回 `None`。
  pub fn from_ultralytics_names(raw: &str) -> Option<Self> {
    let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;
    let mut pairs = Vec::new();
    let mut rest = body.trim_start();

    while !rest.is_empty() {
      let (key, after_key) = rest.split_once(':')?;
      let id: u32 = key.trim().parse().ok()?;
      if id > MAX_CLASS_ID {
        warn!("模型元数据中的类别索引过大: {}", id);
        return None;
      }
      let after_key = after_key.trim_start();

      let quote = after_key.chars().next()?;
      if quote != '\'' && quote != '"' {
        return None;
      }
      let value_start = &after_key[1..];
      let end = value_start.find(quote)?;
      pairs.push((id, value_start[..end].to_string()));

      rest = value_start[end + 1..].trim_start();
      rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    if pairs.is_empty() {
      warn!("模型元数据中的类别表为空");
      return None;
    }
    debug!("从模型元数据解析到 {} 个类别", pairs.len());
    Some(Self::from_pairs(pairs))
  }

  pub fn len(&self) -> usize {
    self.names.iter().filter(|name| name.is_some()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn name(&self, id: u32) -> Option<&str> {
    self.names.get(id as usize).and_then(|name| name.as_deref())
  }

  pub fn resolve(&self, id: u32) -> ClassLabel {
    match self.names.get(id as usize) {
      Some(Some(name)) => ClassLabel::Named {
        id,
        name: Arc::clone(name),
      },
      _ => ClassLabel::Unknown(id),
    }
  }
}

impl<'a> FromIterator<&'a str> for LabelTable {
  fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().map(|name| Some(Arc::from(name))).collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn coco_table_resolves_vehicle_ids() {
    let table = LabelTable::coco();
    assert_eq!(table.len(), 80);
    assert_eq!(table.resolve(2), ClassLabel::named(2, "car"));
    assert_eq!(table.resolve(7).to_label_str(), "truck");
  }

  #[test]
  fn unknown_index_falls_back_to_numeric_text() {
    let table = LabelTable::coco();
    let label = table.resolve(120);
    assert_eq!(label, ClassLabel::Unknown(120));
    assert_eq!(label.to_label_str(), "120");
    assert_eq!(label.label_name(), None);
    assert_eq!(label.to_label_id(), 120);
  }

  #[test]
  fn parses_ultralytics_metadata() {
    let table =
      LabelTable::from_ultralytics_names("{0: 'person', 1: 'bicycle', 2: \"car\", 5: 'bus'}")
        .expect("metadata should parse");
    assert_eq!(table.len(), 4);
    assert_eq!(table.name(2), Some("car"));
    assert_eq!(table.name(5), Some("bus"));
    assert_eq!(table.resolve(3), ClassLabel::Unknown(3));
  }

  #[test]
  fn parses_names_with_spaces_and_trailing_comma() {
    let table = LabelTable::from_ultralytics_names("{ 0: 'traffic light', 1: 'stop sign', }")
      .expect("metadata should parse");
    assert_eq!(table.name(0), Some("traffic light"));
    assert_eq!(table.name(1), Some("stop sign"));
  }

  #[test]
  fn rejects_malformed_metadata() {
    assert!(LabelTable::from_ultralytics_names("person, car").is_none());
    assert!(LabelTable::from_ultralytics_names("{0: person}").is_none());
    assert!(LabelTable::from_ultralytics_names("{x: 'car'}").is_none());
    assert!(LabelTable::from_ultralytics_names("{}").is_none());
  }

  #[test]
  fn rejects_oversized_class_ids() {
    assert!(LabelTable::from_ultralytics_names("{4294967295: 'x'}").is_none());
    assert!(LabelTable::from_ultralytics_names("{0: 'car', 65536: 'x'}").is_none());
    let table = LabelTable::from_ultralytics_names("{65535: 'last'}").expect("bound is inclusive");
    assert_eq!(table.name(MAX_CLASS_ID), Some("last"));
  }
}
