// 该文件是 Cheshu （车数） 项目的一部分。
// src/model.rs - 模型
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

use std::path::PathBuf;

use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，相对原图归一化
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem<T>> {
    self.items.iter()
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<'a, T> IntoIterator for &'a DetectResult<T> {
  type Item = &'a DetectItem<T>;
  type IntoIter = std::slice::Iter<'a, DetectItem<T>>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  /// 标签文本；未知类别返回其索引的十进制文本
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  /// 标签表中登记的名称，未知类别为 `None`
  fn label_name(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("模型加载错误: {path}: {source}")]
  Load {
    path: PathBuf,
    #[source]
    source: ort::Error,
  },
  #[error("推理错误: {0}")]
  Inference(#[from] ort::Error),
  #[error("输入图像为空: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("模型输出形状不支持: {0:?}")]
  UnexpectedOutput(Vec<usize>),
}

impl ModelError {
  /// 是否属于模型加载阶段的错误
  pub fn is_load_error(&self) -> bool {
    matches!(self, ModelError::NotFound(_) | ModelError::Load { .. })
  }
}

pub mod labels;
mod yolo;

pub use self::labels::{COCO_CLASSES, ClassLabel, LabelTable};
pub use self::yolo::{
  DEFAULT_INPUT_SIZE, OutputLayout, Yolo, YoloBuilder, decode_output, non_max_suppression,
};
