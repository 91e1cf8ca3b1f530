// 该文件是 Cheshu （车数） 项目的一部分。
// src/config.rs - 运行配置
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

use std::{path::PathBuf, time::Duration};

use clap::ValueEnum;

use crate::enhance::Clahe;

pub const DEFAULT_MODEL: &str = "yolo12x.onnx";
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.45;

/// 报告输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
  #[default]
  Text,
  Json,
}

/// 一次计数任务的全部配置，构建后不再修改
///
/// `url` 保留原始文本，在获取图像时解析。
#[derive(Debug, Clone)]
pub struct CountConfig {
  pub url: String,
  pub model: PathBuf,
  pub confidence: f32,
  pub iou: f32,
  pub timeout: Duration,
  pub save_vis: Option<PathBuf>,
  pub contrast: Option<Clahe>,
  pub input_size: u32,
  pub font: Option<PathBuf>,
  pub format: ReportFormat,
}
