// 该文件是 Cheshu （车数） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::{ArgAction, Parser};
use tracing::Level;

use cheshu::{
  config::{CountConfig, DEFAULT_CONFIDENCE, DEFAULT_IOU, DEFAULT_MODEL, ReportFormat},
  enhance::Clahe,
  input::DEFAULT_TIMEOUT,
  model::DEFAULT_INPUT_SIZE,
};

/// 统计网络图片中的车辆数量
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 图片 URL（http、https 或 file）
  #[arg(long, value_name = "URL")]
  pub url: String,

  /// ONNX 模型文件路径
  #[arg(long, default_value = DEFAULT_MODEL, value_name = "FILE")]
  pub model: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE, value_parser = parse_probability, value_name = "THRESHOLD")]
  pub conf: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU, value_parser = parse_probability, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 下载超时（秒）
  #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs(), value_name = "SECONDS")]
  pub timeout: u64,

  /// 可视化结果保存路径
  #[arg(long, value_name = "FILE")]
  pub save_vis: Option<PathBuf>,

  /// 推理前进行 CLAHE 对比度增强
  #[arg(long)]
  pub contrast: bool,

  /// 模型输入尺寸
  #[arg(long, default_value_t = DEFAULT_INPUT_SIZE, value_parser = clap::value_parser!(u32).range(32..), value_name = "PIXELS")]
  pub imgsz: u32,

  /// 标签字体文件（TrueType）
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 报告格式
  #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
  pub format: ReportFormat,

  /// 日志详细程度（-v 信息，-vv 调试）
  #[arg(short, long, action = ArgAction::Count)]
  pub verbose: u8,
}

fn parse_probability(s: &str) -> Result<f32, String> {
  let value: f32 = s.parse().map_err(|_| format!("`{}` 不是有效的数字", s))?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(format!("{} 不在 [0, 1] 范围内", value))
  }
}

impl Args {
  pub fn log_level(&self) -> Level {
    match self.verbose {
      0 => Level::WARN,
      1 => Level::INFO,
      _ => Level::DEBUG,
    }
  }

  pub fn into_config(self) -> CountConfig {
    CountConfig {
      url: self.url,
      model: self.model,
      confidence: self.conf,
      iou: self.iou,
      timeout: Duration::from_secs(self.timeout),
      save_vis: self.save_vis,
      contrast: self.contrast.then(Clahe::default),
      input_size: self.imgsz,
      font: self.font,
      format: self.format,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let args = Args::try_parse_from(["cheshu", "--url", "https://example.com/a.jpg"]).unwrap();
    assert_eq!(args.log_level(), Level::WARN);
    let config = args.into_config();
    assert_eq!(config.url, "https://example.com/a.jpg");
    assert_eq!(config.model, PathBuf::from("yolo12x.onnx"));
    assert_eq!(config.confidence, 0.25);
    assert_eq!(config.iou, 0.45);
    assert_eq!(config.timeout, Duration::from_secs(10));
    assert_eq!(config.input_size, 640);
    assert!(config.contrast.is_none());
    assert!(config.save_vis.is_none());
    assert_eq!(config.format, ReportFormat::Text);
  }

  #[test]
  fn contrast_is_a_flag() {
    let args = Args::try_parse_from([
      "cheshu",
      "--url",
      "https://example.com/a.jpg",
      "--contrast",
      "-vv",
      "--format",
      "json",
    ])
    .unwrap();
    assert_eq!(args.log_level(), Level::DEBUG);
    let config = args.into_config();
    assert_eq!(config.contrast, Some(Clahe::default()));
    assert_eq!(config.format, ReportFormat::Json);
  }

  #[test]
  fn rejects_out_of_range_thresholds() {
    for flag in ["--conf", "--iou"] {
      let result = Args::try_parse_from(["cheshu", "--url", "https://example.com/a.jpg", flag, "1.5"]);
      assert!(result.is_err());
    }
    assert!(parse_probability("abc").is_err());
    assert_eq!(parse_probability("0"), Ok(0.0));
  }
}
