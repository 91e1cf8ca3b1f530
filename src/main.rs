// 该文件是 Cheshu （车数） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cheshu::{
  config::CountConfig,
  input::InputWrapper,
  model::YoloBuilder,
  task::{OneShotTask, Task, TaskOutcome, VisualizationStatus},
};

fn main() -> Result<()> {
  let args = args::Args::parse();

  tracing_subscriber::fmt()
    .with_max_level(args.log_level())
    .with_writer(std::io::stderr)
    .init();

  let config = args.into_config();

  info!("图片 URL: {}", config.url);
  info!("模型文件路径: {}", config.model.display());
  info!("置信度阈值: {}", config.confidence);
  info!("NMS 阈值: {}", config.iou);

  let input = InputWrapper::open(&config.url, config.timeout)
    .with_context(|| format!("图像获取失败: {}", config.url))?;

  let model = YoloBuilder::new(&config.model)
    .confidence(config.confidence)
    .iou(config.iou)
    .input_size(config.input_size)
    .build()
    .context("模型加载失败")?;

  let task = OneShotTask::default().with_contrast(config.contrast);
  let outcome = run(task, input, model, &config)?;

  print!("{}", outcome.render(config.format, config.save_vis.as_deref()));

  // 报告输出之后再提示可视化失败
  if let VisualizationStatus::Failed(e) = &outcome.visualization {
    warn!("可视化保存失败: {:#}", e);
  }

  Ok(())
}

#[cfg(feature = "save_image_file")]
fn run(
  task: OneShotTask,
  input: InputWrapper,
  model: cheshu::model::Yolo,
  config: &CountConfig,
) -> Result<TaskOutcome> {
  use cheshu::output::{SaveImageFileOutput, draw::Draw};

  let output = config.save_vis.as_ref().map(|path| {
    let draw = match &config.font {
      Some(font) => Draw::with_font_file(font).unwrap_or_else(|e| {
        warn!("{}，改为查找系统字体", e);
        Draw::default()
      }),
      None => Draw::default(),
    };
    SaveImageFileOutput::new(path, draw)
  });

  task
    .run_task(input.into_frames(), model, output)
    .context("推理失败")
}

#[cfg(not(feature = "save_image_file"))]
fn run(
  task: OneShotTask,
  input: InputWrapper,
  model: cheshu::model::Yolo,
  config: &CountConfig,
) -> Result<TaskOutcome> {
  use cheshu::output::NoOutput;

  if config.save_vis.is_some() {
    warn!("未启用 save_image_file 功能，忽略 --save-vis");
  }

  task
    .run_task(input.into_frames(), model, None::<NoOutput>)
    .context("推理失败")
}
