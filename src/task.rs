// 该文件是 Cheshu （车数） 项目的一部分。
// src/task.rs - 单次计数任务
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

use std::{borrow::Cow, fmt::Write, path::Path, time::Instant};

use image::RgbImage;
use serde_json::json;
use tracing::{debug, info};

use crate::{
  config::ReportFormat,
  count::CountReport,
  enhance::Clahe,
  model::{DetectResult, Model, WithLabel},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 可视化输出的结果
#[derive(Debug)]
pub enum VisualizationStatus {
  NotRequested,
  Saved,
  Failed(anyhow::Error),
}

impl VisualizationStatus {
  pub fn is_saved(&self) -> bool {
    matches!(self, VisualizationStatus::Saved)
  }
}

#[derive(Debug)]
pub struct TaskOutcome {
  pub report: CountReport,
  /// 检测总数（含非车辆类别）
  pub detections: usize,
  pub visualization: VisualizationStatus,
}

impl TaskOutcome {
  /// 生成写到标准输出的报告
  ///
  /// `save_vis` 为请求的可视化路径，只有保存成功时文本报告才附带确认行。
  pub fn render(&self, format: ReportFormat, save_vis: Option<&Path>) -> String {
    match format {
      ReportFormat::Text => {
        let mut text = self.report.to_string();
        if let Some(path) = save_vis
          && self.visualization.is_saved()
        {
          let _ = writeln!(text, "可视化已保存: {}", path.display());
        }
        text
      }
      ReportFormat::Json => {
        let mut report = self.report.to_json();
        report["visualization"] = match (save_vis, &self.visualization) {
          (Some(path), VisualizationStatus::Saved | VisualizationStatus::Failed(_)) => json!({
            "path": path.display().to_string(),
            "saved": self.visualization.is_saved(),
          }),
          _ => json!(null),
        };
        format!("{}\n", report)
      }
    }
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OneShotTask {
  contrast: Option<Clahe>,
}

impl OneShotTask {
  pub fn with_contrast(mut self, contrast: Option<Clahe>) -> Self {
    self.contrast = contrast;
    self
  }
}

impl<T, ME, RE, I, M, O> Task<I, M, Option<O>> for OneShotTask
where
  T: WithLabel,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = DetectResult<T>, Error = ME>,
  O: Render<RgbImage, DetectResult<T>, Error = RE>,
{
  type Output = TaskOutcome;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: Option<O>) -> Result<TaskOutcome, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功: {}x{}", frame.width(), frame.height());

    let frame = match self.contrast {
      Some(clahe) => {
        let now = Instant::now();
        let enhanced = clahe.enhance(&frame);
        info!("对比度增强完成，耗时: {:.2?}", now.elapsed());
        Cow::Owned(enhanced)
      }
      None => Cow::Borrowed(&frame),
    };

    info!("开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，检测到 {} 个目标，耗时: {:.2?}", result.len(), now.elapsed());

    let report = CountReport::from_detections(&result);
    info!("车辆总数: {}", report.total());

    let visualization = match output {
      None => VisualizationStatus::NotRequested,
      Some(output) => {
        let now = Instant::now();
        match output.render_result(&frame, &result) {
          Ok(()) => {
            info!("渲染完成，耗时: {:.2?}", now.elapsed());
            VisualizationStatus::Saved
          }
          Err(e) => {
            debug!("可视化保存失败: {}", e);
            VisualizationStatus::Failed(anyhow::Error::new(e))
          }
        }
      }
    };

    Ok(TaskOutcome {
      report,
      detections: result.len(),
      visualization,
    })
  }
}
