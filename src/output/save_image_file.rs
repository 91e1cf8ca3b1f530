// 该文件是 Cheshu （车数） 项目的一部分。
// src/output/save_image_file.rs - 保存可视化图像文件
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
use thiserror::Error;
use tracing::info;

use crate::{
  model::{DetectResult, WithLabel},
  output::{Render, draw::Draw},
};

pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

impl SaveImageFileOutput {
  pub fn new(path: impl AsRef<Path>, draw: Draw) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      draw,
    }
  }

  /// 图像格式由扩展名决定
  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;

    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl<T: WithLabel> Render<RgbImage, DetectResult<T>> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult<T>) -> Result<(), Self::Error> {
    let image = self.draw.annotate(frame, result);
    self.save_image(&image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{ClassLabel, DetectItem};

  fn detections() -> DetectResult<ClassLabel> {
    DetectResult::from(vec![DetectItem {
      kind: ClassLabel::named(7, "truck"),
      score: 0.75,
      bbox: [0.2, 0.2, 0.6, 0.6],
    }])
  }

  #[test]
  fn writes_annotated_image_and_creates_parents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("vis.png");
    let output = SaveImageFileOutput::new(&path, Draw::new(None));

    output
      .render_result(&RgbImage::new(40, 30), &detections())
      .unwrap();

    let saved = image::open(&path).unwrap().into_rgb8();
    assert_eq!(saved.dimensions(), (40, 30));
    assert_ne!(saved, RgbImage::new(40, 30));
  }

  #[test]
  fn unwritable_path_is_an_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    // 父路径是普通文件，无法创建目录
    let path = file.path().join("vis.png");
    let output = SaveImageFileOutput::new(&path, Draw::new(None));

    let err = output
      .render_result(&RgbImage::new(10, 10), &detections())
      .unwrap_err();
    assert!(matches!(err, SaveImageFileError::IoError(_)));
  }

  #[test]
  fn unknown_extension_is_an_image_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = SaveImageFileOutput::new(dir.path().join("vis.unknownext"), Draw::new(None));

    let err = output
      .render_result(&RgbImage::new(10, 10), &detections())
      .unwrap_err();
    assert!(matches!(err, SaveImageFileError::ImageError(_)));
  }
}
