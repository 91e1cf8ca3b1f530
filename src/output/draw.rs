// 该文件是 Cheshu （车数） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{DetectItem, DetectResult, WithLabel};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_PADDING: i32 = 2;
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色
const LINE_THICKNESS: u32 = 1;
const PALETTE_SIZE: usize = 80;

/// 未指定字体时依次尝试的系统字体
pub const FONT_SEARCH_PATHS: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/Library/Fonts/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件 {0}: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("字体文件无效: {0}")]
  Invalid(PathBuf),
}

pub fn load_font(path: &Path) -> Result<FontVec, FontError> {
  let data = std::fs::read(path).map_err(|e| FontError::Io(path.to_path_buf(), e))?;
  FontVec::try_from_vec(data).map_err(|_| FontError::Invalid(path.to_path_buf()))
}

pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  palette: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(discover_font())
  }
}

fn discover_font() -> Option<FontVec> {
  let font = FONT_SEARCH_PATHS
    .iter()
    .map(Path::new)
    .filter(|path| path.is_file())
    .find_map(|path| match load_font(path) {
      Ok(font) => {
        debug!("使用字体: {}", path.display());
        Some(font)
      }
      Err(e) => {
        debug!("跳过字体: {}", e);
        None
      }
    });
  if font.is_none() {
    warn!("未找到可用字体，可视化结果将不包含标签文字");
  }
  font
}

impl Draw {
  pub fn new(font: Option<FontVec>) -> Self {
    // 每个类别一种颜色
    let palette = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      palette,
    }
  }

  pub fn with_font_file(path: &Path) -> Result<Self, FontError> {
    Ok(Self::new(Some(load_font(path)?)))
  }

  fn color_for(&self, class_id: u32) -> Rgb<u8> {
    self.palette[class_id as usize % self.palette.len()]
  }

  /// 在原图副本上绘制检测结果
  pub fn annotate<T: WithLabel>(&self, image: &RgbImage, result: &DetectResult<T>) -> RgbImage {
    let mut canvas = image.clone();
    self.draw_detections_on_image(&mut canvas, result);
    canvas
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label<T: WithLabel>(&self, image: &mut RgbImage, item: &DetectItem<T>) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w < 1.0 || h < 1.0 {
      return;
    }
    let bbox = &item.bbox;
    let color = self.color_for(item.kind.to_label_id());

    let x_min = ((bbox[0] * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((bbox[1] * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((bbox[2] * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((bbox[3] * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for inset in 0..LINE_THICKNESS as i32 {
      let rect_w = x_max - x_min + 1 - 2 * inset;
      let rect_h = y_max - y_min + 1 - 2 * inset;
      if rect_w <= 0 || rect_h <= 0 {
        break;
      }
      let rect = Rect::at(x_min + inset, y_min + inset).of_size(rect_w as u32, rect_h as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", item.kind.to_label_str(), item.score);
    let scale = PxScale::from(self.font_size);
    let (text_w, text_h) = text_size(scale, font, &label);
    let label_w = (text_w as i32 + 2 * LABEL_TEXT_PADDING).min(w as i32 - x_min);
    let label_h = text_h as i32 + 2 * LABEL_TEXT_PADDING;

    // 标签放在边框上方，空间不足时放在框内
    let label_y = if y_min >= label_h { y_min - label_h } else { y_min };

    if label_w > 0 && label_h > 0 {
      let rect = Rect::at(x_min, label_y).of_size(label_w as u32, label_h as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb(LABEL_TEXT_COLOR),
        x_min + LABEL_TEXT_PADDING,
        label_y + LABEL_TEXT_PADDING,
        scale,
        font,
        &label,
      );
    }
  }
}

pub trait DrawDetectionOnImage<T: WithLabel> {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>);
}

impl<T: WithLabel> DrawDetectionOnImage<T> for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for item in result.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ClassLabel;

  fn result(items: Vec<DetectItem<ClassLabel>>) -> DetectResult<ClassLabel> {
    DetectResult::from(items)
  }

  #[test]
  fn annotate_draws_on_a_copy() {
    let image = RgbImage::from_pixel(100, 50, Rgb([0, 0, 0]));
    let draw = Draw::new(None);
    let detections = result(vec![DetectItem {
      kind: ClassLabel::named(2, "car"),
      score: 0.87,
      bbox: [0.1, 0.2, 0.5, 0.8],
    }]);

    let annotated = draw.annotate(&image, &detections);

    assert_eq!(annotated.dimensions(), image.dimensions());
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    let color = draw.color_for(2);
    // 左上角 (10, 10)
    assert_eq!(*annotated.get_pixel(10, 10), color);
    assert_eq!(*annotated.get_pixel(30, 10), color);
    // 框内部未被填充
    assert_eq!(*annotated.get_pixel(30, 25), Rgb([0, 0, 0]));
  }

  #[test]
  fn line_thickness_is_fixed() {
    let image = RgbImage::new(64, 64);
    let draw = Draw::new(None);
    let detections = result(vec![DetectItem {
      kind: ClassLabel::Unknown(3),
      score: 0.5,
      bbox: [0.25, 0.25, 0.75, 0.75],
    }]);
    let annotated = draw.annotate(&image, &detections);
    // 左边框只有 1 像素宽
    assert_ne!(*annotated.get_pixel(16, 32), Rgb([0, 0, 0]));
    assert_eq!(*annotated.get_pixel(17, 32), Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let image = RgbImage::new(20, 20);
    let draw = Draw::new(None);
    let detections = result(vec![DetectItem {
      kind: ClassLabel::named(0, "person"),
      score: 0.9,
      bbox: [0.5, 0.5, 0.5, 0.5],
    }]);
    assert_eq!(draw.annotate(&image, &detections), image);
  }

  #[test]
  fn palette_is_distinct_for_neighbouring_classes() {
    let draw = Draw::new(None);
    assert_ne!(draw.color_for(2), draw.color_for(7));
    assert_eq!(draw.color_for(2), draw.color_for(2 + PALETTE_SIZE as u32));
  }

  #[test]
  fn missing_font_file_is_reported() {
    let err = Draw::with_font_file(Path::new("/nonexistent/font.ttf")).err();
    assert!(matches!(err, Some(FontError::Io(..))));
  }
}
