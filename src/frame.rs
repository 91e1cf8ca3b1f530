// 该文件是 Cheshu （车数） 项目的一部分。
// src/frame.rs - 模型输入帧定义
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

use image::{Rgb, RgbImage, imageops::FilterType};
use ndarray::Array4;

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: u8 = 114;

/// 等比缩放并填充到模型输入尺寸的 NCHW 帧
///
/// 保留缩放比例与填充偏移，用于把模型输出的框映射回原图。
#[derive(Debug, Clone)]
pub struct LetterboxFrame {
  data: Array4<f32>,
  scale: f32,
  pad: (f32, f32),
  source: (u32, u32),
}

impl LetterboxFrame {
  pub fn from_image(image: &RgbImage, width: u32, height: u32) -> Self {
    let (src_w, src_h) = image.dimensions();
    let scale = (width as f32 / src_w as f32).min(height as f32 / src_h as f32);
    let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, width);
    let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, height);
    let pad_x = (width - new_w) / 2;
    let pad_y = (height - new_h) / 2;

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([LETTERBOX_FILL; 3]));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let (w, h) = (width as usize, height as usize);
    let mut data = Array4::<f32>::zeros((1, RGB_CHANNELS, h, w));
    for (x, y, pixel) in canvas.enumerate_pixels() {
      for c in 0..RGB_CHANNELS {
        data[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      data,
      scale,
      pad: (pad_x as f32, pad_y as f32),
      source: (src_w, src_h),
    }
  }

  pub fn tensor(&self) -> &Array4<f32> {
    &self.data
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  /// 把输入坐标系下的 `[x_min, y_min, x_max, y_max]` 映射回原图的归一化坐标
  pub fn restore_bbox(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (src_w, src_h) = (self.source.0 as f32, self.source.1 as f32);
    let (pad_x, pad_y) = self.pad;
    let x = |v: f32| ((v - pad_x) / self.scale / src_w).clamp(0.0, 1.0);
    let y = |v: f32| ((v - pad_y) / self.scale / src_h).clamp(0.0, 1.0);
    [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wide_image_is_padded_vertically() {
    let image = RgbImage::from_pixel(200, 100, Rgb([255, 0, 0]));
    let frame = LetterboxFrame::from_image(&image, 64, 64);

    assert_eq!(frame.tensor().shape(), &[1, 3, 64, 64]);
    assert!((frame.scale() - 0.32).abs() < 1e-6);
    // 上方填充区域为灰色
    assert!((frame.tensor()[[0, 0, 0, 10]] - 114.0 / 255.0).abs() < 1e-6);
    // 中间是原图内容
    assert!((frame.tensor()[[0, 0, 32, 32]] - 1.0).abs() < 1e-6);
    assert!(frame.tensor()[[0, 1, 32, 32]].abs() < 1e-6);
  }

  #[test]
  fn restore_bbox_inverts_letterbox() {
    let image = RgbImage::new(200, 100);
    let frame = LetterboxFrame::from_image(&image, 64, 64);
    // 原图 (50, 25)-(150, 75) 在输入中为 (16, 24)-(48, 40)
    let restored = frame.restore_bbox([16.0, 24.0, 48.0, 40.0]);
    let expected = [0.25, 0.25, 0.75, 0.75];
    for (r, e) in restored.iter().zip(expected) {
      assert!((r - e).abs() < 1e-4, "{:?} != {:?}", restored, expected);
    }
  }

  #[test]
  fn restore_bbox_clamps_to_image() {
    let image = RgbImage::new(100, 100);
    let frame = LetterboxFrame::from_image(&image, 50, 50);
    assert_eq!(frame.restore_bbox([-10.0, -5.0, 80.0, 60.0]), [0.0, 0.0, 1.0, 1.0]);
  }
}
