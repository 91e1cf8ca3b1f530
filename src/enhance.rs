// 该文件是 Cheshu （车数） 项目的一部分。
// src/enhance.rs - 对比度增强（CLAHE）
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

//! 在 L\*a\*b\* 色彩空间的亮度通道上做限制对比度自适应直方图均衡。
//!
//! 8 位 Lab 编码：L 缩放到 0..=255，a、b 偏移 128。只修改 L，a、b 原样写回。

use image::{GrayImage, Luma, Rgb, RgbImage};
use tracing::debug;

const HIST_BINS: usize = 256;

/// CLAHE 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clahe {
  pub clip_limit: f32,
  pub tile_grid: (u32, u32),
}

impl Default for Clahe {
  fn default() -> Self {
    Self {
      clip_limit: 2.0,
      tile_grid: (8, 8),
    }
  }
}

impl Clahe {
  /// 对 RGB 图像增强对比度，返回新图像
  pub fn enhance(&self, image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return image.clone();
    }

    let mut lightness = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width * height) as usize);
    for (x, y, pixel) in image.enumerate_pixels() {
      let [l, a, b] = rgb_to_lab8(pixel.0);
      lightness.put_pixel(x, y, Luma([l]));
      chroma.push((a, b));
    }

    let equalized = self.apply(&lightness);

    let mut output = RgbImage::new(width, height);
    for ((x, y, pixel), (a, b)) in output.enumerate_pixels_mut().zip(chroma) {
      let l = equalized.get_pixel(x, y)[0];
      *pixel = Rgb(lab8_to_rgb([l, a, b]));
    }
    debug!("对比度增强完成: {}x{}", width, height);
    output
  }

  /// 对单通道图像做 CLAHE
  pub fn apply(&self, gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let tiles_x = self.tile_grid.0.max(1) as usize;
    let tiles_y = self.tile_grid.1.max(1) as usize;
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
      return gray.clone();
    }

    // 图像尺寸不是网格整数倍时按 reflect-101 填充
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);
    let tile_area = (tile_w * tile_h) as f32;
    let clip = if self.clip_limit > 0.0 {
      ((self.clip_limit * tile_area / HIST_BINS as f32) as u32).max(1)
    } else {
      u32::MAX
    };
    let lut_scale = (HIST_BINS - 1) as f32 / tile_area;

    let mut luts = vec![[0u8; HIST_BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
      for tx in 0..tiles_x {
        let mut hist = [0u32; HIST_BINS];
        for y in ty * tile_h..(ty + 1) * tile_h {
          let sy = reflect_101(y, h) as u32;
          for x in tx * tile_w..(tx + 1) * tile_w {
            let sx = reflect_101(x, w) as u32;
            hist[gray.get_pixel(sx, sy)[0] as usize] += 1;
          }
        }
        clip_histogram(&mut hist, clip);

        let lut = &mut luts[ty * tiles_x + tx];
        let mut sum = 0u32;
        for (bin, count) in hist.iter().enumerate() {
          sum += count;
          lut[bin] = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
        }
      }
    }

    // 相邻四个分块的映射表双线性插值
    let inv_tile_w = 1.0 / tile_w as f32;
    let inv_tile_h = 1.0 / tile_h as f32;
    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
      let value = gray.get_pixel(x, y)[0] as usize;

      let txf = x as f32 * inv_tile_w - 0.5;
      let tx1 = txf.floor() as isize;
      let xa = txf - tx1 as f32;
      let tx2 = ((tx1 + 1) as usize).min(tiles_x - 1);
      let tx1 = tx1.max(0) as usize;

      let tyf = y as f32 * inv_tile_h - 0.5;
      let ty1 = tyf.floor() as isize;
      let ya = tyf - ty1 as f32;
      let ty2 = ((ty1 + 1) as usize).min(tiles_y - 1);
      let ty1 = ty1.max(0) as usize;

      let lut = |ty: usize, tx: usize| luts[ty * tiles_x + tx][value] as f32;
      let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
      let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
      let result = top * (1.0 - ya) + bottom * ya;
      *pixel = Luma([result.round().clamp(0.0, 255.0) as u8]);
    }
    output
  }
}

fn reflect_101(mut i: usize, n: usize) -> usize {
  if n == 1 {
    return 0;
  }
  let period = 2 * (n - 1);
  i %= period;
  if i < n { i } else { period - i }
}

fn clip_histogram(hist: &mut [u32; HIST_BINS], clip: u32) {
  let mut clipped = 0u32;
  for count in hist.iter_mut() {
    if *count > clip {
      clipped += *count - clip;
      *count = clip;
    }
  }
  if clipped == 0 {
    return;
  }

  let batch = clipped / HIST_BINS as u32;
  let residual = (clipped as usize) % HIST_BINS;
  for count in hist.iter_mut() {
    *count += batch;
  }
  if residual > 0 {
    let step = (HIST_BINS / residual).max(1);
    for count in hist.iter_mut().step_by(step).take(residual) {
      *count += 1;
    }
  }
}

// sRGB D65 白点
const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;
const LAB_EPSILON: f32 = 0.008856;
const LAB_KAPPA: f32 = 7.787;

fn srgb_to_linear(c: u8) -> f32 {
  let c = c as f32 / 255.0;
  if c <= 0.04045 {
    c / 12.92
  } else {
    ((c + 0.055) / 1.055).powf(2.4)
  }
}

fn linear_to_srgb(c: f32) -> u8 {
  let c = c.clamp(0.0, 1.0);
  let v = if c <= 0.003_130_8 {
    c * 12.92
  } else {
    1.055 * c.powf(1.0 / 2.4) - 0.055
  };
  (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn lab_f(t: f32) -> f32 {
  if t > LAB_EPSILON {
    t.cbrt()
  } else {
    LAB_KAPPA * t + 16.0 / 116.0
  }
}

fn lab_f_inv(t: f32) -> f32 {
  let cube = t * t * t;
  if cube > LAB_EPSILON {
    cube
  } else {
    (t - 16.0 / 116.0) / LAB_KAPPA
  }
}

fn rgb_to_lab8([r, g, b]: [u8; 3]) -> [u8; 3] {
  let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));
  let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / WHITE_X;
  let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
  let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / WHITE_Z;

  let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
  let l = if y > LAB_EPSILON {
    116.0 * fy - 16.0
  } else {
    903.3 * y
  };
  let a = 500.0 * (fx - fy);
  let bb = 200.0 * (fy - fz);

  [
    (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
    (a + 128.0).round().clamp(0.0, 255.0) as u8,
    (bb + 128.0).round().clamp(0.0, 255.0) as u8,
  ]
}

fn lab8_to_rgb([l, a, b]: [u8; 3]) -> [u8; 3] {
  let l = l as f32 * 100.0 / 255.0;
  let a = a as f32 - 128.0;
  let bb = b as f32 - 128.0;

  let fy = (l + 16.0) / 116.0;
  let fx = fy + a / 500.0;
  let fz = fy - bb / 200.0;

  let y = if l > 903.3 * LAB_EPSILON {
    fy * fy * fy
  } else {
    l / 903.3
  };
  let x = lab_f_inv(fx) * WHITE_X;
  let z = lab_f_inv(fz) * WHITE_Z;

  let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
  let g = -0.969256 * x + 1.875992 * y + 0.041556 * z;
  let bl = 0.055648 * x - 0.204043 * y + 1.057311 * z;
  [linear_to_srgb(r), linear_to_srgb(g), linear_to_srgb(bl)]
}
