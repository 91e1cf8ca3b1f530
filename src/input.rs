// 该文件是 Cheshu （车数） 项目的一部分。
// src/input.rs - 图像输入
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

use std::time::Duration;

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, FromUrlWithScheme};

mod http_image;
mod read_image_file;

pub use self::http_image::{DEFAULT_TIMEOUT, HttpImageInput, HttpImageInputBuilder, USER_AGENT};
pub use self::read_image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像下载失败: {0}")]
  Fetch(#[from] reqwest::Error),
  #[error("读取图像文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像解码失败（数据可能不是图片）: {0}")]
  Decode(#[from] image::ImageError),
  #[error("不支持的 URL 方案: {0}")]
  SchemeMismatch(String),
  #[error("无效的图片 URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

impl InputError {
  /// 解码阶段的错误；其余均属于获取阶段
  pub fn is_decode_error(&self) -> bool {
    matches!(self, InputError::Decode(_))
  }
}

/// 把下载或读取到的字节解码为 RGB 图像
pub(crate) fn decode_image(bytes: &[u8]) -> Result<RgbImage, InputError> {
  let image = image::load_from_memory(bytes).map_err(|e| {
    debug!("图像解码失败: {}", e);
    InputError::Decode(e)
  })?;
  debug!("图像解码完成: {}x{}", image.width(), image.height());
  Ok(image.into_rgb8())
}

pub enum InputWrapper {
  HttpImage(HttpImageInput),
  ImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    Self::from_url_with_timeout(url, DEFAULT_TIMEOUT)
  }
}

impl InputWrapper {
  /// 解析 URL 文本并获取图像；无法解析的 URL 属于获取失败
  pub fn open(raw: &str, timeout: Duration) -> Result<Self, InputError> {
    let url = url::Url::parse(raw.trim()).map_err(|e| {
      debug!("无法解析 URL {}: {}", raw, e);
      InputError::InvalidUrl(e)
    })?;
    Self::from_url_with_timeout(&url, timeout)
  }

  /// 按 URL 方案选择输入；`timeout` 只对 HTTP 输入生效
  pub fn from_url_with_timeout(url: &url::Url, timeout: Duration) -> Result<Self, InputError> {
    match url.scheme() {
      "http" | "https" => {
        let input = HttpImageInputBuilder::from_url(url)?
          .timeout(timeout)
          .build()?;
        Ok(InputWrapper::HttpImage(input))
      }
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      other => {
        debug!("不支持的 URL 方案: {}", other);
        Err(InputError::SchemeMismatch(other.to_string()))
      }
    }
  }

  pub fn image(&self) -> &RgbImage {
    match self {
      InputWrapper::HttpImage(input) => input.image(),
      InputWrapper::ImageFile(input) => input.image(),
    }
  }

  pub fn into_image(self) -> RgbImage {
    match self {
      InputWrapper::HttpImage(input) => input.into_image(),
      InputWrapper::ImageFile(input) => input.into_image(),
    }
  }

  /// 单帧迭代器，供任务消费
  pub fn into_frames(self) -> SingleFrame {
    SingleFrame {
      image: Some(self.into_image()),
    }
  }
}

pub struct SingleFrame {
  image: Option<RgbImage>,
}

impl From<RgbImage> for SingleFrame {
  fn from(image: RgbImage) -> Self {
    Self { image: Some(image) }
  }
}

impl Iterator for SingleFrame {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_unsupported_scheme() {
    let url = url::Url::parse("ftp://example.com/a.png").unwrap();
    let err = InputWrapper::from_url(&url).err().unwrap();
    assert!(matches!(err, InputError::SchemeMismatch(scheme) if scheme == "ftp"));
  }

  #[test]
  fn unparsable_url_is_a_fetch_error() {
    let err = InputWrapper::open("not a url", DEFAULT_TIMEOUT).err().unwrap();
    assert!(matches!(err, InputError::InvalidUrl(_)));
    assert!(!err.is_decode_error());
  }

  #[test]
  fn garbage_bytes_are_a_decode_error() {
    let err = decode_image(b"<html>not an image</html>").unwrap_err();
    assert!(err.is_decode_error());
  }

  #[test]
  fn single_frame_yields_once() {
    let mut frames = SingleFrame::from(RgbImage::new(2, 2));
    assert!(frames.next().is_some());
    assert!(frames.next().is_none());
  }
}
