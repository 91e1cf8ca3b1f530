// 该文件是 Cheshu （车数） 项目的一部分。
// src/input/http_image.rs - HTTP 图像下载
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
use reqwest::blocking::Client;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  input::{InputError, decode_image},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = concat!(
  "Mozilla/5.0 (",
  env!("CARGO_PKG_NAME"),
  "/",
  env!("CARGO_PKG_VERSION"),
  ")"
);

pub struct HttpImageInputBuilder {
  url: Url,
  timeout: Duration,
}

impl FromUrl for HttpImageInputBuilder {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !matches!(url.scheme(), "http" | "https") {
      debug!("URI scheme mismatch: expected http(s), found '{}'", url.scheme());
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(HttpImageInputBuilder {
      url: url.clone(),
      timeout: DEFAULT_TIMEOUT,
    })
  }
}

impl HttpImageInputBuilder {
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// 发起一次 GET 请求并解码，不重试
  pub fn build(self) -> Result<HttpImageInput, InputError> {
    let client = Client::builder()
      .user_agent(USER_AGENT)
      .timeout(self.timeout)
      .build()?;

    info!("下载图像: {}", self.url);
    let now = std::time::Instant::now();
    let response = client
      .get(self.url.clone())
      .send()
      .and_then(|response| response.error_for_status())
      .map_err(|e| {
        debug!("图像下载失败: {}", e);
        InputError::Fetch(e)
      })?;
    let bytes = response.bytes()?;
    debug!("下载完成: {} 字节，耗时 {:.2?}", bytes.len(), now.elapsed());

    let image = decode_image(&bytes)?;
    Ok(HttpImageInput { image })
  }
}

pub struct HttpImageInput {
  image: RgbImage,
}

impl HttpImageInput {
  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }
}
